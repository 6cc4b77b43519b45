// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::Write;

use super::{
    huffman::{EncodeTable, TableClass},
    magnitude_bits, magnitude_category,
    optimize::Histogram,
};
use crate::{
    BLOCK_SIZE, NUM_HUFF_TBLS,
    bit_writer::BitWriter,
    coefficients::Block,
    error::{Error, Result},
};

/// Receives the symbols and raw bits of a scan. Implemented by the actual
/// Huffman encoder and by the statistics pass that precedes table
/// optimization, so that both walk the coefficients with the same code.
pub trait EntropySink {
    fn emit_dc(&mut self, table: usize, symbol: u8) -> Result<()>;
    fn emit_ac(&mut self, table: usize, symbol: u8) -> Result<()>;
    /// The low `num` bits of `bits`.
    fn emit_bits(&mut self, num: u32, bits: u32) -> Result<()>;
    /// Ends a restart interval with marker RSTn.
    fn restart(&mut self, n: u8) -> Result<()>;
}

pub struct HuffmanSink<'a, W: Write> {
    writer: BitWriter<'a, W>,
    dc: [Option<EncodeTable>; NUM_HUFF_TBLS],
    ac: [Option<EncodeTable>; NUM_HUFF_TBLS],
}

impl<'a, W: Write> HuffmanSink<'a, W> {
    pub fn new(
        out: &'a mut W,
        dc: [Option<EncodeTable>; NUM_HUFF_TBLS],
        ac: [Option<EncodeTable>; NUM_HUFF_TBLS],
    ) -> Self {
        HuffmanSink {
            writer: BitWriter::new(out),
            dc,
            ac,
        }
    }

    fn table(&self, class: TableClass, index: usize) -> Result<&EncodeTable> {
        let tables = match class {
            TableClass::Dc => &self.dc,
            TableClass::Ac => &self.ac,
        };
        tables
            .get(index)
            .and_then(Option::as_ref)
            .ok_or(Error::UndefinedHuffmanTable {
                class: class.name(),
                index,
            })
    }

    /// Pads the last byte and flushes everything to the output.
    pub fn finish(self) -> Result<()> {
        self.writer.finish()
    }
}

impl<W: Write> EntropySink for HuffmanSink<'_, W> {
    fn emit_dc(&mut self, table: usize, symbol: u8) -> Result<()> {
        let code = self.table(TableClass::Dc, table)?.code(symbol);
        self.writer.write_code(code)
    }

    fn emit_ac(&mut self, table: usize, symbol: u8) -> Result<()> {
        let code = self.table(TableClass::Ac, table)?.code(symbol);
        self.writer.write_code(code)
    }

    fn emit_bits(&mut self, num: u32, bits: u32) -> Result<()> {
        self.writer.write(num, bits)
    }

    fn restart(&mut self, n: u8) -> Result<()> {
        self.writer.write_restart(n)
    }
}

/// Symbol statistics for building optimal tables.
#[derive(Debug, Clone)]
pub struct FrequencyCounter {
    pub dc: [Histogram; NUM_HUFF_TBLS],
    pub ac: [Histogram; NUM_HUFF_TBLS],
}

impl Default for FrequencyCounter {
    fn default() -> Self {
        FrequencyCounter {
            dc: [[0; 257]; NUM_HUFF_TBLS],
            ac: [[0; 257]; NUM_HUFF_TBLS],
        }
    }
}

impl FrequencyCounter {
    pub fn histogram(&self, class: TableClass, index: usize) -> &Histogram {
        match class {
            TableClass::Dc => &self.dc[index],
            TableClass::Ac => &self.ac[index],
        }
    }

    /// Whether any symbol was counted for the table.
    pub fn is_used(&self, class: TableClass, index: usize) -> bool {
        self.histogram(class, index).iter().any(|&f| f > 0)
    }
}

impl EntropySink for FrequencyCounter {
    fn emit_dc(&mut self, table: usize, symbol: u8) -> Result<()> {
        let histogram = self.dc.get_mut(table).ok_or(Error::BadTableIndex(table))?;
        histogram[symbol as usize] += 1;
        Ok(())
    }

    fn emit_ac(&mut self, table: usize, symbol: u8) -> Result<()> {
        let histogram = self.ac.get_mut(table).ok_or(Error::BadTableIndex(table))?;
        histogram[symbol as usize] += 1;
        Ok(())
    }

    fn emit_bits(&mut self, _num: u32, _bits: u32) -> Result<()> {
        Ok(())
    }

    fn restart(&mut self, _n: u8) -> Result<()> {
        Ok(())
    }
}

/// Codes one block of a sequential scan. `last_dc` is the component's DC
/// predictor and is updated.
pub fn encode_sequential_block(
    sink: &mut impl EntropySink,
    block: &Block,
    last_dc: &mut i32,
    dc_table: usize,
    ac_table: usize,
) -> Result<()> {
    let dc = block[0] as i32;
    let diff = dc - *last_dc;
    *last_dc = dc;
    let nbits = magnitude_category(diff);
    sink.emit_dc(dc_table, nbits as u8)?;
    sink.emit_bits(nbits, magnitude_bits(diff, nbits))?;

    let mut run = 0u32;
    for &coef in &block[1..BLOCK_SIZE] {
        let v = coef as i32;
        if v == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            sink.emit_ac(ac_table, 0xF0)?;
            run -= 16;
        }
        let nbits = magnitude_category(v);
        sink.emit_ac(ac_table, ((run << 4) + nbits) as u8)?;
        sink.emit_bits(nbits, magnitude_bits(v, nbits))?;
        run = 0;
    }
    if run > 0 {
        sink.emit_ac(ac_table, 0x00)?;
    }
    Ok(())
}
