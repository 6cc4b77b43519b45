// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::Write;

use crate::{
    error::{Error, Result},
    headers::markers,
};

const OUTPUT_BUFFER_SIZE: usize = 4096;

/// Packs entropy-coded data MSB first, stuffing a zero byte after every
/// 0xFF so that the data can never be mistaken for a marker.
pub struct BitWriter<'a, W: Write> {
    out: &'a mut W,
    buffer: Vec<u8>,
    bit_buf: u64,
    bits_in_buf: u32,
}

impl<'a, W: Write> BitWriter<'a, W> {
    pub fn new(out: &'a mut W) -> BitWriter<'a, W> {
        BitWriter {
            out,
            buffer: Vec::with_capacity(OUTPUT_BUFFER_SIZE),
            bit_buf: 0,
            bits_in_buf: 0,
        }
    }

    fn emit_byte(&mut self, byte: u8) -> Result<()> {
        self.buffer.push(byte);
        if byte == 0xFF {
            self.buffer.push(0);
        }
        if self.buffer.len() >= OUTPUT_BUFFER_SIZE {
            self.out.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Writes the low `num` bits of `bits`. Writing zero bits is a no-op.
    pub fn write(&mut self, num: u32, bits: u32) -> Result<()> {
        debug_assert!(num <= 24);
        if num == 0 {
            return Ok(());
        }
        self.bit_buf = (self.bit_buf << num) | (bits as u64 & ((1u64 << num) - 1));
        self.bits_in_buf += num;
        while self.bits_in_buf >= 8 {
            self.bits_in_buf -= 8;
            self.emit_byte((self.bit_buf >> self.bits_in_buf) as u8)?;
        }
        self.bit_buf &= (1u64 << self.bits_in_buf) - 1;
        Ok(())
    }

    /// Writes one Huffman code. A zero length means the table has no code
    /// for the symbol being coded.
    pub fn write_code(&mut self, (code, len): (u16, u8)) -> Result<()> {
        if len == 0 {
            return Err(Error::MissingHuffmanCode);
        }
        self.write(len as u32, code as u32)
    }

    /// Pads the last partial byte with 1 bits.
    pub fn flush_bits(&mut self) -> Result<()> {
        self.write(7, 0x7F)?;
        self.bit_buf = 0;
        self.bits_in_buf = 0;
        Ok(())
    }

    /// Ends the current restart interval with marker RSTn.
    pub fn write_restart(&mut self, n: u8) -> Result<()> {
        self.flush_bits()?;
        self.buffer.push(0xFF);
        self.buffer.push(markers::RST0 + (n & 7));
        Ok(())
    }

    /// Pads the data and hands everything written so far to the output.
    pub fn finish(mut self) -> Result<()> {
        self.flush_bits()?;
        self.out.write_all(&self.buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn stuffing_and_padding() -> Result<()> {
        let mut out = vec![];
        let mut w = BitWriter::new(&mut out);
        w.write(8, 0xFF)?;
        w.write(4, 0b1010)?;
        w.finish()?;
        assert_eq!(out, [0xFF, 0x00, 0xAF]);
        Ok(())
    }

    #[test]
    fn restarts_are_byte_aligned() -> Result<()> {
        let mut out = vec![];
        let mut w = BitWriter::new(&mut out);
        w.write(3, 0)?;
        w.write_restart(9)?;
        w.write(8, 0x12)?;
        w.finish()?;
        assert_eq!(out, [0x1F, 0xFF, 0xD1, 0x12]);
        Ok(())
    }

    #[test]
    fn missing_code() {
        let mut out = vec![];
        let mut w = BitWriter::new(&mut out);
        assert!(matches!(w.write_code((0, 0)), Err(Error::MissingHuffmanCode)));
    }

    #[test]
    fn empty_stream_stays_empty() -> Result<()> {
        let mut out = vec![];
        BitWriter::new(&mut out).finish()?;
        assert!(out.is_empty());
        Ok(())
    }
}
