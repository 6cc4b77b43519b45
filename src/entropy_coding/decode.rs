// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{extend, huffman::DecodeTable};
use crate::{
    BLOCK_SIZE,
    bit_reader::BitReader,
    coefficients::Block,
    error::{Warning, WarningLog},
};

/// Decodes one Huffman symbol. A code that matches nothing is reported and
/// replaced by symbol 0, which is a zero DC difference or an end of block.
#[inline]
pub fn decode_symbol(br: &mut BitReader, table: &DecodeTable, warnings: &mut WarningLog) -> u8 {
    table.decode(br).unwrap_or_else(|| {
        warnings.emit(Warning::BadHuffmanCode);
        0
    })
}

/// Reads a DC difference: a category symbol and that many extra bits.
#[inline]
pub fn decode_dc_diff(br: &mut BitReader, table: &DecodeTable, warnings: &mut WarningLog) -> i32 {
    let size = decode_symbol(br, table, warnings) as u32;
    extend(br.read(size), size)
}

/// Decodes one block of a sequential scan into `block` (zigzag order),
/// which must be zero on entry. `last_dc` is the component's DC predictor.
pub fn decode_sequential_block(
    br: &mut BitReader,
    dc_table: &DecodeTable,
    ac_table: &DecodeTable,
    last_dc: &mut i32,
    block: &mut Block,
    warnings: &mut WarningLog,
) {
    let diff = decode_dc_diff(br, dc_table, warnings);
    *last_dc = last_dc.wrapping_add(diff);
    block[0] = *last_dc as i16;

    let mut k = 1;
    while k < BLOCK_SIZE {
        let rs = decode_symbol(br, ac_table, warnings);
        let run = (rs >> 4) as usize;
        let size = (rs & 15) as u32;
        if size != 0 {
            k += run;
            let v = extend(br.read(size), size);
            // Corrupt data can run past the end of the block.
            if k < BLOCK_SIZE {
                block[k] = v as i16;
            }
        } else if run == 15 {
            k += 15;
        } else {
            break;
        }
        k += 1;
    }
}
