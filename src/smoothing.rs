// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Cross-block smoothing of dequantized coefficients (ITU T.81 Annex K.8).
//!
//! The five lowest-frequency AC coefficients of a block are predicted from
//! the DC values of the block and its eight neighbours. A prediction replaces
//! the decoded value only if the encoder could have quantized it to the same
//! level, i.e. it lies within half a quantization step.

use crate::{BLOCK_SIZE, coefficients::ComponentBlocks, quant::QuantTable};

/// Divides by 256, rounding half away from zero.
#[inline]
fn divide_256(x: i64) -> i64 {
    if x < 0 {
        -((128 - x) / 256)
    } else {
        (x + 128) / 256
    }
}

/// (natural index, zigzag index) of each predicted coefficient.
const AC01: (usize, usize) = (1, 1);
const AC02: (usize, usize) = (2, 5);
const AC10: (usize, usize) = (8, 2);
const AC11: (usize, usize) = (9, 4);
const AC20: (usize, usize) = (16, 3);

pub struct BlockSmoother<'a> {
    quant: &'a QuantTable,
    blocks_in_row: usize,
    block_rows: usize,
}

impl<'a> BlockSmoother<'a> {
    /// `blocks_in_row` counts only whole blocks of image data, so a partial
    /// last column is treated as an edge.
    pub fn new(quant: &'a QuantTable, downsampled_width: usize, block_rows: usize) -> Self {
        BlockSmoother {
            quant,
            blocks_in_row: downsampled_width / 8,
            block_rows,
        }
    }

    /// Whether block (`bx`, `by`) has all eight neighbours.
    pub fn applies(&self, bx: usize, by: usize) -> bool {
        bx >= 1 && bx + 1 < self.blocks_in_row && by >= 1 && by + 1 < self.block_rows
    }

    /// Smooths the dequantized natural-order `coefs` of block (`bx`, `by`),
    /// reading neighbour DC values from the quantized `blocks`.
    pub fn smooth(
        &self,
        blocks: &ComponentBlocks,
        bx: usize,
        by: usize,
        coefs: &mut [i32; BLOCK_SIZE],
    ) {
        if !self.applies(bx, by) {
            return;
        }
        // DC values reach 2^31 with 16-bit tables.
        let q0 = self.quant.get(0) as i64;
        let dc = |dx: usize, dy: usize| blocks.block(bx + dx - 1, by + dy - 1)[0] as i64 * q0;
        let (dc1, dc2, dc3) = (dc(0, 0), dc(1, 0), dc(2, 0));
        let (dc4, dc5, dc6) = (dc(0, 1), dc(1, 1), dc(2, 1));
        let (dc7, dc8, dc9) = (dc(0, 2), dc(1, 2), dc(2, 2));

        let predictions = [
            (AC01, divide_256(36 * (dc4 - dc6))),
            (AC02, divide_256(9 * (dc4 + dc6 - 2 * dc5))),
            (AC10, divide_256(36 * (dc2 - dc8))),
            (AC11, divide_256(5 * ((dc1 - dc3) - (dc7 - dc9)))),
            (AC20, divide_256(9 * (dc2 + dc8 - 2 * dc5))),
        ];
        for ((n, z), ac) in predictions {
            let q = self.quant.get(crate::quant::NATURAL_ORDER[z]) as i64;
            if (coefs[n] as i64 - ac).abs() << 1 <= q {
                // Predictions stay below 2^30.
                coefs[n] = ac as i32;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Result;
    use test_log::test;

    #[test]
    fn rounding() {
        assert_eq!(divide_256(128), 1);
        assert_eq!(divide_256(127), 0);
        assert_eq!(divide_256(-128), -1);
        assert_eq!(divide_256(-127), 0);
        assert_eq!(divide_256(-384), -2);
    }

    #[test]
    fn horizontal_ramp() -> Result<()> {
        let quant = QuantTable::new([16; BLOCK_SIZE])?;
        let mut blocks = ComponentBlocks::new(3, 3)?;
        for by in 0..3 {
            for bx in 0..3 {
                blocks.block_mut(bx, by)[0] = bx as i16 * 4;
            }
        }
        let smoother = BlockSmoother::new(&quant, 24, 3);
        assert!(smoother.applies(1, 1));
        assert!(!smoother.applies(0, 1));
        let mut coefs = [0; BLOCK_SIZE];
        coefs[0] = 64;
        coefs[1] = -30;
        smoother.smooth(&blocks, 1, 1, &mut coefs);
        // 36 * (DC4 - DC6) / 256 = -18, more than half a step from -30.
        assert_eq!(coefs[1], -30);
        coefs[1] = -14;
        smoother.smooth(&blocks, 1, 1, &mut coefs);
        assert_eq!(coefs[1], -18);
        assert_eq!(coefs[2], 0);
        Ok(())
    }

    #[test]
    fn extreme_dc_values() -> Result<()> {
        let quant = QuantTable::new([65535; BLOCK_SIZE])?;
        let mut blocks = ComponentBlocks::new(3, 3)?;
        for by in 0..3 {
            for bx in 0..3 {
                blocks.block_mut(bx, by)[0] = if bx == 0 { i16::MAX } else { i16::MIN };
            }
        }
        let smoother = BlockSmoother::new(&quant, 24, 3);
        let mut coefs = [0; BLOCK_SIZE];
        coefs[0] = i16::MIN as i32 * 65535;
        coefs[1] = 603_961_000;
        smoother.smooth(&blocks, 1, 1, &mut coefs);
        // 36 * (DC4 - DC6) / 256, with DC4 - DC6 = 65535 * 65535.
        assert_eq!(coefs[1], 603_961_344);
        assert_eq!(coefs[2], 0);
        Ok(())
    }

    #[test]
    fn partial_last_column_is_an_edge() -> Result<()> {
        let quant = QuantTable::new([1; BLOCK_SIZE])?;
        let smoother = BlockSmoother::new(&quant, 23, 3);
        assert!(!smoother.applies(1, 1));
        Ok(())
    }
}
