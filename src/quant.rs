// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{BLOCK_SIZE, coefficients::Block, error::Result, error::Error};

/// `NATURAL_ORDER[k]` is the natural (row-major) position of the `k`-th
/// coefficient in zigzag order.
pub const NATURAL_ORDER: [usize; BLOCK_SIZE] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Annex K.1 luminance table, natural order.
pub const STD_LUMINANCE_QUANT: [u16; BLOCK_SIZE] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Annex K.1 chrominance table, natural order.
pub const STD_CHROMINANCE_QUANT: [u16; BLOCK_SIZE] = [
    17, 18, 24, 47, 99, 99, 99, 99, //
    18, 21, 26, 66, 99, 99, 99, 99, //
    24, 26, 56, 99, 99, 99, 99, 99, //
    47, 66, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// A quantization table, stored in natural order. Entries are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantTable {
    values: [u16; BLOCK_SIZE],
}

/// Converts a 1..=100 quality rating to a percentage scale factor for the
/// standard tables. Out-of-range ratings are clamped.
pub fn quality_scaling(quality: u32) -> u32 {
    let quality = quality.clamp(1, 100);
    if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    }
}

impl QuantTable {
    /// Builds a table from natural-order values; zero entries are rejected.
    pub fn new(values: [u16; BLOCK_SIZE]) -> Result<QuantTable> {
        if values.contains(&0) {
            return Err(Error::InvalidOption("quantization table entry is zero"));
        }
        Ok(QuantTable { values })
    }

    /// Builds a table from zigzag-order values as they appear in DQT.
    pub fn from_zigzag(zigzag: &[u16; BLOCK_SIZE]) -> QuantTable {
        let mut values = [0; BLOCK_SIZE];
        for (k, &v) in zigzag.iter().enumerate() {
            // A zero entry in a file would make every coefficient vanish;
            // treat it as 1 so dequantization stays well defined.
            values[NATURAL_ORDER[k]] = v.max(1);
        }
        QuantTable { values }
    }

    /// `base` scaled by a percentage, each entry clamped to 1..=65535 (or
    /// 1..=255 when `force_baseline` is set).
    pub fn scaled(base: &[u16; BLOCK_SIZE], scale_factor: u32, force_baseline: bool) -> QuantTable {
        let max = if force_baseline { 255 } else { 65535 };
        let values = base.map(|b| {
            let v = (b as u64 * scale_factor as u64 + 50) / 100;
            v.clamp(1, max) as u16
        });
        QuantTable { values }
    }

    pub fn for_quality(base: &[u16; BLOCK_SIZE], quality: u32, force_baseline: bool) -> QuantTable {
        Self::scaled(base, quality_scaling(quality), force_baseline)
    }

    /// Value for natural position `n`.
    pub fn get(&self, n: usize) -> u16 {
        self.values[n]
    }

    pub fn natural(&self) -> &[u16; BLOCK_SIZE] {
        &self.values
    }

    pub fn zigzag(&self) -> [u16; BLOCK_SIZE] {
        std::array::from_fn(|k| self.values[NATURAL_ORDER[k]])
    }

    /// Whether DQT has to carry 16-bit entries for this table.
    pub fn needs_16_bit(&self) -> bool {
        self.values.iter().any(|&v| v > 255)
    }

    /// Divides natural-order DCT output by the table, rounding half away
    /// from zero, and returns the coefficients in zigzag order.
    pub fn quantize(&self, dct: &[i32; BLOCK_SIZE]) -> Block {
        let mut out = [0i16; BLOCK_SIZE];
        for (k, o) in out.iter_mut().enumerate() {
            let n = NATURAL_ORDER[k];
            let q = self.values[n] as i32;
            let temp = dct[n];
            let quotient = (temp.abs() + (q >> 1)) / q;
            *o = if temp < 0 { -quotient } else { quotient } as i16;
        }
        out
    }

    /// Multiplies zigzag-order coefficients back and returns them in natural
    /// order.
    pub fn dequantize(&self, coefs: &Block) -> [i32; BLOCK_SIZE] {
        let mut out = [0i32; BLOCK_SIZE];
        for (k, &c) in coefs.iter().enumerate() {
            let n = NATURAL_ORDER[k];
            out[n] = c as i32 * self.values[n] as i32;
        }
        out
    }
}
