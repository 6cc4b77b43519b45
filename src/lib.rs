// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![deny(unsafe_code)]
pub mod api;
pub mod bit_reader;
pub mod bit_writer;
pub mod coefficients;
pub mod color;
pub mod color_quant;
pub mod dct;
pub mod decode;
pub mod encode;
pub mod entropy_coding;
pub mod error;
pub mod geometry;
pub mod headers;
pub mod quant;
pub mod sample;
pub mod smoothing;
pub mod util;

pub use api::*;
pub use headers::ColorSpace;

const BLOCK_DIM: usize = 8;
const BLOCK_SIZE: usize = BLOCK_DIM * BLOCK_DIM;
/// Components in a frame.
const MAX_COMPONENTS: usize = 10;
const MAX_COMPS_IN_SCAN: usize = 4;
const MAX_BLOCKS_IN_MCU: usize = 10;
const MAX_SAMP_FACTOR: u8 = 4;
const NUM_QUANT_TBLS: usize = 4;
const NUM_HUFF_TBLS: usize = 4;
/// Largest width or height a frame header can carry.
const MAX_DIMENSION: usize = 65535;
