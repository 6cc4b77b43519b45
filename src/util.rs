// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod ring_buffer;
#[cfg(test)]
pub mod test;
pub mod tracing_wrappers;

pub use ring_buffer::*;

/// Integer division rounding up.
pub fn div_ceil(a: usize, b: usize) -> usize {
    a.div_ceil(b)
}

/// Rounds `a` up to the next multiple of `b`.
pub fn round_up(a: usize, b: usize) -> usize {
    a.div_ceil(b) * b
}

/// Clamps an intermediate result into the 8-bit sample range.
#[inline]
pub fn clamp_sample(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}
