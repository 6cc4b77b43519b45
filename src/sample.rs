// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Resampling between full-resolution planes and subsampled components.

pub mod downsample;
pub mod upsample;

pub use downsample::Downsampler;
pub use upsample::Upsampler;

use crate::error::{Error, Result};

/// How a component's resolution relates to the frame's maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingRatio {
    Fullsize,
    /// Half width, full height.
    H2V1,
    /// Half width, half height.
    H2V2,
    /// Any other whole-number ratio.
    Integral { h_expand: usize, v_expand: usize },
}

impl SamplingRatio {
    pub fn new(h: usize, v: usize, max_h: usize, max_v: usize) -> Result<SamplingRatio> {
        if h == max_h && v == max_v {
            Ok(SamplingRatio::Fullsize)
        } else if h * 2 == max_h && v == max_v {
            Ok(SamplingRatio::H2V1)
        } else if h * 2 == max_h && v * 2 == max_v {
            Ok(SamplingRatio::H2V2)
        } else if max_h % h == 0 && max_v % v == 0 {
            Ok(SamplingRatio::Integral {
                h_expand: max_h / h,
                v_expand: max_v / v,
            })
        } else {
            Err(Error::FractionalSampling(
                h as u8,
                v as u8,
                max_h as u8,
                max_v as u8,
            ))
        }
    }

    pub fn expansion(self) -> (usize, usize) {
        match self {
            SamplingRatio::Fullsize => (1, 1),
            SamplingRatio::H2V1 => (2, 1),
            SamplingRatio::H2V2 => (2, 2),
            SamplingRatio::Integral { h_expand, v_expand } => (h_expand, v_expand),
        }
    }
}
