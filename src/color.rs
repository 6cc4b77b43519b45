// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Color space conversion between caller pixels and JPEG components.
//!
//! Conversions run on one row at a time: interleaved caller samples on one
//! side, one plane row per component on the other. Arithmetic is integer
//! only, with products precomputed per sample value and 16 fractional bits.

use crate::{
    error::{Error, Result},
    headers::ColorSpace,
    util::clamp_sample,
};

const SCALEBITS: u32 = 16;
const ONE_HALF: i32 = 1 << (SCALEBITS - 1);
const CBCR_OFFSET: i32 = 128 << SCALEBITS;

const fn fix(x: f64) -> i32 {
    (x * (1i64 << SCALEBITS) as f64 + 0.5) as i32
}

/// Per-sample products for RGB to YCbCr.
struct RgbYccTables {
    r_y: [i32; 256],
    g_y: [i32; 256],
    b_y: [i32; 256],
    r_cb: [i32; 256],
    g_cb: [i32; 256],
    /// Also used as `r_cr`.
    b_cb: [i32; 256],
    g_cr: [i32; 256],
    b_cr: [i32; 256],
}

impl RgbYccTables {
    fn new() -> Box<RgbYccTables> {
        // B=>Cb and R=>Cr share a table. ONE_HALF - 1 instead of ONE_HALF
        // keeps the maximum chroma output at 255.
        Box::new(RgbYccTables {
            r_y: std::array::from_fn(|i| fix(0.29900) * i as i32),
            g_y: std::array::from_fn(|i| fix(0.58700) * i as i32),
            b_y: std::array::from_fn(|i| fix(0.11400) * i as i32 + ONE_HALF),
            r_cb: std::array::from_fn(|i| -fix(0.16874) * i as i32),
            g_cb: std::array::from_fn(|i| -fix(0.33126) * i as i32),
            b_cb: std::array::from_fn(|i| fix(0.50000) * i as i32 + CBCR_OFFSET + ONE_HALF - 1),
            g_cr: std::array::from_fn(|i| -fix(0.41869) * i as i32),
            b_cr: std::array::from_fn(|i| -fix(0.08131) * i as i32),
        })
    }

    #[inline]
    fn y(&self, r: u8, g: u8, b: u8) -> u8 {
        ((self.r_y[r as usize] + self.g_y[g as usize] + self.b_y[b as usize]) >> SCALEBITS) as u8
    }

    #[inline]
    fn ycc(&self, r: u8, g: u8, b: u8) -> (u8, u8, u8) {
        let (r, g, b) = (r as usize, g as usize, b as usize);
        let y = (self.r_y[r] + self.g_y[g] + self.b_y[b]) >> SCALEBITS;
        let cb = (self.r_cb[r] + self.g_cb[g] + self.b_cb[b]) >> SCALEBITS;
        let cr = (self.b_cb[r] + self.g_cr[g] + self.b_cr[b]) >> SCALEBITS;
        (y as u8, cb as u8, cr as u8)
    }
}

/// Per-sample chroma terms for YCbCr to RGB.
struct YccRgbTables {
    cr_r: [i32; 256],
    cb_b: [i32; 256],
    cr_g: [i32; 256],
    cb_g: [i32; 256],
}

impl YccRgbTables {
    fn new() -> Box<YccRgbTables> {
        // Chroma is centered on 128, matching the forward transform.
        Box::new(YccRgbTables {
            cr_r: std::array::from_fn(|i| (fix(1.40200) * (i as i32 - 128) + ONE_HALF) >> SCALEBITS),
            cb_b: std::array::from_fn(|i| (fix(1.77200) * (i as i32 - 128) + ONE_HALF) >> SCALEBITS),
            cr_g: std::array::from_fn(|i| -fix(0.71414) * (i as i32 - 128)),
            cb_g: std::array::from_fn(|i| -fix(0.34414) * (i as i32 - 128) + ONE_HALF),
        })
    }

    #[inline]
    fn rgb(&self, y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
        let y = y as i32;
        let (cb, cr) = (cb as usize, cr as usize);
        (
            clamp_sample(y + self.cr_r[cr]),
            clamp_sample(y + ((self.cb_g[cb] + self.cr_g[cr]) >> SCALEBITS)),
            clamp_sample(y + self.cb_b[cb]),
        )
    }
}

enum ForwardKind {
    /// Component `c` is input channel `c`.
    Copy,
    RgbToYcc(Box<RgbYccTables>),
    RgbToGray(Box<RgbYccTables>),
    /// Keeps only the first channel.
    FirstChannel,
    CmykToYcck(Box<RgbYccTables>),
}

/// Converts interleaved caller rows into component rows.
pub struct ColorEncoder {
    kind: ForwardKind,
    in_channels: usize,
    num_components: usize,
}

impl ColorEncoder {
    pub fn new(
        input: ColorSpace,
        in_channels: usize,
        jpeg: ColorSpace,
        num_components: usize,
    ) -> Result<ColorEncoder> {
        use ColorSpace::*;
        let unsupported = Err(Error::UnsupportedColorConversion {
            from: input,
            to: jpeg,
        });
        if input.channels().is_some_and(|c| c != in_channels) {
            return Err(Error::InvalidOption("channel count does not match input color space"));
        }
        if jpeg.channels().is_some_and(|c| c != num_components) {
            return Err(Error::InvalidOption("component count does not match JPEG color space"));
        }
        let kind = match (input, jpeg) {
            (Rgb, YCbCr) => ForwardKind::RgbToYcc(RgbYccTables::new()),
            (Rgb, Grayscale) => ForwardKind::RgbToGray(RgbYccTables::new()),
            (YCbCr, Grayscale) => ForwardKind::FirstChannel,
            (Cmyk, Ycck) => ForwardKind::CmykToYcck(RgbYccTables::new()),
            (Unknown, Unknown) if in_channels == num_components => ForwardKind::Copy,
            (a, b) if a == b && a != Unknown => ForwardKind::Copy,
            _ => return unsupported,
        };
        Ok(ColorEncoder {
            kind,
            in_channels,
            num_components,
        })
    }

    /// Converts `input` (interleaved, `in_channels` per pixel) into one row
    /// per component. The output rows may be wider than the input; only the
    /// first `input.len() / in_channels` samples are written.
    pub fn convert_row(&self, input: &[u8], output: &mut [&mut [u8]]) {
        debug_assert_eq!(output.len(), self.num_components);
        let nc = self.in_channels;
        match &self.kind {
            ForwardKind::Copy | ForwardKind::FirstChannel => {
                for (c, out) in output.iter_mut().enumerate() {
                    for (o, px) in out.iter_mut().zip(input.chunks_exact(nc)) {
                        *o = px[c];
                    }
                }
            }
            ForwardKind::RgbToGray(t) => {
                for (o, px) in output[0].iter_mut().zip(input.chunks_exact(nc)) {
                    *o = t.y(px[0], px[1], px[2]);
                }
            }
            ForwardKind::RgbToYcc(t) => {
                let [y, cb, cr] = output else {
                    unreachable!("YCbCr has three components");
                };
                for (x, px) in input.chunks_exact(nc).enumerate() {
                    (y[x], cb[x], cr[x]) = t.ycc(px[0], px[1], px[2]);
                }
            }
            ForwardKind::CmykToYcck(t) => {
                let [y, cb, cr, k] = output else {
                    unreachable!("YCCK has four components");
                };
                for (x, px) in input.chunks_exact(nc).enumerate() {
                    (y[x], cb[x], cr[x]) = t.ycc(255 - px[0], 255 - px[1], 255 - px[2]);
                    k[x] = px[3];
                }
            }
        }
    }
}

enum InverseKind {
    Copy,
    /// Output is the first component.
    FirstComponent,
    YccToRgb(Box<YccRgbTables>),
    RgbToGray(Box<RgbYccTables>),
    GrayToRgb,
    YcckToCmyk(Box<YccRgbTables>),
}

/// Converts component rows into interleaved output rows.
pub struct ColorDecoder {
    kind: InverseKind,
    out_channels: usize,
}

/// The output color space used when the caller does not ask for one.
pub fn default_output_space(jpeg: ColorSpace) -> ColorSpace {
    match jpeg {
        ColorSpace::YCbCr => ColorSpace::Rgb,
        ColorSpace::Ycck => ColorSpace::Cmyk,
        other => other,
    }
}

impl ColorDecoder {
    pub fn new(jpeg: ColorSpace, num_components: usize, output: ColorSpace) -> Result<ColorDecoder> {
        use ColorSpace::*;
        let kind = match (jpeg, output) {
            (YCbCr, Rgb) => InverseKind::YccToRgb(YccRgbTables::new()),
            (YCbCr, Grayscale) => InverseKind::FirstComponent,
            (Rgb, Grayscale) => InverseKind::RgbToGray(RgbYccTables::new()),
            (Grayscale, Rgb) => InverseKind::GrayToRgb,
            (Ycck, Cmyk) => InverseKind::YcckToCmyk(YccRgbTables::new()),
            (a, b) if a == b => InverseKind::Copy,
            _ => {
                return Err(Error::UnsupportedColorConversion {
                    from: jpeg,
                    to: output,
                });
            }
        };
        if jpeg.channels().is_some_and(|c| c != num_components) {
            return Err(Error::InvalidComponentCount(num_components));
        }
        let out_channels = output.channels().unwrap_or(num_components);
        Ok(ColorDecoder { kind, out_channels })
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Converts `width` pixels of component rows into `output`, interleaved.
    pub fn convert_row(&self, input: &[&[u8]], output: &mut [u8], width: usize) {
        let out = &mut output[..width * self.out_channels];
        match &self.kind {
            InverseKind::Copy => {
                let nc = self.out_channels;
                for (c, row) in input.iter().enumerate() {
                    for (px, &s) in out.chunks_exact_mut(nc).zip(row.iter()) {
                        px[c] = s;
                    }
                }
            }
            InverseKind::FirstComponent => out.copy_from_slice(&input[0][..width]),
            InverseKind::GrayToRgb => {
                for (px, &s) in out.chunks_exact_mut(3).zip(input[0].iter()) {
                    px.fill(s);
                }
            }
            InverseKind::RgbToGray(t) => {
                for (x, o) in out.iter_mut().enumerate() {
                    *o = t.y(input[0][x], input[1][x], input[2][x]);
                }
            }
            InverseKind::YccToRgb(t) => {
                for (x, px) in out.chunks_exact_mut(3).enumerate() {
                    (px[0], px[1], px[2]) = t.rgb(input[0][x], input[1][x], input[2][x]);
                }
            }
            InverseKind::YcckToCmyk(t) => {
                for (x, px) in out.chunks_exact_mut(4).enumerate() {
                    let (r, g, b) = t.rgb(input[0][x], input[1][x], input[2][x]);
                    px[0] = 255 - r;
                    px[1] = 255 - g;
                    px[2] = 255 - b;
                    px[3] = input[3][x];
                }
            }
        }
    }
}
