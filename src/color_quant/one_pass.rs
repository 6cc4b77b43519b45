// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{Colormap, ErrorDiffusion, MAX_COLORS};
use crate::{
    ColorSpace,
    error::{Error, Result},
    util::tracing_wrappers::*,
};

/// Quantizers work on at most this many channels.
const MAX_QUANT_CHANNELS: usize = 4;

/// Picks how many levels each channel gets, so that their product is at
/// most `max_colors`.
fn select_levels(color_space: ColorSpace, channels: usize, max_colors: usize) -> Result<Vec<usize>> {
    let mut iroot = 1usize;
    loop {
        iroot += 1;
        if iroot.checked_pow(channels as u32).is_none_or(|t| t > max_colors) {
            break;
        }
    }
    iroot -= 1;
    if iroot < 2 {
        return Err(Error::InvalidColorCount(max_colors));
    }

    if color_space != ColorSpace::Rgb || channels != 3 {
        let mut levels = vec![iroot; channels];
        let mut total: usize = levels.iter().product();
        for level in levels.iter_mut() {
            let grown = total / *level * (*level + 1);
            if grown > max_colors {
                break;
            }
            *level += 1;
            total = grown;
        }
        return Ok(levels);
    }

    // RGB levels roughly in the proportion 3:4:2.
    let mut levels = match max_colors {
        256 => return Ok(vec![8, 8, 4]),
        ..12 => vec![2, 2, 2],
        12..18 => vec![2, 3, 2],
        18..24 => vec![3, 3, 2],
        24..27 => vec![3, 4, 2],
        27..36 => vec![3, 3, 3],
        _ => vec![(iroot * 266) >> 8, (iroot * 355) >> 8, (iroot * 177) >> 8],
    };
    let mut total: usize = levels.iter().product();
    loop {
        let mut changed = false;
        for level in levels.iter_mut().rev() {
            let grown = total / *level * (*level + 1);
            if grown <= max_colors {
                *level += 1;
                total = grown;
                changed = true;
            }
        }
        if !changed {
            return Ok(levels);
        }
    }
}

/// The value of level `j` of `max_level + 1` evenly spaced levels.
fn level_value(j: usize, max_level: usize) -> u8 {
    ((j * 255 + max_level / 2) / max_level) as u8
}

/// Maps pixels onto a uniform grid of colors, optionally dithered.
pub struct OnePassQuantizer {
    channels: usize,
    width: usize,
    colormap: Colormap,
    /// For each channel and sample value, that channel's contribution to
    /// the colormap index of the nearest grid color.
    color_index: Vec<[u8; 256]>,
    dither: Option<ErrorDiffusion>,
}

impl OnePassQuantizer {
    pub fn new(
        color_space: ColorSpace,
        channels: usize,
        desired_colors: usize,
        dither: bool,
        width: usize,
    ) -> Result<OnePassQuantizer> {
        if channels == 0 || channels > MAX_QUANT_CHANNELS {
            return Err(Error::InvalidOption("cannot quantize more than 4 channels"));
        }
        if !(2..=MAX_COLORS).contains(&desired_colors) {
            return Err(Error::InvalidColorCount(desired_colors));
        }
        let levels = select_levels(color_space, channels, desired_colors)?;
        let total: usize = levels.iter().product();
        debug!(?levels, total, "one-pass colormap");

        let mut entries = vec![0u8; total * channels];
        let mut color_index = vec![[0u8; 256]; channels];
        let mut block_size = total;
        for (c, &n) in levels.iter().enumerate() {
            let max_level = n - 1;
            let block_dist = block_size;
            block_size /= n;
            for j in 0..n {
                let value = level_value(j, max_level);
                for start in (0..total).step_by(block_dist) {
                    for k in start + j * block_size..start + (j + 1) * block_size {
                        entries[k * channels + c] = value;
                    }
                }
            }
            // Sample values up to this bound are closest to level j.
            let mut j = 0;
            let mut bound = (255 + max_level) / (2 * max_level);
            for (v, index) in color_index[c].iter_mut().enumerate() {
                while v > bound {
                    j += 1;
                    bound = ((2 * j + 1) * 255 + max_level) / (2 * max_level);
                }
                *index = (j * block_size) as u8;
            }
        }

        let dither = if dither {
            Some(ErrorDiffusion::new(width, channels)?)
        } else {
            None
        };
        Ok(OnePassQuantizer {
            channels,
            width,
            colormap: Colormap::new(channels, entries),
            color_index,
            dither,
        })
    }

    pub fn colormap(&self) -> &Colormap {
        &self.colormap
    }

    /// Maps one row of interleaved pixels to colormap indexes.
    pub fn quantize_row(&mut self, input: &[u8], output: &mut [u8]) {
        let nc = self.channels;
        let width = self.width;
        let Some(dither) = self.dither.as_mut() else {
            for (px, out) in input.chunks_exact(nc).zip(output[..width].iter_mut()) {
                *out = px
                    .iter()
                    .zip(self.color_index.iter())
                    .map(|(&s, index)| index[s as usize])
                    .sum();
            }
            return;
        };
        let color_index = &self.color_index;
        let colormap = &self.colormap;
        output[..width].fill(0);
        match nc {
            1 => dither.run_row::<1>(width, |x, s| {
                diffuse_pixel(&input[x..], &mut output[x], color_index, colormap, s)
            }),
            2 => dither.run_row::<2>(width, |x, s| {
                diffuse_pixel(&input[x * 2..], &mut output[x], color_index, colormap, s)
            }),
            3 => dither.run_row::<3>(width, |x, s| {
                diffuse_pixel(&input[x * 3..], &mut output[x], color_index, colormap, s)
            }),
            _ => dither.run_row::<4>(width, |x, s| {
                diffuse_pixel(&input[x * 4..], &mut output[x], color_index, colormap, s)
            }),
        }
    }
}

/// Channels are independent on a uniform grid, so each one picks its level
/// from its own error-corrected sample.
fn diffuse_pixel<const N: usize>(
    pixel: &[u8],
    out: &mut u8,
    color_index: &[[u8; 256]],
    colormap: &Colormap,
    samples: &mut [i32; N],
) -> [i32; N] {
    let mut represented = [0i32; N];
    for c in 0..N {
        let v = (samples[c] + pixel[c] as i32).clamp(0, 255);
        samples[c] = v;
        let code = color_index[c][v as usize];
        *out += code;
        represented[c] = colormap.color(code as usize)[c] as i32;
    }
    represented
}
