// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Reduction of decoded pixels to a small palette, for output devices that
//! can only show a colormapped image.

pub mod one_pass;
pub mod two_pass;

pub use one_pass::OnePassQuantizer;
pub use two_pass::TwoPassQuantizer;

/// Colormap indexes are single bytes.
pub const MAX_COLORS: usize = 256;

/// Settings for colormapped output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct ColorQuantOptions {
    /// Upper bound on the size of the colormap, 2..=256 (8..=256 for the
    /// two-pass quantizer).
    pub desired_colors: usize,
    /// Choose the colormap from a histogram of the image instead of using a
    /// fixed uniform grid. Only possible for three-channel output; other
    /// outputs fall back to the one-pass quantizer.
    pub two_pass: bool,
    /// Apply Floyd-Steinberg dithering.
    pub dither: bool,
}

impl Default for ColorQuantOptions {
    fn default() -> Self {
        Self {
            desired_colors: MAX_COLORS,
            two_pass: true,
            dither: true,
        }
    }
}

impl ColorQuantOptions {
    pub fn with_colors(desired_colors: usize) -> Self {
        Self {
            desired_colors,
            ..Default::default()
        }
    }
}

/// The colors a quantized image refers to, each `channels` samples long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Colormap {
    channels: usize,
    entries: Vec<u8>,
}

impl Colormap {
    pub(crate) fn new(channels: usize, entries: Vec<u8>) -> Colormap {
        debug_assert_eq!(entries.len() % channels, 0);
        Colormap { channels, entries }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.entries.len() / self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn color(&self, index: usize) -> &[u8] {
        &self.entries[index * self.channels..(index + 1) * self.channels]
    }

    /// Replaces each index by its color.
    pub fn expand(&self, indexes: &[u8]) -> Vec<u8> {
        indexes
            .iter()
            .flat_map(|&i| self.color(i as usize).iter().copied())
            .collect()
    }
}

/// Floyd-Steinberg error distribution over one row, kept in sixteenths.
///
/// Rows alternate direction. The buffer holds one entry per column plus a
/// dummy at each end; entries behind the current column already belong to
/// the next row.
struct ErrorDiffusion {
    channels: usize,
    errors: Vec<i32>,
    odd_row: bool,
}

impl ErrorDiffusion {
    fn new(width: usize, channels: usize) -> crate::error::Result<ErrorDiffusion> {
        let mut errors = Vec::new();
        errors.try_reserve_exact((width + 2) * channels)?;
        errors.resize((width + 2) * channels, 0);
        Ok(ErrorDiffusion {
            channels,
            errors,
            odd_row: false,
        })
    }

    /// Runs one row. `pick(x, samples)` receives the column and, per
    /// channel, the error correction for it; it must replace each entry by
    /// the corrected, clamped sample and return the value actually
    /// represented for each channel.
    fn run_row<const N: usize>(
        &mut self,
        width: usize,
        mut pick: impl FnMut(usize, &mut [i32; N]) -> [i32; N],
    ) {
        debug_assert_eq!(N, self.channels);
        let nc = self.channels;
        let forward = !self.odd_row;
        self.odd_row = !self.odd_row;

        let mut cur = [0i32; N];
        let mut below = [0i32; N];
        let mut below_prev = [0i32; N];
        // Entry of the column before the current one, in walking order.
        let mut prev_entry: isize = if forward { 0 } else { width as isize + 1 };
        let dir: isize = if forward { 1 } else { -1 };
        for i in 0..width {
            let x = if forward { i } else { width - 1 - i };
            let this_entry = (prev_entry + dir) as usize * nc;
            let mut samples = [0i32; N];
            for c in 0..N {
                samples[c] = (cur[c] + self.errors[this_entry + c] + 8) >> 4;
            }
            let represented = pick(x, &mut samples);
            let prev = prev_entry as usize * nc;
            for c in 0..N {
                let err = samples[c] - represented[c];
                let delta = err * 2;
                let mut e = err + delta;
                self.errors[prev + c] = below_prev[c] + e;
                e += delta;
                below_prev[c] = below[c] + e;
                below[c] = err;
                cur[c] = e + delta;
            }
            prev_entry += dir;
        }
        let last = prev_entry as usize * nc;
        self.errors[last..last + nc].copy_from_slice(&below_prev);
    }
}
