// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Histogram-driven colormap selection by median cut, followed by a
//! lazily filled inverse colormap.
//!
//! Works on the three components of the file before color conversion. The
//! first component gets finer histogram cells and counts double in
//! distances, matching luma's weight in perception.

use super::{Colormap, ErrorDiffusion, MAX_COLORS};
use crate::{
    color::ColorDecoder,
    error::{Error, Result},
    util::tracing_wrappers::*,
};

const HIST_Y_BITS: u32 = 6;
const HIST_C_BITS: u32 = 5;
const Y_SHIFT: u32 = 8 - HIST_Y_BITS;
const C_SHIFT: u32 = 8 - HIST_C_BITS;
const HIST_Y_ELEMS: usize = 1 << HIST_Y_BITS;
const HIST_C_ELEMS: usize = 1 << HIST_C_BITS;
const Y_SCALE: i32 = 2;

// The inverse colormap is filled in boxes of 8x4x4 cells.
const BOX_Y_LOG: u32 = HIST_Y_BITS - 3;
const BOX_C_LOG: u32 = HIST_C_BITS - 3;
const BOX_Y_ELEMS: usize = 1 << BOX_Y_LOG;
const BOX_C_ELEMS: usize = 1 << BOX_C_LOG;
const BOX_Y_SHIFT: u32 = Y_SHIFT + BOX_Y_LOG;
const BOX_C_SHIFT: u32 = C_SHIFT + BOX_C_LOG;
const BOX_CELLS: usize = BOX_Y_ELEMS * BOX_C_ELEMS * BOX_C_ELEMS;

// Distance between neighboring cell centers along each axis.
const STEP_Y: i32 = (1 << Y_SHIFT) * Y_SCALE;
const STEP_C: i32 = 1 << C_SHIFT;

pub const MIN_COLORS: usize = 8;

fn cell(c0: usize, c1: usize, c2: usize) -> usize {
    (c0 * HIST_C_ELEMS + c1) * HIST_C_ELEMS + c2
}

fn cell_of(px: [i32; 3]) -> [usize; 3] {
    [
        (px[0] >> Y_SHIFT) as usize,
        (px[1] >> C_SHIFT) as usize,
        (px[2] >> C_SHIFT) as usize,
    ]
}

/// A box of histogram cells, shrunk to the occupied ones.
#[derive(Debug, Clone, Copy)]
struct ColorBox {
    min: [usize; 3],
    max: [usize; 3],
    /// Number of occupied cells.
    occupied: u64,
}

impl ColorBox {
    fn is_splittable(&self) -> bool {
        (0..3).any(|a| self.max[a] > self.min[a])
    }

    fn scaled_extent(&self) -> [i64; 3] {
        let len = |a: usize| (self.max[a] - self.min[a]) as i64;
        [
            len(0) * Y_SCALE as i64,
            len(1) << (HIST_Y_BITS - HIST_C_BITS),
            len(2) << (HIST_Y_BITS - HIST_C_BITS),
        ]
    }

    fn volume(&self) -> i64 {
        self.scaled_extent().iter().map(|e| e * e).sum()
    }

    fn cells(&self) -> impl Iterator<Item = (usize, usize, usize)> + use<> {
        let (min, max) = (self.min, self.max);
        (min[0]..=max[0]).flat_map(move |c0| {
            (min[1]..=max[1]).flat_map(move |c1| (min[2]..=max[2]).map(move |c2| (c0, c1, c2)))
        })
    }
}

/// Chooses up to `desired` colors by repeatedly splitting boxes of the
/// histogram. Returned colors are in component space.
fn median_cut(histogram: &[u16], desired: usize) -> Vec<[u8; 3]> {
    let mut boxes = Vec::with_capacity(desired);
    let mut first = ColorBox {
        min: [0; 3],
        max: [HIST_Y_ELEMS - 1, HIST_C_ELEMS - 1, HIST_C_ELEMS - 1],
        occupied: 0,
    };
    shrink(histogram, &mut first);
    boxes.push(first);

    while boxes.len() < desired {
        // Split the most populated boxes first, then the largest ones.
        let pick = if boxes.len() * 2 <= desired {
            boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.occupied > 0 && b.is_splittable())
                .fold(None, |best: Option<(usize, u64)>, (i, b)| match best {
                    Some((_, n)) if n >= b.occupied => best,
                    _ => Some((i, b.occupied)),
                })
                .map(|(i, _)| i)
        } else {
            boxes
                .iter()
                .enumerate()
                .filter(|(_, b)| b.volume() > 0)
                .fold(None, |best: Option<(usize, i64)>, (i, b)| match best {
                    Some((_, v)) if v >= b.volume() => best,
                    _ => Some((i, b.volume())),
                })
                .map(|(i, _)| i)
        };
        let Some(i) = pick else {
            break;
        };

        let b1 = &mut boxes[i];
        let mut b2 = *b1;
        let extent = b1.scaled_extent();
        let mut axis = 0;
        if extent[1] > extent[axis] {
            axis = 1;
        }
        if extent[2] > extent[axis] {
            axis = 2;
        }
        let mid = (b1.max[axis] + b1.min[axis]) / 2;
        b1.max[axis] = mid;
        b2.min[axis] = mid + 1;
        shrink(histogram, b1);
        shrink(histogram, &mut b2);
        boxes.push(b2);
    }

    boxes.iter().map(|b| mean_color(histogram, b)).collect()
}

/// Shrinks `b` to the bounding box of its occupied cells and counts them.
fn shrink(histogram: &[u16], b: &mut ColorBox) {
    let occupied = |b: &ColorBox, axis: usize, value: usize| {
        let mut plane = *b;
        plane.min[axis] = value;
        plane.max[axis] = value;
        plane
            .cells()
            .any(|(c0, c1, c2)| histogram[cell(c0, c1, c2)] != 0)
    };
    for axis in 0..3 {
        if b.max[axis] > b.min[axis] {
            let low = (b.min[axis]..=b.max[axis]).find(|&v| occupied(b, axis, v));
            if let Some(v) = low {
                b.min[axis] = v;
            }
        }
        if b.max[axis] > b.min[axis] {
            let high = (b.min[axis]..=b.max[axis])
                .rev()
                .find(|&v| occupied(b, axis, v));
            if let Some(v) = high {
                b.max[axis] = v;
            }
        }
    }
    b.occupied = b
        .cells()
        .filter(|&(c0, c1, c2)| histogram[cell(c0, c1, c2)] != 0)
        .count() as u64;
}

/// Pixel-weighted mean of the cell centers in `b`.
fn mean_color(histogram: &[u16], b: &ColorBox) -> [u8; 3] {
    let mut total = 0u64;
    let mut sums = [0u64; 3];
    for (c0, c1, c2) in b.cells() {
        let count = histogram[cell(c0, c1, c2)] as u64;
        if count == 0 {
            continue;
        }
        total += count;
        sums[0] += (((c0 as u64) << Y_SHIFT) + ((1 << Y_SHIFT) >> 1)) * count;
        sums[1] += (((c1 as u64) << C_SHIFT) + ((1 << C_SHIFT) >> 1)) * count;
        sums[2] += (((c2 as u64) << C_SHIFT) + ((1 << C_SHIFT) >> 1)) * count;
    }
    if total == 0 {
        return [0; 3];
    }
    sums.map(|s| ((s + total / 2) / total) as u8)
}

/// Weighted squared distance from a coordinate to the interval `lo..=hi`
/// (nearest and farthest point), with `center` splitting the interval.
fn axis_distances(x: i32, lo: i32, hi: i32, scale: i32) -> (i32, i32) {
    let sq = |d: i32| (d * scale) * (d * scale);
    let center = (lo + hi) >> 1;
    if x < lo {
        (sq(x - lo), sq(x - hi))
    } else if x > hi {
        (sq(x - hi), sq(x - lo))
    } else if x <= center {
        (0, sq(x - hi))
    } else {
        (0, sq(x - lo))
    }
}

/// Colors that may be nearest to some cell of the update box with origin
/// `minc` (cell-center coordinates).
fn nearby_colors(palette: &[[u8; 3]], minc: [i32; 3]) -> Vec<u8> {
    let maxc = [
        minc[0] + ((1 << BOX_Y_SHIFT) - (1 << Y_SHIFT)),
        minc[1] + ((1 << BOX_C_SHIFT) - (1 << C_SHIFT)),
        minc[2] + ((1 << BOX_C_SHIFT) - (1 << C_SHIFT)),
    ];
    let scales = [Y_SCALE, 1, 1];
    let mut min_dist = Vec::with_capacity(palette.len());
    let mut min_max_dist = i32::MAX;
    for color in palette {
        let (mut near, mut far) = (0, 0);
        for a in 0..3 {
            let (n, f) = axis_distances(color[a] as i32, minc[a], maxc[a], scales[a]);
            near += n;
            far += f;
        }
        min_dist.push(near);
        min_max_dist = min_max_dist.min(far);
    }
    min_dist
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d <= min_max_dist)
        .map(|(i, _)| i as u8)
        .collect()
}

/// Nearest candidate for every cell of the update box, found with
/// incremental distance updates along each axis.
fn best_colors(palette: &[[u8; 3]], minc: [i32; 3], candidates: &[u8]) -> [u8; BOX_CELLS] {
    let mut best_dist = [i32::MAX; BOX_CELLS];
    let mut best = [0u8; BOX_CELLS];
    for &icolor in candidates {
        let color = palette[icolor as usize];
        let mut inc0 = (minc[0] - color[0] as i32) * Y_SCALE;
        let mut inc1 = minc[1] - color[1] as i32;
        let mut inc2 = minc[2] - color[2] as i32;
        let mut dist0 = inc0 * inc0 + inc1 * inc1 + inc2 * inc2;
        inc0 = inc0 * (2 * STEP_Y) + STEP_Y * STEP_Y;
        inc1 = inc1 * (2 * STEP_C) + STEP_C * STEP_C;
        inc2 = inc2 * (2 * STEP_C) + STEP_C * STEP_C;

        let mut i = 0;
        let mut xx0 = inc0;
        for _ in 0..BOX_Y_ELEMS {
            let mut dist1 = dist0;
            let mut xx1 = inc1;
            for _ in 0..BOX_C_ELEMS {
                let mut dist2 = dist1;
                let mut xx2 = inc2;
                for _ in 0..BOX_C_ELEMS {
                    if dist2 < best_dist[i] {
                        best_dist[i] = dist2;
                        best[i] = icolor;
                    }
                    dist2 += xx2;
                    xx2 += 2 * STEP_C * STEP_C;
                    i += 1;
                }
                dist1 += xx1;
                xx1 += 2 * STEP_C * STEP_C;
            }
            dist0 += xx0;
            xx0 += 2 * STEP_Y * STEP_Y;
        }
    }
    best
}

/// Nearest palette entry for the cell, filling the whole update box around
/// it on a cache miss. Cache entries hold index + 1, 0 meaning unknown.
fn lookup(cache: &mut [u16], palette: &[[u8; 3]], c: [usize; 3]) -> usize {
    let hit = cache[cell(c[0], c[1], c[2])];
    if hit != 0 {
        return hit as usize - 1;
    }
    let origin = [
        c[0] >> BOX_Y_LOG << BOX_Y_LOG,
        c[1] >> BOX_C_LOG << BOX_C_LOG,
        c[2] >> BOX_C_LOG << BOX_C_LOG,
    ];
    let minc = [
        ((origin[0] << Y_SHIFT) + ((1 << Y_SHIFT) >> 1)) as i32,
        ((origin[1] << C_SHIFT) + ((1 << C_SHIFT) >> 1)) as i32,
        ((origin[2] << C_SHIFT) + ((1 << C_SHIFT) >> 1)) as i32,
    ];
    let candidates = nearby_colors(palette, minc);
    let best = best_colors(palette, minc, &candidates);
    let mut i = 0;
    for i0 in 0..BOX_Y_ELEMS {
        for i1 in 0..BOX_C_ELEMS {
            for i2 in 0..BOX_C_ELEMS {
                cache[cell(origin[0] + i0, origin[1] + i1, origin[2] + i2)] = best[i] as u16 + 1;
                i += 1;
            }
        }
    }
    cache[cell(c[0], c[1], c[2])] as usize - 1
}

/// Two-pass quantizer: every pixel is seen by [`prescan_row`] before
/// [`select_colors`], then mapped by [`map_row`].
///
/// [`prescan_row`]: TwoPassQuantizer::prescan_row
/// [`select_colors`]: TwoPassQuantizer::select_colors
/// [`map_row`]: TwoPassQuantizer::map_row
pub struct TwoPassQuantizer {
    width: usize,
    desired_colors: usize,
    /// Pixel counts per cell during the first pass, the inverse colormap
    /// cache afterwards.
    histogram: Vec<u16>,
    palette: Vec<[u8; 3]>,
    colormap: Option<Colormap>,
    dither: Option<ErrorDiffusion>,
}

impl TwoPassQuantizer {
    pub fn new(desired_colors: usize, dither: bool, width: usize) -> Result<TwoPassQuantizer> {
        if !(MIN_COLORS..=MAX_COLORS).contains(&desired_colors) {
            return Err(Error::InvalidColorCount(desired_colors));
        }
        let mut histogram = Vec::new();
        histogram.try_reserve_exact(HIST_Y_ELEMS * HIST_C_ELEMS * HIST_C_ELEMS)?;
        histogram.resize(HIST_Y_ELEMS * HIST_C_ELEMS * HIST_C_ELEMS, 0);
        let dither = if dither {
            Some(ErrorDiffusion::new(width, 3)?)
        } else {
            None
        };
        Ok(TwoPassQuantizer {
            width,
            desired_colors,
            histogram,
            palette: Vec::new(),
            colormap: None,
            dither,
        })
    }

    /// Counts the pixels of one row of interleaved three-component samples.
    pub fn prescan_row(&mut self, row: &[u8]) {
        for px in row.chunks_exact(3).take(self.width) {
            let [c0, c1, c2] = cell_of([px[0] as i32, px[1] as i32, px[2] as i32]);
            let count = &mut self.histogram[cell(c0, c1, c2)];
            *count = count.saturating_add(1);
        }
    }

    /// Runs median cut over the histogram and returns the colormap, in the
    /// output space of `color`.
    pub fn select_colors(&mut self, color: &ColorDecoder) -> Result<&Colormap> {
        self.palette = median_cut(&self.histogram, self.desired_colors);
        debug!(colors = self.palette.len(), "selected colors");
        let n = self.palette.len();
        let planes: Vec<Vec<u8>> = (0..3)
            .map(|c| self.palette.iter().map(|p| p[c]).collect())
            .collect();
        let inputs: Vec<&[u8]> = planes.iter().map(Vec::as_slice).collect();
        let mut entries = vec![0u8; n * color.out_channels()];
        color.convert_row(&inputs, &mut entries, n);
        self.histogram.fill(0);
        Ok(self
            .colormap
            .insert(Colormap::new(color.out_channels(), entries)))
    }

    pub fn colormap(&self) -> Option<&Colormap> {
        self.colormap.as_ref()
    }

    /// Maps one row of interleaved three-component samples to colormap
    /// indexes. Only valid after [`TwoPassQuantizer::select_colors`].
    pub fn map_row(&mut self, row: &[u8], output: &mut [u8]) {
        debug_assert!(!self.palette.is_empty());
        let width = self.width;
        let TwoPassQuantizer {
            histogram,
            palette,
            dither,
            ..
        } = self;
        let Some(dither) = dither.as_mut() else {
            for (px, out) in row.chunks_exact(3).zip(output[..width].iter_mut()) {
                let c = cell_of([px[0] as i32, px[1] as i32, px[2] as i32]);
                *out = lookup(histogram, palette, c) as u8;
            }
            return;
        };
        dither.run_row::<3>(width, |x, samples| {
            for (c, s) in samples.iter_mut().enumerate() {
                *s = (*s + row[x * 3 + c] as i32).clamp(0, 255);
            }
            let index = lookup(histogram, palette, cell_of(*samples));
            output[x] = index as u8;
            palette[index].map(|v| v as i32)
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ColorSpace;
    use test_log::test;

    fn identity() -> Result<ColorDecoder> {
        ColorDecoder::new(ColorSpace::YCbCr, 3, ColorSpace::YCbCr)
    }

    #[test]
    fn too_few_colors() {
        assert!(matches!(
            TwoPassQuantizer::new(4, false, 10),
            Err(Error::InvalidColorCount(4))
        ));
    }

    #[test]
    fn few_distinct_colors_are_kept() -> Result<()> {
        let colors: [[u8; 3]; 4] = [[16, 128, 128], [200, 40, 90], [90, 220, 30], [250, 250, 250]];
        let row: Vec<u8> = colors.iter().cycle().take(64).flatten().copied().collect();
        let mut q = TwoPassQuantizer::new(16, false, 64)?;
        for _ in 0..8 {
            q.prescan_row(&row);
        }
        let map = q.select_colors(&identity()?)?.clone();
        assert_eq!(map.len(), 4);
        let mut out = vec![0u8; 64];
        q.map_row(&row, &mut out);
        for (px, &i) in row.chunks_exact(3).zip(out.iter()) {
            let color = map.color(i as usize);
            for c in 0..3 {
                assert!(px[c].abs_diff(color[c]) <= 4, "{px:?} -> {color:?}");
            }
        }
        Ok(())
    }

    #[test]
    fn palette_never_exceeds_request() -> Result<()> {
        let mut rng = 0x1234_5678u32;
        let mut q = TwoPassQuantizer::new(32, true, 128)?;
        let mut rows = vec![];
        for _ in 0..32 {
            let row: Vec<u8> = (0..128 * 3)
                .map(|_| {
                    rng ^= rng << 13;
                    rng ^= rng >> 17;
                    rng ^= rng << 5;
                    rng as u8
                })
                .collect();
            q.prescan_row(&row);
            rows.push(row);
        }
        let n = q.select_colors(&identity()?)?.len();
        assert!(n <= 32 && n >= 16, "{n}");
        let mut out = vec![0u8; 128];
        for row in &rows {
            q.map_row(row, &mut out);
            assert!(out.iter().all(|&i| (i as usize) < n));
        }
        Ok(())
    }

    #[test]
    fn inverse_map_finds_nearest() {
        let palette = [[0, 0, 0], [255, 255, 255], [128, 0, 255]];
        let mut cache = vec![0u16; HIST_Y_ELEMS * HIST_C_ELEMS * HIST_C_ELEMS];
        assert_eq!(lookup(&mut cache, &palette, cell_of([10, 10, 10])), 0);
        assert_eq!(lookup(&mut cache, &palette, cell_of([240, 250, 230])), 1);
        assert_eq!(lookup(&mut cache, &palette, cell_of([120, 10, 250])), 2);
        assert!(cache.iter().any(|&c| c != 0));
    }
}
