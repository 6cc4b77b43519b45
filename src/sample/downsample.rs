// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::SamplingRatio;
use crate::{error::Result, util::RowGroupRing, util::tracing_wrappers::*};

/// Encoder-side reduction of one row group of a full-resolution plane to a
/// component's sampling.
///
/// Optional input smoothing replaces each input pixel by a weighted sum of
/// itself and its eight neighbours, with weight `SF = smoothing_factor / 1024`
/// for each neighbour and `1 - 8 * SF` for the pixel itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Downsampler {
    Fullsize,
    FullsizeSmooth { smoothing_factor: i32 },
    H2V1,
    H2V2,
    H2V2Smooth { smoothing_factor: i32 },
    Integral { h_expand: usize, v_expand: usize },
}

impl Downsampler {
    pub fn new(
        h: usize,
        v: usize,
        max_h: usize,
        max_v: usize,
        smoothing_factor: u8,
    ) -> Result<Downsampler> {
        let sf = smoothing_factor as i32;
        let ratio = SamplingRatio::new(h, v, max_h, max_v)?;
        Ok(match ratio {
            SamplingRatio::Fullsize if sf > 0 => Downsampler::FullsizeSmooth {
                smoothing_factor: sf,
            },
            SamplingRatio::Fullsize => Downsampler::Fullsize,
            SamplingRatio::H2V2 if sf > 0 => Downsampler::H2V2Smooth {
                smoothing_factor: sf,
            },
            SamplingRatio::H2V2 => Downsampler::H2V2,
            SamplingRatio::H2V1 | SamplingRatio::Integral { .. } => {
                if sf > 0 {
                    debug!("Smoothing not supported with sampling ratio {ratio:?}");
                }
                match ratio {
                    SamplingRatio::H2V1 => Downsampler::H2V1,
                    _ => {
                        let (h_expand, v_expand) = ratio.expansion();
                        Downsampler::Integral { h_expand, v_expand }
                    }
                }
            }
        })
    }

    /// Downsamples row group `group` of `input` into `output`, one row per
    /// output row. Every input row must be `output` width times the
    /// horizontal expansion; the ring supplies rows above and below the group
    /// for the smoothing variants.
    pub fn downsample_group(&self, input: &RowGroupRing, group: usize, output: &mut [&mut [u8]]) {
        let row = |r: usize| input.row(group, r);
        match *self {
            Downsampler::Fullsize => {
                for (r, out) in output.iter_mut().enumerate() {
                    out.copy_from_slice(&row(r)[..out.len()]);
                }
            }
            Downsampler::H2V1 => {
                for (r, out) in output.iter_mut().enumerate() {
                    let inp = row(r);
                    for (x, o) in out.iter_mut().enumerate() {
                        *o = ((inp[2 * x] as u32 + inp[2 * x + 1] as u32 + 1) >> 1) as u8;
                    }
                }
            }
            Downsampler::H2V2 => {
                for (r, out) in output.iter_mut().enumerate() {
                    let (in0, in1) = (row(2 * r), row(2 * r + 1));
                    for (x, o) in out.iter_mut().enumerate() {
                        let sum = in0[2 * x] as u32
                            + in0[2 * x + 1] as u32
                            + in1[2 * x] as u32
                            + in1[2 * x + 1] as u32;
                        *o = ((sum + 2) >> 2) as u8;
                    }
                }
            }
            Downsampler::Integral { h_expand, v_expand } => {
                let numpix = (h_expand * v_expand) as u32;
                for (r, out) in output.iter_mut().enumerate() {
                    for (x, o) in out.iter_mut().enumerate() {
                        let mut sum = 0u32;
                        for v in 0..v_expand {
                            let inp = &row(r * v_expand + v)[x * h_expand..(x + 1) * h_expand];
                            sum += inp.iter().map(|&s| s as u32).sum::<u32>();
                        }
                        *o = ((sum + numpix / 2) / numpix) as u8;
                    }
                }
            }
            Downsampler::FullsizeSmooth { smoothing_factor } => {
                fullsize_smooth(input, group, smoothing_factor, output)
            }
            Downsampler::H2V2Smooth { smoothing_factor } => {
                h2v2_smooth(input, group, smoothing_factor, output)
            }
        }
    }
}

#[inline]
fn descale(sum: i32) -> u8 {
    ((sum + 32768) >> 16) as u8
}

fn h2v2_smooth(input: &RowGroupRing, group: usize, sf: i32, output: &mut [&mut [u8]]) {
    // The output is the mean of four smoothed pixels: each member pixel
    // contributes (1-5*SF)/4, edge neighbours SF/2 and corner neighbours
    // SF/4, all scaled by 2^16.
    let member_scale = 16384 - sf * 80;
    let neigh_scale = sf * 16;
    for (r, out) in output.iter_mut().enumerate() {
        let above = input.row_with_context(group, 2 * r as isize - 1);
        let in0 = input.row(group, 2 * r);
        let in1 = input.row(group, 2 * r + 1);
        let below = input.row_with_context(group, 2 * r as isize + 2);
        let s = |row: &[u8], x: usize| row[x] as i32;
        let cols = out.len();
        for (x, o) in out.iter_mut().enumerate() {
            let c = 2 * x;
            // Columns -1 and 2*cols are replaced by their nearest neighbours.
            let left = if x == 0 { c } else { c - 1 };
            let right = if x + 1 == cols { c + 1 } else { c + 2 };
            let member = s(in0, c) + s(in0, c + 1) + s(in1, c) + s(in1, c + 1);
            let mut neigh = s(above, c)
                + s(above, c + 1)
                + s(below, c)
                + s(below, c + 1)
                + s(in0, left)
                + s(in0, right)
                + s(in1, left)
                + s(in1, right);
            neigh += neigh;
            neigh += s(above, left) + s(above, right) + s(below, left) + s(below, right);
            *o = descale(member * member_scale + neigh * neigh_scale);
        }
    }
}

fn fullsize_smooth(input: &RowGroupRing, group: usize, sf: i32, output: &mut [&mut [u8]]) {
    let member_scale = 65536 - sf * 512;
    let neigh_scale = sf * 64;
    for (r, out) in output.iter_mut().enumerate() {
        let above = input.row_with_context(group, r as isize - 1);
        let inp = input.row(group, r);
        let below = input.row_with_context(group, r as isize + 1);
        let cols = out.len();
        let colsum = |x: usize| above[x] as i32 + below[x] as i32 + inp[x] as i32;
        for (x, o) in out.iter_mut().enumerate() {
            let member = inp[x] as i32;
            let last = colsum(x.saturating_sub(1));
            let next = colsum(if x + 1 == cols { x } else { x + 1 });
            let neigh = last + (colsum(x) - member) + next;
            *o = descale(member * member_scale + neigh * neigh_scale);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Result;
    use test_log::test;

    fn ring_with(rows: &[&[u8]]) -> Result<RowGroupRing> {
        let mut ring = RowGroupRing::new(rows[0].len(), rows.len(), 1)?;
        let g = ring.push_group();
        for (r, row) in rows.iter().enumerate() {
            ring.row_mut(g, r).copy_from_slice(row);
        }
        ring.finish();
        Ok(ring)
    }

    fn run(d: Downsampler, ring: &RowGroupRing, out_rows: usize, out_cols: usize) -> Vec<Vec<u8>> {
        let mut out = vec![vec![0u8; out_cols]; out_rows];
        let mut refs: Vec<&mut [u8]> = out.iter_mut().map(|r| &mut r[..]).collect();
        d.downsample_group(ring, 0, &mut refs);
        out
    }

    #[test]
    fn box_filters_round() -> Result<()> {
        let ring = ring_with(&[&[0, 1, 10, 20], &[1, 1, 30, 41]])?;
        assert_eq!(run(Downsampler::new(1, 2, 2, 2, 0)?, &ring, 2, 2), [[1, 15], [1, 36]]);
        assert_eq!(run(Downsampler::new(1, 1, 2, 2, 0)?, &ring, 1, 2), [[1, 25]]);
        assert_eq!(
            run(Downsampler::new(1, 1, 4, 2, 0)?, &ring, 1, 1),
            [[13]]
        );
        Ok(())
    }

    #[test]
    fn smoothing_keeps_flat_areas() -> Result<()> {
        let flat = [77u8; 16];
        let ring = ring_with(&[&flat, &flat])?;
        assert_eq!(
            run(Downsampler::new(1, 1, 2, 2, 50)?, &ring, 1, 8),
            [[77; 8]]
        );
        assert_eq!(
            run(Downsampler::new(2, 2, 2, 2, 100)?, &ring, 2, 16),
            [[77; 16], [77; 16]]
        );
        Ok(())
    }

    #[test]
    fn smoothing_spreads_a_spike() -> Result<()> {
        let mut mid = [0u8; 4];
        mid[1] = 255;
        let ring = ring_with(&[&[0; 4], &mid, &[0; 4]])?;
        let out = run(Downsampler::new(1, 1, 1, 1, 64)?, &ring, 3, 4);
        // Member weight 1 - 8/16 keeps half, each neighbour gets 1/16.
        assert_eq!(out[1][1], 128);
        assert_eq!(out[0][0], 16);
        assert_eq!(out[1][3], 0);
        Ok(())
    }
}
