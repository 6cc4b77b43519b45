// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::SamplingRatio;
use crate::{error::Result, util::RowGroupRing};

/// Decoder-side expansion of a component plane to full resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsampler {
    Fullsize,
    /// Pixel replication by whole factors.
    Replicate { h_expand: usize, v_expand: usize },
    /// Triangle filter, 2:1 horizontally.
    FancyH2V1,
    /// Triangle filter, 2:1 both ways. Needs one source row of context
    /// above and below.
    FancyH2V2,
}

impl Upsampler {
    pub fn new(h: usize, v: usize, max_h: usize, max_v: usize, fancy: bool) -> Result<Upsampler> {
        let ratio = SamplingRatio::new(h, v, max_h, max_v)?;
        Ok(match ratio {
            SamplingRatio::Fullsize => Upsampler::Fullsize,
            SamplingRatio::H2V1 if fancy => Upsampler::FancyH2V1,
            SamplingRatio::H2V2 if fancy => Upsampler::FancyH2V2,
            _ => {
                let (h_expand, v_expand) = ratio.expansion();
                Upsampler::Replicate { h_expand, v_expand }
            }
        })
    }

    pub fn v_expand(&self) -> usize {
        match *self {
            Upsampler::Fullsize | Upsampler::FancyH2V1 => 1,
            Upsampler::FancyH2V2 => 2,
            Upsampler::Replicate { v_expand, .. } => v_expand,
        }
    }

    /// Highest source row needed to produce output row `y`, before clamping
    /// to the plane.
    pub fn last_source_row(&self, y: usize) -> usize {
        match self {
            Upsampler::FancyH2V2 => y / 2 + 1,
            _ => y / self.v_expand(),
        }
    }

    /// Produces full-resolution row `y` into `output`.
    ///
    /// `plane` holds the component's rows; only the first `valid_rows` rows
    /// and `valid_cols` columns are real data, and the filters duplicate the
    /// edge samples beyond them.
    pub fn upsample_row(
        &self,
        plane: &RowGroupRing,
        valid_rows: usize,
        valid_cols: usize,
        y: usize,
        output: &mut [u8],
    ) {
        match *self {
            Upsampler::Fullsize => {
                let src = plane.clamped_row(y as isize, valid_rows);
                output.copy_from_slice(&src[..output.len()]);
            }
            Upsampler::Replicate { h_expand, v_expand } => {
                let src = plane.clamped_row((y / v_expand) as isize, valid_rows);
                for (chunk, &s) in output.chunks_mut(h_expand).zip(src.iter()) {
                    chunk.fill(s);
                }
            }
            Upsampler::FancyH2V1 => {
                let src = plane.clamped_row(y as isize, valid_rows);
                h2v1_fancy(&src[..valid_cols], output);
            }
            Upsampler::FancyH2V2 => {
                let src = (y / 2) as isize;
                // Even output rows lean on the source row above, odd rows on
                // the one below.
                let neighbor = if y % 2 == 0 { src - 1 } else { src + 1 };
                let near = plane.clamped_row(src, valid_rows);
                let far = plane.clamped_row(neighbor, valid_rows);
                h2v2_fancy(&near[..valid_cols], &far[..valid_cols], output);
            }
        }
    }
}

/// Each output pair is 3/4 of the nearer source sample plus 1/4 of the
/// further one; the rounding bias alternates so that errors do not
/// accumulate in one direction.
fn h2v1_fancy(src: &[u8], output: &mut [u8]) {
    let n = src.len();
    let s = |i: usize| src[i] as u32;
    let mut put = |x: usize, v: u32| {
        if let Some(o) = output.get_mut(x) {
            *o = v as u8;
        }
    };
    if n == 1 {
        put(0, s(0));
        put(1, s(0));
        return;
    }
    put(0, s(0));
    put(1, (s(0) * 3 + s(1) + 2) >> 2);
    for i in 1..n - 1 {
        let center = s(i) * 3;
        put(2 * i, (center + s(i - 1) + 1) >> 2);
        put(2 * i + 1, (center + s(i + 1) + 2) >> 2);
    }
    put(2 * (n - 1), (s(n - 1) * 3 + s(n - 2) + 1) >> 2);
    put(2 * n - 1, s(n - 1));
}

/// Vertical then horizontal triangle filter. Column sums carry the vertical
/// 3:1 weighting, so the horizontal step divides by 16.
fn h2v2_fancy(near: &[u8], far: &[u8], output: &mut [u8]) {
    let n = near.len();
    let colsum = |i: usize| near[i] as u32 * 3 + far[i] as u32;
    let mut put = |x: usize, v: u32| {
        if let Some(o) = output.get_mut(x) {
            *o = v as u8;
        }
    };
    if n == 1 {
        let v = (colsum(0) * 4 + 8) >> 4;
        put(0, v);
        put(1, v);
        return;
    }
    put(0, (colsum(0) * 4 + 8) >> 4);
    put(1, (colsum(0) * 3 + colsum(1) + 7) >> 4);
    for i in 1..n - 1 {
        let this = colsum(i) * 3;
        put(2 * i, (this + colsum(i - 1) + 8) >> 4);
        put(2 * i + 1, (this + colsum(i + 1) + 7) >> 4);
    }
    put(2 * (n - 1), (colsum(n - 1) * 3 + colsum(n - 2) + 8) >> 4);
    put(2 * n - 1, (colsum(n - 1) * 4 + 7) >> 4);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Result;
    use test_log::test;

    fn plane(rows: &[&[u8]]) -> Result<RowGroupRing> {
        let mut ring = RowGroupRing::new(rows[0].len(), rows.len(), 1)?;
        let g = ring.push_group();
        for (r, row) in rows.iter().enumerate() {
            ring.row_mut(g, r).copy_from_slice(row);
        }
        ring.finish();
        Ok(ring)
    }

    #[test]
    fn replication() -> Result<()> {
        let p = plane(&[&[1, 2, 0, 0], &[3, 4, 0, 0]])?;
        let up = Upsampler::new(1, 1, 2, 2, false)?;
        let mut out = [0u8; 3];
        up.upsample_row(&p, 2, 2, 3, &mut out);
        assert_eq!(out, [3, 3, 4]);
        // Rows past the real data repeat the last one.
        up.upsample_row(&p, 1, 2, 3, &mut out);
        assert_eq!(out, [1, 1, 2]);
        Ok(())
    }

    #[test]
    fn fancy_h2v1() -> Result<()> {
        let p = plane(&[&[0, 100, 200, 77]])?;
        let up = Upsampler::new(1, 1, 2, 1, true)?;
        assert_eq!(up, Upsampler::FancyH2V1);
        let mut out = [0u8; 5];
        up.upsample_row(&p, 1, 3, 0, &mut out);
        assert_eq!(out, [0, 25, 75, 125, 175]);
        let mut out = [0u8; 6];
        up.upsample_row(&p, 1, 3, 0, &mut out);
        assert_eq!(out[5], 200);
        Ok(())
    }

    #[test]
    fn fancy_h2v2_flat_and_edges() -> Result<()> {
        let p = plane(&[&[50, 50], &[50, 50]])?;
        let up = Upsampler::new(1, 1, 2, 2, true)?;
        let mut out = [0u8; 4];
        for y in 0..4 {
            up.upsample_row(&p, 2, 2, y, &mut out);
            assert_eq!(out, [50; 4]);
        }
        let p = plane(&[&[0], &[160]])?;
        let mut out = [0u8; 2];
        up.upsample_row(&p, 2, 1, 1, &mut out);
        // 3/4 * 0 + 1/4 * 160.
        assert_eq!(out, [40, 40]);
        up.upsample_row(&p, 2, 1, 3, &mut out);
        assert_eq!(out, [160, 160]);
        Ok(())
    }
}
