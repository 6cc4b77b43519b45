// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Fixed-point separable 8x8 DCT.
//!
//! Both directions run an 8-point 1-D transform over the rows of the block,
//! writing the results transposed, twice. Constants carry 16 fractional
//! bits; terms that would otherwise overflow in the odd part are kept with
//! 2 bits less precision ("overscaled") and shifted back before the final
//! multiply. The first pass keeps `PASS1_BITS` extra fractional bits that
//! the second pass drops along with its own scaling. The forward
//! transform's output is scaled so that the DC term is 8 times the block
//! mean, as the quantization tables assume.

use crate::{BLOCK_DIM, BLOCK_SIZE, util::clamp_sample};

const LG2_DCT_SCALE: u32 = 16;
const LG2_OVERSCALE: u32 = 2;
const PASS1_BITS: u32 = 2;
/// Output shifts of the two passes. Both fold in the 1/2 factor of a 1-D
/// pass.
const PASS1_SHIFT: u32 = LG2_DCT_SCALE + 1 - PASS1_BITS;
const PASS2_SHIFT: u32 = LG2_DCT_SCALE + 1 + PASS1_BITS;

const fn fix(x: f64) -> i64 {
    (x * (1i64 << LG2_DCT_SCALE) as f64 + 0.5) as i64
}

const fn fixo(x: f64) -> i64 {
    (x * (1i64 << LG2_DCT_SCALE) as f64 / (1i64 << LG2_OVERSCALE) as f64 + 0.5) as i64
}

/// Shifts right by `bits`, rounding to nearest.
#[inline(always)]
fn descale(x: i64, bits: u32) -> i64 {
    (x + (1 << (bits - 1))) >> bits
}

#[inline(always)]
fn unfixo(x: i64) -> i64 {
    (x + (1 << (LG2_DCT_SCALE - 1 - LG2_OVERSCALE))) >> (LG2_DCT_SCALE - LG2_OVERSCALE)
}

const SIN_1_4: i64 = fix(0.707106781);
const COS_1_4: i64 = SIN_1_4;
const SIN_1_8: i64 = fix(0.382683432);
const COS_1_8: i64 = fix(0.923879533);

const OSIN_1_16: i64 = fixo(0.195090322);
const OCOS_1_16: i64 = fixo(0.980785280);
const OSIN_7_16: i64 = OCOS_1_16;
const OCOS_7_16: i64 = OSIN_1_16;
const OSIN_3_16: i64 = fixo(0.555570233);
const OCOS_3_16: i64 = fixo(0.831469612);
const OSIN_5_16: i64 = OCOS_3_16;
const OCOS_5_16: i64 = OSIN_3_16;

/// One forward 1-D pass: reads `input` row by row and writes each result
/// as a column of `output`, descaled by `shift`.
fn fdct_pass(input: &[i64; BLOCK_SIZE], output: &mut [i64; BLOCK_SIZE], shift: u32) {
    let unfixh = |x: i64| descale(x, shift);
    for (r, row) in input.chunks_exact(BLOCK_DIM).enumerate() {
        let tmp0 = row[7] + row[0];
        let tmp1 = row[6] + row[1];
        let tmp2 = row[5] + row[2];
        let tmp3 = row[4] + row[3];
        let mut tmp4 = row[3] - row[4];
        let tmp5 = row[2] - row[5];
        let tmp6 = row[1] - row[6];
        let mut tmp7 = row[0] - row[7];

        let tmp10 = tmp3 + tmp0;
        let tmp11 = tmp2 + tmp1;
        let tmp12 = tmp1 - tmp2;
        let tmp13 = tmp0 - tmp3;

        output[r] = unfixh((tmp10 + tmp11) * SIN_1_4);
        output[4 * BLOCK_DIM + r] = unfixh((tmp10 - tmp11) * COS_1_4);
        output[2 * BLOCK_DIM + r] = unfixh(tmp13 * COS_1_8 + tmp12 * SIN_1_8);
        output[6 * BLOCK_DIM + r] = unfixh(tmp13 * SIN_1_8 - tmp12 * COS_1_8);

        let tmp16 = unfixo((tmp6 + tmp5) * SIN_1_4);
        let tmp15 = unfixo((tmp6 - tmp5) * COS_1_4);

        tmp4 <<= LG2_OVERSCALE;
        tmp7 <<= LG2_OVERSCALE;

        let tmp14 = tmp4 + tmp15;
        let tmp25 = tmp4 - tmp15;
        let tmp26 = tmp7 - tmp16;
        let tmp17 = tmp7 + tmp16;

        output[BLOCK_DIM + r] = unfixh(tmp17 * OCOS_1_16 + tmp14 * OSIN_1_16);
        output[7 * BLOCK_DIM + r] = unfixh(tmp17 * OCOS_7_16 - tmp14 * OSIN_7_16);
        output[5 * BLOCK_DIM + r] = unfixh(tmp26 * OCOS_5_16 + tmp25 * OSIN_5_16);
        output[3 * BLOCK_DIM + r] = unfixh(tmp26 * OCOS_3_16 - tmp25 * OSIN_3_16);
    }
}

fn idct_pass(input: &[i64; BLOCK_SIZE], output: &mut [i64; BLOCK_SIZE], shift: u32) {
    let unfixh = |x: i64| descale(x, shift);
    for (r, row) in input.chunks_exact(BLOCK_DIM).enumerate() {
        let tmp10 = (row[0] + row[4]) * COS_1_4;
        let tmp11 = (row[0] - row[4]) * COS_1_4;
        let tmp12 = row[2] * SIN_1_8 - row[6] * COS_1_8;
        let tmp13 = row[6] * SIN_1_8 + row[2] * COS_1_8;

        let tmp20 = tmp10 + tmp13;
        let tmp21 = tmp11 + tmp12;
        let tmp22 = tmp11 - tmp12;
        let tmp23 = tmp10 - tmp13;

        let tmp30 = unfixo((row[3] + row[5]) * COS_1_4);
        let tmp31 = unfixo((row[3] - row[5]) * COS_1_4);

        let in1 = row[1] << LG2_OVERSCALE;
        let in7 = row[7] << LG2_OVERSCALE;

        let tmp40 = in1 + tmp30;
        let tmp41 = in7 + tmp31;
        let tmp42 = in1 - tmp30;
        let tmp43 = in7 - tmp31;

        let tmp50 = tmp40 * OCOS_1_16 + tmp41 * OSIN_1_16;
        let tmp51 = tmp40 * OSIN_1_16 - tmp41 * OCOS_1_16;
        let tmp52 = tmp42 * OCOS_5_16 + tmp43 * OSIN_5_16;
        let tmp53 = tmp42 * OSIN_5_16 - tmp43 * OCOS_5_16;

        output[r] = unfixh(tmp20 + tmp50);
        output[BLOCK_DIM + r] = unfixh(tmp21 + tmp53);
        output[2 * BLOCK_DIM + r] = unfixh(tmp22 + tmp52);
        output[3 * BLOCK_DIM + r] = unfixh(tmp23 + tmp51);
        output[4 * BLOCK_DIM + r] = unfixh(tmp23 - tmp51);
        output[5 * BLOCK_DIM + r] = unfixh(tmp22 - tmp52);
        output[6 * BLOCK_DIM + r] = unfixh(tmp21 - tmp53);
        output[7 * BLOCK_DIM + r] = unfixh(tmp20 - tmp50);
    }
}

/// Forward DCT of level-shifted samples (`sample - 128`), natural order in
/// and out.
pub fn forward_dct(block: &[i32; BLOCK_SIZE]) -> [i32; BLOCK_SIZE] {
    let input = block.map(|v| v as i64);
    let mut workspace = [0i64; BLOCK_SIZE];
    let mut output = [0i64; BLOCK_SIZE];
    fdct_pass(&input, &mut workspace, PASS1_SHIFT);
    fdct_pass(&workspace, &mut output, PASS2_SHIFT);
    output.map(|v| v as i32)
}

/// Reads the 8x8 block at column `x` of `rows` and level-shifts it.
pub fn load_block<'a>(rows: impl Iterator<Item = &'a [u8]>, x: usize) -> [i32; BLOCK_SIZE] {
    let mut block = [0i32; BLOCK_SIZE];
    for (dst, row) in block.chunks_exact_mut(BLOCK_DIM).zip(rows) {
        for (d, &s) in dst.iter_mut().zip(row[x..x + BLOCK_DIM].iter()) {
            *d = s as i32 - 128;
        }
    }
    block
}

/// Inverse DCT of dequantized natural-order coefficients. The result is
/// shifted back to unsigned samples and clamped, so arbitrary input from
/// corrupt data is harmless.
pub fn inverse_dct(coefs: &[i32; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let input = coefs.map(|v| v as i64);
    let mut workspace = [0i64; BLOCK_SIZE];
    let mut output = [0i64; BLOCK_SIZE];
    idct_pass(&input, &mut workspace, PASS1_SHIFT);
    idct_pass(&workspace, &mut output, PASS2_SHIFT);
    output.map(|v| clamp_sample((v + 128).clamp(i32::MIN as i64, i32::MAX as i64) as i32))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::util::test::assert_all_almost_eq;
    use rand::{Rng, SeedableRng};
    use test_log::test;

    fn shifted(samples: &[u8; BLOCK_SIZE]) -> [i32; BLOCK_SIZE] {
        samples.map(|s| s as i32 - 128)
    }

    #[test]
    fn dc_scaling() {
        assert_eq!(forward_dct(&[0; BLOCK_SIZE])[0], 0);
        assert_eq!(forward_dct(&[-128; BLOCK_SIZE])[0], -1024);
        let flat = forward_dct(&[100; BLOCK_SIZE]);
        assert_eq!(flat[0], 800);
        assert!(flat[1..].iter().all(|&c| c == 0));
        let mut coefs = [0; BLOCK_SIZE];
        coefs[0] = 800;
        assert!(inverse_dct(&coefs).iter().all(|&s| s == 228));
    }

    /// Real-valued 2-D DCT of the same scaling, in either direction.
    fn real_transform(input: &[f64; BLOCK_SIZE], inverse: bool) -> [f64; BLOCK_SIZE] {
        let basis = |x: usize, u: usize| {
            let c = if u == 0 { std::f64::consts::FRAC_1_SQRT_2 } else { 1.0 };
            c * (((2 * x + 1) * u) as f64 * std::f64::consts::PI / 16.0).cos()
        };
        std::array::from_fn(|i| {
            let (a, b) = (i / BLOCK_DIM, i % BLOCK_DIM);
            let mut sum = 0.0;
            for (j, v) in input.iter().enumerate() {
                let (c, d) = (j / BLOCK_DIM, j % BLOCK_DIM);
                sum += v * if inverse {
                    basis(a, c) * basis(b, d)
                } else {
                    basis(c, a) * basis(d, b)
                };
            }
            sum / 4.0
        })
    }

    #[test]
    fn flat_blocks_are_exact() {
        for level in -128..128 {
            let coefs = forward_dct(&[level; BLOCK_SIZE]);
            assert_eq!(coefs[0], level * 8);
            assert!(coefs[1..].iter().all(|&c| c == 0));
        }
    }

    #[test]
    fn near_inverse() {
        arbtest::arbtest(|u| {
            let mut samples = [0u8; BLOCK_SIZE];
            for s in samples.iter_mut() {
                *s = u.arbitrary()?;
            }
            let shifted = shifted(&samples);
            let coefs = forward_dct(&shifted);
            let real = real_transform(&shifted.map(f64::from), false);
            for (&c, r) in coefs.iter().zip(real) {
                assert!((c as f64 - r).abs() <= 1.0, "{c} {r}");
            }

            let back = inverse_dct(&coefs);
            let real = real_transform(&coefs.map(f64::from), true);
            for (&s, r) in back.iter().zip(real) {
                let r = (r + 128.0).clamp(0.0, 255.0);
                assert!((s as f64 - r).abs() <= 1.0, "{s} {r}");
            }
            // Rounding the coefficients to integers can move a sample of
            // pure noise by 2.
            assert_all_almost_eq!(back, samples, 2);
            Ok(())
        });
    }

    #[test]
    fn smooth_blocks_roundtrip_within_one() {
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(0);
        for _ in 0..1000 {
            let base: i32 = rng.random_range(20..236);
            let samples: [u8; BLOCK_SIZE] =
                std::array::from_fn(|i| (base + (i % 8) as i32 - (i / 8) as i32) as u8);
            let back = inverse_dct(&forward_dct(&shifted(&samples)));
            assert_all_almost_eq!(back, samples, 1);
        }
    }

    #[test]
    fn corrupt_coefficients_are_clamped() {
        let coefs = [i32::from(i16::MAX) * 65535; BLOCK_SIZE];
        let out = inverse_dct(&coefs);
        assert!(out.iter().all(|&s| s == 0 || s == 255));
    }
}
