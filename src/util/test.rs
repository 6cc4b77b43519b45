// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use num_traits::Num;
use rand::Rng;

use crate::{ColorSpace, api::RawImage};

pub fn abs_delta<T: Num + std::cmp::PartialOrd>(left_val: T, right_val: T) -> T {
    if left_val > right_val {
        left_val - right_val
    } else {
        right_val - left_val
    }
}

macro_rules! assert_almost_eq {
    ($left:expr, $right:expr, $max_error:expr $(,)?) => {
        let (left_val, right_val, max_error) = (&$left, &$right, &$max_error);
        match $crate::util::test::abs_delta(*left_val, *right_val).partial_cmp(max_error) {
            Some(std::cmp::Ordering::Greater) | None => panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n max_error: `{:?}`",
                left_val, right_val, max_error
            ),
            _ => {}
        }
    };
}
pub(crate) use assert_almost_eq;

macro_rules! assert_all_almost_eq {
    ($left:expr, $right:expr, $max_error:expr $(,)?) => {
        let (left_val, right_val, max_error) = (&$left, &$right, &$max_error);
        if left_val.len() != right_val.len() {
            panic!("assertion failed: `(left ≈ right)`\n left.len(): `{}`,\n right.len(): `{}`", left_val.len(), right_val.len());
        }
        for index in 0..left_val.len() {
            match $crate::util::test::abs_delta(left_val[index], right_val[index]).partial_cmp(max_error) {
                Some(std::cmp::Ordering::Greater) | None =>  panic!(
                    "assertion failed: `(left ≈ right)`\n left: `{:?}`,\n right: `{:?}`,\n max_error: `{:?}`,\n left[{}]: `{}`,\n right[{}]: `{}`",
                    left_val, right_val, max_error, index, left_val[index], index, right_val[index]
                ),
                _ => {}
            }
        }
    };
}
pub(crate) use assert_all_almost_eq;

/// An image of uniformly random samples.
pub fn random_image<R: Rng>(
    rng: &mut R,
    width: usize,
    height: usize,
    color_space: ColorSpace,
) -> RawImage {
    let len = width * height * color_space.num_components();
    let data = (0..len).map(|_| rng.random::<u8>()).collect();
    RawImage::new(width, height, color_space, data).unwrap()
}

/// `t` folded into `0..=period`, rising then falling without jumps.
pub fn triangle_wave(t: usize, period: usize) -> usize {
    let t = t % (2 * period);
    if t <= period { t } else { 2 * period - t }
}

/// A smooth image (folded gradients, no sharp edges) that compresses the
/// way photographs do, so round-trip errors stay small.
pub fn smooth_image(width: usize, height: usize, color_space: ColorSpace) -> RawImage {
    let nc = color_space.num_components();
    let mut data = Vec::with_capacity(width * height * nc);
    for y in 0..height {
        for x in 0..width {
            for c in 0..nc {
                let v = 40 + triangle_wave(x * (3 + c) + y * (5 - c.min(4)), 160) + (c * 7) % 30;
                data.push(v as u8);
            }
        }
    }
    RawImage::new(width, height, color_space, data).unwrap()
}

pub fn mean_abs_diff(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    let total: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as i32 - *y as i32).unsigned_abs() as u64)
        .sum();
    total as f64 / a.len() as f64
}

pub fn max_abs_diff(a: &[u8], b: &[u8]) -> u8 {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x.abs_diff(*y)).max().unwrap_or(0)
}
