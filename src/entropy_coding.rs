// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Huffman entropy coding of quantized coefficient blocks, for both
//! sequential and progressive scans.

pub mod decode;
pub mod encode;
pub mod huffman;
pub mod optimize;
pub mod progressive;

pub use huffman::*;

/// Number of bits needed to represent `|v|`: the category coded in the
/// Huffman symbol of a coefficient or DC difference.
#[inline]
pub fn magnitude_category(v: i32) -> u32 {
    32 - v.unsigned_abs().leading_zeros()
}

/// The `size` extra bits sent after a category symbol. Negative values are
/// sent as the low bits of `v - 1`.
#[inline]
pub fn magnitude_bits(v: i32, size: u32) -> u32 {
    let bits = (if v < 0 { v - 1 } else { v }) as u32;
    bits & ((1u32 << size) - 1)
}

/// Inverse of [`magnitude_bits`] (ITU T.81 F.2.2.1 EXTEND).
#[inline]
pub fn extend(bits: u32, size: u32) -> i32 {
    if size == 0 {
        0
    } else if bits < 1 << (size - 1) {
        bits as i32 - (1 << size) + 1
    } else {
        bits as i32
    }
}

/// Counts MCUs of a scan and says when a restart marker is due.
#[derive(Debug, Clone)]
pub struct RestartCounter {
    interval: usize,
    to_go: usize,
    next_num: u8,
}

impl RestartCounter {
    /// `interval` is in MCUs; 0 disables restarts.
    pub fn new(interval: usize) -> RestartCounter {
        RestartCounter {
            interval,
            to_go: interval,
            next_num: 0,
        }
    }

    /// Called before every MCU. Returns `n` if marker RSTn precedes it.
    pub fn before_mcu(&mut self) -> Option<u8> {
        if self.interval == 0 {
            return None;
        }
        let due = if self.to_go == 0 {
            self.to_go = self.interval;
            let n = self.next_num;
            self.next_num = (n + 1) & 7;
            Some(n)
        } else {
            None
        };
        self.to_go -= 1;
        due
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn categories() {
        assert_eq!(magnitude_category(0), 0);
        assert_eq!(magnitude_category(1), 1);
        assert_eq!(magnitude_category(-1), 1);
        assert_eq!(magnitude_category(-2), 2);
        assert_eq!(magnitude_category(1023), 10);
        assert_eq!(magnitude_category(-2047), 11);
    }

    #[test]
    fn extend_inverts_magnitude_bits() {
        arbtest::arbtest(|u| {
            let v: i32 = u.int_in_range(-32767..=32767)?;
            let size = magnitude_category(v);
            assert_eq!(extend(magnitude_bits(v, size), size), v);
            Ok(())
        });
        assert_eq!(magnitude_bits(-3, 2), 0b00);
        assert_eq!(magnitude_bits(-1, 1), 0);
        assert_eq!(extend(0b011, 3), -4);
    }

    #[test]
    fn restart_cycle() {
        let mut counter = RestartCounter::new(2);
        let due: Vec<_> = (0..20).map(|_| counter.before_mcu()).collect();
        assert_eq!(due[0], None);
        assert_eq!(due[1], None);
        assert_eq!(due[2], Some(0));
        assert_eq!(due[4], Some(1));
        assert_eq!(due[18], Some(0));
        assert_eq!(due.iter().flatten().count(), 9);
        let mut off = RestartCounter::new(0);
        assert!((0..10).all(|_| off.before_mcu().is_none()));
    }
}
