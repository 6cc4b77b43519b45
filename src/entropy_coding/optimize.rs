// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::huffman::{HuffmanTable, MAX_CODE_LENGTH};

/// Symbol counts for one table. Slot 256 is reserved for the pseudo-symbol
/// that keeps every real symbol off the all-ones code.
pub type Histogram = [u32; 257];

/// Builds an optimal length-limited code for `freq` (ITU T.81 K.2).
pub fn optimal_table(freq: &Histogram) -> HuffmanTable {
    let mut freq: [u64; 257] = freq.map(|f| f as u64);
    freq[256] = 1;
    let mut codesize = [0usize; 257];
    // Next symbol in the chain of each tree branch.
    let mut others = [None::<usize>; 257];

    loop {
        // The two least frequent remaining symbols; ties go to the larger
        // symbol index.
        let smallest = |skip: Option<usize>| {
            let mut best: Option<usize> = None;
            for (i, &f) in freq.iter().enumerate() {
                if f != 0 && Some(i) != skip && best.is_none_or(|b| f <= freq[b]) {
                    best = Some(i);
                }
            }
            best
        };
        let Some(mut c1) = smallest(None) else {
            break;
        };
        let Some(mut c2) = smallest(Some(c1)) else {
            break;
        };
        freq[c1] += freq[c2];
        freq[c2] = 0;
        codesize[c1] += 1;
        while let Some(next) = others[c1] {
            c1 = next;
            codesize[c1] += 1;
        }
        others[c1] = Some(c2);
        codesize[c2] += 1;
        while let Some(next) = others[c2] {
            c2 = next;
            codesize[c2] += 1;
        }
    }

    let mut bits = [0u32; 258];
    for &size in codesize.iter().filter(|&&s| s > 0) {
        bits[size] += 1;
    }

    // Shorten codes longer than the limit: two symbols at the longest
    // length become one prefix one bit shorter, and a shorter code is split
    // to make room for the second.
    for i in (MAX_CODE_LENGTH + 1..bits.len()).rev() {
        while bits[i] > 0 {
            let mut j = i - 2;
            while bits[j] == 0 {
                j -= 1;
            }
            bits[i] -= 2;
            bits[i - 1] += 1;
            bits[j + 1] += 2;
            bits[j] -= 1;
        }
    }

    // Drop the pseudo-symbol, which holds the longest code.
    if let Some(longest) = (1..=MAX_CODE_LENGTH).rev().find(|&l| bits[l] > 0) {
        bits[longest] -= 1;
    }

    let mut table_bits = [0u8; MAX_CODE_LENGTH + 1];
    for l in 1..=MAX_CODE_LENGTH {
        table_bits[l] = bits[l] as u8;
    }
    let mut values = vec![];
    for len in 1..=bits.len() - 1 {
        for symbol in 0..256 {
            if codesize[symbol] == len {
                values.push(symbol as u8);
            }
        }
    }
    HuffmanTable {
        bits: table_bits,
        values,
    }
}

/// Total coded size of `freq` under `table`, in bits, or `None` if some
/// counted symbol has no code.
pub fn coded_size(freq: &Histogram, table: &HuffmanTable) -> Option<u64> {
    let mut lengths = [0u8; 256];
    let mut p = 0;
    for len in 1..=MAX_CODE_LENGTH {
        for _ in 0..table.bits[len] {
            lengths[table.values[p] as usize] = len as u8;
            p += 1;
        }
    }
    let mut total = 0u64;
    for (symbol, &f) in freq[..256].iter().enumerate() {
        if f == 0 {
            continue;
        }
        if lengths[symbol] == 0 {
            return None;
        }
        total += f as u64 * lengths[symbol] as u64;
    }
    Some(total)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entropy_coding::huffman::{EncodeTable, TableClass};
    use rand::{Rng, SeedableRng};
    use test_log::test;

    #[test]
    fn two_symbols() {
        let mut freq = [0; 257];
        freq[3] = 10;
        freq[7] = 1;
        let table = optimal_table(&freq);
        // With the pseudo-symbol: 3 -> 1 bit, 7 and 256 -> 2 bits; dropping
        // 256 leaves one code of each length.
        assert_eq!(&table.bits[1..3], &[1, 1]);
        assert_eq!(table.values, vec![3, 7]);
        assert!(table.canonical_codes().is_ok());
    }

    #[test]
    fn lengths_are_limited() {
        // Fibonacci counts give a maximally skewed tree.
        let mut freq = [0; 257];
        let (mut a, mut b) = (1u32, 1u32);
        for f in freq.iter_mut().take(30) {
            *f = a;
            (a, b) = (b, a + b);
        }
        let table = optimal_table(&freq);
        assert_eq!(table.values.len(), 30);
        assert!(table.canonical_codes().is_ok());
        assert!(EncodeTable::new(&table, TableClass::Ac).is_ok());
    }

    #[test]
    fn no_worse_than_standard() {
        let standard = HuffmanTable::standard(TableClass::Ac, false);
        arbtest::arbtest(|u| {
            let mut freq = [0u32; 257];
            for &s in &standard.values {
                if u.arbitrary::<bool>()? {
                    freq[s as usize] = u.int_in_range(0..=100_000)?;
                }
            }
            if freq.iter().filter(|&&f| f > 0).count() < 2 {
                return Ok(());
            }
            let table = optimal_table(&freq);
            assert!(table.bits[1..].iter().map(|&b| b as usize).sum::<usize>() <= 256);
            let optimal = coded_size(&freq, &table).unwrap();
            let fixed = coded_size(&freq, &standard).unwrap();
            assert!(optimal <= fixed, "{optimal} > {fixed}");
            Ok(())
        });
    }

    #[test]
    fn random_histograms_give_valid_codes() {
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(0);
        for _ in 0..100 {
            let mut freq = [0u32; 257];
            for f in freq[..256].iter_mut() {
                if rng.random_bool(0.3) {
                    *f = rng.random_range(1..1_000_000);
                }
            }
            let table = optimal_table(&freq);
            assert!(table.canonical_codes().is_ok());
            assert!(coded_size(&freq, &table).is_some());
        }
    }
}
