// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    bit_reader::BitReader,
    error::{Error, Result},
};

pub const MAX_CODE_LENGTH: usize = 16;
const LOOKAHEAD_BITS: u32 = 8;

/// Table class, as coded in the high nibble of a DHT table identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableClass {
    Dc = 0,
    Ac = 1,
}

impl TableClass {
    pub fn name(self) -> &'static str {
        match self {
            TableClass::Dc => "DC",
            TableClass::Ac => "AC",
        }
    }
}

/// A Huffman table as transmitted in a DHT segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    /// `bits[l]` is the number of codes of length `l`; `bits[0]` is unused.
    pub bits: [u8; MAX_CODE_LENGTH + 1],
    /// Symbols in order of increasing code length.
    pub values: Vec<u8>,
}

const STD_DC_LUMINANCE_BITS: [u8; 17] = [0, 0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];
const STD_DC_CHROMINANCE_BITS: [u8; 17] = [0, 0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];
const STD_DC_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

const STD_AC_LUMINANCE_BITS: [u8; 17] = [0, 0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7d];
#[rustfmt::skip]
const STD_AC_LUMINANCE_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07,
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52, 0xd1, 0xf0,
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25, 0x26, 0x27, 0x28,
    0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49,
    0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69,
    0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7,
    0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5,
    0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2,
    0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

const STD_AC_CHROMINANCE_BITS: [u8; 17] = [0, 0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];
#[rustfmt::skip]
const STD_AC_CHROMINANCE_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71,
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33, 0x52, 0xf0,
    0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18, 0x19, 0x1a, 0x26,
    0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48,
    0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68,
    0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87,
    0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5,
    0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3,
    0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda,
    0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8,
    0xf9, 0xfa,
];

impl HuffmanTable {
    /// Builds a table, checking that the counts and symbols agree and that
    /// the canonical code fits.
    pub fn new(bits: [u8; MAX_CODE_LENGTH + 1], values: Vec<u8>) -> Result<HuffmanTable> {
        let count: usize = bits[1..].iter().map(|&b| b as usize).sum();
        if count > 256 || count != values.len() {
            return Err(Error::BadDhtCounts(count));
        }
        let table = HuffmanTable { bits, values };
        table.canonical_codes()?;
        Ok(table)
    }

    /// The example tables of ITU T.81 Annex K.3.
    pub fn standard(class: TableClass, chrominance: bool) -> HuffmanTable {
        let (bits, values): (&[u8; 17], &[u8]) = match (class, chrominance) {
            (TableClass::Dc, false) => (&STD_DC_LUMINANCE_BITS, &STD_DC_VALUES),
            (TableClass::Dc, true) => (&STD_DC_CHROMINANCE_BITS, &STD_DC_VALUES),
            (TableClass::Ac, false) => (&STD_AC_LUMINANCE_BITS, &STD_AC_LUMINANCE_VALUES),
            (TableClass::Ac, true) => (&STD_AC_CHROMINANCE_BITS, &STD_AC_CHROMINANCE_VALUES),
        };
        HuffmanTable {
            bits: *bits,
            values: values.to_vec(),
        }
    }

    /// Assigns (code, length) to each entry of `values` (ITU T.81 C.1 and
    /// C.2): codes of one length are consecutive, and moving to the next
    /// length appends a zero bit.
    pub fn canonical_codes(&self) -> Result<Vec<(u16, u8)>> {
        let mut codes = Vec::with_capacity(self.values.len());
        let mut code = 0u32;
        for len in 1..=MAX_CODE_LENGTH {
            for _ in 0..self.bits[len] {
                codes.push((code as u16, len as u8));
                code += 1;
            }
            // The all-ones code of each length must stay unused.
            if code >= 1 << len {
                return Err(Error::BadHuffmanTable);
            }
            code <<= 1;
        }
        Ok(codes)
    }
}

/// Symbol to (code, length) map for encoding. A length of 0 marks a symbol
/// without a code.
#[derive(Debug, Clone)]
pub struct EncodeTable {
    codes: [(u16, u8); 256],
}

impl EncodeTable {
    pub fn new(table: &HuffmanTable, class: TableClass) -> Result<EncodeTable> {
        let mut codes = [(0, 0); 256];
        for (&symbol, code) in table.values.iter().zip(table.canonical_codes()?) {
            if class == TableClass::Dc && symbol > 15 {
                return Err(Error::BadHuffmanTable);
            }
            codes[symbol as usize] = code;
        }
        Ok(EncodeTable { codes })
    }

    #[inline]
    pub fn code(&self, symbol: u8) -> (u16, u8) {
        self.codes[symbol as usize]
    }
}

/// Decoding tables: an 8-bit lookahead for short codes and per-length code
/// bounds for the rest (ITU T.81 F.2.2.3).
#[derive(Debug, Clone)]
pub struct DecodeTable {
    /// Largest code of each length, or -1 if there is none.
    maxcode: [i32; MAX_CODE_LENGTH + 1],
    /// Index into `values` of code 0 of each length, offset by the first
    /// code of that length.
    valoffset: [i32; MAX_CODE_LENGTH + 1],
    values: Vec<u8>,
    /// (length, symbol) for every 8-bit prefix that starts with a short code.
    lookahead: [(u8, u8); 1 << LOOKAHEAD_BITS],
}

impl DecodeTable {
    pub fn new(table: &HuffmanTable, class: TableClass) -> Result<DecodeTable> {
        let codes = table.canonical_codes()?;
        if class == TableClass::Dc && table.values.iter().any(|&v| v > 15) {
            return Err(Error::BadHuffmanTable);
        }
        let mut maxcode = [-1; MAX_CODE_LENGTH + 1];
        let mut valoffset = [0; MAX_CODE_LENGTH + 1];
        let mut lookahead = [(0, 0); 1 << LOOKAHEAD_BITS];
        let mut p = 0usize;
        for len in 1..=MAX_CODE_LENGTH {
            let n = table.bits[len] as usize;
            if n > 0 {
                valoffset[len] = p as i32 - codes[p].0 as i32;
                p += n;
                maxcode[len] = codes[p - 1].0 as i32;
            }
        }
        for (&(code, len), &symbol) in codes.iter().zip(table.values.iter()) {
            if len as u32 > LOOKAHEAD_BITS {
                break;
            }
            let shift = LOOKAHEAD_BITS - len as u32;
            let first = (code as usize) << shift;
            lookahead[first..first + (1 << shift)].fill((len, symbol));
        }
        Ok(DecodeTable {
            maxcode,
            valoffset,
            values: table.values.clone(),
            lookahead,
        })
    }

    /// Decodes one symbol. Returns `None` if the next 16 bits match no
    /// code, after skipping them.
    #[inline]
    pub fn decode(&self, br: &mut BitReader) -> Option<u8> {
        let (len, symbol) = self.lookahead[br.peek(LOOKAHEAD_BITS) as usize];
        if len > 0 {
            br.consume(len as u32);
            return Some(symbol);
        }
        let bits = br.peek(MAX_CODE_LENGTH as u32) as i32;
        for len in LOOKAHEAD_BITS as usize + 1..=MAX_CODE_LENGTH {
            let code = bits >> (MAX_CODE_LENGTH - len);
            if code <= self.maxcode[len] {
                br.consume(len as u32);
                return self
                    .values
                    .get((code + self.valoffset[len]) as usize)
                    .copied();
            }
        }
        br.consume(MAX_CODE_LENGTH as u32);
        None
    }
}
