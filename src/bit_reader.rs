// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    error::{Warning, WarningLog},
    headers::markers,
    util::tracing_wrappers::*,
};

/// Reads entropy-coded data, MSB first, undoing byte stuffing.
///
/// A marker ends the data: once one is found the reader keeps it pending and
/// supplies zero bits from then on, as it does at the end of the input.
/// Consuming such filler bits is reported once as
/// [`Warning::PrematureEnd`].
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u64,
    bits_in_buf: u32,
    // Bits at the top of `bit_buf` that came from the data rather than filler.
    real_bits: u32,
    pending_marker: Option<u8>,
    insufficient_data: bool,
    warned: bool,
}

/// Largest request for a single `peek` or `read`.
pub const MAX_BITS_PER_CALL: u32 = 16;

impl<'a> BitReader<'a> {
    /// Starts reading `data` at byte offset `pos`.
    pub fn new(data: &'a [u8], pos: usize) -> BitReader<'a> {
        BitReader {
            data,
            pos: pos.min(data.len()),
            bit_buf: 0,
            bits_in_buf: 0,
            real_bits: 0,
            pending_marker: None,
            insufficient_data: false,
            warned: false,
        }
    }

    /// Offset of the first byte not yet examined. After [`Self::next_marker`]
    /// this is just past the marker code.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn at_end(&self) -> bool {
        self.pending_marker.is_some() || self.pos >= self.data.len()
    }

    /// Loads the next data byte, or `None` at a marker or the end of input.
    fn next_data_byte(&mut self) -> Option<u8> {
        if self.at_end() {
            return None;
        }
        let byte = self.data[self.pos];
        if byte != 0xFF {
            self.pos += 1;
            return Some(byte);
        }
        let mut p = self.pos + 1;
        // Any number of 0xFF fill bytes may precede a marker.
        while p < self.data.len() && self.data[p] == 0xFF {
            p += 1;
        }
        match self.data.get(p) {
            None => {
                self.pos = self.data.len();
                None
            }
            Some(0) => {
                self.pos = p + 1;
                Some(0xFF)
            }
            Some(&code) => {
                self.pos = p + 1;
                self.pending_marker = Some(code);
                None
            }
        }
    }

    fn refill(&mut self) {
        while self.bits_in_buf <= 56 {
            let byte = self.next_data_byte();
            self.bit_buf = (self.bit_buf << 8) | byte.unwrap_or(0) as u64;
            self.bits_in_buf += 8;
            if byte.is_some() {
                self.real_bits += 8;
            }
        }
    }

    /// Returns the next `num` bits without consuming them.
    #[inline]
    pub fn peek(&mut self, num: u32) -> u32 {
        debug_assert!(num <= MAX_BITS_PER_CALL);
        if self.bits_in_buf < num {
            self.refill();
        }
        ((self.bit_buf >> (self.bits_in_buf - num)) & ((1u64 << num) - 1)) as u32
    }

    /// Advances by `num` bits, which must have been peeked.
    #[inline]
    pub fn consume(&mut self, num: u32) {
        debug_assert!(num <= self.bits_in_buf);
        self.bits_in_buf -= num;
        self.bit_buf &= (1u64 << self.bits_in_buf) - 1;
        if num > self.real_bits {
            self.real_bits = 0;
            self.insufficient_data = true;
        } else {
            self.real_bits -= num;
        }
    }

    #[inline]
    pub fn read(&mut self, num: u32) -> u32 {
        if num == 0 {
            return 0;
        }
        let bits = self.peek(num);
        self.consume(num);
        bits
    }

    /// Whether filler bits past the end of the data have been consumed.
    pub fn is_out_of_data(&self) -> bool {
        self.insufficient_data
    }

    /// Reports the first use of filler bits, once per scan.
    pub fn take_warning(&mut self) -> Option<Warning> {
        if self.insufficient_data && !self.warned {
            self.warned = true;
            Some(Warning::PrematureEnd)
        } else {
            None
        }
    }

    fn discard_bits(&mut self) {
        self.bit_buf = 0;
        self.bits_in_buf = 0;
        self.real_bits = 0;
    }

    /// Abandons any buffered bits and returns the next marker code, skipping
    /// (and reporting) garbage before it. `None` means the input ended.
    pub fn next_marker(&mut self, warnings: &mut WarningLog) -> Option<u8> {
        self.discard_bits();
        if let Some(code) = self.pending_marker.take() {
            return Some(code);
        }
        let mut discarded = 0;
        loop {
            while self.pos < self.data.len() && self.data[self.pos] != 0xFF {
                self.pos += 1;
                discarded += 1;
            }
            while self.pos < self.data.len() && self.data[self.pos] == 0xFF {
                self.pos += 1;
            }
            let Some(&code) = self.data.get(self.pos) else {
                return None;
            };
            self.pos += 1;
            if code == 0 {
                // A stuffed zero: still data.
                discarded += 2;
                continue;
            }
            if discarded > 0 {
                warnings.emit(Warning::ExtraneousBytes {
                    count: discarded,
                    marker: code,
                });
            }
            return Some(code);
        }
    }

    /// Reads the RSTn marker that ends a restart interval, where `expected`
    /// is n. If some other marker is found, the reader resynchronises: a
    /// restart marker for a later interval is left pending (the intervals in
    /// between decode as empty), one for an earlier interval is skipped, and
    /// anything else is left pending so that the rest of the scan decodes as
    /// empty.
    pub fn process_restart(&mut self, expected: u8, warnings: &mut WarningLog) {
        let want = markers::RST0 + (expected & 7);
        let mut marker = self.next_marker(warnings);
        if marker == Some(want) {
            trace!("RST{expected}");
        } else {
            warnings.emit(Warning::UnexpectedRestart {
                found: marker.unwrap_or(markers::EOI),
                expected: expected & 7,
            });
            let rst = |delta: u8| markers::RST0 + (expected.wrapping_add(delta) & 7);
            loop {
                match marker {
                    // Out of data: leave it that way.
                    None => break,
                    Some(code) if code < markers::SOF0 => {
                        marker = self.next_marker(warnings);
                    }
                    Some(code) if !markers::is_rst(code) => {
                        self.pending_marker = Some(code);
                        break;
                    }
                    Some(code) if code == rst(1) || code == rst(2) => {
                        self.pending_marker = Some(code);
                        break;
                    }
                    Some(code) if code == rst(7) || code == rst(6) => {
                        marker = self.next_marker(warnings);
                    }
                    // Probably the intended marker, damaged.
                    Some(_) => break,
                }
            }
        }
        self.discard_bits();
        if !self.at_end() {
            self.insufficient_data = false;
            self.warned = false;
        }
    }
}

impl std::fmt::Debug for BitReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BitReader{{ pos: {}, bits_in_buf: {}, real_bits: {}, pending_marker: {:?} }}",
            self.pos, self.bits_in_buf, self.real_bits, self.pending_marker
        )
    }
}
