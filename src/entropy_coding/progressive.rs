// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Progressive scans (ITU T.81 G.1.2): DC and AC first passes, which code
//! coefficients shifted right by Al, and refinement passes, which send one
//! more bit of each.

use super::{
    decode::{decode_dc_diff, decode_symbol},
    encode::EntropySink,
    extend,
    huffman::DecodeTable,
    magnitude_bits, magnitude_category,
};
use crate::{
    BLOCK_SIZE, MAX_COMPS_IN_SCAN,
    bit_reader::BitReader,
    coefficients::Block,
    error::{Error, Result, Warning, WarningLog},
    headers::ScanHeader,
    util::tracing_wrappers::*,
};

/// Longest run of empty blocks one EOBn symbol can describe.
const MAX_EOBRUN: u32 = 0x7FFF;
/// Correction bits buffered for an EOB run before the run is flushed.
const MAX_CORRECTION_BITS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

impl ScanKind {
    pub fn of(scan: &ScanHeader) -> ScanKind {
        match (scan.is_dc_scan(), scan.is_refinement()) {
            (true, false) => ScanKind::DcFirst,
            (true, true) => ScanKind::DcRefine,
            (false, false) => ScanKind::AcFirst,
            (false, true) => ScanKind::AcRefine,
        }
    }
}

/// Encoder state of one progressive scan.
pub struct ProgressiveEncoder {
    kind: ScanKind,
    ss: usize,
    se: usize,
    al: u32,
    last_dc: [i32; MAX_COMPS_IN_SCAN],
    eobrun: u32,
    /// Correction bits of the blocks in the pending EOB run.
    correction_bits: Vec<u8>,
}

impl ProgressiveEncoder {
    pub fn new(scan: &ScanHeader) -> ProgressiveEncoder {
        ProgressiveEncoder {
            kind: ScanKind::of(scan),
            ss: scan.ss as usize,
            se: scan.se as usize,
            al: scan.al as u32,
            last_dc: [0; MAX_COMPS_IN_SCAN],
            eobrun: 0,
            correction_bits: Vec::with_capacity(MAX_CORRECTION_BITS),
        }
    }

    /// Codes `block`, the `scan_component`th block source of the MCU. AC
    /// scans have a single component and ignore `dc_table`.
    pub fn encode_block(
        &mut self,
        sink: &mut impl EntropySink,
        block: &Block,
        scan_component: usize,
        dc_table: usize,
        ac_table: usize,
    ) -> Result<()> {
        match self.kind {
            ScanKind::DcFirst => self.encode_dc_first(sink, block, scan_component, dc_table),
            ScanKind::DcRefine => sink.emit_bits(1, (block[0] as i32 >> self.al) as u32),
            ScanKind::AcFirst => self.encode_ac_first(sink, block, ac_table),
            ScanKind::AcRefine => self.encode_ac_refine(sink, block, ac_table),
        }
    }

    fn encode_dc_first(
        &mut self,
        sink: &mut impl EntropySink,
        block: &Block,
        scan_component: usize,
        dc_table: usize,
    ) -> Result<()> {
        let dc = block[0] as i32 >> self.al;
        let diff = dc - self.last_dc[scan_component];
        self.last_dc[scan_component] = dc;
        let nbits = magnitude_category(diff);
        sink.emit_dc(dc_table, nbits as u8)?;
        sink.emit_bits(nbits, magnitude_bits(diff, nbits))
    }

    /// Sends the pending EOB run and the correction bits that belong to it.
    fn emit_eobrun(&mut self, sink: &mut impl EntropySink, ac_table: usize) -> Result<()> {
        if self.eobrun == 0 {
            return Ok(());
        }
        let nbits = 31 - self.eobrun.leading_zeros();
        if nbits > 14 {
            return Err(Error::ArithmeticOverflow);
        }
        sink.emit_ac(ac_table, (nbits << 4) as u8)?;
        sink.emit_bits(nbits, self.eobrun)?;
        self.eobrun = 0;
        for &bit in &self.correction_bits {
            sink.emit_bits(1, bit as u32)?;
        }
        self.correction_bits.clear();
        Ok(())
    }

    fn encode_ac_first(
        &mut self,
        sink: &mut impl EntropySink,
        block: &Block,
        ac_table: usize,
    ) -> Result<()> {
        let mut run = 0u32;
        for &coef in &block[self.ss..=self.se] {
            let coef = coef as i32;
            // Shift the magnitude, not the value, so that -1 >> 1 is 0.
            let magnitude = coef.abs() >> self.al;
            if magnitude == 0 {
                run += 1;
                continue;
            }
            let v = if coef < 0 { -magnitude } else { magnitude };
            self.emit_eobrun(sink, ac_table)?;
            while run > 15 {
                sink.emit_ac(ac_table, 0xF0)?;
                run -= 16;
            }
            let nbits = magnitude_category(v);
            sink.emit_ac(ac_table, ((run << 4) + nbits) as u8)?;
            sink.emit_bits(nbits, magnitude_bits(v, nbits))?;
            run = 0;
        }
        if run > 0 {
            self.eobrun += 1;
            if self.eobrun == MAX_EOBRUN {
                self.emit_eobrun(sink, ac_table)?;
            }
        }
        Ok(())
    }

    fn encode_ac_refine(
        &mut self,
        sink: &mut impl EntropySink,
        block: &Block,
        ac_table: usize,
    ) -> Result<()> {
        let mut absvalues = [0u32; BLOCK_SIZE];
        // Position of the last coefficient that becomes nonzero in this pass.
        let mut eob = 0;
        for k in self.ss..=self.se {
            absvalues[k] = (block[k] as i32).unsigned_abs() >> self.al;
            if absvalues[k] == 1 {
                eob = k;
            }
        }

        let mut run = 0u32;
        // Correction bits of this block not yet sent.
        let mut pending = Vec::new();
        for k in self.ss..=self.se {
            let v = absvalues[k];
            if v == 0 {
                run += 1;
                continue;
            }
            while run > 15 && k <= eob {
                self.emit_eobrun(sink, ac_table)?;
                sink.emit_ac(ac_table, 0xF0)?;
                run -= 16;
                for bit in pending.drain(..) {
                    sink.emit_bits(1, bit as u32)?;
                }
            }
            if v > 1 {
                // Already nonzero: the new bit goes with the next symbol.
                pending.push((v & 1) as u8);
                continue;
            }
            self.emit_eobrun(sink, ac_table)?;
            sink.emit_ac(ac_table, ((run << 4) + 1) as u8)?;
            sink.emit_bits(1, (block[k] >= 0) as u32)?;
            for bit in pending.drain(..) {
                sink.emit_bits(1, bit as u32)?;
            }
            run = 0;
        }

        if run > 0 || !pending.is_empty() {
            self.eobrun += 1;
            self.correction_bits.extend_from_slice(&pending);
            if self.eobrun == MAX_EOBRUN
                || self.correction_bits.len() > MAX_CORRECTION_BITS - BLOCK_SIZE + 1
            {
                self.emit_eobrun(sink, ac_table)?;
            }
        }
        Ok(())
    }

    /// Ends a restart interval.
    pub fn restart(&mut self, sink: &mut impl EntropySink, n: u8, ac_table: usize) -> Result<()> {
        self.emit_eobrun(sink, ac_table)?;
        sink.restart(n)?;
        self.last_dc = [0; MAX_COMPS_IN_SCAN];
        Ok(())
    }

    /// Flushes the pending EOB run at the end of the scan.
    pub fn finish(&mut self, sink: &mut impl EntropySink, ac_table: usize) -> Result<()> {
        self.emit_eobrun(sink, ac_table)
    }
}

/// Decoder state of one progressive scan.
pub struct ProgressiveDecoder {
    kind: ScanKind,
    ss: usize,
    se: usize,
    al: u32,
    last_dc: [i32; MAX_COMPS_IN_SCAN],
    eobrun: u32,
}

impl ProgressiveDecoder {
    pub fn new(scan: &ScanHeader) -> ProgressiveDecoder {
        ProgressiveDecoder {
            kind: ScanKind::of(scan),
            ss: scan.ss as usize,
            se: scan.se as usize,
            al: scan.al as u32,
            last_dc: [0; MAX_COMPS_IN_SCAN],
            eobrun: 0,
        }
    }

    pub fn restart(&mut self) {
        self.last_dc = [0; MAX_COMPS_IN_SCAN];
        self.eobrun = 0;
    }

    /// Adds this scan's contribution to `block`. `dc_table` must be present
    /// for first DC scans and `ac_table` for AC scans.
    pub fn decode_block(
        &mut self,
        br: &mut BitReader,
        block: &mut Block,
        scan_component: usize,
        dc_table: Option<&DecodeTable>,
        ac_table: Option<&DecodeTable>,
        warnings: &mut WarningLog,
    ) {
        match (self.kind, dc_table, ac_table) {
            (ScanKind::DcFirst, Some(dc), _) => {
                let diff = decode_dc_diff(br, dc, warnings);
                let dc = self.last_dc[scan_component].wrapping_add(diff);
                self.last_dc[scan_component] = dc;
                block[0] = (dc << self.al) as i16;
            }
            (ScanKind::DcRefine, ..) => {
                if br.read(1) != 0 {
                    block[0] |= 1 << self.al;
                }
            }
            (ScanKind::AcFirst, _, Some(ac)) => self.decode_ac_first(br, block, ac, warnings),
            (ScanKind::AcRefine, _, Some(ac)) => self.decode_ac_refine(br, block, ac, warnings),
            _ => debug_assert!(false, "missing table for {:?} scan", self.kind),
        }
    }

    fn decode_ac_first(
        &mut self,
        br: &mut BitReader,
        block: &mut Block,
        ac: &DecodeTable,
        warnings: &mut WarningLog,
    ) {
        if self.eobrun > 0 {
            self.eobrun -= 1;
            return;
        }
        let mut k = self.ss;
        while k <= self.se {
            let rs = decode_symbol(br, ac, warnings);
            let run = (rs >> 4) as u32;
            let size = (rs & 15) as u32;
            if size != 0 {
                k += run as usize;
                let v = extend(br.read(size), size);
                if k <= self.se {
                    block[k] = (v << self.al) as i16;
                }
            } else if run == 15 {
                k += 15;
            } else {
                self.eobrun = (1 << run) + br.read(run) - 1;
                break;
            }
            k += 1;
        }
    }

    fn decode_ac_refine(
        &mut self,
        br: &mut BitReader,
        block: &mut Block,
        ac: &DecodeTable,
        warnings: &mut WarningLog,
    ) {
        let p1: i16 = 1 << self.al;
        let m1: i16 = -1 << self.al;
        // Adds a correction bit to an already nonzero coefficient.
        let refine = |br: &mut BitReader, coef: &mut i16| {
            if br.read(1) != 0 && *coef & p1 == 0 {
                // Corrupt first scans can leave a coefficient at i16::MIN.
                *coef = coef.saturating_add(if *coef >= 0 { p1 } else { m1 });
            }
        };

        let mut k = self.ss;
        if self.eobrun == 0 {
            while k <= self.se {
                let rs = decode_symbol(br, ac, warnings);
                let mut run = (rs >> 4) as i32;
                let size = rs & 15;
                let mut value = 0;
                if size != 0 {
                    if size != 1 {
                        warnings.emit(Warning::BadHuffmanCode);
                    }
                    value = if br.read(1) != 0 { p1 } else { m1 };
                } else if run != 15 {
                    self.eobrun = (1 << run) + br.read(run as u32);
                    break;
                }
                // Skip `run` zero coefficients, refining the nonzero ones on
                // the way, and stop on the zero that receives `value`.
                while k <= self.se {
                    if block[k] != 0 {
                        refine(br, &mut block[k]);
                    } else {
                        run -= 1;
                        if run < 0 {
                            break;
                        }
                    }
                    k += 1;
                }
                if value != 0 && k <= self.se {
                    block[k] = value;
                }
                k += 1;
            }
        }
        if self.eobrun > 0 {
            // The rest of the band is in an EOB run: only corrections.
            while k <= self.se {
                if block[k] != 0 {
                    refine(br, &mut block[k]);
                }
                k += 1;
            }
            self.eobrun -= 1;
        }
    }
}

/// Follows which bits of which coefficients earlier scans have supplied,
/// to flag scans that do not fit the progression.
#[derive(Debug)]
pub struct ProgressionTracker {
    /// Per component, the Al of the last scan that coded each coefficient,
    /// or -1 if none has.
    coef_bits: Vec<[i8; BLOCK_SIZE]>,
}

impl ProgressionTracker {
    pub fn new(num_components: usize) -> ProgressionTracker {
        ProgressionTracker {
            coef_bits: vec![[-1; BLOCK_SIZE]; num_components],
        }
    }

    /// Records `scan`, reporting every coefficient whose previous state
    /// does not match the scan's Ah.
    pub fn start_scan(&mut self, scan: &ScanHeader, warnings: &mut WarningLog) {
        for sc in &scan.components {
            let bits = &mut self.coef_bits[sc.component];
            if !scan.is_dc_scan() && bits[0] < 0 {
                warnings.emit(Warning::BogusProgression {
                    component: sc.component,
                    coefficient: 0,
                });
            }
            for k in scan.ss as usize..=scan.se as usize {
                let expected = bits[k].max(0) as u8;
                if scan.ah != expected {
                    warnings.emit(Warning::BogusProgression {
                        component: sc.component,
                        coefficient: k,
                    });
                }
                bits[k] = scan.al as i8;
            }
        }
    }

    /// Whether coefficient `k` of `component` has received any data.
    pub fn has_data(&self, component: usize, k: usize) -> bool {
        self.coef_bits[component][k] >= 0
    }

    /// Reports components that never received DC data.
    pub fn finish(&self, warnings: &mut WarningLog) {
        for (c, bits) in self.coef_bits.iter().enumerate() {
            if bits[0] < 0 {
                debug!("component {c} has no coefficients");
                warnings.emit(Warning::MissingComponentData(c));
            }
        }
    }
}
