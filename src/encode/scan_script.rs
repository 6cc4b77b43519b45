// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    BLOCK_SIZE, ColorSpace, MAX_COMPS_IN_SCAN,
    error::{Error, Result},
};

/// Highest successive approximation bit position for 8-bit samples.
const MAX_AH_AL: u8 = 13;

/// One scan of an encoding script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInfo {
    /// Frame component indices coded by the scan, increasing.
    pub components: Vec<usize>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

impl ScanInfo {
    pub fn new(components: &[usize], ss: u8, se: u8, ah: u8, al: u8) -> ScanInfo {
        ScanInfo {
            components: components.to_vec(),
            ss,
            se,
            ah,
            al,
        }
    }
}

fn per_component(script: &mut Vec<ScanInfo>, n: usize, ss: u8, se: u8, ah: u8, al: u8) {
    script.extend((0..n).map(|c| ScanInfo::new(&[c], ss, se, ah, al)));
}

/// One interleaved DC scan when possible, else one per component.
fn dc_scans(script: &mut Vec<ScanInfo>, n: usize, ah: u8, al: u8) {
    if n <= MAX_COMPS_IN_SCAN {
        let all: Vec<usize> = (0..n).collect();
        script.push(ScanInfo::new(&all, 0, 0, ah, al));
    } else {
        per_component(script, n, 0, 0, ah, al);
    }
}

/// All components in one interleaved scan, or one scan each when there are
/// too many to interleave.
pub fn sequential_script(num_components: usize) -> Vec<ScanInfo> {
    let mut script = vec![];
    if num_components <= MAX_COMPS_IN_SCAN {
        let all: Vec<usize> = (0..num_components).collect();
        script.push(ScanInfo::new(&all, 0, 63, 0, 0));
    } else {
        per_component(&mut script, num_components, 0, 63, 0, 0);
    }
    script
}

/// Default progressive script: a quick low-precision pass over everything,
/// then refinement.
pub fn simple_progression(color_space: ColorSpace, num_components: usize) -> Vec<ScanInfo> {
    let n = num_components;
    let mut script = vec![];
    if n == 3 && color_space == ColorSpace::YCbCr {
        dc_scans(&mut script, n, 0, 1);
        // Some luma detail early; chroma is too small to deserve many scans.
        script.push(ScanInfo::new(&[0], 1, 5, 0, 2));
        script.push(ScanInfo::new(&[2], 1, 63, 0, 1));
        script.push(ScanInfo::new(&[1], 1, 63, 0, 1));
        script.push(ScanInfo::new(&[0], 6, 63, 0, 2));
        script.push(ScanInfo::new(&[0], 1, 63, 2, 1));
        dc_scans(&mut script, n, 1, 0);
        script.push(ScanInfo::new(&[2], 1, 63, 1, 0));
        script.push(ScanInfo::new(&[1], 1, 63, 1, 0));
        // The last luma bit is usually the largest scan.
        script.push(ScanInfo::new(&[0], 1, 63, 1, 0));
    } else {
        dc_scans(&mut script, n, 0, 1);
        per_component(&mut script, n, 1, 5, 0, 2);
        per_component(&mut script, n, 6, 63, 0, 2);
        per_component(&mut script, n, 1, 63, 2, 1);
        dc_scans(&mut script, n, 1, 0);
        per_component(&mut script, n, 1, 63, 1, 0);
    }
    script
}

/// Checks that `script` codes every coefficient the decoder needs in a
/// legal order.
///
/// Progressive scripts must send each coefficient's bits from the top
/// down, one bit per refinement, and DC before any AC of a component.
/// Sequential scripts must send each component exactly once.
pub fn validate_script(script: &[ScanInfo], num_components: usize, progressive: bool) -> Result<()> {
    let fail = |scan: usize, reason: &'static str| Err(Error::InvalidScanScript { scan, reason });
    if script.is_empty() {
        return fail(0, "no scans");
    }
    // Lowest bit position sent so far per coefficient, None before the
    // first scan that touches it.
    let mut last_bit: Vec<[Option<u8>; BLOCK_SIZE]> = vec![[None; BLOCK_SIZE]; num_components];
    let mut sent = vec![false; num_components];

    for (i, scan) in script.iter().enumerate() {
        if scan.components.is_empty() || scan.components.len() > MAX_COMPS_IN_SCAN {
            return fail(i, "a scan codes 1 to 4 components");
        }
        for (k, &c) in scan.components.iter().enumerate() {
            if c >= num_components {
                return fail(i, "component index out of range");
            }
            if k > 0 && c <= scan.components[k - 1] {
                return fail(i, "component indices must increase");
            }
        }
        if !progressive {
            if scan.ss != 0 || scan.se != 63 || scan.ah != 0 || scan.al != 0 {
                return fail(i, "sequential scans code all coefficients at full precision");
            }
            for &c in &scan.components {
                if std::mem::replace(&mut sent[c], true) {
                    return fail(i, "component coded twice");
                }
            }
            continue;
        }

        if scan.se < scan.ss || scan.se > 63 || scan.ah > MAX_AH_AL || scan.al > MAX_AH_AL {
            return fail(i, "bad spectral selection or bit position");
        }
        if scan.ss == 0 {
            if scan.se != 0 {
                return fail(i, "DC scans cannot include AC coefficients");
            }
        } else if scan.components.len() != 1 {
            return fail(i, "AC scans code a single component");
        }
        for &c in &scan.components {
            let bits = &mut last_bit[c];
            if scan.ss != 0 && bits[0].is_none() {
                return fail(i, "AC scan before the component's DC scan");
            }
            for bit in &mut bits[scan.ss as usize..=scan.se as usize] {
                match *bit {
                    None if scan.ah != 0 => return fail(i, "refinement of unsent coefficients"),
                    Some(prev) if scan.ah != prev || scan.al + 1 != scan.ah => {
                        return fail(i, "successive approximation out of sequence");
                    }
                    _ => *bit = Some(scan.al),
                }
            }
        }
    }

    for c in 0..num_components {
        let complete = if progressive {
            last_bit[c][0].is_some()
        } else {
            sent[c]
        };
        if !complete {
            return fail(script.len(), "a component never receives data");
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn default_scripts_are_valid() -> Result<()> {
        for (cs, n) in [
            (ColorSpace::YCbCr, 3),
            (ColorSpace::Grayscale, 1),
            (ColorSpace::Cmyk, 4),
            (ColorSpace::Unknown, 6),
        ] {
            let script = simple_progression(cs, n);
            validate_script(&script, n, true)?;
            validate_script(&sequential_script(n), n, false)?;
        }
        assert_eq!(simple_progression(ColorSpace::YCbCr, 3).len(), 10);
        assert_eq!(simple_progression(ColorSpace::Grayscale, 1).len(), 6);
        assert_eq!(sequential_script(6).len(), 6);
        Ok(())
    }

    #[test]
    fn rejects_bad_progressions() {
        let bad = |script: Vec<ScanInfo>| validate_script(&script, 1, true).is_err();
        // AC before DC.
        assert!(bad(vec![ScanInfo::new(&[0], 1, 63, 0, 0)]));
        // DC scan with AC coefficients.
        assert!(bad(vec![ScanInfo::new(&[0], 0, 5, 0, 0)]));
        // Refinement skipping a bit.
        assert!(bad(vec![
            ScanInfo::new(&[0], 0, 0, 0, 2),
            ScanInfo::new(&[0], 0, 0, 2, 0),
        ]));
        // Coefficients sent twice at full precision.
        assert!(bad(vec![
            ScanInfo::new(&[0], 0, 0, 0, 0),
            ScanInfo::new(&[0], 0, 0, 0, 0),
        ]));
        assert!(bad(vec![]));
        // No DC at all for the second component.
        assert!(validate_script(&[ScanInfo::new(&[0], 0, 0, 0, 0)], 2, true).is_err());
        // AC scans cannot interleave.
        assert!(
            validate_script(
                &[ScanInfo::new(&[0, 1], 0, 0, 0, 0), ScanInfo::new(&[0, 1], 1, 63, 0, 0)],
                2,
                true
            )
            .is_err()
        );
    }

    #[test]
    fn rejects_bad_sequential_scripts() {
        assert!(validate_script(&[ScanInfo::new(&[0], 0, 63, 0, 0)], 2, false).is_err());
        assert!(validate_script(&[ScanInfo::new(&[1, 0], 0, 63, 0, 0)], 2, false).is_err());
        assert!(validate_script(&[ScanInfo::new(&[0, 1], 0, 62, 0, 0)], 2, false).is_err());
        assert!(
            validate_script(
                &[ScanInfo::new(&[0], 0, 63, 0, 0), ScanInfo::new(&[1], 0, 63, 0, 0)],
                2,
                false
            )
            .is_ok()
        );
    }
}
