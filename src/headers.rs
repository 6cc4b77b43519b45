// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

pub mod marker_reader;
pub mod marker_writer;

use num_derive::FromPrimitive;

use crate::{
    MAX_BLOCKS_IN_MCU, MAX_COMPONENTS, MAX_COMPS_IN_SCAN, MAX_DIMENSION, MAX_SAMP_FACTOR,
    NUM_HUFF_TBLS, NUM_QUANT_TBLS,
    error::{Error, Result},
};

/// Marker codes (the byte following 0xFF).
pub mod markers {
    pub const SOF0: u8 = 0xC0;
    pub const SOF1: u8 = 0xC1;
    pub const SOF2: u8 = 0xC2;
    pub const SOF3: u8 = 0xC3;
    pub const DHT: u8 = 0xC4;
    pub const SOF5: u8 = 0xC5;
    pub const SOF15: u8 = 0xCF;
    pub const JPG: u8 = 0xC8;
    pub const DAC: u8 = 0xCC;
    pub const RST0: u8 = 0xD0;
    pub const RST7: u8 = 0xD7;
    pub const SOI: u8 = 0xD8;
    pub const EOI: u8 = 0xD9;
    pub const SOS: u8 = 0xDA;
    pub const DQT: u8 = 0xDB;
    pub const DNL: u8 = 0xDC;
    pub const DRI: u8 = 0xDD;
    pub const APP0: u8 = 0xE0;
    pub const APP14: u8 = 0xEE;
    pub const COM: u8 = 0xFE;
    pub const TEM: u8 = 0x01;

    pub fn is_sof(code: u8) -> bool {
        (SOF0..=SOF15).contains(&code) && code != DHT && code != JPG && code != DAC
    }

    pub fn is_rst(code: u8) -> bool {
        (RST0..=RST7).contains(&code)
    }
}

/// Color space of either the caller's pixels or the components stored in
/// the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    #[default]
    Unknown,
    Grayscale,
    Rgb,
    YCbCr,
    Cmyk,
    Ycck,
}

impl ColorSpace {
    /// Number of channels a pixel has in this space, or `None` for
    /// [`ColorSpace::Unknown`], whose channel count is given separately.
    pub fn channels(self) -> Option<usize> {
        match self {
            ColorSpace::Unknown => None,
            ColorSpace::Grayscale => Some(1),
            ColorSpace::Rgb | ColorSpace::YCbCr => Some(3),
            ColorSpace::Cmyk | ColorSpace::Ycck => Some(4),
        }
    }

    /// Like [`ColorSpace::channels`] but treats unknown as 0.
    pub fn num_components(self) -> usize {
        self.channels().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum DensityUnit {
    /// Only the aspect ratio is known.
    #[default]
    Unknown = 0,
    DotsPerInch = 1,
    DotsPerCm = 2,
}

/// Contents of a JFIF APP0 marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JfifHeader {
    pub major_version: u8,
    pub minor_version: u8,
    pub density_unit: DensityUnit,
    pub x_density: u16,
    pub y_density: u16,
    pub thumbnail_width: u8,
    pub thumbnail_height: u8,
}

impl Default for JfifHeader {
    fn default() -> Self {
        Self {
            major_version: 1,
            minor_version: 1,
            density_unit: DensityUnit::Unknown,
            x_density: 1,
            y_density: 1,
            thumbnail_width: 0,
            thumbnail_height: 0,
        }
    }
}

/// Contents of an Adobe APP14 marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdobeHeader {
    pub version: u16,
    pub flags0: u16,
    pub flags1: u16,
    /// 0 = no transform (RGB or CMYK), 1 = YCbCr, 2 = YCCK.
    pub transform: u8,
}

impl AdobeHeader {
    pub fn for_color_space(color_space: ColorSpace) -> AdobeHeader {
        let transform = match color_space {
            ColorSpace::YCbCr => 1,
            ColorSpace::Ycck => 2,
            _ => 0,
        };
        AdobeHeader {
            version: 100,
            flags0: 0,
            flags1: 0,
            transform,
        }
    }
}

/// One component entry of a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentInfo {
    pub id: u8,
    pub h_samp_factor: u8,
    pub v_samp_factor: u8,
    pub quant_table: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// SOF0.
    Baseline,
    /// SOF1: sequential, 16-bit quantization tables or more than two table
    /// slots of each kind.
    ExtendedSequential,
    /// SOF2.
    Progressive,
}

impl FrameKind {
    pub fn from_marker(code: u8) -> Result<FrameKind> {
        match code {
            markers::SOF0 => Ok(FrameKind::Baseline),
            markers::SOF1 => Ok(FrameKind::ExtendedSequential),
            markers::SOF2 => Ok(FrameKind::Progressive),
            0xC9..=0xCB => Err(Error::Unsupported("arithmetic coding")),
            _ => Err(Error::UnsupportedFrameType(code)),
        }
    }

    pub fn marker(self) -> u8 {
        match self {
            FrameKind::Baseline => markers::SOF0,
            FrameKind::ExtendedSequential => markers::SOF1,
            FrameKind::Progressive => markers::SOF2,
        }
    }

    pub fn is_progressive(self) -> bool {
        self == FrameKind::Progressive
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: FrameKind,
    pub precision: u8,
    pub width: usize,
    pub height: usize,
    pub components: Vec<ComponentInfo>,
}

impl FrameHeader {
    /// Checks the constraints every frame must satisfy regardless of how the
    /// scans are laid out.
    pub fn validate(&self) -> Result<()> {
        if self.precision != 8 {
            return Err(Error::UnsupportedPrecision(self.precision));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::EmptyImage(self.width, self.height));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(Error::ImageTooLarge(self.width, self.height));
        }
        if self.components.is_empty() || self.components.len() > MAX_COMPONENTS {
            return Err(Error::InvalidComponentCount(self.components.len()));
        }
        for (i, c) in self.components.iter().enumerate() {
            if !(1..=MAX_SAMP_FACTOR).contains(&c.h_samp_factor)
                || !(1..=MAX_SAMP_FACTOR).contains(&c.v_samp_factor)
            {
                return Err(Error::InvalidSamplingFactor(
                    c.h_samp_factor,
                    c.v_samp_factor,
                ));
            }
            if c.quant_table as usize >= NUM_QUANT_TBLS {
                return Err(Error::BadTableIndex(c.quant_table as usize));
            }
            if self.components[..i].iter().any(|o| o.id == c.id) {
                return Err(Error::DuplicateComponent(c.id));
            }
        }
        Ok(())
    }

    pub fn max_h_samp_factor(&self) -> u8 {
        self.components
            .iter()
            .map(|c| c.h_samp_factor)
            .max()
            .unwrap_or(1)
    }

    pub fn max_v_samp_factor(&self) -> u8 {
        self.components
            .iter()
            .map(|c| c.v_samp_factor)
            .max()
            .unwrap_or(1)
    }

    pub fn component_index(&self, id: u8) -> Option<usize> {
        self.components.iter().position(|c| c.id == id)
    }
}

/// One component entry of a scan header, referring to the frame's
/// component list by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    pub component: usize,
    pub dc_table: u8,
    pub ac_table: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    pub components: Vec<ScanComponent>,
    /// Spectral selection start.
    pub ss: u8,
    /// Spectral selection end.
    pub se: u8,
    /// Successive approximation high bit.
    pub ah: u8,
    /// Successive approximation low bit.
    pub al: u8,
}

impl ScanHeader {
    pub fn is_dc_scan(&self) -> bool {
        self.ss == 0
    }

    pub fn is_refinement(&self) -> bool {
        self.ah != 0
    }

    /// Whether the parameters are the ones a sequential scan must carry.
    pub fn is_full_sequential(&self) -> bool {
        self.ss == 0 && self.se == 63 && self.ah == 0 && self.al == 0
    }

    /// Checks scan parameters against the frame they belong to.
    pub fn validate(&self, frame: &FrameHeader) -> Result<()> {
        let n = self.components.len();
        if n == 0 || n > MAX_COMPS_IN_SCAN {
            return Err(Error::InvalidComponentCount(n));
        }
        for (i, sc) in self.components.iter().enumerate() {
            if sc.dc_table as usize >= NUM_HUFF_TBLS {
                return Err(Error::BadTableIndex(sc.dc_table as usize));
            }
            if sc.ac_table as usize >= NUM_HUFF_TBLS {
                return Err(Error::BadTableIndex(sc.ac_table as usize));
            }
            if self.components[..i]
                .iter()
                .any(|o| o.component == sc.component)
            {
                return Err(Error::DuplicateComponent(frame.components[sc.component].id));
            }
        }
        let bad = || Error::BadScanParameters {
            ss: self.ss,
            se: self.se,
            ah: self.ah,
            al: self.al,
        };
        if frame.kind.is_progressive() {
            // DC and AC must be in separate scans, AC scans cover a single
            // component, and bit positions are bounded by 13 for 8-bit data.
            if self.ss == 0 {
                if self.se != 0 {
                    return Err(bad());
                }
            } else if self.se < self.ss || self.se > 63 || n != 1 {
                return Err(bad());
            }
            if self.ah > 13 || self.al > 13 {
                return Err(bad());
            }
            if self.ah != 0 && self.al + 1 != self.ah {
                return Err(bad());
            }
        }
        if n > 1 {
            let blocks: usize = self
                .components
                .iter()
                .map(|sc| {
                    let c = &frame.components[sc.component];
                    c.h_samp_factor as usize * c.v_samp_factor as usize
                })
                .sum();
            if blocks > MAX_BLOCKS_IN_MCU {
                return Err(Error::TooManyBlocksInMcu(blocks));
            }
        }
        Ok(())
    }
}
