// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::{ColorSpace, util::tracing_wrappers::*};

#[derive(Error, Debug)]
pub enum Error {
    // Malformed input.
    #[error("Not a JPEG file: starts with {0:02x} {1:02x}")]
    NotAJpeg(u8, u8),
    #[error("File truncated")]
    FileTruncated,
    #[error("Bogus length {length} in marker 0x{marker:02x} at offset {offset}")]
    BadMarkerLength {
        marker: u8,
        length: usize,
        offset: usize,
    },
    #[error("Unexpected marker 0x{found:02x} at offset {offset}, expected {expected}")]
    UnexpectedMarker {
        found: u8,
        offset: usize,
        expected: &'static str,
    },
    #[error("Scan started before any frame header")]
    MissingFrameHeader,
    #[error("Duplicate frame header")]
    DuplicateFrameHeader,
    #[error("No image data: file ended without any scan")]
    NoScans,
    #[error("Huffman table {class} {index} used but not defined")]
    UndefinedHuffmanTable { class: &'static str, index: usize },
    #[error("Quantization table {0} used but not defined")]
    UndefinedQuantTable(usize),
    #[error("Bogus table index {0}")]
    BadTableIndex(usize),
    #[error("Bogus DHT counts: {0} symbols")]
    BadDhtCounts(usize),
    #[error("Huffman table has codes longer than 16 bits or too many codes")]
    BadHuffmanTable,
    #[error("Invalid sampling factors {0}x{1}")]
    InvalidSamplingFactor(u8, u8),
    #[error("Fractional sampling ratio {0}x{1} relative to {2}x{3}")]
    FractionalSampling(u8, u8, u8, u8),
    #[error("Sampling factors too large for interleaved scan: {0} blocks in MCU")]
    TooManyBlocksInMcu(usize),
    #[error("Invalid component count {0}")]
    InvalidComponentCount(usize),
    #[error("Component id {0} in scan is not part of the frame")]
    UnknownScanComponent(u8),
    #[error("Component id {0} appears twice")]
    DuplicateComponent(u8),
    #[error("Bogus scan parameters: Ss={ss} Se={se} Ah={ah} Al={al}")]
    BadScanParameters { ss: u8, se: u8, ah: u8, al: u8 },
    #[error("Empty image: {0}x{1}")]
    EmptyImage(usize, usize),
    #[error("Image size {0}x{1} exceeds the JPEG limit")]
    ImageTooLarge(usize, usize),
    #[error("Image has {0} pixels, more than the configured limit of {1}")]
    PixelLimitExceeded(usize, usize),
    #[error("Unsupported JFIF revision {0}.{1:02}")]
    UnsupportedJfifVersion(u8, u8),

    // Unsupported features.
    #[error("Unsupported: {0}")]
    Unsupported(&'static str),
    #[error("Unsupported SOF marker type 0x{0:02x}")]
    UnsupportedFrameType(u8),
    #[error("Unsupported sample precision {0}")]
    UnsupportedPrecision(u8),
    #[error("Unsupported color conversion from {from:?} to {to:?}")]
    UnsupportedColorConversion { from: ColorSpace, to: ColorSpace },

    // Caller configuration.
    #[error("Quality {0} out of range 1..=100")]
    InvalidQuality(u32),
    #[error("Invalid option: {0}")]
    InvalidOption(&'static str),
    #[error("Source delivered {found} samples per row, expected {expected}")]
    BadSourceRow { expected: usize, found: usize },
    #[error("Missing Huffman code table entry")]
    MissingHuffmanCode,
    #[error("Cannot quantize to {0} colors")]
    InvalidColorCount(usize),
    #[error("Invalid scan script at scan {scan}: {reason}")]
    InvalidScanScript { scan: usize, reason: &'static str },

    // Resources and I/O.
    #[error("Out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    // Generic arithmetic overflow. Prefer using other errors if possible.
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Recoverable anomalies found while decoding damaged data. Decoding
/// continues after each of these with a best-effort substitute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Entropy-coded data ended (marker or end of input) before the scan did.
    PrematureEnd,
    /// A Huffman code longer than 16 bits: the symbol was replaced by 0.
    BadHuffmanCode,
    /// Garbage bytes were skipped before a marker.
    ExtraneousBytes { count: usize, marker: u8 },
    /// The marker found where RSTn was expected.
    UnexpectedRestart { found: u8, expected: u8 },
    /// A progressive scan refines or repeats coefficients inconsistently.
    BogusProgression {
        component: usize,
        coefficient: usize,
    },
    /// A sequential scan carried progressive parameters; they were ignored.
    NotSequential { ss: u8, se: u8, ah: u8, al: u8 },
    /// Input data ended without EOI.
    MissingEoi,
    UnknownJfifRevision(u8, u8),
    JfifThumbnailMismatch { expected: usize, found: usize },
    UnrecognizedComponentIds(u8, u8, u8),
    UnknownAdobeTransform(u8),
    /// Scan data for a component that never received any coefficients.
    MissingComponentData(usize),
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::PrematureEnd => write!(f, "Corrupt JPEG data: premature end of data segment"),
            Warning::BadHuffmanCode => write!(f, "Corrupt JPEG data: bad Huffman code"),
            Warning::ExtraneousBytes { count, marker } => write!(
                f,
                "Corrupt JPEG data: {count} extraneous bytes before marker 0x{marker:02x}"
            ),
            Warning::UnexpectedRestart { found, expected } => write!(
                f,
                "Corrupt JPEG data: found marker 0x{found:02x} instead of RST{expected}"
            ),
            Warning::BogusProgression {
                component,
                coefficient,
            } => write!(
                f,
                "Inconsistent progression sequence for component {component} coefficient {coefficient}"
            ),
            Warning::NotSequential { ss, se, ah, al } => write!(
                f,
                "Invalid SOS parameters for sequential JPEG: Ss={ss} Se={se} Ah={ah} Al={al}"
            ),
            Warning::MissingEoi => write!(f, "Premature end of JPEG file"),
            Warning::UnknownJfifRevision(major, minor) => {
                write!(f, "Unknown JFIF revision number {major}.{minor:02}")
            }
            Warning::JfifThumbnailMismatch { expected, found } => write!(
                f,
                "JFIF thumbnail should have {expected} bytes, marker has {found}"
            ),
            Warning::UnrecognizedComponentIds(a, b, c) => {
                write!(f, "Unrecognized component IDs {a} {b} {c}, assuming YCbCr")
            }
            Warning::UnknownAdobeTransform(t) => {
                write!(f, "Unknown Adobe color transform code {t}")
            }
            Warning::MissingComponentData(c) => {
                write!(f, "Component {c} received no coefficient data")
            }
        }
    }
}

/// Collects the warnings of one decode session.
#[derive(Debug, Default)]
pub struct WarningLog {
    warnings: Vec<Warning>,
}

impl WarningLog {
    pub fn emit(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
