// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::{
    BLOCK_SIZE, ColorSpace,
    color_quant::ColorQuantOptions,
    encode::ScanInfo,
    error::{Error, Result},
    headers::DensityUnit,
};

/// Default compression quality.
pub const DEFAULT_QUALITY: u32 = 75;

/// Settings of one compression run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct EncoderOptions {
    /// Compression quality, 1..=100. Scales the base quantization tables.
    /// Default: 75
    pub quality: u32,
    /// Limit quantizers to 1..=255 so that the file stays baseline.
    /// Default: true
    pub force_baseline: bool,
    /// Build Huffman tables fitted to the image instead of the standard
    /// ones. Costs a buffering pass over the whole image.
    pub optimize_huffman: bool,
    /// MCUs between restart markers; 0 disables them.
    pub restart_interval: u32,
    /// Restart interval in MCU rows. Takes precedence over
    /// `restart_interval` when nonzero.
    pub restart_in_rows: u32,
    /// Per-component (h, v) sampling factors, each 1..=4. `None` picks 2x2
    /// luma with full chroma for YCbCr and YCCK, 1x1 otherwise.
    pub sampling_factors: Option<Vec<(u8, u8)>>,
    /// Write a progressive file. Implies `optimize_huffman`.
    pub progressive: bool,
    /// Explicit scan sequence. Progressive scripts must follow the
    /// spectral selection and successive approximation rules; sequential
    /// ones must code every component exactly once.
    pub scan_script: Option<Vec<ScanInfo>>,
    /// Input smoothing strength, 0..=100.
    pub smoothing_factor: u8,
    /// Color space stored in the file. `None` picks YCbCr for RGB input,
    /// YCCK for CMYK input and the input space otherwise.
    pub jpeg_color_space: Option<ColorSpace>,
    /// Write a JFIF marker for grayscale and YCbCr files.
    /// Default: true
    pub write_jfif_header: bool,
    pub density_unit: DensityUnit,
    pub x_density: u16,
    pub y_density: u16,
    /// Write an Adobe marker for RGB, CMYK and YCCK files.
    /// Default: true
    pub write_adobe_marker: bool,
    /// Payload of a COM marker.
    pub comment: Option<Vec<u8>>,
    /// Base quantization tables in natural order, scaled by `quality`.
    /// Entry 0 serves luma (and K), entry 1 chroma. `None` uses the
    /// tables of Annex K.
    pub quant_tables: Option<Vec<[u16; BLOCK_SIZE]>>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            force_baseline: true,
            optimize_huffman: false,
            restart_interval: 0,
            restart_in_rows: 0,
            sampling_factors: None,
            progressive: false,
            scan_script: None,
            smoothing_factor: 0,
            jpeg_color_space: None,
            write_jfif_header: true,
            density_unit: DensityUnit::Unknown,
            x_density: 1,
            y_density: 1,
            write_adobe_marker: true,
            comment: None,
            quant_tables: None,
        }
    }
}

impl EncoderOptions {
    pub fn with_quality(quality: u32) -> Self {
        Self {
            quality,
            ..Default::default()
        }
    }

    /// Checks the settings that do not depend on the image.
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.quality) {
            return Err(Error::InvalidQuality(self.quality));
        }
        if self.smoothing_factor > 100 {
            return Err(Error::InvalidOption("smoothing factor must be at most 100"));
        }
        if self.restart_interval > u16::MAX as u32 {
            return Err(Error::InvalidOption("restart interval must be at most 65535"));
        }
        if let Some(tables) = &self.quant_tables {
            if tables.is_empty() || tables.len() > crate::NUM_QUANT_TBLS {
                return Err(Error::InvalidOption("between 1 and 4 quantization tables"));
            }
            if tables.iter().any(|t| t.contains(&0)) {
                return Err(Error::InvalidOption("quantization table entries must be nonzero"));
            }
        }
        if let Some(sampling) = &self.sampling_factors {
            for &(h, v) in sampling {
                if !(1..=crate::MAX_SAMP_FACTOR).contains(&h)
                    || !(1..=crate::MAX_SAMP_FACTOR).contains(&v)
                {
                    return Err(Error::InvalidSamplingFactor(h, v));
                }
            }
        }
        Ok(())
    }
}

/// Settings of one decompression run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct DecoderOptions {
    /// Color space of the delivered pixels. `None` picks RGB for YCbCr
    /// files, CMYK for YCCK files and the file's own space otherwise.
    pub output_color_space: Option<ColorSpace>,
    /// Interpolate 2:1 subsampled chroma instead of replicating it.
    /// Default: true
    pub fancy_upsampling: bool,
    /// Smooth block boundaries by predicting the lowest AC coefficients
    /// from neighbouring DC values. Most useful for progressive images
    /// whose high frequencies are coarse. Buffers the whole image.
    /// Default: false
    pub block_smoothing: bool,
    /// Deliver colormapped pixels.
    pub color_quantization: Option<ColorQuantOptions>,
    /// Color space of the file's components, overriding what the markers
    /// and component identifiers suggest.
    pub jpeg_color_space: Option<ColorSpace>,
    /// Refuse images with more pixels than this.
    pub pixel_limit: Option<usize>,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            output_color_space: None,
            fancy_upsampling: true,
            block_smoothing: false,
            color_quantization: None,
            jpeg_color_space: None,
            pixel_limit: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    #[test]
    fn option_checks() {
        assert!(EncoderOptions::default().validate().is_ok());
        assert!(matches!(
            EncoderOptions::with_quality(0).validate(),
            Err(Error::InvalidQuality(0))
        ));
        assert!(EncoderOptions::with_quality(101).validate().is_err());
        let options = EncoderOptions {
            sampling_factors: Some(vec![(5, 1)]),
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(Error::InvalidSamplingFactor(5, 1))));
        let options = EncoderOptions {
            smoothing_factor: 101,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
