// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

mod decoder;
mod encoder;
mod options;

pub use decoder::*;
pub use encoder::*;
pub use options::*;

pub use crate::{
    color_quant::{ColorQuantOptions, Colormap},
    encode::ScanInfo,
    error::{Error, Result, Warning},
    headers::{AdobeHeader, DensityUnit, FrameKind, JfifHeader},
};

use crate::ColorSpace;

/// What a [`PixelSource`] delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub width: usize,
    pub height: usize,
    pub color_space: ColorSpace,
    /// Samples per pixel. Must match `color_space` unless it is
    /// [`ColorSpace::Unknown`].
    pub channels: usize,
}

/// Supplies the rows of an image to the encoder, top to bottom.
pub trait PixelSource {
    /// Called once before any rows are requested.
    fn start(&mut self) -> Result<SourceInfo>;

    /// Fills each of `rows` with the next row of interleaved samples, each
    /// `width * channels` long.
    fn get_rows(&mut self, rows: &mut [&mut [u8]]) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shape of the pixels a [`PixelSink`] receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub width: usize,
    pub height: usize,
    pub color_space: ColorSpace,
    /// Samples per pixel, or 1 for colormapped output.
    pub channels: usize,
}

/// Receives decoded rows, top to bottom.
pub trait PixelSink {
    /// Called once before the first row. `colormap` is set when the rows
    /// hold colormap indexes.
    fn start(&mut self, format: &OutputFormat, colormap: Option<&Colormap>) -> Result<()>;

    fn put_rows(&mut self, rows: &[&[u8]]) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An image held in memory, rows of interleaved 8-bit samples without
/// padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    width: usize,
    height: usize,
    color_space: ColorSpace,
    channels: usize,
    data: Vec<u8>,
}

impl RawImage {
    pub fn new(width: usize, height: usize, color_space: ColorSpace, data: Vec<u8>) -> Result<Self> {
        let channels = color_space
            .channels()
            .ok_or(Error::InvalidOption("unknown color space needs a channel count"))?;
        Self::with_channels(width, height, color_space, channels, data)
    }

    /// Like [`RawImage::new`], for [`ColorSpace::Unknown`] data.
    pub fn with_channels(
        width: usize,
        height: usize,
        color_space: ColorSpace,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyImage(width, height));
        }
        if channels == 0 || color_space.channels().is_some_and(|c| c != channels) {
            return Err(Error::InvalidOption("channel count does not match color space"));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|p| p.checked_mul(channels))
            .ok_or(Error::ArithmeticOverflow)?;
        if data.len() != expected {
            return Err(Error::BadSourceRow {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            color_space,
            channels,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.width * self.channels;
        &self.data[y * stride..(y + 1) * stride]
    }

    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        &self.row(y)[x * self.channels..(x + 1) * self.channels]
    }

    /// Reads the image row by row.
    pub fn source(&self) -> RawImageSource<'_> {
        RawImageSource {
            image: self,
            next_row: 0,
        }
    }
}

pub struct RawImageSource<'a> {
    image: &'a RawImage,
    next_row: usize,
}

impl PixelSource for RawImageSource<'_> {
    fn start(&mut self) -> Result<SourceInfo> {
        self.next_row = 0;
        Ok(SourceInfo {
            width: self.image.width,
            height: self.image.height,
            color_space: self.image.color_space,
            channels: self.image.channels,
        })
    }

    fn get_rows(&mut self, rows: &mut [&mut [u8]]) -> Result<()> {
        if self.next_row + rows.len() > self.image.height {
            return Err(Error::InvalidOption("rows requested past the end of the image"));
        }
        for row in rows.iter_mut() {
            let src = self.image.row(self.next_row);
            if row.len() != src.len() {
                return Err(Error::BadSourceRow {
                    expected: row.len(),
                    found: src.len(),
                });
            }
            row.copy_from_slice(src);
            self.next_row += 1;
        }
        Ok(())
    }
}

/// Collects decoded rows into memory.
#[derive(Debug, Default)]
pub struct RawImageSink {
    format: Option<OutputFormat>,
    colormap: Option<Colormap>,
    data: Vec<u8>,
}

impl RawImageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self) -> Option<&OutputFormat> {
        self.format.as_ref()
    }

    pub fn colormap(&self) -> Option<&Colormap> {
        self.colormap.as_ref()
    }

    /// The collected pixels. Colormapped output is expanded through the
    /// colormap when `expand_colormap` is set.
    pub fn into_image(self, expand_colormap: bool) -> Result<RawImage> {
        let format = self.format.ok_or(Error::InvalidOption("sink was never started"))?;
        match self.colormap {
            Some(map) if expand_colormap => RawImage::with_channels(
                format.width,
                format.height,
                format.color_space,
                map.channels(),
                map.expand(&self.data),
            ),
            Some(_) => RawImage::with_channels(
                format.width,
                format.height,
                ColorSpace::Unknown,
                1,
                self.data,
            ),
            None => RawImage::with_channels(
                format.width,
                format.height,
                format.color_space,
                format.channels,
                self.data,
            ),
        }
    }
}

impl PixelSink for RawImageSink {
    fn start(&mut self, format: &OutputFormat, colormap: Option<&Colormap>) -> Result<()> {
        let total = format.width * format.height * format.channels;
        self.data.clear();
        self.data.try_reserve_exact(total)?;
        self.format = Some(*format);
        self.colormap = colormap.cloned();
        Ok(())
    }

    fn put_rows(&mut self, rows: &[&[u8]]) -> Result<()> {
        let format = self.format.ok_or(Error::InvalidOption("sink was never started"))?;
        let stride = format.width * format.channels;
        for row in rows {
            if row.len() != stride {
                return Err(Error::BadSourceRow {
                    expected: stride,
                    found: row.len(),
                });
            }
            self.data.extend_from_slice(row);
        }
        Ok(())
    }
}

/// Facts about a file known once its frame header has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: usize,
    pub height: usize,
    pub num_components: usize,
    /// Color space of the components, after inference from the markers.
    pub jpeg_color_space: ColorSpace,
    pub frame_kind: FrameKind,
    pub jfif: Option<JfifHeader>,
    pub adobe: Option<AdobeHeader>,
    /// Payloads of the COM markers seen so far.
    pub comments: Vec<Vec<u8>>,
}

/// Recoverable problems met while decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub warnings: Vec<Warning>,
    pub scans: usize,
}

impl DecodeReport {
    /// Whether the data decoded without any damage being detected.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Result of [`decode`].
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: RawImage,
    /// Set for colormapped output; `image` then holds one index per pixel.
    pub colormap: Option<Colormap>,
    pub info: ImageInfo,
    pub report: DecodeReport,
}

/// Compresses `image` into a complete JPEG file.
pub fn encode(image: &RawImage, options: &EncoderOptions) -> Result<Vec<u8>> {
    let encoder = JpegEncoder::new(options.clone())?;
    let mut out = Vec::new();
    encoder.encode(&mut image.source(), &mut out)?;
    Ok(out)
}

/// Decompresses a complete JPEG file held in memory.
pub fn decode(data: &[u8], options: DecoderOptions) -> Result<DecodedImage> {
    JpegDecoder::new(data, options).read_header()?.decode()
}
