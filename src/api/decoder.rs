// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use super::{
    DecodeReport, DecodedImage, DecoderOptions, ImageInfo, OutputFormat, PixelSink, RawImageSink,
};
use crate::{
    color::default_output_space,
    decode::decompress,
    error::{Error, Result, Warning, WarningLog},
    headers::marker_reader::MarkerReader,
    util::tracing_wrappers::*,
};
use states::*;

pub mod states {
    use crate::api::ImageInfo;

    pub trait DecoderState {}
    pub struct Initialized;
    /// The frame header has been read.
    pub struct WithHeader {
        pub(super) info: ImageInfo,
    }
    impl DecoderState for Initialized {}
    impl DecoderState for WithHeader {}
}

struct DecoderInner<'a> {
    reader: MarkerReader<'a>,
    warnings: WarningLog,
    options: DecoderOptions,
}

/// High level API using the typestate pattern to forbid invalid usage:
/// image data can only be requested once the header has been read.
pub struct JpegDecoder<'a, State: DecoderState> {
    inner: DecoderInner<'a>,
    state: State,
}

impl<'a, S: DecoderState> JpegDecoder<'a, S> {
    /// Warnings emitted so far.
    pub fn warnings(&self) -> &[Warning] {
        self.inner.warnings.warnings()
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.inner.options
    }
}

impl<'a> JpegDecoder<'a, Initialized> {
    pub fn new(data: &'a [u8], options: DecoderOptions) -> Self {
        Self {
            inner: DecoderInner {
                reader: MarkerReader::new(data),
                warnings: WarningLog::default(),
                options,
            },
            state: Initialized,
        }
    }

    /// Reads the markers up to and including the frame header.
    pub fn read_header(mut self) -> Result<JpegDecoder<'a, WithHeader>> {
        let inner = &mut self.inner;
        let frame = inner.reader.read_header(&mut inner.warnings)?.clone();
        let pixels = frame.width * frame.height;
        if let Some(limit) = inner.options.pixel_limit.filter(|&limit| pixels > limit) {
            return Err(Error::PixelLimitExceeded(pixels, limit));
        }
        let jpeg_color_space = match inner.options.jpeg_color_space {
            Some(color_space) => color_space,
            None => inner.reader.infer_color_space(&mut inner.warnings),
        };
        let info = ImageInfo {
            width: frame.width,
            height: frame.height,
            num_components: frame.components.len(),
            jpeg_color_space,
            frame_kind: frame.kind,
            jfif: inner.reader.info.jfif,
            adobe: inner.reader.info.adobe,
            comments: inner.reader.info.comments.clone(),
        };
        debug!(?info, "read header");
        Ok(JpegDecoder {
            inner: self.inner,
            state: WithHeader { info },
        })
    }
}

impl<'a> JpegDecoder<'a, WithHeader> {
    pub fn info(&self) -> &ImageInfo {
        &self.state.info
    }

    /// The shape of the rows [`JpegDecoder::decode_into`] will deliver.
    pub fn output_format(&self) -> OutputFormat {
        let info = &self.state.info;
        let options = &self.inner.options;
        let color_space = options
            .output_color_space
            .unwrap_or_else(|| default_output_space(info.jpeg_color_space));
        let channels = match options.color_quantization {
            Some(_) => 1,
            None => color_space.channels().unwrap_or(info.num_components),
        };
        OutputFormat {
            width: info.width,
            height: info.height,
            color_space,
            channels,
        }
    }

    fn run(&mut self, sink: &mut impl PixelSink) -> Result<usize> {
        let inner = &mut self.inner;
        decompress(
            &mut inner.reader,
            self.state.info.jpeg_color_space,
            &inner.options,
            sink,
            &mut inner.warnings,
        )
    }

    /// Decodes the image, delivering its rows to `sink`.
    pub fn decode_into(mut self, sink: &mut impl PixelSink) -> Result<DecodeReport> {
        let scans = self.run(sink)?;
        Ok(DecodeReport {
            warnings: self.inner.warnings.into_warnings(),
            scans,
        })
    }

    /// Decodes the image into memory.
    pub fn decode(mut self) -> Result<DecodedImage> {
        let mut sink = RawImageSink::new();
        let scans = self.run(&mut sink)?;
        let mut info = self.state.info;
        // COM markers may follow the frame header.
        info.comments = self.inner.reader.info.comments;
        let colormap = sink.colormap().cloned();
        Ok(DecodedImage {
            image: sink.into_image(false)?,
            colormap,
            info,
            report: DecodeReport {
                warnings: self.inner.warnings.into_warnings(),
                scans,
            },
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        ColorSpace,
        api::{EncoderOptions, encode},
        util::test::smooth_image,
    };
    use test_log::test;

    #[test]
    fn header_then_image() -> Result<()> {
        let image = smooth_image(19, 7, ColorSpace::Rgb);
        let options = EncoderOptions {
            comment: Some(b"hello".to_vec()),
            ..Default::default()
        };
        let data = encode(&image, &options)?;
        let decoder = JpegDecoder::new(&data, DecoderOptions::default()).read_header()?;
        let info = decoder.info().clone();
        assert_eq!((info.width, info.height, info.num_components), (19, 7, 3));
        assert_eq!(info.jpeg_color_space, ColorSpace::YCbCr);
        assert_eq!(info.comments, vec![b"hello".to_vec()]);
        assert!(info.jfif.is_some());
        let format = decoder.output_format();
        assert_eq!((format.color_space, format.channels), (ColorSpace::Rgb, 3));

        let decoded = decoder.decode()?;
        assert_eq!(decoded.image.color_space(), ColorSpace::Rgb);
        assert_eq!(decoded.report.scans, 1);
        assert!(decoded.report.is_clean());
        assert!(decoded.colormap.is_none());
        Ok(())
    }

    #[test]
    fn pixel_limit() -> Result<()> {
        let data = encode(&smooth_image(30, 30, ColorSpace::Grayscale), &EncoderOptions::default())?;
        let options = DecoderOptions {
            pixel_limit: Some(899),
            ..Default::default()
        };
        assert!(matches!(
            JpegDecoder::new(&data, options).read_header(),
            Err(Error::PixelLimitExceeded(900, 899))
        ));
        Ok(())
    }

    #[test]
    fn color_space_overrides() -> Result<()> {
        let data = encode(&smooth_image(16, 16, ColorSpace::Rgb), &EncoderOptions::default())?;
        let options = DecoderOptions {
            output_color_space: Some(ColorSpace::Grayscale),
            ..Default::default()
        };
        let decoded = JpegDecoder::new(&data, options).read_header()?.decode()?;
        assert_eq!(decoded.image.channels(), 1);

        // Reading YCbCr samples as RGB is legal, just wrong-looking.
        let options = DecoderOptions {
            jpeg_color_space: Some(ColorSpace::Rgb),
            ..Default::default()
        };
        let decoder = JpegDecoder::new(&data, options).read_header()?;
        assert_eq!(decoder.info().jpeg_color_space, ColorSpace::Rgb);
        decoder.decode()?;
        Ok(())
    }
}
