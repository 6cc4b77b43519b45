// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::Write;

use super::{EncoderOptions, PixelSource};
use crate::{encode::compress, error::Result};

/// A compression session. The same encoder can compress any number of
/// images with its settings.
#[derive(Debug, Clone)]
pub struct JpegEncoder {
    options: EncoderOptions,
}

impl JpegEncoder {
    pub fn new(options: EncoderOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Compresses the image `source` delivers into a complete file written
    /// to `out`.
    pub fn encode<W: Write>(&self, source: &mut impl PixelSource, out: &mut W) -> Result<()> {
        compress(&self.options, source, out)
    }
}
