// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Decompression controller: entropy decoding of each scan into quantized
//! blocks, then inverse DCT, upsampling, color conversion and optional
//! color quantization into rows for a [`PixelSink`].
//!
//! Single-scan sequential files stream one iMCU row of blocks at a time.
//! Everything else (progressive files, sequential files split into several
//! scans, block smoothing) first collects the coefficients of the whole
//! image.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    BLOCK_DIM, BLOCK_SIZE,
    api::{DecoderOptions, OutputFormat, PixelSink},
    bit_reader::BitReader,
    coefficients::{CoefficientBuffer, ComponentBlocks},
    color::{ColorDecoder, default_output_space},
    color_quant::{OnePassQuantizer, TwoPassQuantizer},
    dct::inverse_dct,
    entropy_coding::{
        DecodeTable, RestartCounter, TableClass,
        decode::decode_sequential_block,
        progressive::{ProgressionTracker, ProgressiveDecoder, ScanKind},
    },
    error::{Error, Result, Warning, WarningLog},
    geometry::{FrameGeometry, ScanLayout},
    headers::{ColorSpace, FrameHeader, ScanHeader, markers, marker_reader::MarkerReader},
    quant::QuantTable,
    sample::Upsampler,
    smoothing::BlockSmoother,
    util::{RowGroupRing, tracing_wrappers::*},
};

/// Row groups each component plane keeps: the one being produced and the
/// context rows the upsampling filters read on either side of it.
const PLANE_GROUPS: usize = 3;

/// Quantization tables bound to each component when its first scan starts.
/// Later DQT markers do not affect coefficients already received.
struct QuantLatch {
    tables: Vec<Option<QuantTable>>,
}

impl QuantLatch {
    fn new(num_components: usize) -> QuantLatch {
        QuantLatch {
            tables: vec![None; num_components],
        }
    }

    fn latch(&mut self, scan: &ScanHeader, frame: &FrameHeader, reader: &MarkerReader) -> Result<()> {
        for sc in &scan.components {
            if self.tables[sc.component].is_none() {
                let slot = frame.components[sc.component].quant_table as usize;
                self.tables[sc.component] = Some(*reader.tables.quant(slot)?);
            }
        }
        Ok(())
    }

    fn is_latched(&self, component: usize) -> bool {
        self.tables[component].is_some()
    }

    /// The latched tables; components that never appeared in a scan hold
    /// only zero coefficients, so any table will do for them.
    fn tables(&self) -> Vec<QuantTable> {
        self.tables
            .iter()
            .map(|t| t.unwrap_or_else(|| QuantTable::from_zigzag(&[1; BLOCK_SIZE])))
            .collect()
    }
}

enum BlockDecoder {
    Sequential { last_dc: [i32; crate::MAX_COMPS_IN_SCAN] },
    Progressive(ProgressiveDecoder),
}

/// Entropy decoding of one scan into a coefficient buffer.
struct ScanDecoder {
    scan: ScanHeader,
    layout: ScanLayout,
    dc_tables: Vec<Option<DecodeTable>>,
    ac_tables: Vec<Option<DecodeTable>>,
    decoder: BlockDecoder,
    restarts: RestartCounter,
}

impl ScanDecoder {
    fn new(
        frame: &FrameHeader,
        geometry: &FrameGeometry,
        scan: ScanHeader,
        reader: &MarkerReader,
    ) -> Result<ScanDecoder> {
        let components: Vec<usize> = scan.components.iter().map(|sc| sc.component).collect();
        let layout = ScanLayout::new(geometry, &components)?;
        let (needs_dc, needs_ac, decoder) = if frame.kind.is_progressive() {
            let kind = ScanKind::of(&scan);
            (
                kind == ScanKind::DcFirst,
                matches!(kind, ScanKind::AcFirst | ScanKind::AcRefine),
                BlockDecoder::Progressive(ProgressiveDecoder::new(&scan)),
            )
        } else {
            (
                true,
                true,
                BlockDecoder::Sequential {
                    last_dc: [0; crate::MAX_COMPS_IN_SCAN],
                },
            )
        };
        let table = |needed: bool, class: TableClass, index: u8| -> Result<Option<DecodeTable>> {
            if !needed {
                return Ok(None);
            }
            let table = reader.tables.huffman(class, index as usize)?;
            DecodeTable::new(table, class).map(Some)
        };
        let dc_tables = scan
            .components
            .iter()
            .map(|sc| table(needs_dc, TableClass::Dc, sc.dc_table))
            .collect::<Result<_>>()?;
        let ac_tables = scan
            .components
            .iter()
            .map(|sc| table(needs_ac, TableClass::Ac, sc.ac_table))
            .collect::<Result<_>>()?;
        trace!(
            ss = scan.ss,
            se = scan.se,
            ah = scan.ah,
            al = scan.al,
            components = scan.components.len(),
            "decoding scan"
        );
        Ok(ScanDecoder {
            scan,
            layout,
            dc_tables,
            ac_tables,
            decoder,
            restarts: RestartCounter::new(reader.tables.restart_interval as usize),
        })
    }

    fn decode_mcu_row(
        &mut self,
        br: &mut BitReader,
        coefs: &mut CoefficientBuffer,
        mcu_y: usize,
        warnings: &mut WarningLog,
    ) {
        for mcu_x in 0..self.layout.mcus_per_row {
            if let Some(n) = self.restarts.before_mcu() {
                br.process_restart(n, warnings);
                match &mut self.decoder {
                    BlockDecoder::Sequential { last_dc } => *last_dc = [0; crate::MAX_COMPS_IN_SCAN],
                    BlockDecoder::Progressive(d) => d.restart(),
                }
            }
            // Once the data has run out the remaining blocks keep what
            // earlier scans gave them.
            if br.is_out_of_data() {
                continue;
            }
            for b in &self.layout.mcu_blocks {
                let component = self.scan.components[b.scan_component].component;
                let (bx, by) = self.layout.block_position(b, mcu_x, mcu_y);
                let block = coefs.components[component].block_mut(bx, by);
                let dc = self.dc_tables[b.scan_component].as_ref();
                let ac = self.ac_tables[b.scan_component].as_ref();
                match (&mut self.decoder, dc, ac) {
                    (BlockDecoder::Sequential { last_dc }, Some(dc), Some(ac)) => {
                        *block = [0; BLOCK_SIZE];
                        let pred = &mut last_dc[b.scan_component];
                        decode_sequential_block(br, dc, ac, pred, block, warnings);
                    }
                    (BlockDecoder::Progressive(d), dc, ac) => {
                        d.decode_block(br, block, b.scan_component, dc, ac, warnings)
                    }
                    (BlockDecoder::Sequential { .. }, ..) => {}
                }
            }
            if let Some(warning) = br.take_warning() {
                warnings.emit(warning);
            }
        }
    }

    fn decode_all(&mut self, br: &mut BitReader, coefs: &mut CoefficientBuffer, warnings: &mut WarningLog) {
        for mcu_y in 0..self.layout.mcu_rows {
            self.decode_mcu_row(br, coefs, mcu_y, warnings);
        }
    }
}

/// Hands the marker that ended a scan's entropy-coded data back to the
/// marker reader.
fn end_scan(reader: &mut MarkerReader, br: &mut BitReader, warnings: &mut WarningLog) {
    let marker = br.next_marker(warnings);
    reader.resume(br.position(), marker);
}

/// Dequantizes and inverse transforms one row of blocks.
fn inverse_transform_row(
    blocks: &ComponentBlocks,
    by: usize,
    quant: &QuantTable,
    smoother: Option<&BlockSmoother>,
) -> Vec<[u8; BLOCK_SIZE]> {
    let transform = |bx: usize| {
        let mut coefs = quant.dequantize(blocks.block(bx, by));
        if let Some(smoother) = smoother {
            smoother.smooth(blocks, bx, by, &mut coefs);
        }
        inverse_dct(&coefs)
    };
    #[cfg(feature = "parallel")]
    return (0..blocks.blocks_wide()).into_par_iter().map(transform).collect();
    #[cfg(not(feature = "parallel"))]
    (0..blocks.blocks_wide()).map(transform).collect()
}

enum Quantizer {
    OnePass(OnePassQuantizer),
    /// The whole image in component space, kept until the colormap is
    /// known.
    TwoPass {
        quantizer: TwoPassQuantizer,
        rows: Vec<u8>,
    },
}

/// Post-processing: from quantized blocks to output rows.
struct OutputStage {
    geometry: FrameGeometry,
    color: ColorDecoder,
    format: OutputFormat,
    /// Decoded samples of each component at its own resolution.
    planes: Vec<RowGroupRing>,
    upsamplers: Vec<Upsampler>,
    /// Full-resolution samples of the row being emitted.
    component_rows: Vec<Vec<u8>>,
    pixel_row: Vec<u8>,
    index_row: Vec<u8>,
    quantizer: Option<Quantizer>,
    next_row: usize,
    started: bool,
}

impl OutputStage {
    fn new(
        geometry: FrameGeometry,
        jpeg_color_space: ColorSpace,
        options: &DecoderOptions,
    ) -> Result<OutputStage> {
        let output_space = options
            .output_color_space
            .unwrap_or_else(|| default_output_space(jpeg_color_space));
        let num_components = geometry.components.len();
        let color = ColorDecoder::new(jpeg_color_space, num_components, output_space)?;
        let channels = color.out_channels();
        let width = geometry.width;

        let planes = geometry
            .components
            .iter()
            .map(|c| RowGroupRing::new(c.padded_blocks_wide * BLOCK_DIM, c.v_samp_factor * BLOCK_DIM, PLANE_GROUPS))
            .collect::<Result<_>>()?;
        let upsamplers = geometry
            .components
            .iter()
            .map(|c| {
                Upsampler::new(
                    c.h_samp_factor,
                    c.v_samp_factor,
                    geometry.max_h_samp_factor,
                    geometry.max_v_samp_factor,
                    options.fancy_upsampling,
                )
            })
            .collect::<Result<_>>()?;

        let quantizer = match &options.color_quantization {
            None => None,
            Some(q) if q.two_pass && num_components == 3 && channels == 3 => {
                let mut rows = Vec::new();
                let total = width
                    .checked_mul(geometry.height)
                    .and_then(|p| p.checked_mul(3))
                    .ok_or(Error::ArithmeticOverflow)?;
                rows.try_reserve_exact(total)?;
                rows.resize(total, 0);
                Some(Quantizer::TwoPass {
                    quantizer: TwoPassQuantizer::new(q.desired_colors, q.dither, width)?,
                    rows,
                })
            }
            Some(q) => {
                if q.two_pass {
                    debug!(channels, "two-pass quantization needs three channels, using one pass");
                }
                Some(Quantizer::OnePass(OnePassQuantizer::new(
                    output_space,
                    channels,
                    q.desired_colors,
                    q.dither,
                    width,
                )?))
            }
        };

        let format = OutputFormat {
            width,
            height: geometry.height,
            color_space: output_space,
            channels: if quantizer.is_some() { 1 } else { channels },
        };
        Ok(OutputStage {
            component_rows: vec![vec![0; width]; num_components],
            pixel_row: vec![0; width * channels],
            index_row: vec![0; width],
            geometry,
            color,
            format,
            planes,
            upsamplers,
            quantizer,
            next_row: 0,
            started: false,
        })
    }

    /// Reconstructs the samples of iMCU row `imcu_row` from `coefs` and
    /// emits every output row that no longer waits for later rows.
    fn process_imcu_row(
        &mut self,
        coefs: &CoefficientBuffer,
        quant: &[QuantTable],
        imcu_row: usize,
        smoothing: bool,
        sink: &mut impl PixelSink,
    ) -> Result<()> {
        let last = imcu_row + 1 == self.geometry.imcu_rows;
        for (c, plane) in self.planes.iter_mut().enumerate() {
            let cg = &self.geometry.components[c];
            let blocks = &coefs.components[c];
            let smoother = smoothing
                .then(|| BlockSmoother::new(&quant[c], cg.downsampled_width, cg.height_in_blocks));
            let group = plane.push_group();
            for r in 0..cg.v_samp_factor {
                let by = imcu_row * cg.v_samp_factor + r;
                let pixels = inverse_transform_row(blocks, by, &quant[c], smoother.as_ref());
                for y in 0..BLOCK_DIM {
                    let row = plane.row_mut(group, r * BLOCK_DIM + y);
                    for (dst, block) in row.chunks_exact_mut(BLOCK_DIM).zip(pixels.iter()) {
                        dst.copy_from_slice(&block[y * BLOCK_DIM..(y + 1) * BLOCK_DIM]);
                    }
                }
            }
            if last {
                plane.finish();
            }
        }
        while self.next_row < self.geometry.height && self.row_ready(self.next_row) {
            self.emit_row(self.next_row, sink)?;
            self.next_row += 1;
        }
        Ok(())
    }

    /// Whether every plane holds the source rows output row `y` reads.
    fn row_ready(&self, y: usize) -> bool {
        self.planes
            .iter()
            .zip(&self.upsamplers)
            .zip(&self.geometry.components)
            .all(|((plane, up), cg)| {
                let needed = up.last_source_row(y).min(cg.downsampled_height - 1);
                plane.is_finished() || needed < plane.groups_pushed() * plane.group_height()
            })
    }

    fn emit_row(&mut self, y: usize, sink: &mut impl PixelSink) -> Result<()> {
        if !self.started && !matches!(self.quantizer, Some(Quantizer::TwoPass { .. })) {
            let colormap = match &self.quantizer {
                Some(Quantizer::OnePass(q)) => Some(q.colormap()),
                _ => None,
            };
            sink.start(&self.format, colormap)?;
            self.started = true;
        }

        let width = self.format.width;
        for (c, row) in self.component_rows.iter_mut().enumerate() {
            let cg = &self.geometry.components[c];
            self.upsamplers[c].upsample_row(&self.planes[c], cg.downsampled_height, cg.downsampled_width, y, row);
        }
        let inputs: Vec<&[u8]> = self.component_rows.iter().map(Vec::as_slice).collect();
        match &mut self.quantizer {
            None => {
                self.color.convert_row(&inputs, &mut self.pixel_row, width);
                sink.put_rows(&[self.pixel_row.as_slice()])
            }
            Some(Quantizer::OnePass(q)) => {
                self.color.convert_row(&inputs, &mut self.pixel_row, width);
                q.quantize_row(&self.pixel_row, &mut self.index_row);
                sink.put_rows(&[self.index_row.as_slice()])
            }
            Some(Quantizer::TwoPass { quantizer, rows }) => {
                let row = &mut rows[y * width * 3..(y + 1) * width * 3];
                for (x, px) in row.chunks_exact_mut(3).enumerate() {
                    for (c, s) in px.iter_mut().enumerate() {
                        *s = inputs[c][x];
                    }
                }
                quantizer.prescan_row(row);
                Ok(())
            }
        }
    }

    /// Delivers what is still held back and finishes the sink.
    fn finish(&mut self, sink: &mut impl PixelSink) -> Result<()> {
        debug_assert_eq!(self.next_row, self.geometry.height);
        if let Some(Quantizer::TwoPass { quantizer, rows }) = &mut self.quantizer {
            let colormap = quantizer.select_colors(&self.color)?.clone();
            sink.start(&self.format, Some(&colormap))?;
            for row in rows.chunks_exact(self.format.width * 3) {
                quantizer.map_row(row, &mut self.index_row);
                sink.put_rows(&[self.index_row.as_slice()])?;
            }
        }
        sink.finish()
    }
}

/// Decodes the scans following the frame header `reader` has read and
/// delivers the image to `sink`. Returns the number of scans decoded.
pub fn decompress(
    reader: &mut MarkerReader,
    jpeg_color_space: ColorSpace,
    options: &DecoderOptions,
    sink: &mut impl PixelSink,
    warnings: &mut WarningLog,
) -> Result<usize> {
    let frame = reader.frame.clone().ok_or(Error::MissingFrameHeader)?;
    let geometry = FrameGeometry::from_header(&frame);
    let mut output = OutputStage::new(geometry.clone(), jpeg_color_space, options)?;
    let Some(first) = reader.next_scan(warnings)? else {
        return Err(Error::NoScans);
    };

    let streaming = !frame.kind.is_progressive()
        && first.components.len() == frame.components.len()
        && !options.block_smoothing;
    debug!(
        width = frame.width,
        height = frame.height,
        kind = ?frame.kind,
        color_space = ?jpeg_color_space,
        output = ?output.format.color_space,
        streaming,
        "decompressing"
    );
    let scans = if streaming {
        decompress_streaming(reader, &frame, &geometry, first, &mut output, sink, warnings)?
    } else {
        decompress_buffered(reader, &frame, &geometry, first, options, &mut output, sink, warnings)?
    };
    output.finish(sink)?;
    Ok(scans)
}

/// Decodes and emits one iMCU row at a time. The file must have a single
/// scan.
fn decompress_streaming(
    reader: &mut MarkerReader,
    frame: &FrameHeader,
    geometry: &FrameGeometry,
    scan: ScanHeader,
    output: &mut OutputStage,
    sink: &mut impl PixelSink,
    warnings: &mut WarningLog,
) -> Result<usize> {
    let mut latch = QuantLatch::new(frame.components.len());
    latch.latch(&scan, frame, reader)?;
    let quant = latch.tables();
    let mut decoder = ScanDecoder::new(frame, geometry, scan, reader)?;
    let mut coefs = CoefficientBuffer::for_imcu_row(geometry)?;
    let mut br = reader.bit_reader();
    for imcu_row in 0..geometry.imcu_rows {
        coefs.reset_to_imcu_row(geometry, imcu_row);
        decoder.decode_mcu_row(&mut br, &mut coefs, imcu_row, warnings);
        output.process_imcu_row(&coefs, &quant, imcu_row, false, sink)?;
    }
    end_scan(reader, &mut br, warnings);
    if reader.next_scan(warnings)?.is_some() {
        return Err(Error::UnexpectedMarker {
            found: markers::SOS,
            offset: reader.position(),
            expected: "EOI",
        });
    }
    Ok(1)
}

/// Decodes every scan into a whole-image coefficient buffer, then emits
/// the image.
#[allow(clippy::too_many_arguments)]
fn decompress_buffered(
    reader: &mut MarkerReader,
    frame: &FrameHeader,
    geometry: &FrameGeometry,
    first: ScanHeader,
    options: &DecoderOptions,
    output: &mut OutputStage,
    sink: &mut impl PixelSink,
    warnings: &mut WarningLog,
) -> Result<usize> {
    let num_components = frame.components.len();
    let mut coefs = CoefficientBuffer::for_image(geometry)?;
    let mut latch = QuantLatch::new(num_components);
    let mut tracker = frame
        .kind
        .is_progressive()
        .then(|| ProgressionTracker::new(num_components));
    let mut scans = 0;
    let mut next = Some(first);
    while let Some(scan) = next {
        if let Some(tracker) = &mut tracker {
            tracker.start_scan(&scan, warnings);
        }
        latch.latch(&scan, frame, reader)?;
        let mut decoder = ScanDecoder::new(frame, geometry, scan, reader)?;
        let mut br = reader.bit_reader();
        decoder.decode_all(&mut br, &mut coefs, warnings);
        end_scan(reader, &mut br, warnings);
        scans += 1;
        next = reader.next_scan(warnings)?;
    }
    match &tracker {
        Some(tracker) => tracker.finish(warnings),
        None => {
            for c in (0..num_components).filter(|&c| !latch.is_latched(c)) {
                warnings.emit(Warning::MissingComponentData(c));
            }
        }
    }
    debug!(scans, "all scans read");

    let quant = latch.tables();
    for imcu_row in 0..geometry.imcu_rows {
        output.process_imcu_row(&coefs, &quant, imcu_row, options.block_smoothing, sink)?;
    }
    Ok(scans)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        api::{EncoderOptions, RawImage, RawImageSink},
        color_quant::ColorQuantOptions,
        encode::{ScanInfo, compress},
        util::test::{max_abs_diff, mean_abs_diff, random_image, smooth_image},
    };
    use rand::SeedableRng;
    use test_log::test;

    fn compress_image(image: &RawImage, options: &EncoderOptions) -> Result<Vec<u8>> {
        let mut out = vec![];
        compress(options, &mut image.source(), &mut out)?;
        Ok(out)
    }

    fn decompress_file(data: &[u8], options: &DecoderOptions) -> Result<(RawImage, Vec<Warning>)> {
        let mut warnings = WarningLog::default();
        let mut reader = MarkerReader::new(data);
        reader.read_header(&mut warnings)?;
        let color_space = reader.infer_color_space(&mut warnings);
        let mut sink = RawImageSink::new();
        decompress(&mut reader, color_space, options, &mut sink, &mut warnings)?;
        Ok((sink.into_image(true)?, warnings.into_warnings()))
    }

    /// Offset of the first byte of entropy-coded data.
    fn scan_data_start(data: &[u8]) -> usize {
        let sos = data
            .windows(2)
            .position(|w| w == [0xFF, markers::SOS])
            .expect("no SOS");
        sos + 2 + u16::from_be_bytes([data[sos + 2], data[sos + 3]]) as usize
    }

    #[test]
    fn gray_round_trip() -> Result<()> {
        let image = smooth_image(37, 21, ColorSpace::Grayscale);
        let data = compress_image(&image, &EncoderOptions::with_quality(90))?;
        let (decoded, warnings) = decompress_file(&data, &DecoderOptions::default())?;
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(decoded.color_space(), ColorSpace::Grayscale);
        assert_eq!((decoded.width(), decoded.height()), (37, 21));
        assert!(mean_abs_diff(image.data(), decoded.data()) < 1.0);
        Ok(())
    }

    #[test]
    fn subsampled_rgb_round_trip() -> Result<()> {
        let image = smooth_image(45, 30, ColorSpace::Rgb);
        let data = compress_image(&image, &EncoderOptions::with_quality(95))?;
        for fancy_upsampling in [true, false] {
            let options = DecoderOptions {
                fancy_upsampling,
                ..Default::default()
            };
            let (decoded, warnings) = decompress_file(&data, &options)?;
            assert!(warnings.is_empty());
            assert_eq!(decoded.color_space(), ColorSpace::Rgb);
            assert!(mean_abs_diff(image.data(), decoded.data()) < 2.5);
        }
        Ok(())
    }

    #[test]
    fn progressive_matches_sequential() -> Result<()> {
        let image = smooth_image(50, 34, ColorSpace::Rgb);
        let sequential = compress_image(&image, &EncoderOptions::default())?;
        let options = EncoderOptions {
            progressive: true,
            ..Default::default()
        };
        let progressive = compress_image(&image, &options)?;
        let (a, _) = decompress_file(&sequential, &DecoderOptions::default())?;
        let (b, warnings) = decompress_file(&progressive, &DecoderOptions::default())?;
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn multi_scan_sequential_file() -> Result<()> {
        let image = smooth_image(24, 16, ColorSpace::Rgb);
        let single = compress_image(&image, &EncoderOptions::default())?;
        let options = EncoderOptions {
            scan_script: Some(vec![
                ScanInfo::new(&[0], 0, 63, 0, 0),
                ScanInfo::new(&[1, 2], 0, 63, 0, 0),
            ]),
            ..Default::default()
        };
        let split = compress_image(&image, &options)?;
        let (a, _) = decompress_file(&single, &DecoderOptions::default())?;
        let (b, warnings) = decompress_file(&split, &DecoderOptions::default())?;
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn restart_markers_confine_damage() -> Result<()> {
        let image = smooth_image(64, 64, ColorSpace::Grayscale);
        let options = EncoderOptions {
            restart_interval: 1,
            ..Default::default()
        };
        let data = compress_image(&image, &options)?;
        let (clean, _) = decompress_file(&data, &DecoderOptions::default())?;

        let start = scan_data_start(&data);
        let mut pos = start + (data.len() - start) / 2;
        while data[pos] == 0xFF || data[pos - 1] == 0xFF || data[pos + 1] == 0xFF {
            pos += 1;
        }
        let mut corrupt = data.clone();
        corrupt[pos] ^= 0x5A;
        if corrupt[pos] == 0xFF {
            corrupt[pos] = 0x00;
        }
        let (damaged, _) = decompress_file(&corrupt, &DecoderOptions::default())?;

        let mut bad_blocks = 0;
        for by in 0..8 {
            for bx in 0..8 {
                let differs = (0..8).any(|y| {
                    let row = by * 8 + y;
                    clean.row(row)[bx * 8..bx * 8 + 8] != damaged.row(row)[bx * 8..bx * 8 + 8]
                });
                bad_blocks += differs as usize;
            }
        }
        assert!(bad_blocks <= 1, "{bad_blocks} blocks damaged");
        Ok(())
    }

    #[test]
    fn truncated_file_still_decodes() -> Result<()> {
        let image = smooth_image(32, 32, ColorSpace::Rgb);
        let data = compress_image(&image, &EncoderOptions::default())?;
        let cut = scan_data_start(&data) + 40;
        let (decoded, warnings) = decompress_file(&data[..cut], &DecoderOptions::default())?;
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
        assert!(warnings.contains(&Warning::PrematureEnd));
        assert!(warnings.contains(&Warning::MissingEoi));
        // The top rows came through intact.
        assert!(mean_abs_diff(&image.row(0)[..24], &decoded.row(0)[..24]) < 6.0);
        Ok(())
    }

    #[test]
    fn file_without_scans() -> Result<()> {
        let image = smooth_image(8, 8, ColorSpace::Grayscale);
        let data = compress_image(&image, &EncoderOptions::default())?;
        let sos = data.windows(2).position(|w| w == [0xFF, markers::SOS]).unwrap();
        let mut truncated = data[..sos].to_vec();
        truncated.extend_from_slice(&[0xFF, markers::EOI]);
        assert!(matches!(
            decompress_file(&truncated, &DecoderOptions::default()),
            Err(Error::NoScans)
        ));
        Ok(())
    }

    #[test]
    fn block_smoothing_keeps_the_image() -> Result<()> {
        let image = smooth_image(40, 40, ColorSpace::Grayscale);
        let options = EncoderOptions {
            progressive: true,
            ..Default::default()
        };
        let data = compress_image(&image, &options)?;
        let smoothed = DecoderOptions {
            block_smoothing: true,
            ..Default::default()
        };
        let (decoded, warnings) = decompress_file(&data, &smoothed)?;
        assert!(warnings.is_empty());
        assert!(mean_abs_diff(image.data(), decoded.data()) < 3.0);
        Ok(())
    }

    #[test]
    fn one_pass_quantized_output() -> Result<()> {
        let image = smooth_image(20, 12, ColorSpace::Grayscale);
        let data = compress_image(&image, &EncoderOptions::default())?;
        let options = DecoderOptions {
            color_quantization: Some(ColorQuantOptions::with_colors(16)),
            ..Default::default()
        };
        let mut warnings = WarningLog::default();
        let mut reader = MarkerReader::new(&data);
        reader.read_header(&mut warnings)?;
        let mut sink = RawImageSink::new();
        decompress(&mut reader, ColorSpace::Grayscale, &options, &mut sink, &mut warnings)?;
        let colors = sink.colormap().map(|m| m.len()).unwrap_or(0);
        assert!(colors > 0 && colors <= 16);
        let indexes = sink.into_image(false)?;
        assert_eq!(indexes.channels(), 1);
        assert!(indexes.data().iter().all(|&i| (i as usize) < colors));
        Ok(())
    }

    #[test]
    fn two_pass_quantized_output() -> Result<()> {
        let image = smooth_image(48, 32, ColorSpace::Rgb);
        let data = compress_image(&image, &EncoderOptions::with_quality(95))?;
        let options = DecoderOptions {
            color_quantization: Some(ColorQuantOptions {
                desired_colors: 64,
                two_pass: true,
                dither: false,
            }),
            ..Default::default()
        };
        let (full, _) = decompress_file(&data, &DecoderOptions::default())?;
        let (mapped, warnings) = decompress_file(&data, &options)?;
        assert!(warnings.is_empty());
        assert_eq!(mapped.channels(), 3);
        assert!(mean_abs_diff(full.data(), mapped.data()) < 12.0);
        Ok(())
    }

    #[test]
    fn random_content_survives_best_quality() -> Result<()> {
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(0);
        let image = random_image(&mut rng, 16, 16, ColorSpace::Grayscale);
        let data = compress_image(&image, &EncoderOptions::with_quality(100))?;
        let (decoded, _) = decompress_file(&data, &DecoderOptions::default())?;
        assert!(mean_abs_diff(image.data(), decoded.data()) < 1.5);
        assert!(max_abs_diff(image.data(), decoded.data()) <= 10);
        Ok(())
    }
}
