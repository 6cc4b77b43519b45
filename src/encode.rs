// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Compression controller: turns the rows of a [`PixelSource`] into a
//! complete file, either streaming one iMCU row at a time or through a
//! whole-image coefficient buffer when the tables have to be fitted to the
//! data first or the file has several scans.

mod scan_script;

pub use scan_script::{ScanInfo, sequential_script, simple_progression, validate_script};

use std::io::Write;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    BLOCK_DIM, MAX_COMPS_IN_SCAN, NUM_HUFF_TBLS,
    api::{EncoderOptions, PixelSource, SourceInfo},
    coefficients::{Block, CoefficientBuffer},
    color::ColorEncoder,
    dct::{forward_dct, load_block},
    entropy_coding::{
        EncodeTable, HuffmanTable, RestartCounter, TableClass,
        encode::{EntropySink, FrequencyCounter, HuffmanSink, encode_sequential_block},
        optimize::optimal_table,
        progressive::ProgressiveEncoder,
    },
    error::{Error, Result},
    geometry::{FrameGeometry, ScanLayout},
    headers::{
        AdobeHeader, ColorSpace, ComponentInfo, FrameHeader, FrameKind, JfifHeader, ScanComponent,
        ScanHeader, marker_writer::MarkerWriter,
    },
    quant::{QuantTable, STD_CHROMINANCE_QUANT, STD_LUMINANCE_QUANT},
    sample::Downsampler,
    util::{RowGroupRing, tracing_wrappers::*},
};

/// The color space a file gets when the caller does not choose one.
fn default_jpeg_color_space(input: ColorSpace) -> ColorSpace {
    match input {
        ColorSpace::Rgb => ColorSpace::YCbCr,
        ColorSpace::Cmyk => ColorSpace::Ycck,
        other => other,
    }
}

fn component_ids(color_space: ColorSpace, num_components: usize) -> Vec<u8> {
    match color_space {
        ColorSpace::Rgb => b"RGB".to_vec(),
        ColorSpace::Cmyk => b"CMYK".to_vec(),
        ColorSpace::Unknown => (0..num_components as u8).collect(),
        _ => (1..=num_components as u8).collect(),
    }
}

fn default_sampling(color_space: ColorSpace, num_components: usize) -> Vec<(u8, u8)> {
    match color_space {
        ColorSpace::YCbCr => vec![(2, 2), (1, 1), (1, 1)],
        ColorSpace::Ycck => vec![(2, 2), (1, 1), (1, 1), (2, 2)],
        _ => vec![(1, 1); num_components],
    }
}

/// Chroma components share the second quantization and Huffman slots.
fn table_slot(color_space: ColorSpace, component: usize) -> u8 {
    let chroma = matches!(color_space, ColorSpace::YCbCr | ColorSpace::Ycck)
        && (component == 1 || component == 2);
    chroma as u8
}

/// Everything decided about a file before the first row is read.
#[derive(Debug)]
struct EncodePlan {
    source: SourceInfo,
    jpeg_color_space: ColorSpace,
    frame: FrameHeader,
    geometry: FrameGeometry,
    /// Tables by slot.
    quant_tables: Vec<QuantTable>,
    scans: Vec<ScanHeader>,
    /// Fit Huffman tables to the data instead of using the standard ones.
    optimize: bool,
}

impl EncodePlan {
    fn new(options: &EncoderOptions, source: SourceInfo) -> Result<EncodePlan> {
        let jpeg_color_space = options
            .jpeg_color_space
            .unwrap_or_else(|| default_jpeg_color_space(source.color_space));
        let num_components = jpeg_color_space.channels().unwrap_or(source.channels);

        let sampling = match &options.sampling_factors {
            // A lone component is always coded at full resolution.
            _ if num_components == 1 => vec![(1, 1)],
            Some(factors) if factors.len() != num_components => {
                return Err(Error::InvalidOption(
                    "sampling factors must be given for every component",
                ));
            }
            Some(factors) => factors.clone(),
            None => default_sampling(jpeg_color_space, num_components),
        };

        let num_slots = if (0..num_components).any(|c| table_slot(jpeg_color_space, c) == 1) {
            2
        } else {
            1
        };
        let quant_tables = (0..num_slots)
            .map(|slot| {
                let base = match options.quant_tables.as_deref() {
                    Some(tables) => *tables
                        .get(slot)
                        .or(tables.first())
                        .ok_or(Error::InvalidOption("no quantization tables"))?,
                    None if slot == 0 => STD_LUMINANCE_QUANT,
                    None => STD_CHROMINANCE_QUANT,
                };
                Ok(QuantTable::for_quality(
                    &base,
                    options.quality,
                    options.force_baseline,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let kind = if options.progressive {
            FrameKind::Progressive
        } else if quant_tables.iter().any(QuantTable::needs_16_bit) {
            FrameKind::ExtendedSequential
        } else {
            FrameKind::Baseline
        };
        let components = component_ids(jpeg_color_space, num_components)
            .into_iter()
            .zip(sampling.iter())
            .enumerate()
            .map(|(c, (id, &(h, v)))| ComponentInfo {
                id,
                h_samp_factor: h,
                v_samp_factor: v,
                quant_table: table_slot(jpeg_color_space, c),
            })
            .collect();
        let frame = FrameHeader {
            kind,
            precision: 8,
            width: source.width,
            height: source.height,
            components,
        };
        frame.validate()?;
        let geometry = FrameGeometry::from_header(&frame);

        let script = match &options.scan_script {
            Some(script) => {
                validate_script(script, num_components, options.progressive)?;
                script.clone()
            }
            None if options.progressive => simple_progression(jpeg_color_space, num_components),
            None => sequential_script(num_components),
        };
        let scans = script
            .iter()
            .map(|s| {
                let components = s
                    .components
                    .iter()
                    .map(|&component| {
                        let slot = table_slot(jpeg_color_space, component);
                        ScanComponent {
                            component,
                            dc_table: slot,
                            ac_table: slot,
                        }
                    })
                    .collect();
                let scan = ScanHeader {
                    components,
                    ss: s.ss,
                    se: s.se,
                    ah: s.ah,
                    al: s.al,
                };
                scan.validate(&frame)?;
                // Rejects MCUs with too many blocks before anything is written.
                ScanLayout::new(&geometry, &s.components)?;
                Ok(scan)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EncodePlan {
            source,
            jpeg_color_space,
            frame,
            geometry,
            quant_tables,
            scans,
            optimize: options.optimize_huffman || options.progressive,
        })
    }

    /// A single scan with standard tables can be written as the rows arrive.
    fn is_streaming(&self) -> bool {
        !self.optimize && self.scans.len() == 1
    }

    fn scan_layout(&self, scan: &ScanHeader) -> Result<ScanLayout> {
        let components: Vec<usize> = scan.components.iter().map(|sc| sc.component).collect();
        ScanLayout::new(&self.geometry, &components)
    }
}

/// MCUs per restart interval of a scan.
fn restart_interval(options: &EncoderOptions, layout: &ScanLayout) -> usize {
    let interval = if options.restart_in_rows > 0 {
        options.restart_in_rows as usize * layout.mcus_per_row
    } else {
        options.restart_interval as usize
    };
    // DRI holds 16 bits.
    interval.min(u16::MAX as usize)
}

/// Level-shifts, transforms and quantizes one row of blocks. `samples`
/// holds eight rows of `stride` samples.
fn transform_block_row(samples: &[u8], stride: usize, quant: &QuantTable, blocks: &mut [Block]) {
    let transform = |(bx, block): (usize, &mut Block)| {
        let rows = samples.chunks_exact(stride).take(BLOCK_DIM);
        *block = quant.quantize(&forward_dct(&load_block(rows, bx * BLOCK_DIM)));
    };
    #[cfg(feature = "parallel")]
    blocks.par_iter_mut().enumerate().for_each(transform);
    #[cfg(not(feature = "parallel"))]
    blocks.iter_mut().enumerate().for_each(transform);
}

/// Color conversion, edge padding, downsampling and forward DCT: from
/// caller rows to quantized blocks, one iMCU row at a time.
struct Preprocessor {
    color: ColorEncoder,
    width: usize,
    height: usize,
    imcu_rows: usize,
    /// Interleaved caller rows of one row group.
    input: Vec<Vec<u8>>,
    /// Full-resolution plane of each component, padded to the MCU grid.
    planes: Vec<RowGroupRing>,
    downsamplers: Vec<Downsampler>,
    /// Downsampled samples of the current iMCU row of each component.
    groups: Vec<Vec<u8>>,
    group_widths: Vec<usize>,
    /// Quantization table of each component.
    quant: Vec<QuantTable>,
}

impl Preprocessor {
    fn new(plan: &EncodePlan, smoothing_factor: u8) -> Result<Preprocessor> {
        let geometry = &plan.geometry;
        let source = &plan.source;
        let color = ColorEncoder::new(
            source.color_space,
            source.channels,
            plan.jpeg_color_space,
            geometry.components.len(),
        )?;
        let imcu_height = geometry.imcu_height();
        let input = vec![vec![0u8; source.width * source.channels]; imcu_height];
        let mut planes = vec![];
        let mut downsamplers = vec![];
        let mut groups = vec![];
        let mut group_widths = vec![];
        for c in &geometry.components {
            planes.push(RowGroupRing::new(geometry.padded_width(), imcu_height, 3)?);
            downsamplers.push(Downsampler::new(
                c.h_samp_factor,
                c.v_samp_factor,
                geometry.max_h_samp_factor,
                geometry.max_v_samp_factor,
                smoothing_factor,
            )?);
            let width = c.padded_blocks_wide * BLOCK_DIM;
            let size = width * c.v_samp_factor * BLOCK_DIM;
            let mut group = vec![];
            group.try_reserve_exact(size)?;
            group.resize(size, 0);
            groups.push(group);
            group_widths.push(width);
        }
        let quant = plan
            .frame
            .components
            .iter()
            .map(|c| plan.quant_tables[c.quant_table as usize])
            .collect();
        Ok(Preprocessor {
            color,
            width: source.width,
            height: source.height,
            imcu_rows: geometry.imcu_rows,
            input,
            planes,
            downsamplers,
            groups,
            group_widths,
            quant,
        })
    }

    /// Reads the next row group from `source` into every plane, replicating
    /// the last column and row into the padding.
    fn read_group(&mut self, source: &mut impl PixelSource) -> Result<()> {
        let group_height = self.input.len();
        let g = self.planes[0].groups_pushed();
        let first_row = g * group_height;
        let real_rows = group_height.min(self.height - first_row);
        let mut rows: Vec<&mut [u8]> = self.input[..real_rows]
            .iter_mut()
            .map(|r| &mut r[..])
            .collect();
        source.get_rows(&mut rows)?;

        for plane in self.planes.iter_mut() {
            plane.push_group();
        }
        for r in 0..group_height {
            let src = &self.input[r.min(real_rows - 1)];
            let mut out: Vec<&mut [u8]> = self.planes.iter_mut().map(|p| p.row_mut(g, r)).collect();
            self.color.convert_row(src, &mut out);
            for row in out {
                let last = row[self.width - 1];
                row[self.width..].fill(last);
            }
        }
        if g + 1 == self.imcu_rows {
            for plane in self.planes.iter_mut() {
                plane.finish();
            }
        }
        Ok(())
    }

    /// Produces the quantized blocks of iMCU row `imcu_row` into `coefs`,
    /// which must hold that row.
    fn process_imcu_row(
        &mut self,
        source: &mut impl PixelSource,
        imcu_row: usize,
        coefs: &mut CoefficientBuffer,
    ) -> Result<()> {
        // Smoothing reads one row of the following group.
        let needed = (imcu_row + 2).min(self.imcu_rows);
        while self.planes[0].groups_pushed() < needed {
            self.read_group(source)?;
        }
        for (c, blocks) in coefs.components.iter_mut().enumerate() {
            let width = self.group_widths[c];
            let group = &mut self.groups[c];
            let mut rows: Vec<&mut [u8]> = group.chunks_exact_mut(width).collect();
            self.downsamplers[c].downsample_group(&self.planes[c], imcu_row, &mut rows);

            let block_rows = group.len() / (width * BLOCK_DIM);
            for r in 0..block_rows {
                let samples = &group[r * BLOCK_DIM * width..(r + 1) * BLOCK_DIM * width];
                let by = imcu_row * block_rows + r;
                transform_block_row(samples, width, &self.quant[c], blocks.row_mut(by));
            }
        }
        Ok(())
    }
}

enum BlockCoder {
    Sequential {
        last_dc: [i32; MAX_COMPS_IN_SCAN],
    },
    Progressive(ProgressiveEncoder),
}

/// Walks the MCUs of one scan and hands their blocks to an entropy sink.
struct ScanEncoder<'a> {
    scan: &'a ScanHeader,
    layout: &'a ScanLayout,
    coder: BlockCoder,
    restarts: RestartCounter,
}

impl<'a> ScanEncoder<'a> {
    fn new(
        frame: &FrameHeader,
        scan: &'a ScanHeader,
        layout: &'a ScanLayout,
        restart_interval: usize,
    ) -> Self {
        let coder = if frame.kind.is_progressive() {
            BlockCoder::Progressive(ProgressiveEncoder::new(scan))
        } else {
            BlockCoder::Sequential {
                last_dc: [0; MAX_COMPS_IN_SCAN],
            }
        };
        ScanEncoder {
            scan,
            layout,
            coder,
            restarts: RestartCounter::new(restart_interval),
        }
    }

    /// AC scans have a single component, whose table is the one in use.
    fn ac_table(&self) -> usize {
        self.scan.components[0].ac_table as usize
    }

    fn encode_mcu_row(
        &mut self,
        sink: &mut impl EntropySink,
        coefs: &CoefficientBuffer,
        mcu_y: usize,
    ) -> Result<()> {
        let ac_table = self.ac_table();
        for mcu_x in 0..self.layout.mcus_per_row {
            if let Some(n) = self.restarts.before_mcu() {
                match &mut self.coder {
                    BlockCoder::Sequential { last_dc } => {
                        sink.restart(n)?;
                        *last_dc = [0; MAX_COMPS_IN_SCAN];
                    }
                    BlockCoder::Progressive(encoder) => encoder.restart(sink, n, ac_table)?,
                }
            }
            for b in &self.layout.mcu_blocks {
                let sc = &self.scan.components[b.scan_component];
                let (bx, by) = self.layout.block_position(b, mcu_x, mcu_y);
                let block = coefs.components[sc.component].block(bx, by);
                let (dc_table, ac_table) = (sc.dc_table as usize, sc.ac_table as usize);
                match &mut self.coder {
                    BlockCoder::Sequential { last_dc } => encode_sequential_block(
                        sink,
                        block,
                        &mut last_dc[b.scan_component],
                        dc_table,
                        ac_table,
                    )?,
                    BlockCoder::Progressive(encoder) => {
                        encoder.encode_block(sink, block, b.scan_component, dc_table, ac_table)?
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, sink: &mut impl EntropySink) -> Result<()> {
        let ac_table = self.ac_table();
        match &mut self.coder {
            BlockCoder::Sequential { .. } => Ok(()),
            BlockCoder::Progressive(encoder) => encoder.finish(sink, ac_table),
        }
    }

    /// Codes every MCU of the scan from a whole-image buffer.
    fn encode_all(&mut self, sink: &mut impl EntropySink, coefs: &CoefficientBuffer) -> Result<()> {
        for mcu_y in 0..self.layout.mcu_rows {
            self.encode_mcu_row(sink, coefs, mcu_y)?;
        }
        self.finish(sink)
    }
}

type TableSet = [Option<HuffmanTable>; NUM_HUFF_TBLS];

/// The Annex K tables for every slot `scan` refers to.
fn standard_tables(scan: &ScanHeader) -> (TableSet, TableSet) {
    let mut dc = TableSet::default();
    let mut ac = TableSet::default();
    for sc in &scan.components {
        dc[sc.dc_table as usize] = Some(HuffmanTable::standard(TableClass::Dc, sc.dc_table == 1));
        ac[sc.ac_table as usize] = Some(HuffmanTable::standard(TableClass::Ac, sc.ac_table == 1));
    }
    (dc, ac)
}

/// Optimal tables for every slot that received symbols.
fn fitted_tables(counter: &FrequencyCounter) -> (TableSet, TableSet) {
    let fit = |class| {
        array_init::array_init(|i| {
            counter
                .is_used(class, i)
                .then(|| optimal_table(counter.histogram(class, i)))
        })
    };
    (fit(TableClass::Dc), fit(TableClass::Ac))
}

fn encode_tables(tables: &TableSet, class: TableClass) -> Result<[Option<EncodeTable>; NUM_HUFF_TBLS]> {
    array_init::try_array_init(|i| {
        tables[i]
            .as_ref()
            .map(|t| EncodeTable::new(t, class))
            .transpose()
    })
}

/// Writes the tables and header of one scan, then its entropy-coded data.
fn write_scan<W: Write>(
    writer: &mut MarkerWriter<W>,
    plan: &EncodePlan,
    scan: &ScanHeader,
    (dc, ac): (TableSet, TableSet),
    restart_interval: usize,
    encode: impl FnOnce(&mut HuffmanSink<W>) -> Result<()>,
) -> Result<()> {
    for (class, tables) in [(TableClass::Dc, &dc), (TableClass::Ac, &ac)] {
        for (slot, table) in tables.iter().enumerate() {
            if let Some(table) = table {
                writer.write_dht(class, slot, table)?;
            }
        }
    }
    writer.write_dri(restart_interval as u16)?;
    writer.write_sos(scan, &plan.frame)?;
    let mut sink = HuffmanSink::new(
        writer.output(),
        encode_tables(&dc, TableClass::Dc)?,
        encode_tables(&ac, TableClass::Ac)?,
    );
    encode(&mut sink)?;
    sink.finish()
}

fn write_file_header<W: Write>(
    writer: &mut MarkerWriter<W>,
    options: &EncoderOptions,
    plan: &EncodePlan,
) -> Result<()> {
    writer.write_soi()?;
    let color_space = plan.jpeg_color_space;
    if options.write_jfif_header
        && matches!(color_space, ColorSpace::Grayscale | ColorSpace::YCbCr)
    {
        writer.write_jfif(&JfifHeader {
            density_unit: options.density_unit,
            x_density: options.x_density,
            y_density: options.y_density,
            ..Default::default()
        })?;
    }
    if options.write_adobe_marker
        && matches!(
            color_space,
            ColorSpace::Rgb | ColorSpace::Cmyk | ColorSpace::Ycck
        )
    {
        writer.write_adobe(&AdobeHeader::for_color_space(color_space))?;
    }
    if let Some(comment) = &options.comment {
        writer.write_comment(comment)?;
    }
    for (slot, table) in plan.quant_tables.iter().enumerate() {
        writer.write_dqt(slot, table)?;
    }
    writer.write_sof(&plan.frame)
}

/// One scan, standard tables, one iMCU row of coefficients in memory.
fn compress_streaming<W: Write>(
    writer: &mut MarkerWriter<W>,
    options: &EncoderOptions,
    plan: &EncodePlan,
    pre: &mut Preprocessor,
    source: &mut impl PixelSource,
) -> Result<()> {
    let scan = &plan.scans[0];
    let layout = plan.scan_layout(scan)?;
    let interval = restart_interval(options, &layout);
    let mut coefs = CoefficientBuffer::for_imcu_row(&plan.geometry)?;
    write_scan(
        writer,
        plan,
        scan,
        standard_tables(scan),
        interval,
        |sink| {
            let mut encoder = ScanEncoder::new(&plan.frame, scan, &layout, interval);
            for imcu_row in 0..plan.geometry.imcu_rows {
                coefs.reset_to_imcu_row(&plan.geometry, imcu_row);
                pre.process_imcu_row(source, imcu_row, &mut coefs)?;
                encoder.encode_mcu_row(sink, &coefs, imcu_row)?;
            }
            encoder.finish(sink)
        },
    )
}

/// Transforms the whole image first, then writes every scan, counting
/// symbols in a dry run first when the tables are to be fitted.
fn compress_buffered<W: Write>(
    writer: &mut MarkerWriter<W>,
    options: &EncoderOptions,
    plan: &EncodePlan,
    pre: &mut Preprocessor,
    source: &mut impl PixelSource,
) -> Result<()> {
    let mut coefs = CoefficientBuffer::for_image(&plan.geometry)?;
    for imcu_row in 0..plan.geometry.imcu_rows {
        pre.process_imcu_row(source, imcu_row, &mut coefs)?;
    }
    for scan in &plan.scans {
        let layout = plan.scan_layout(scan)?;
        let interval = restart_interval(options, &layout);
        let tables = if plan.optimize {
            let mut counter = FrequencyCounter::default();
            ScanEncoder::new(&plan.frame, scan, &layout, interval).encode_all(&mut counter, &coefs)?;
            fitted_tables(&counter)
        } else {
            standard_tables(scan)
        };
        trace!(ss = scan.ss, se = scan.se, mcus = layout.total_mcus(), "writing scan");
        write_scan(writer, plan, scan, tables, interval, |sink| {
            ScanEncoder::new(&plan.frame, scan, &layout, interval).encode_all(sink, &coefs)
        })?;
    }
    Ok(())
}

/// Compresses the rows of `source` into `out`. Nothing is written if the
/// settings are invalid or do not fit the image.
pub fn compress<W: Write>(
    options: &EncoderOptions,
    source: &mut impl PixelSource,
    out: &mut W,
) -> Result<()> {
    options.validate()?;
    let info = source.start()?;
    let plan = EncodePlan::new(options, info)?;
    let mut pre = Preprocessor::new(&plan, options.smoothing_factor)?;
    debug!(
        width = info.width,
        height = info.height,
        color_space = ?plan.jpeg_color_space,
        kind = ?plan.frame.kind,
        scans = plan.scans.len(),
        streaming = plan.is_streaming(),
        "compressing"
    );

    let mut writer = MarkerWriter::new(out);
    write_file_header(&mut writer, options, &plan)?;
    if plan.is_streaming() {
        compress_streaming(&mut writer, options, &plan, &mut pre, source)?;
    } else {
        compress_buffered(&mut writer, options, &plan, &mut pre, source)?;
    }
    writer.write_eoi()?;
    source.finish()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        api::RawImage,
        headers::markers,
        util::test::{random_image, smooth_image},
    };
    use rand::SeedableRng;
    use test_log::test;

    fn info(width: usize, height: usize, color_space: ColorSpace) -> SourceInfo {
        SourceInfo {
            width,
            height,
            color_space,
            channels: color_space.channels().unwrap_or(1),
        }
    }

    /// Marker codes of a file in order, skipping entropy-coded data.
    fn marker_codes(data: &[u8]) -> Vec<u8> {
        let mut codes = vec![];
        let mut pos = 0;
        while pos + 1 < data.len() {
            if data[pos] != 0xFF || data[pos + 1] == 0 || data[pos + 1] == 0xFF {
                pos += 1;
                continue;
            }
            let code = data[pos + 1];
            codes.push(code);
            pos += 2;
            let standalone = code == markers::SOI || code == markers::EOI || markers::is_rst(code);
            if !standalone {
                pos += u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
            }
        }
        codes
    }

    fn compress_image(image: &RawImage, options: &EncoderOptions) -> Result<Vec<u8>> {
        let mut out = vec![];
        compress(options, &mut image.source(), &mut out)?;
        Ok(out)
    }

    #[test]
    fn default_plan_for_rgb() -> Result<()> {
        let plan = EncodePlan::new(&EncoderOptions::default(), info(17, 9, ColorSpace::Rgb))?;
        assert_eq!(plan.jpeg_color_space, ColorSpace::YCbCr);
        assert_eq!(plan.frame.kind, FrameKind::Baseline);
        let ids: Vec<u8> = plan.frame.components.iter().map(|c| c.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        let slots: Vec<u8> = plan.frame.components.iter().map(|c| c.quant_table).collect();
        assert_eq!(slots, [0, 1, 1]);
        assert_eq!(plan.frame.components[0].h_samp_factor, 2);
        assert_eq!(plan.quant_tables.len(), 2);
        assert_eq!(plan.scans.len(), 1);
        assert!(plan.is_streaming());
        Ok(())
    }

    #[test]
    fn plan_choices() -> Result<()> {
        let mut options = EncoderOptions::with_quality(1);
        options.force_baseline = false;
        let plan = EncodePlan::new(&options, info(8, 8, ColorSpace::Grayscale))?;
        assert_eq!(plan.frame.kind, FrameKind::ExtendedSequential);
        assert_eq!(plan.quant_tables.len(), 1);

        let mut options = EncoderOptions::default();
        options.progressive = true;
        let plan = EncodePlan::new(&options, info(8, 8, ColorSpace::Rgb))?;
        assert_eq!(plan.frame.kind, FrameKind::Progressive);
        assert_eq!(plan.scans.len(), 10);
        assert!(!plan.is_streaming());

        let plan = EncodePlan::new(&EncoderOptions::default(), info(8, 8, ColorSpace::Cmyk))?;
        assert_eq!(plan.jpeg_color_space, ColorSpace::Ycck);
        assert_eq!(plan.frame.components[3].h_samp_factor, 2);

        let mut options = EncoderOptions::default();
        options.sampling_factors = Some(vec![(1, 1)]);
        assert!(EncodePlan::new(&options, info(8, 8, ColorSpace::Rgb)).is_err());
        options.sampling_factors = Some(vec![(4, 2), (2, 2), (1, 1)]);
        assert!(matches!(
            EncodePlan::new(&options, info(8, 8, ColorSpace::Rgb)),
            Err(Error::TooManyBlocksInMcu(13))
        ));
        Ok(())
    }

    #[test]
    fn flat_single_pixel_fills_its_block() -> Result<()> {
        let image = RawImage::new(1, 1, ColorSpace::Grayscale, vec![200])?;
        let mut options = EncoderOptions::with_quality(100);
        options.force_baseline = false;
        let plan = EncodePlan::new(&options, info(1, 1, ColorSpace::Grayscale))?;
        let mut pre = Preprocessor::new(&plan, 0)?;
        let mut coefs = CoefficientBuffer::for_imcu_row(&plan.geometry)?;
        let mut source = image.source();
        source.start()?;
        pre.process_imcu_row(&mut source, 0, &mut coefs)?;
        let block = coefs.components[0].block(0, 0);
        assert_eq!(block[0], (200 - 128) * 8);
        assert!(block[1..].iter().all(|&c| c == 0));
        Ok(())
    }

    #[test]
    fn marker_layout() -> Result<()> {
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(0);
        let image = random_image(&mut rng, 16, 16, ColorSpace::Rgb);
        let mut options = EncoderOptions::default();
        options.comment = Some(b"hello".to_vec());
        let data = compress_image(&image, &options)?;
        assert_eq!(
            marker_codes(&data),
            [
                markers::SOI,
                markers::APP0,
                markers::COM,
                markers::DQT,
                markers::DQT,
                markers::SOF0,
                markers::DHT,
                markers::DHT,
                markers::DHT,
                markers::DHT,
                markers::SOS,
                markers::EOI
            ]
        );

        let mut options = EncoderOptions::default();
        options.jpeg_color_space = Some(ColorSpace::Rgb);
        let data = compress_image(&image, &options)?;
        let codes = marker_codes(&data);
        assert_eq!(codes[1], markers::APP14);
        assert!(!codes.contains(&markers::APP0));
        Ok(())
    }

    #[test]
    fn restart_markers() -> Result<()> {
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(0);
        let image = random_image(&mut rng, 32, 8, ColorSpace::Grayscale);
        let mut options = EncoderOptions::default();
        options.restart_interval = 1;
        let codes = marker_codes(&compress_image(&image, &options)?);
        let rst: Vec<u8> = codes.into_iter().filter(|&c| markers::is_rst(c)).collect();
        assert_eq!(rst, [markers::RST0, markers::RST0 + 1, markers::RST0 + 2]);

        let image = random_image(&mut rng, 16, 24, ColorSpace::Grayscale);
        let mut options = EncoderOptions::default();
        options.restart_in_rows = 1;
        let codes = marker_codes(&compress_image(&image, &options)?);
        assert!(codes.contains(&markers::DRI));
        assert_eq!(codes.iter().filter(|&&c| markers::is_rst(c)).count(), 2);
        Ok(())
    }

    #[test]
    fn fitted_tables_are_smaller() -> Result<()> {
        let image = smooth_image(64, 64, ColorSpace::Rgb);
        let standard = compress_image(&image, &EncoderOptions::default())?;
        let mut options = EncoderOptions::default();
        options.optimize_huffman = true;
        let fitted = compress_image(&image, &options)?;
        assert!(fitted.len() < standard.len(), "{} {}", fitted.len(), standard.len());
        Ok(())
    }

    #[test]
    fn progressive_file_has_every_scan() -> Result<()> {
        let image = smooth_image(40, 24, ColorSpace::Rgb);
        let mut options = EncoderOptions::default();
        options.progressive = true;
        let codes = marker_codes(&compress_image(&image, &options)?);
        assert!(codes.contains(&markers::SOF2));
        assert_eq!(codes.iter().filter(|&&c| c == markers::SOS).count(), 10);
        assert_eq!(codes.last(), Some(&markers::EOI));
        Ok(())
    }

    #[test]
    fn invalid_options_write_nothing() -> Result<()> {
        let image = RawImage::new(4, 4, ColorSpace::Grayscale, vec![0; 16])?;
        let mut bad_sampling = EncoderOptions::default();
        bad_sampling.sampling_factors = Some(vec![(5, 1)]);
        let mut long_restarts = EncoderOptions::default();
        long_restarts.restart_interval = u16::MAX as u32 + 1;
        for options in [bad_sampling, long_restarts, EncoderOptions::with_quality(0)] {
            let mut out = vec![];
            assert!(compress(&options, &mut image.source(), &mut out).is_err());
            assert!(out.is_empty());
        }
        Ok(())
    }

    #[test]
    fn longest_restart_interval() -> Result<()> {
        let image = smooth_image(16, 8, ColorSpace::Grayscale);
        let mut options = EncoderOptions::default();
        options.restart_interval = u16::MAX as u32;
        let data = compress_image(&image, &options)?;
        let dri = data
            .windows(2)
            .position(|w| w == [0xFF, markers::DRI])
            .expect("no DRI");
        assert_eq!(&data[dri + 2..dri + 6], &[0, 4, 0xFF, 0xFF]);
        // Two MCUs never reach the interval.
        assert!(!marker_codes(&data).into_iter().any(markers::is_rst));
        Ok(())
    }

    #[test]
    fn mismatched_color_space_writes_nothing() -> Result<()> {
        let image = RawImage::new(4, 4, ColorSpace::Grayscale, vec![0; 16])?;
        let mut options = EncoderOptions::default();
        options.jpeg_color_space = Some(ColorSpace::YCbCr);
        let mut out = vec![];
        assert!(compress(&options, &mut image.source(), &mut out).is_err());
        assert!(out.is_empty());
        Ok(())
    }
}
