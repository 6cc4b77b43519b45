// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use super::{AdobeHeader, FrameHeader, JfifHeader, ScanHeader, markers};
use crate::{
    NUM_HUFF_TBLS, NUM_QUANT_TBLS,
    entropy_coding::{HuffmanTable, MAX_CODE_LENGTH, TableClass},
    error::{Error, Result},
    quant::QuantTable,
    util::tracing_wrappers::*,
};

/// Longest payload a marker segment can carry.
const MAX_SEGMENT_PAYLOAD: usize = 65533;

/// Writes marker segments, remembering which tables the current file
/// already contains so that each is sent only once, or again after it
/// changes.
pub struct MarkerWriter<'a, W: Write> {
    out: &'a mut W,
    quant: [Option<QuantTable>; NUM_QUANT_TBLS],
    dc: [Option<HuffmanTable>; NUM_HUFF_TBLS],
    ac: [Option<HuffmanTable>; NUM_HUFF_TBLS],
    restart_interval: Option<u16>,
}

impl<'a, W: Write> MarkerWriter<'a, W> {
    pub fn new(out: &'a mut W) -> MarkerWriter<'a, W> {
        MarkerWriter {
            out,
            quant: Default::default(),
            dc: Default::default(),
            ac: Default::default(),
            restart_interval: None,
        }
    }

    /// The underlying output, for entropy-coded data.
    pub fn output(&mut self) -> &mut W {
        self.out
    }

    fn marker(&mut self, code: u8) -> Result<()> {
        self.out.write_all(&[0xFF, code])?;
        Ok(())
    }

    fn segment_header(&mut self, code: u8, payload: usize) -> Result<()> {
        if payload > MAX_SEGMENT_PAYLOAD {
            return Err(Error::InvalidOption("marker segment too long"));
        }
        self.marker(code)?;
        self.out.write_u16::<BigEndian>(payload as u16 + 2)?;
        Ok(())
    }

    /// Starts a new file, forgetting every table sent so far.
    pub fn write_soi(&mut self) -> Result<()> {
        self.quant = Default::default();
        self.dc = Default::default();
        self.ac = Default::default();
        self.restart_interval = None;
        self.marker(markers::SOI)
    }

    pub fn write_eoi(&mut self) -> Result<()> {
        self.marker(markers::EOI)
    }

    pub fn write_jfif(&mut self, jfif: &JfifHeader) -> Result<()> {
        self.segment_header(markers::APP0, 14)?;
        self.out.write_all(b"JFIF\0")?;
        self.out.write_all(&[
            jfif.major_version,
            jfif.minor_version,
            jfif.density_unit as u8,
        ])?;
        self.out.write_u16::<BigEndian>(jfif.x_density)?;
        self.out.write_u16::<BigEndian>(jfif.y_density)?;
        // No thumbnail.
        self.out.write_all(&[0, 0])?;
        Ok(())
    }

    pub fn write_adobe(&mut self, adobe: &AdobeHeader) -> Result<()> {
        self.segment_header(markers::APP14, 12)?;
        self.out.write_all(b"Adobe")?;
        self.out.write_u16::<BigEndian>(adobe.version)?;
        self.out.write_u16::<BigEndian>(adobe.flags0)?;
        self.out.write_u16::<BigEndian>(adobe.flags1)?;
        self.out.write_u8(adobe.transform)?;
        Ok(())
    }

    pub fn write_comment(&mut self, comment: &[u8]) -> Result<()> {
        if comment.len() > MAX_SEGMENT_PAYLOAD {
            return Err(Error::InvalidOption("comment longer than 65533 bytes"));
        }
        self.segment_header(markers::COM, comment.len())?;
        self.out.write_all(comment)?;
        Ok(())
    }

    /// Sends quantization table `slot` unless the file already has it.
    /// Returns whether the table needs 16-bit precision.
    pub fn write_dqt(&mut self, slot: usize, table: &QuantTable) -> Result<bool> {
        let sixteen_bit = table.needs_16_bit();
        if self.quant[slot].as_ref() == Some(table) {
            return Ok(sixteen_bit);
        }
        trace!("Define Quantization Table {slot}, 16-bit: {sixteen_bit}");
        let payload = if sixteen_bit { 129 } else { 65 };
        self.segment_header(markers::DQT, payload)?;
        self.out.write_u8(((sixteen_bit as u8) << 4) | slot as u8)?;
        for q in table.zigzag() {
            if sixteen_bit {
                self.out.write_u16::<BigEndian>(q)?;
            } else {
                self.out.write_u8(q as u8)?;
            }
        }
        self.quant[slot] = Some(*table);
        Ok(sixteen_bit)
    }

    /// Sends Huffman table `slot` of `class` unless the file already has it.
    pub fn write_dht(&mut self, class: TableClass, slot: usize, table: &HuffmanTable) -> Result<()> {
        let sent = match class {
            TableClass::Dc => &self.dc[slot],
            TableClass::Ac => &self.ac[slot],
        };
        if sent.as_ref() == Some(table) {
            return Ok(());
        }
        trace!("Define Huffman Table {} {slot}", class.name());
        self.segment_header(markers::DHT, 1 + MAX_CODE_LENGTH + table.values.len())?;
        self.out.write_u8(((class as u8) << 4) | slot as u8)?;
        self.out.write_all(&table.bits[1..])?;
        self.out.write_all(&table.values)?;
        let sent = match class {
            TableClass::Dc => &mut self.dc[slot],
            TableClass::Ac => &mut self.ac[slot],
        };
        *sent = Some(table.clone());
        Ok(())
    }

    /// Sends a DRI segment if the interval differs from the one in effect.
    pub fn write_dri(&mut self, interval: u16) -> Result<()> {
        if self.restart_interval == Some(interval) {
            return Ok(());
        }
        // Files start with restarts off.
        if self.restart_interval.is_none() && interval == 0 {
            self.restart_interval = Some(0);
            return Ok(());
        }
        self.segment_header(markers::DRI, 2)?;
        self.out.write_u16::<BigEndian>(interval)?;
        self.restart_interval = Some(interval);
        Ok(())
    }

    pub fn write_sof(&mut self, frame: &FrameHeader) -> Result<()> {
        debug!(
            "Start Of Frame 0x{:02x}: {}x{}, {} components",
            frame.kind.marker(),
            frame.width,
            frame.height,
            frame.components.len()
        );
        let (Ok(width), Ok(height)) = (u16::try_from(frame.width), u16::try_from(frame.height))
        else {
            return Err(Error::ImageTooLarge(frame.width, frame.height));
        };
        self.segment_header(frame.kind.marker(), 6 + 3 * frame.components.len())?;
        self.out.write_u8(frame.precision)?;
        self.out.write_u16::<BigEndian>(height)?;
        self.out.write_u16::<BigEndian>(width)?;
        self.out.write_u8(frame.components.len() as u8)?;
        for c in &frame.components {
            self.out
                .write_all(&[c.id, (c.h_samp_factor << 4) | c.v_samp_factor, c.quant_table])?;
        }
        Ok(())
    }

    pub fn write_sos(&mut self, scan: &ScanHeader, frame: &FrameHeader) -> Result<()> {
        trace!(
            "Start Of Scan: {} components, Ss={} Se={} Ah={} Al={}",
            scan.components.len(),
            scan.ss,
            scan.se,
            scan.ah,
            scan.al
        );
        self.segment_header(markers::SOS, 4 + 2 * scan.components.len())?;
        self.out.write_u8(scan.components.len() as u8)?;
        for sc in &scan.components {
            let id = frame.components[sc.component].id;
            self.out.write_all(&[id, (sc.dc_table << 4) | sc.ac_table])?;
        }
        self.out
            .write_all(&[scan.ss, scan.se, (scan.ah << 4) | scan.al])?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        error::WarningLog,
        headers::{
            ColorSpace, ComponentInfo, DensityUnit, FrameKind, ScanComponent,
            marker_reader::MarkerReader,
        },
        quant::STD_LUMINANCE_QUANT,
    };
    use test_log::test;

    fn gray_frame(kind: FrameKind) -> FrameHeader {
        FrameHeader {
            kind,
            precision: 8,
            width: 300,
            height: 20,
            components: vec![ComponentInfo {
                id: 1,
                h_samp_factor: 1,
                v_samp_factor: 1,
                quant_table: 0,
            }],
        }
    }

    fn gray_scan() -> ScanHeader {
        ScanHeader {
            components: vec![ScanComponent {
                component: 0,
                dc_table: 0,
                ac_table: 1,
            }],
            ss: 0,
            se: 63,
            ah: 0,
            al: 0,
        }
    }

    #[test]
    fn reader_understands_writer() -> Result<()> {
        let quant = QuantTable::for_quality(&STD_LUMINANCE_QUANT, 50, true);
        let dc = HuffmanTable::standard(TableClass::Dc, false);
        let ac = HuffmanTable::standard(TableClass::Ac, true);
        let frame = gray_frame(FrameKind::Baseline);
        let scan = gray_scan();

        let mut out = vec![];
        let mut writer = MarkerWriter::new(&mut out);
        writer.write_soi()?;
        writer.write_jfif(&JfifHeader {
            density_unit: DensityUnit::DotsPerCm,
            x_density: 30,
            y_density: 40,
            ..Default::default()
        })?;
        writer.write_comment(b"made in a test")?;
        assert!(!writer.write_dqt(0, &quant)?);
        writer.write_sof(&frame)?;
        writer.write_dht(TableClass::Dc, 0, &dc)?;
        writer.write_dht(TableClass::Ac, 1, &ac)?;
        writer.write_dri(5)?;
        writer.write_sos(&scan, &frame)?;
        writer.write_eoi()?;

        let mut warnings = WarningLog::default();
        let mut reader = MarkerReader::new(&out);
        assert_eq!(reader.read_header(&mut warnings)?, &frame);
        assert_eq!(reader.tables.quant(0)?, &quant);
        let jfif = reader.info.jfif.unwrap();
        assert_eq!((jfif.density_unit, jfif.x_density), (DensityUnit::DotsPerCm, 30));
        assert_eq!(reader.info.comments, vec![b"made in a test".to_vec()]);
        assert_eq!(reader.infer_color_space(&mut warnings), ColorSpace::Grayscale);
        assert_eq!(reader.next_scan(&mut warnings)?, Some(scan));
        assert_eq!(reader.tables.huffman(TableClass::Ac, 1)?, &ac);
        assert_eq!(reader.tables.restart_interval, 5);
        assert_eq!(reader.next_scan(&mut warnings)?, None);
        assert!(warnings.is_empty());
        Ok(())
    }

    #[test]
    fn tables_are_sent_once_per_file() -> Result<()> {
        let quant = QuantTable::for_quality(&STD_LUMINANCE_QUANT, 75, true);
        let dc = HuffmanTable::standard(TableClass::Dc, false);
        let mut out = vec![];
        let mut writer = MarkerWriter::new(&mut out);
        writer.write_soi()?;
        writer.write_dqt(0, &quant)?;
        writer.write_dht(TableClass::Dc, 0, &dc)?;
        writer.write_dri(0)?;
        let first = writer.output().len();
        writer.write_dqt(0, &quant)?;
        writer.write_dht(TableClass::Dc, 0, &dc)?;
        writer.write_dri(0)?;
        assert_eq!(writer.output().len(), first);

        // A redefined table is sent again.
        let other = QuantTable::for_quality(&STD_LUMINANCE_QUANT, 20, true);
        writer.write_dqt(0, &other)?;
        assert_eq!(writer.output().len(), first + 2 + 2 + 65);

        // As is everything after a new SOI.
        writer.write_soi()?;
        let start = writer.output().len();
        writer.write_dht(TableClass::Dc, 0, &dc)?;
        assert!(writer.output().len() > start);
        Ok(())
    }

    #[test]
    fn sixteen_bit_quantizers() -> Result<()> {
        let quant = QuantTable::for_quality(&STD_LUMINANCE_QUANT, 1, false);
        assert!(quant.needs_16_bit());
        let mut out = vec![];
        let mut writer = MarkerWriter::new(&mut out);
        assert!(writer.write_dqt(2, &quant)?);
        assert_eq!(&out[..5], &[0xFF, markers::DQT, 0, 131, 0x12]);
        Ok(())
    }

    #[test]
    fn oversized_comment() {
        let mut out = vec![];
        let mut writer = MarkerWriter::new(&mut out);
        assert!(matches!(
            writer.write_comment(&vec![b'x'; 70000]),
            Err(Error::InvalidOption(_))
        ));
    }
}
