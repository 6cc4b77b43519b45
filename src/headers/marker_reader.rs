// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use byteorder::{BigEndian, ByteOrder};
use num_traits::FromPrimitive;

use super::{
    AdobeHeader, ColorSpace, ComponentInfo, DensityUnit, FrameHeader, FrameKind, JfifHeader,
    ScanComponent, ScanHeader, markers,
};
use crate::{
    BLOCK_SIZE, NUM_HUFF_TBLS, NUM_QUANT_TBLS,
    bit_reader::BitReader,
    entropy_coding::{HuffmanTable, MAX_CODE_LENGTH, TableClass},
    error::{Error, Result, Warning, WarningLog},
    quant::QuantTable,
    util::tracing_wrappers::*,
};

const JFIF_LEN: usize = 14;
const ADOBE_LEN: usize = 12;

/// Tables defined so far. Later definitions replace earlier ones, so a
/// table can change between scans.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub quant: [Option<QuantTable>; NUM_QUANT_TBLS],
    pub dc: [Option<HuffmanTable>; NUM_HUFF_TBLS],
    pub ac: [Option<HuffmanTable>; NUM_HUFF_TBLS],
    /// MCUs per restart interval, 0 if restarts are off.
    pub restart_interval: u16,
}

impl Tables {
    pub fn huffman(&self, class: TableClass, index: usize) -> Result<&HuffmanTable> {
        let tables = match class {
            TableClass::Dc => &self.dc,
            TableClass::Ac => &self.ac,
        };
        tables
            .get(index)
            .and_then(Option::as_ref)
            .ok_or(Error::UndefinedHuffmanTable {
                class: class.name(),
                index,
            })
    }

    pub fn quant(&self, index: usize) -> Result<&QuantTable> {
        self.quant
            .get(index)
            .and_then(Option::as_ref)
            .ok_or(Error::UndefinedQuantTable(index))
    }
}

/// Application markers and comments found in the file.
#[derive(Debug, Clone, Default)]
pub struct MarkerInfo {
    pub jfif: Option<JfifHeader>,
    pub adobe: Option<AdobeHeader>,
    pub comments: Vec<Vec<u8>>,
}

/// The parameters of one marker segment, read big-endian.
struct Segment<'a> {
    marker: u8,
    offset: usize,
    data: &'a [u8],
    pos: usize,
}

impl<'a> Segment<'a> {
    fn bad_length(&self) -> Error {
        Error::BadMarkerLength {
            marker: self.marker,
            length: self.data.len() + 2,
            offset: self.offset,
        }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(self.bad_length());
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.bytes(2)?))
    }
}

/// Parses the marker structure of a JPEG file held in memory. Entropy-coded
/// data is skipped over by the caller, which hands back the marker that
/// ended it through [`MarkerReader::resume`].
pub struct MarkerReader<'a> {
    data: &'a [u8],
    pos: usize,
    pending_marker: Option<u8>,
    at_end: bool,
    pub tables: Tables,
    pub info: MarkerInfo,
    pub frame: Option<FrameHeader>,
}

impl<'a> MarkerReader<'a> {
    pub fn new(data: &'a [u8]) -> MarkerReader<'a> {
        MarkerReader {
            data,
            pos: 0,
            pending_marker: None,
            at_end: false,
            tables: Tables::default(),
            info: MarkerInfo::default(),
            frame: None,
        }
    }

    /// Offset of the first byte not yet parsed.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// A reader for the entropy-coded data that follows the last scan
    /// header.
    pub fn bit_reader(&self) -> BitReader<'a> {
        BitReader::new(self.data, self.pos)
    }

    /// Continues after entropy-coded data that ended at `pos` with `marker`,
    /// or with the end of the input if `marker` is `None`.
    pub fn resume(&mut self, pos: usize, marker: Option<u8>) {
        self.pos = pos;
        self.pending_marker = marker;
        self.at_end = marker.is_none();
    }

    /// Checks the SOI marker at the start of the data.
    pub fn read_soi(&mut self) -> Result<()> {
        match self.data {
            [0xFF, markers::SOI, ..] => {
                trace!("Start of Image");
                self.pos = 2;
                self.tables.restart_interval = 0;
                Ok(())
            }
            [a, b, ..] => Err(Error::NotAJpeg(*a, *b)),
            _ => Err(Error::FileTruncated),
        }
    }

    fn next_marker(&mut self, warnings: &mut WarningLog) -> Option<u8> {
        if let Some(code) = self.pending_marker.take() {
            return Some(code);
        }
        if self.at_end {
            return None;
        }
        let mut br = BitReader::new(self.data, self.pos);
        let code = br.next_marker(warnings);
        self.pos = br.position();
        self.at_end = code.is_none();
        code
    }

    fn segment(&mut self, marker: u8) -> Result<Segment<'a>> {
        let offset = self.pos;
        if self.pos + 2 > self.data.len() {
            return Err(Error::FileTruncated);
        }
        let length = BigEndian::read_u16(&self.data[self.pos..]) as usize;
        if length < 2 {
            return Err(Error::BadMarkerLength {
                marker,
                length,
                offset,
            });
        }
        if self.pos + length > self.data.len() {
            return Err(Error::FileTruncated);
        }
        let data = &self.data[self.pos + 2..self.pos + length];
        self.pos += length;
        Ok(Segment {
            marker,
            offset,
            data,
            pos: 0,
        })
    }

    /// Handles markers that may appear anywhere between SOI and the first
    /// SOF or between scans. Returns the first marker that is not one of
    /// those, or `None` at the end of the input.
    fn process_tables(&mut self, warnings: &mut WarningLog) -> Result<Option<u8>> {
        loop {
            let Some(code) = self.next_marker(warnings) else {
                return Ok(None);
            };
            match code {
                markers::SOI | markers::EOI | markers::SOS => return Ok(Some(code)),
                markers::DHT => self.read_dht()?,
                markers::DQT => self.read_dqt()?,
                markers::DRI => self.read_dri()?,
                markers::APP0 => self.read_app0(warnings)?,
                markers::APP14 => self.read_app14()?,
                markers::COM => {
                    let segment = self.segment(code)?;
                    trace!("Comment, length {}", segment.data.len());
                    self.info.comments.push(segment.data.to_vec());
                }
                markers::DAC => return Err(Error::Unsupported("arithmetic coding")),
                markers::DNL => return Err(Error::Unsupported("DNL marker")),
                c if markers::is_sof(c) || c == markers::JPG => return Ok(Some(code)),
                c if markers::is_rst(c) || c == markers::TEM => {
                    trace!("Unexpected marker 0x{c:02x}");
                }
                _ => {
                    trace!("Skipping marker 0x{code:02x}");
                    self.segment(code)?;
                }
            }
        }
    }

    fn read_dht(&mut self) -> Result<()> {
        let mut segment = self.segment(markers::DHT)?;
        while segment.remaining() > 0 {
            let index = segment.u8()?;
            trace!("Define Huffman Table 0x{index:02x}");
            let mut bits = [0u8; MAX_CODE_LENGTH + 1];
            bits[1..].copy_from_slice(segment.bytes(MAX_CODE_LENGTH)?);
            let count: usize = bits.iter().map(|&b| b as usize).sum();
            if count > 256 || count > segment.remaining() {
                return Err(Error::BadDhtCounts(count));
            }
            let values = segment.bytes(count)?.to_vec();
            let slot = (index & 0x0F) as usize;
            let tables = match index >> 4 {
                0 => &mut self.tables.dc,
                1 => &mut self.tables.ac,
                _ => return Err(Error::BadTableIndex(index as usize)),
            };
            if slot >= NUM_HUFF_TBLS {
                return Err(Error::BadTableIndex(index as usize));
            }
            tables[slot] = Some(HuffmanTable::new(bits, values)?);
        }
        Ok(())
    }

    fn read_dqt(&mut self) -> Result<()> {
        let mut segment = self.segment(markers::DQT)?;
        while segment.remaining() > 0 {
            let n = segment.u8()?;
            let precision = n >> 4;
            let slot = (n & 0x0F) as usize;
            trace!("Define Quantization Table {slot}  precision {precision}");
            if slot >= NUM_QUANT_TBLS {
                return Err(Error::BadTableIndex(slot));
            }
            let mut zigzag = [0u16; BLOCK_SIZE];
            for q in zigzag.iter_mut() {
                *q = if precision != 0 {
                    segment.u16()?
                } else {
                    segment.u8()? as u16
                };
            }
            self.tables.quant[slot] = Some(QuantTable::from_zigzag(&zigzag));
        }
        Ok(())
    }

    fn read_dri(&mut self) -> Result<()> {
        let mut segment = self.segment(markers::DRI)?;
        if segment.remaining() != 2 {
            return Err(segment.bad_length());
        }
        self.tables.restart_interval = segment.u16()?;
        trace!("Define Restart Interval {}", self.tables.restart_interval);
        Ok(())
    }

    fn read_app0(&mut self, warnings: &mut WarningLog) -> Result<()> {
        let mut segment = self.segment(markers::APP0)?;
        if segment.remaining() < JFIF_LEN {
            trace!("Short APP0 marker, length {}", segment.data.len() + 2);
            return Ok(());
        }
        if segment.bytes(5)? != b"JFIF\0" {
            trace!("Unknown APP0 marker, length {}", segment.data.len() + 2);
            return Ok(());
        }
        let major_version = segment.u8()?;
        let minor_version = segment.u8()?;
        if major_version != 1 {
            return Err(Error::UnsupportedJfifVersion(major_version, minor_version));
        }
        if minor_version > 2 {
            warnings.emit(Warning::UnknownJfifRevision(major_version, minor_version));
        }
        let unit = segment.u8()?;
        let jfif = JfifHeader {
            major_version,
            minor_version,
            density_unit: DensityUnit::from_u8(unit).unwrap_or_default(),
            x_density: segment.u16()?,
            y_density: segment.u16()?,
            thumbnail_width: segment.u8()?,
            thumbnail_height: segment.u8()?,
        };
        debug!(
            "JFIF APP0 marker: version {major_version}.{minor_version:02}, density {}x{} {unit}",
            jfif.x_density, jfif.y_density
        );
        let expected = jfif.thumbnail_width as usize * jfif.thumbnail_height as usize * 3;
        if segment.remaining() != expected {
            warnings.emit(Warning::JfifThumbnailMismatch {
                expected,
                found: segment.remaining(),
            });
        }
        self.info.jfif = Some(jfif);
        Ok(())
    }

    fn read_app14(&mut self) -> Result<()> {
        let mut segment = self.segment(markers::APP14)?;
        if segment.remaining() < ADOBE_LEN || segment.bytes(5)? != b"Adobe" {
            trace!("Unknown APP14 marker, length {}", segment.data.len() + 2);
            return Ok(());
        }
        let adobe = AdobeHeader {
            version: segment.u16()?,
            flags0: segment.u16()?,
            flags1: segment.u16()?,
            transform: segment.u8()?,
        };
        debug!(
            "Adobe APP14 marker: version {}, flags 0x{:04x} 0x{:04x}, transform {}",
            adobe.version, adobe.flags0, adobe.flags1, adobe.transform
        );
        self.info.adobe = Some(adobe);
        Ok(())
    }

    fn read_sof(&mut self, code: u8) -> Result<()> {
        if self.frame.is_some() {
            return Err(Error::DuplicateFrameHeader);
        }
        let kind = FrameKind::from_marker(code)?;
        let mut segment = self.segment(code)?;
        let precision = segment.u8()?;
        let height = segment.u16()? as usize;
        let width = segment.u16()? as usize;
        let num_components = segment.u8()? as usize;
        debug!(
            "Start Of Frame 0x{code:02x}: width={width}, height={height}, components={num_components}"
        );
        if height == 0 {
            return Err(Error::Unsupported("image height defined by DNL"));
        }
        if segment.remaining() != num_components * 3 {
            return Err(segment.bad_length());
        }
        let mut components = Vec::with_capacity(num_components);
        for _ in 0..num_components {
            let id = segment.u8()?;
            let sampling = segment.u8()?;
            let quant_table = segment.u8()?;
            let component = ComponentInfo {
                id,
                h_samp_factor: sampling >> 4,
                v_samp_factor: sampling & 15,
                quant_table,
            };
            trace!(
                "    Component {id}: {}hx{}v q={quant_table}",
                component.h_samp_factor, component.v_samp_factor
            );
            components.push(component);
        }
        let frame = FrameHeader {
            kind,
            precision,
            width,
            height,
            components,
        };
        frame.validate()?;
        self.frame = Some(frame);
        Ok(())
    }

    fn read_sos(&mut self, warnings: &mut WarningLog) -> Result<ScanHeader> {
        let mut segment = self.segment(markers::SOS)?;
        let frame = self.frame.as_ref().ok_or(Error::MissingFrameHeader)?;
        let n = segment.u8()? as usize;
        if segment.remaining() != n * 2 + 3 {
            return Err(segment.bad_length());
        }
        debug!("Start Of Scan: {n} components");
        let mut components = Vec::with_capacity(n);
        for _ in 0..n {
            let id = segment.u8()?;
            let tables = segment.u8()?;
            let component = frame
                .component_index(id)
                .ok_or(Error::UnknownScanComponent(id))?;
            trace!("    c{id}: [dc={} ac={}]", tables >> 4, tables & 15);
            components.push(ScanComponent {
                component,
                dc_table: tables >> 4,
                ac_table: tables & 15,
            });
        }
        let ss = segment.u8()?;
        let se = segment.u8()?;
        let approximation = segment.u8()?;
        let mut scan = ScanHeader {
            components,
            ss,
            se,
            ah: approximation >> 4,
            al: approximation & 15,
        };
        trace!("  Ss={ss}, Se={se}, Ah={}, Al={}", scan.ah, scan.al);
        if !frame.kind.is_progressive() && !scan.is_full_sequential() {
            warnings.emit(Warning::NotSequential {
                ss: scan.ss,
                se: scan.se,
                ah: scan.ah,
                al: scan.al,
            });
            scan.ss = 0;
            scan.se = 63;
            scan.ah = 0;
            scan.al = 0;
        }
        scan.validate(frame)?;
        Ok(scan)
    }

    /// Reads everything up to and including the frame header.
    pub fn read_header(&mut self, warnings: &mut WarningLog) -> Result<&FrameHeader> {
        self.read_soi()?;
        match self.process_tables(warnings)? {
            Some(markers::SOS) => Err(Error::MissingFrameHeader),
            Some(code @ (markers::SOI | markers::EOI)) => Err(Error::UnexpectedMarker {
                found: code,
                offset: self.pos - 2,
                expected: "SOF",
            }),
            Some(code) => {
                self.read_sof(code)?;
                self.frame.as_ref().ok_or(Error::MissingFrameHeader)
            }
            None => Err(Error::FileTruncated),
        }
    }

    /// Reads the markers up to the next scan. Returns `None` at EOI, or at
    /// the end of the input, which is reported as [`Warning::MissingEoi`].
    pub fn next_scan(&mut self, warnings: &mut WarningLog) -> Result<Option<ScanHeader>> {
        match self.process_tables(warnings)? {
            Some(markers::SOS) => self.read_sos(warnings).map(Some),
            Some(markers::EOI) => {
                trace!("End Of Image");
                Ok(None)
            }
            Some(code) if markers::is_sof(code) => Err(Error::DuplicateFrameHeader),
            Some(code) => Err(Error::UnexpectedMarker {
                found: code,
                offset: self.pos - 2,
                expected: "SOS or EOI",
            }),
            None => {
                warnings.emit(Warning::MissingEoi);
                Ok(None)
            }
        }
    }

    /// Works out the color space of the stored components from the
    /// application markers and component ids.
    pub fn infer_color_space(&self, warnings: &mut WarningLog) -> ColorSpace {
        let Some(frame) = &self.frame else {
            return ColorSpace::Unknown;
        };
        match frame.components.len() {
            1 => ColorSpace::Grayscale,
            3 => {
                if self.info.jfif.is_some() {
                    return ColorSpace::YCbCr;
                }
                if let Some(adobe) = &self.info.adobe {
                    return match adobe.transform {
                        0 => ColorSpace::Rgb,
                        1 => ColorSpace::YCbCr,
                        t => {
                            warnings.emit(Warning::UnknownAdobeTransform(t));
                            ColorSpace::YCbCr
                        }
                    };
                }
                let ids: Vec<u8> = frame.components.iter().map(|c| c.id).collect();
                match ids[..] {
                    [1, 2, 3] => ColorSpace::YCbCr,
                    [b'R', b'G', b'B'] => ColorSpace::Rgb,
                    [a, b, c] => {
                        warnings.emit(Warning::UnrecognizedComponentIds(a, b, c));
                        ColorSpace::YCbCr
                    }
                    _ => ColorSpace::YCbCr,
                }
            }
            4 => match &self.info.adobe {
                None => ColorSpace::Cmyk,
                Some(adobe) => match adobe.transform {
                    0 => ColorSpace::Cmyk,
                    2 => ColorSpace::Ycck,
                    t => {
                        warnings.emit(Warning::UnknownAdobeTransform(t));
                        ColorSpace::Ycck
                    }
                },
            },
            _ => ColorSpace::Unknown,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn sof(kind: u8, width: u16, height: u16, components: &[(u8, u8, u8)]) -> Vec<u8> {
        let mut out = vec![0xFF, kind];
        out.extend_from_slice(&((8 + 3 * components.len()) as u16).to_be_bytes());
        out.push(8);
        out.extend_from_slice(&height.to_be_bytes());
        out.extend_from_slice(&width.to_be_bytes());
        out.push(components.len() as u8);
        for &(id, hv, q) in components {
            out.extend_from_slice(&[id, hv, q]);
        }
        out
    }

    fn dqt(slot: u8) -> Vec<u8> {
        let mut out = vec![0xFF, markers::DQT, 0, 67, slot];
        out.extend((1..=64).map(|v| v as u8));
        out
    }

    fn file(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut out = vec![0xFF, markers::SOI];
        for s in segments {
            out.extend_from_slice(s);
        }
        out
    }

    #[test]
    fn not_a_jpeg() {
        let mut warnings = WarningLog::default();
        let data = [0x89, b'P', b'N', b'G'];
        assert!(matches!(
            MarkerReader::new(&data).read_header(&mut warnings),
            Err(Error::NotAJpeg(0x89, b'P'))
        ));
        assert!(matches!(
            MarkerReader::new(&[0xFF]).read_header(&mut warnings),
            Err(Error::FileTruncated)
        ));
    }

    #[test]
    fn header_and_scan() -> Result<()> {
        let data = file(&[
            dqt(0),
            vec![0xFF, markers::DRI, 0, 4, 0, 9],
            vec![0xFF, markers::COM, 0, 4, b'h', b'i'],
            sof(0xC0, 17, 9, &[(1, 0x22, 0), (2, 0x11, 0), (3, 0x11, 0)]),
            vec![
                0xFF,
                markers::SOS,
                0,
                12,
                3,
                1,
                0x00,
                2,
                0x11,
                3,
                0x11,
                0,
                63,
                0,
            ],
        ]);
        let mut warnings = WarningLog::default();
        let mut reader = MarkerReader::new(&data);
        let frame = reader.read_header(&mut warnings)?;
        assert_eq!((frame.width, frame.height), (17, 9));
        assert_eq!(frame.kind, FrameKind::Baseline);
        assert_eq!(reader.tables.restart_interval, 9);
        assert_eq!(reader.info.comments, vec![b"hi".to_vec()]);
        assert_eq!(reader.tables.quant(0)?.get(1), 2);
        assert_eq!(reader.tables.quant(0)?.get(8), 3);
        assert!(matches!(
            reader.tables.quant(1),
            Err(Error::UndefinedQuantTable(1))
        ));
        assert_eq!(
            reader.infer_color_space(&mut warnings),
            ColorSpace::YCbCr
        );
        let scan = reader.next_scan(&mut warnings)?.unwrap();
        assert_eq!(scan.components.len(), 3);
        assert_eq!(scan.components[1].ac_table, 1);
        assert_eq!(reader.position(), data.len());
        // No EOI follows.
        assert_eq!(reader.next_scan(&mut warnings)?, None);
        assert_eq!(warnings.warnings(), &[Warning::MissingEoi]);
        Ok(())
    }

    #[test]
    fn huffman_tables() -> Result<()> {
        let standard = HuffmanTable::standard(TableClass::Ac, true);
        let mut dht = vec![0xFF, markers::DHT];
        dht.extend_from_slice(&((2 + 17 + standard.values.len()) as u16).to_be_bytes());
        dht.push(0x13);
        dht.extend_from_slice(&standard.bits[1..]);
        dht.extend_from_slice(&standard.values);
        let data = file(&[dht, sof(0xC2, 8, 8, &[(1, 0x11, 0)])]);
        let mut reader = MarkerReader::new(&data);
        reader.read_header(&mut WarningLog::default())?;
        assert_eq!(reader.tables.huffman(TableClass::Ac, 3)?, &standard);
        assert!(matches!(
            reader.tables.huffman(TableClass::Dc, 3),
            Err(Error::UndefinedHuffmanTable { class: "DC", index: 3 })
        ));

        let mut bad = vec![0xFF, markers::DHT, 0, 19, 0x00];
        bad.extend_from_slice(&[0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        let data = file(&[bad]);
        assert!(matches!(
            MarkerReader::new(&data).read_header(&mut WarningLog::default()),
            Err(Error::BadDhtCounts(3))
        ));
        Ok(())
    }

    #[test]
    fn frame_errors() {
        let mut warnings = WarningLog::default();
        let sos_first = file(&[vec![0xFF, markers::SOS, 0, 8, 1, 1, 0, 0, 63, 0]]);
        assert!(matches!(
            MarkerReader::new(&sos_first).read_header(&mut warnings),
            Err(Error::MissingFrameHeader)
        ));
        let arithmetic = file(&[sof(0xC9, 8, 8, &[(1, 0x11, 0)])]);
        assert!(matches!(
            MarkerReader::new(&arithmetic).read_header(&mut warnings),
            Err(Error::Unsupported(_))
        ));
        let lossless = file(&[sof(0xC3, 8, 8, &[(1, 0x11, 0)])]);
        assert!(matches!(
            MarkerReader::new(&lossless).read_header(&mut warnings),
            Err(Error::UnsupportedFrameType(0xC3))
        ));
        let dnl = file(&[sof(0xC0, 8, 0, &[(1, 0x11, 0)])]);
        assert!(matches!(
            MarkerReader::new(&dnl).read_header(&mut warnings),
            Err(Error::Unsupported(_))
        ));
        let sampling = file(&[sof(0xC0, 8, 8, &[(1, 0x51, 0), (2, 0x11, 0)])]);
        assert!(matches!(
            MarkerReader::new(&sampling).read_header(&mut warnings),
            Err(Error::InvalidSamplingFactor(5, 1))
        ));
        let mut short = sof(0xC0, 8, 8, &[(1, 0x11, 0)]);
        short[3] += 3;
        short.extend_from_slice(&[0, 0, 0]);
        assert!(matches!(
            MarkerReader::new(&file(&[short])).read_header(&mut warnings),
            Err(Error::BadMarkerLength { marker: 0xC0, .. })
        ));
        let truncated = file(&[vec![0xFF, markers::DQT, 0, 67, 0, 1, 2]]);
        assert!(matches!(
            MarkerReader::new(&truncated).read_header(&mut warnings),
            Err(Error::FileTruncated)
        ));
    }

    #[test]
    fn jfif_and_adobe() -> Result<()> {
        let jfif = |major: u8, minor: u8, thumb: u8| {
            let mut out = vec![0xFF, markers::APP0, 0, 16];
            out.extend_from_slice(b"JFIF\0");
            out.extend_from_slice(&[major, minor, 1, 0, 72, 0, 72, thumb, thumb]);
            out
        };
        let three = sof(0xC0, 8, 8, &[(1, 0x11, 0), (2, 0x11, 0), (3, 0x11, 0)]);

        let data = file(&[jfif(1, 3, 1), three.clone()]);
        let mut warnings = WarningLog::default();
        let mut reader = MarkerReader::new(&data);
        reader.read_header(&mut warnings)?;
        let header = reader.info.jfif.unwrap();
        assert_eq!(header.density_unit, DensityUnit::DotsPerInch);
        assert_eq!((header.x_density, header.y_density), (72, 72));
        assert_eq!(
            warnings.warnings(),
            &[
                Warning::UnknownJfifRevision(1, 3),
                Warning::JfifThumbnailMismatch {
                    expected: 3,
                    found: 0
                }
            ]
        );

        let data = file(&[jfif(2, 0, 0), three.clone()]);
        assert!(matches!(
            MarkerReader::new(&data).read_header(&mut warnings),
            Err(Error::UnsupportedJfifVersion(2, 0))
        ));

        let mut adobe = vec![0xFF, markers::APP14, 0, 14];
        adobe.extend_from_slice(b"Adobe");
        adobe.extend_from_slice(&[0, 100, 0, 0, 0, 0, 0]);
        let data = file(&[adobe.clone(), three]);
        let mut reader = MarkerReader::new(&data);
        reader.read_header(&mut warnings)?;
        assert_eq!(reader.infer_color_space(&mut warnings), ColorSpace::Rgb);

        adobe[15] = 2;
        let four = sof(
            0xC0,
            8,
            8,
            &[(1, 0x11, 0), (2, 0x11, 0), (3, 0x11, 0), (4, 0x11, 0)],
        );
        let data = file(&[adobe, four]);
        let mut reader = MarkerReader::new(&data);
        reader.read_header(&mut warnings)?;
        assert_eq!(reader.infer_color_space(&mut warnings), ColorSpace::Ycck);
        Ok(())
    }

    #[test]
    fn component_id_heuristics() -> Result<()> {
        let mut warnings = WarningLog::default();
        let rgb = file(&[sof(0xC0, 8, 8, &[(b'R', 0x11, 0), (b'G', 0x11, 0), (b'B', 0x11, 0)])]);
        let mut reader = MarkerReader::new(&rgb);
        reader.read_header(&mut warnings)?;
        assert_eq!(reader.infer_color_space(&mut warnings), ColorSpace::Rgb);
        assert!(warnings.is_empty());

        let odd = file(&[sof(0xC0, 8, 8, &[(0, 0x11, 0), (1, 0x11, 0), (2, 0x11, 0)])]);
        let mut reader = MarkerReader::new(&odd);
        reader.read_header(&mut warnings)?;
        assert_eq!(reader.infer_color_space(&mut warnings), ColorSpace::YCbCr);
        assert_eq!(
            warnings.warnings(),
            &[Warning::UnrecognizedComponentIds(0, 1, 2)]
        );
        Ok(())
    }

    #[test]
    fn sequential_scan_parameters_are_ignored() -> Result<()> {
        let data = file(&[
            sof(0xC0, 8, 8, &[(1, 0x11, 0)]),
            vec![0xFF, markers::SOS, 0, 8, 1, 1, 0x00, 1, 5, 0x10],
            vec![0xFF, markers::EOI],
        ]);
        let mut warnings = WarningLog::default();
        let mut reader = MarkerReader::new(&data);
        reader.read_header(&mut warnings)?;
        let scan = reader.next_scan(&mut warnings)?.unwrap();
        assert!(scan.is_full_sequential());
        assert_eq!(
            warnings.warnings(),
            &[Warning::NotSequential {
                ss: 1,
                se: 5,
                ah: 1,
                al: 0
            }]
        );
        assert_eq!(reader.next_scan(&mut warnings)?, None);
        Ok(())
    }

    #[test]
    fn garbage_between_segments() -> Result<()> {
        let mut data = file(&[dqt(1)]);
        data.extend_from_slice(&[1, 2, 3]);
        data.extend_from_slice(&sof(0xC1, 8, 8, &[(1, 0x11, 1)]));
        let mut warnings = WarningLog::default();
        let mut reader = MarkerReader::new(&data);
        assert_eq!(
            reader.read_header(&mut warnings)?.kind,
            FrameKind::ExtendedSequential
        );
        assert_eq!(
            warnings.warnings(),
            &[Warning::ExtraneousBytes {
                count: 3,
                marker: 0xC1
            }]
        );
        Ok(())
    }
}
