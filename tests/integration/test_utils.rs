//! Test utilities for integration tests.
//!
//! Builders for synthetic slides: a TIFF writer covering the classic,
//! BigTIFF and NDPI dialects, plus writers for Mirax companion folders and
//! iSyntax headers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

// =============================================================================
// TIFF constants
// =============================================================================

pub const TAG_IMAGE_WIDTH: u16 = 256;
pub const TAG_IMAGE_LENGTH: u16 = 257;
pub const TAG_IMAGE_DESCRIPTION: u16 = 270;
pub const TAG_MAKE: u16 = 271;
pub const TAG_STRIP_OFFSETS: u16 = 273;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 279;
pub const TAG_SOFTWARE: u16 = 305;
pub const TAG_DATE_TIME: u16 = 306;
pub const TAG_TILE_OFFSETS: u16 = 324;
pub const TAG_TILE_BYTE_COUNTS: u16 = 325;
pub const TAG_XMP: u16 = 700;
pub const TAG_NDPI_FORMAT_FLAG: u16 = 65420;
pub const TAG_NDPI_SOURCE_LENS: u16 = 65421;

const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;
const TYPE_FLOAT: u16 = 11;
const TYPE_LONG8: u16 = 16;

// =============================================================================
// TIFF builder
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Classic,
    BigTiff,
    /// Classic header and entries, 8-byte next pointers
    Ndpi,
}

/// A value stored in an IFD entry.
#[derive(Clone, Debug)]
enum Value {
    Ascii(String),
    Bytes(Vec<u8>),
    Short(u16),
    Long(u32),
    Float(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DataLayout {
    Strips,
    Tiles,
}

/// One directory to write.
#[derive(Clone, Debug)]
pub struct IfdBuilder {
    entries: Vec<(u16, Value)>,
    layout: DataLayout,
    chunks: Vec<Vec<u8>>,
}

impl IfdBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            layout: DataLayout::Strips,
            chunks: Vec::new(),
        }
    }

    pub fn ascii(mut self, tag: u16, text: &str) -> Self {
        self.entries.push((tag, Value::Ascii(text.to_string())));
        self
    }

    pub fn bytes(mut self, tag: u16, data: &[u8]) -> Self {
        self.entries.push((tag, Value::Bytes(data.to_vec())));
        self
    }

    pub fn short(mut self, tag: u16, value: u16) -> Self {
        self.entries.push((tag, Value::Short(value)));
        self
    }

    pub fn long(mut self, tag: u16, value: u32) -> Self {
        self.entries.push((tag, Value::Long(value)));
        self
    }

    pub fn float(mut self, tag: u16, value: f32) -> Self {
        self.entries.push((tag, Value::Float(value)));
        self
    }

    pub fn dimensions(self, width: u16, height: u16) -> Self {
        self.short(TAG_IMAGE_WIDTH, width)
            .short(TAG_IMAGE_LENGTH, height)
    }

    /// Pixel data stored as strips.
    pub fn strips(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.layout = DataLayout::Strips;
        self.chunks = chunks;
        self
    }

    /// Pixel data stored as tiles.
    pub fn tiles(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.layout = DataLayout::Tiles;
        self.chunks = chunks;
        self
    }
}

impl Default for IfdBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A written TIFF and where each directory's pixel chunks landed.
pub struct BuiltTiff {
    pub data: Vec<u8>,
    /// `(offset, len)` of every chunk, per directory
    pub chunks: Vec<Vec<(usize, usize)>>,
    /// Offset of every IFD
    pub ifd_offsets: Vec<u64>,
}

impl BuiltTiff {
    /// Bytes of chunk `chunk` of directory `ifd`, read from `data`.
    pub fn chunk<'a>(&self, data: &'a [u8], ifd: usize, chunk: usize) -> &'a [u8] {
        let (offset, len) = self.chunks[ifd][chunk];
        &data[offset..offset + len]
    }
}

/// Builder for test TIFF files.
///
/// Every directory is laid out as its pixel data, then its out-of-line
/// values, then the IFD itself, the way scanners write them.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    dialect: Dialect,
    ifds: Vec<IfdBuilder>,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            dialect: Dialect::Classic,
            ifds: Vec::new(),
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn add_ifd(mut self, ifd: IfdBuilder) -> Self {
        self.ifds.push(ifd);
        self
    }

    fn big(&self) -> bool {
        self.dialect == Dialect::BigTiff
    }

    fn inline_limit(&self) -> usize {
        if self.big() {
            8
        } else {
            4
        }
    }

    fn next_pointer_width(&self) -> usize {
        if self.dialect == Dialect::Classic {
            4
        } else {
            8
        }
    }

    /// Build the TIFF file data.
    pub fn build(self) -> BuiltTiff {
        let mut data = Vec::new();
        match self.byte_order {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        let first_slot;
        if self.big() {
            self.put_uint(&mut data, 43, 2);
            self.put_uint(&mut data, 8, 2);
            self.put_uint(&mut data, 0, 2);
            first_slot = data.len();
            self.put_uint(&mut data, 0, 8);
        } else {
            self.put_uint(&mut data, 42, 2);
            first_slot = data.len();
            self.put_uint(&mut data, 0, 4);
        }

        let mut chunks = Vec::new();
        let mut ifd_offsets = Vec::new();
        let mut next_slots = Vec::new();

        for ifd in &self.ifds {
            // pixel data
            let mut spans = Vec::new();
            for chunk in &ifd.chunks {
                spans.push((data.len(), chunk.len()));
                data.extend_from_slice(chunk);
            }
            chunks.push(spans.clone());

            let mut entries = ifd.entries.clone();
            if !spans.is_empty() {
                let (offsets_tag, counts_tag) = match ifd.layout {
                    DataLayout::Strips => (TAG_STRIP_OFFSETS, TAG_STRIP_BYTE_COUNTS),
                    DataLayout::Tiles => (TAG_TILE_OFFSETS, TAG_TILE_BYTE_COUNTS),
                };
                let offsets: Vec<u64> = spans.iter().map(|(o, _)| *o as u64).collect();
                let counts: Vec<u64> = spans.iter().map(|(_, l)| *l as u64).collect();
                entries.push((offsets_tag, Value::Bytes(self.offset_array(&offsets))));
                entries.push((counts_tag, Value::Bytes(self.offset_array(&counts))));
            }
            entries.sort_by_key(|(tag, _)| *tag);

            // out-of-line values
            let mut encoded = Vec::new();
            for (tag, value) in &entries {
                let (field_type, count, bytes) = self.encode(*tag, value);
                let placement = if bytes.len() <= self.inline_limit() {
                    let mut inline = bytes.clone();
                    inline.resize(self.inline_limit(), 0);
                    inline
                } else {
                    if data.len() % 2 == 1 {
                        data.push(0);
                    }
                    let offset = data.len() as u64;
                    data.extend_from_slice(&bytes);
                    self.uint_bytes(offset, self.inline_limit())
                };
                encoded.push((*tag, field_type, count, placement));
            }

            // the IFD
            if data.len() % 2 == 1 {
                data.push(0);
            }
            ifd_offsets.push(data.len() as u64);
            let count_width = if self.big() { 8 } else { 2 };
            self.put_uint(&mut data, encoded.len() as u64, count_width);
            for (tag, field_type, count, placement) in encoded {
                self.put_uint(&mut data, tag as u64, 2);
                self.put_uint(&mut data, field_type as u64, 2);
                self.put_uint(&mut data, count, if self.big() { 8 } else { 4 });
                data.extend_from_slice(&placement);
            }
            next_slots.push(data.len());
            self.put_uint(&mut data, 0, self.next_pointer_width());
        }

        if let Some(&first) = ifd_offsets.first() {
            let width = if self.big() { 8 } else { 4 };
            let bytes = self.uint_bytes(first, width);
            data[first_slot..first_slot + width].copy_from_slice(&bytes);
        }
        for (i, slot) in next_slots.iter().enumerate() {
            if let Some(&next) = ifd_offsets.get(i + 1) {
                let width = self.next_pointer_width();
                let bytes = self.uint_bytes(next, width);
                data[*slot..*slot + width].copy_from_slice(&bytes);
            }
        }

        BuiltTiff {
            data,
            chunks,
            ifd_offsets,
        }
    }

    /// Field type, count and value bytes of an entry.
    fn encode(&self, tag: u16, value: &Value) -> (u16, u64, Vec<u8>) {
        match value {
            Value::Ascii(text) => {
                let mut bytes = text.as_bytes().to_vec();
                bytes.push(0);
                (TYPE_ASCII, bytes.len() as u64, bytes)
            }
            Value::Bytes(bytes) if tag == TAG_XMP => (TYPE_BYTE, bytes.len() as u64, bytes.clone()),
            Value::Bytes(bytes) => {
                // offset arrays
                let (field_type, width) = if self.big() {
                    (TYPE_LONG8, 8)
                } else {
                    (TYPE_LONG, 4)
                };
                (field_type, (bytes.len() / width) as u64, bytes.clone())
            }
            Value::Short(v) => (TYPE_SHORT, 1, self.uint_bytes(*v as u64, 2)),
            Value::Long(v) => (TYPE_LONG, 1, self.uint_bytes(*v as u64, 4)),
            Value::Float(v) => (TYPE_FLOAT, 1, self.uint_bytes(v.to_bits() as u64, 4)),
        }
    }

    fn offset_array(&self, values: &[u64]) -> Vec<u8> {
        let width = if self.big() { 8 } else { 4 };
        values
            .iter()
            .flat_map(|&v| self.uint_bytes(v, width))
            .collect()
    }

    fn uint_bytes(&self, value: u64, width: usize) -> Vec<u8> {
        let le = value.to_le_bytes();
        let mut bytes = le[..width].to_vec();
        if self.byte_order == ByteOrderType::BigEndian {
            bytes.reverse();
        }
        bytes
    }

    fn put_uint(&self, data: &mut Vec<u8>, value: u64, width: usize) {
        data.extend_from_slice(&self.uint_bytes(value, width));
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// File positions of the count and the value slot of `tag` in the
/// little-endian classic IFD at `ifd`.
pub fn entry_slots(data: &[u8], ifd: u64, tag: u16) -> (usize, usize) {
    let ifd = ifd as usize;
    let count = u16::from_le_bytes([data[ifd], data[ifd + 1]]) as usize;
    (0..count)
        .map(|i| ifd + 2 + 12 * i)
        .find(|&e| u16::from_le_bytes([data[e], data[e + 1]]) == tag)
        .map(|e| (e + 4, e + 8))
        .unwrap_or_else(|| panic!("tag {} not in IFD at {}", tag, ifd))
}

pub fn le_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// A chunk of `len` bytes of `byte`.
pub fn pixels(byte: u8, len: usize) -> Vec<u8> {
    vec![byte; len]
}

// =============================================================================
// Vendor TIFF fixtures
// =============================================================================

pub const APERIO_USER: &str = "b414003d-95c6-48b0-9369-8010ed517ba7";

/// Aperio slide: tiled base level, stripped thumbnail, label and macro.
pub fn aperio_slide() -> BuiltTiff {
    aperio_slide_with(ByteOrderType::LittleEndian, Dialect::Classic)
}

pub fn aperio_slide_with(order: ByteOrderType, dialect: Dialect) -> BuiltTiff {
    let main = format!(
        "Aperio Image Library v10.0.50\r\n2220x2967 [0,100 2220x2867] (240x240) JPEG/RGB Q=70\
         |AppMag = 20|StripeWidth = 460|ScanScope ID = SS1302|Filename = CMU-1\
         |Date = 12/29/09|Time = 09:59:15|User = {}|MPP = 0.4990",
        APERIO_USER
    );
    let thumbnail = format!(
        "Aperio Image Library v10.0.50\r\n2220x2967 -> 574x768 - |AppMag = 20|Filename = CMU-1\
         |Date = 12/29/09|Time = 09:59:15|User = {}",
        APERIO_USER
    );
    TiffBuilder::new()
        .with_byte_order(order)
        .with_dialect(dialect)
        .add_ifd(
            IfdBuilder::new()
                .dimensions(2220, 2967)
                .ascii(TAG_IMAGE_DESCRIPTION, &main)
                .tiles(vec![pixels(0x11, 96), pixels(0x12, 96)]),
        )
        .add_ifd(
            IfdBuilder::new()
                .dimensions(574, 768)
                .ascii(TAG_IMAGE_DESCRIPTION, &thumbnail)
                .strips(vec![pixels(0x21, 48)]),
        )
        .add_ifd(
            IfdBuilder::new()
                .dimensions(387, 463)
                .ascii(TAG_IMAGE_DESCRIPTION, "Aperio Image Library v10.0.50\r\nlabel 387x463")
                .strips(vec![pixels(0x31, 40)]),
        )
        .add_ifd(
            IfdBuilder::new()
                .dimensions(1280, 431)
                .ascii(TAG_IMAGE_DESCRIPTION, "Aperio Image Library v10.0.50\r\nmacro 1280x431")
                .strips(vec![pixels(0x41, 40)]),
        )
        .build()
}

pub const VENTANA_XMP: &str = concat!(
    r#"<?xml version="1.0" encoding="utf-8"?><Metadata><iScan "#,
    r#"BuildDate="12/12/2017" BuildVersion="3.3.1.1" UnitNumber="BI10N0294" "#,
    r#"UserName="operator" Barcode1D="S19-12345" Barcode2D="S19-12345-A" "#,
    r#"BaseName="S19-12345" ScanRes="0.25" /></Metadata>"#,
);

/// Ventana slide: label first, then the base level carrying the XMP packet,
/// then a thumbnail and the overview.
pub fn ventana_slide() -> BuiltTiff {
    TiffBuilder::new()
        .add_ifd(
            IfdBuilder::new()
                .ascii(TAG_IMAGE_DESCRIPTION, "Label Image")
                .strips(vec![pixels(0x31, 40)]),
        )
        .add_ifd(
            IfdBuilder::new()
                .ascii(TAG_IMAGE_DESCRIPTION, "level=0 mag=40 quality=95")
                .ascii(TAG_DATE_TIME, "2019:01:15 10:24:33")
                .bytes(TAG_XMP, VENTANA_XMP.as_bytes())
                .tiles(vec![pixels(0x11, 64), pixels(0x12, 64)]),
        )
        .add_ifd(
            IfdBuilder::new()
                .ascii(TAG_IMAGE_DESCRIPTION, "Thumbnail")
                .strips(vec![pixels(0x21, 32)]),
        )
        .add_ifd(
            IfdBuilder::new()
                .ascii(TAG_IMAGE_DESCRIPTION, "Overview Image")
                .strips(vec![pixels(0x41, 40)]),
        )
        .build()
}

pub const NDPI_DATE_TIME: &str = "2011:11:11 11:11:11";

/// Hamamatsu NDPI slide: two pyramid levels and the overview (lens -1).
pub fn hamamatsu_slide() -> BuiltTiff {
    hamamatsu_slide_dated(NDPI_DATE_TIME)
}

pub fn hamamatsu_slide_dated(date_time: &str) -> BuiltTiff {
    let level = |lens: f32, byte: u8| {
        IfdBuilder::new()
            .ascii(TAG_MAKE, "Hamamatsu")
            .ascii(TAG_DATE_TIME, date_time)
            .long(TAG_NDPI_FORMAT_FLAG, 1)
            .float(TAG_NDPI_SOURCE_LENS, lens)
            .strips(vec![pixels(byte, 64)])
    };
    TiffBuilder::new()
        .with_dialect(Dialect::Ndpi)
        .add_ifd(level(20.0, 0x11))
        .add_ifd(level(5.0, 0x12))
        .add_ifd(level(-1.0, 0x31))
        .build()
}

pub const PHILIPS_SERIAL: &str = "FMT0107";

/// Philips TIFF description with embedded label and macro pictures.
pub fn philips_xml() -> String {
    format!(r#"<?xml version="1.0" encoding="UTF-8" ?>{}"#, philips_data_object())
}

/// The `DPUfsImport` root element shared by Philips TIFF and iSyntax headers.
pub fn philips_data_object() -> String {
    concat!(
        r#"<DataObject ObjectType="DPUfsImport">"#,
        r#"<Attribute Name="DICOM_ACQUISITION_DATETIME" PMSVR="IString">20200101120000.000000</Attribute>"#,
        r#"<Attribute Name="DICOM_DEVICE_SERIAL_NUMBER" PMSVR="IString">FMT0107</Attribute>"#,
        r#"<Attribute Name="PIM_DP_UFS_BARCODE" PMSVR="IString">UzE5LTEyMzQ1</Attribute>"#,
        r#"<Attribute Name="PIM_DP_SCANNED_IMAGES" PMSVR="IDataObjectArray"><Array>"#,
        r#"<DataObject ObjectType="DPScannedImage">"#,
        r#"<Attribute Name="PIM_DP_IMAGE_TYPE" PMSVR="IString">LABELIMAGE</Attribute>"#,
        r#"<Attribute Name="PIM_DP_IMAGE_DATA" PMSVR="IString">/9j/4AAQSkZJRgABAQ==</Attribute>"#,
        r#"</DataObject>"#,
        r#"<DataObject ObjectType="DPScannedImage">"#,
        r#"<Attribute Name="PIM_DP_IMAGE_TYPE" PMSVR="IString">MACROIMAGE</Attribute>"#,
        r#"<Attribute Name="PIM_DP_IMAGE_DATA" PMSVR="IString">/9j/4BBQSkZJRgABAg==</Attribute>"#,
        r#"</DataObject>"#,
        r#"</Array></Attribute></DataObject>"#,
    )
    .to_string()
}

/// Philips TIFF slide: base level with the XML description, then label and
/// macro directories.
pub fn philips_tiff_slide() -> BuiltTiff {
    TiffBuilder::new()
        .with_dialect(Dialect::BigTiff)
        .add_ifd(
            IfdBuilder::new()
                .ascii(TAG_SOFTWARE, "Philips DP v1.0")
                .ascii(TAG_IMAGE_DESCRIPTION, &philips_xml())
                .tiles(vec![pixels(0x11, 64)]),
        )
        .add_ifd(
            IfdBuilder::new()
                .ascii(TAG_SOFTWARE, "Philips DP v1.0")
                .ascii(TAG_IMAGE_DESCRIPTION, "Label")
                .strips(vec![pixels(0x31, 40)]),
        )
        .add_ifd(
            IfdBuilder::new()
                .ascii(TAG_SOFTWARE, "Philips DP v1.0")
                .ascii(TAG_IMAGE_DESCRIPTION, "Macro")
                .strips(vec![pixels(0x41, 40)]),
        )
        .build()
}

// =============================================================================
// iSyntax
// =============================================================================

/// An iSyntax file: the XML header, the EOT byte and some image data.
pub fn isyntax_file() -> Vec<u8> {
    let mut data = vec![0xEF, 0xBB, 0xBF];
    data.extend_from_slice(philips_data_object().as_bytes());
    data.extend_from_slice(b"\r\n");
    data.push(0x04);
    data.extend_from_slice(&pixels(0x55, 256));
    data
}

// =============================================================================
// Mirax
// =============================================================================

pub const MIRAX_SLIDE_ID: &str = "3141592653589793";

const MIRAX_VERSION: &[u8] = b"01.02";

/// Levels of the scan data layer, with the byte their data is filled with.
pub const MIRAX_LEVELS: &[(&str, u8)] = &[
    ("ScanDataLayer_SlideThumbnail", 0x21),
    ("ScanDataLayer_SlideBarcode", 0x31),
    ("ScanDataLayer_SlidePreview", 0x41),
];

/// Size of every level record in the data file
pub const MIRAX_RECORD_SIZE: usize = 100;

/// Offset of the first record in the data file
pub const MIRAX_DATA_START: usize = 64;

pub fn mirax_slidedat() -> String {
    let mut ini = format!(
        "[GENERAL]\n\
         SLIDE_VERSION = 01.02\n\
         SLIDE_ID = {}\n\
         SLIDE_NAME = patient-42\n\
         PROJECT_NAME = study-7\n\
         SLIDE_CREATIONDATETIME = 12/12/2019 10:11:12\n\
         [HIERARCHICAL]\n\
         INDEXFILE = Index.dat\n\
         NONHIER_COUNT = 1\n\
         NONHIER_0_NAME = Scan data layer\n\
         NONHIER_0_COUNT = {}\n",
        MIRAX_SLIDE_ID,
        MIRAX_LEVELS.len()
    );
    for (i, (name, _)) in MIRAX_LEVELS.iter().enumerate() {
        ini.push_str(&format!(
            "NONHIER_0_VAL_{i} = {name}\nNONHIER_0_VAL_{i}_SECTION = NONHIER_0_VAL_{i}\n"
        ));
    }
    ini.push_str("[DATAFILE]\nFILE_COUNT = 1\nFILE_0 = Data0000.dat\n");
    for (i, (name, _)) in MIRAX_LEVELS.iter().enumerate() {
        ini.push_str(&format!("[NONHIER_0_VAL_{i}]\nIMAGE_TYPE = {name}\n"));
    }
    ini
}

fn put_i32(data: &mut [u8], offset: usize, value: i32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Index file: version and slide id, the two roots, the record table at 64,
/// list heads from 100 and pages from 200.
pub fn mirax_index() -> Vec<u8> {
    let mut data = vec![0u8; 200 + 40 * MIRAX_LEVELS.len()];
    data[..5].copy_from_slice(MIRAX_VERSION);
    data[5..5 + MIRAX_SLIDE_ID.len()].copy_from_slice(MIRAX_SLIDE_ID.as_bytes());
    put_i32(&mut data, 41, 64);

    for record in 0..MIRAX_LEVELS.len() {
        let head = 100 + 8 * record;
        let page = 200 + 40 * record;
        put_i32(&mut data, 64 + 4 * record, head as i32);
        put_i32(&mut data, head, 0);
        put_i32(&mut data, head + 4, page as i32);
        put_i32(&mut data, page, 1);
        put_i32(&mut data, page + 16, (MIRAX_DATA_START + record * MIRAX_RECORD_SIZE) as i32);
        put_i32(&mut data, page + 20, MIRAX_RECORD_SIZE as i32);
        put_i32(&mut data, page + 24, 0);
    }
    data
}

/// Data file: version and slide id, then one record per level.
pub fn mirax_data() -> Vec<u8> {
    let mut data = vec![0u8; MIRAX_DATA_START];
    data[..5].copy_from_slice(MIRAX_VERSION);
    data[5..5 + MIRAX_SLIDE_ID.len()].copy_from_slice(MIRAX_SLIDE_ID.as_bytes());
    for (_, byte) in MIRAX_LEVELS {
        data.extend_from_slice(&pixels(*byte, MIRAX_RECORD_SIZE));
    }
    data
}

/// Write `<dir>/<stem>.mrxs` and its companion folder; returns the `.mrxs` path.
pub fn write_mirax(dir: &Path, stem: &str) -> PathBuf {
    let companion = dir.join(stem);
    std::fs::create_dir_all(&companion).unwrap();
    std::fs::write(companion.join("Slidedat.ini"), mirax_slidedat()).unwrap();
    std::fs::write(companion.join("Index.dat"), mirax_index()).unwrap();
    std::fs::write(companion.join("Data0000.dat"), mirax_data()).unwrap();

    let path = dir.join(format!("{}.mrxs", stem));
    std::fs::write(&path, b"MRXS stub").unwrap();
    path
}

// =============================================================================
// Files
// =============================================================================

/// Write `data` to `<dir>/<name>`.
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

