//! TIFF header and directory parsing.
//!
//! This module handles parsing of TIFF, BigTIFF and NDPI headers and
//! directories. Unlike a viewer, the anonymizer needs to know where every
//! field lives on disk, so entries remember their own file position and
//! directories remember where their next-pointer slot is.
//!
//! # TIFF Header Structure
//!
//! ## Classic TIFF (8 bytes)
//! ```text
//! Bytes 0-1: Byte order (0x4949 = little-endian "II", 0x4D4D = big-endian "MM")
//! Bytes 2-3: Version (42 = 0x002A)
//! Bytes 4-7: Offset to first IFD (4 bytes)
//! ```
//!
//! ## BigTIFF (16 bytes)
//! ```text
//! Bytes 0-1: Byte order
//! Bytes 2-3: Version (43 = 0x002B)
//! Bytes 4-5: Offset byte size (must be 8)
//! Bytes 6-7: Reserved (must be 0)
//! Bytes 8-15: Offset to first IFD (8 bytes)
//! ```
//!
//! ## NDPI
//!
//! Hamamatsu files use the classic header and classic 12-byte entries, but
//! every next-IFD pointer is 8 bytes wide. In-entry offsets stay 32 bits and
//! are widened with [`fix_ndpi_offset`].

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};

use super::tags::{FieldType, TiffTag};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes indicating little-endian byte order ("II" for Intel)
const BYTE_ORDER_LITTLE_ENDIAN: u16 = 0x4949;

/// Magic bytes indicating big-endian byte order ("MM" for Motorola)
const BYTE_ORDER_BIG_ENDIAN: u16 = 0x4D4D;

/// Version number for classic TIFF
const VERSION_TIFF: u16 = 42;

/// Version number for BigTIFF
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

const FOUR_GIB: u64 = 1 << 32;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order (endianness) of a TIFF file.
///
/// TIFF files declare their byte order in the first two bytes of the header.
/// All multi-byte values in the file must be read and written respecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian ("II" = Intel)
    LittleEndian,
    /// Big-endian ("MM" = Motorola)
    BigEndian,
}

impl ByteOrder {
    /// Read a u16 from a byte slice using this byte order.
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    /// Read a u32 from a byte slice using this byte order.
    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    /// Read a u64 from a byte slice using this byte order.
    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }

    /// Encode a u32 in this byte order.
    #[inline]
    pub fn u32_bytes(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    /// Encode a u64 in this byte order.
    #[inline]
    pub fn u64_bytes(self, value: u64) -> [u8; 8] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    /// Encode an unsigned value into `width` bytes (4 or 8).
    ///
    /// For a 4-byte width the value is truncated to its low 32 bits, which is
    /// what both classic TIFF and NDPI in-entry offsets store.
    pub fn encode_uint(self, value: u64, width: usize) -> Vec<u8> {
        if width == 8 {
            self.u64_bytes(value).to_vec()
        } else {
            self.u32_bytes(value as u32).to_vec()
        }
    }

    /// Decode an unsigned value of `width` bytes (2, 4 or 8).
    pub fn decode_uint(self, bytes: &[u8], width: usize) -> u64 {
        match width {
            2 => self.read_u16(bytes) as u64,
            4 => self.read_u32(bytes) as u64,
            _ => self.read_u64(bytes),
        }
    }
}

/// Widen a 32-bit NDPI offset relative to the directory that references it.
///
/// NDPI stores pixel data before the directory describing it, so the high
/// half of the real offset is taken from the directory's own offset. When
/// that lands at or past the directory, the data must be in the previous
/// 4 GiB window.
pub fn fix_ndpi_offset(directory_offset: u64, value: u64) -> u64 {
    let widened = (directory_offset & !0xFFFF_FFFF) | (value & 0xFFFF_FFFF);
    if widened >= directory_offset && widened >= FOUR_GIB {
        widened - FOUR_GIB
    } else {
        widened
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
///
/// Contains the essential information needed to walk and edit directories:
/// - Byte order for every multi-byte value in the file
/// - The dialect (classic, BigTIFF or NDPI), which fixes field widths
/// - Location of the first IFD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    /// Byte order for all multi-byte values in the file
    pub byte_order: ByteOrder,

    /// Whether this is a BigTIFF file (64-bit offsets)
    pub is_bigtiff: bool,

    /// Whether next-IFD pointers use the 8-byte NDPI layout
    pub is_ndpi: bool,

    /// Offset to the first IFD in the file
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse a TIFF header from raw bytes.
    ///
    /// The input must contain at least 8 bytes for classic TIFF or 16 bytes
    /// for BigTIFF. The NDPI dialect cannot be recognized from the header
    /// alone; see [`TiffHeader::with_ndpi`].
    ///
    /// # Errors
    /// - `InvalidMagic` if byte order bytes are not II or MM
    /// - `InvalidVersion` if version is not 42 or 43
    /// - `InvalidBigTiffOffsetSize` if BigTIFF offset size is not 8
    /// - `FileTooSmall` if there aren't enough bytes for the header
    /// - `InvalidIfdOffset` if the first IFD offset is outside the file
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        // Checking for specific byte patterns, so read as little-endian
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        let byte_order = match magic {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(magic)),
        };

        let version = byte_order.read_u16(&bytes[2..4]);

        let (is_bigtiff, first_ifd_offset) = match version {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }

                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }

                (true, byte_order.read_u64(&bytes[8..16]))
            }
            _ => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            is_ndpi: false,
            first_ifd_offset,
        })
    }

    /// Switch a classic header to the NDPI dialect.
    ///
    /// BigTIFF headers are returned unchanged; NDPI is always classic.
    pub fn with_ndpi(self) -> Self {
        Self {
            is_ndpi: !self.is_bigtiff,
            ..self
        }
    }

    /// Size of the header itself.
    #[inline]
    pub const fn header_size(&self) -> usize {
        if self.is_bigtiff {
            BIGTIFF_HEADER_SIZE
        } else {
            TIFF_HEADER_SIZE
        }
    }

    /// File position of the first-IFD pointer in the header.
    #[inline]
    pub const fn first_ifd_slot(&self) -> u64 {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Width of the first-IFD pointer in the header.
    #[inline]
    pub const fn first_ifd_slot_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Size of an IFD entry in bytes.
    ///
    /// Classic TIFF and NDPI: 12 bytes (2 tag + 2 type + 4 count + 4 value/offset)
    /// BigTIFF: 20 bytes (2 tag + 2 type + 8 count + 8 value/offset)
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Size of the entry count field at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Size of the count field inside an IFD entry.
    #[inline]
    pub const fn entry_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Size of the next IFD offset field at the end of an IFD.
    ///
    /// Classic TIFF: 4 bytes. BigTIFF and NDPI: 8 bytes.
    #[inline]
    pub const fn ifd_next_offset_size(&self) -> usize {
        if self.is_bigtiff || self.is_ndpi {
            8
        } else {
            4
        }
    }

    /// Size of the value/offset field in an IFD entry.
    ///
    /// This determines the inline value threshold.
    #[inline]
    pub const fn value_offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// A single entry of an Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    /// Tag identifier
    pub tag_id: u16,

    /// Decoded field type, `None` when the type value is not recognized
    pub field_type: Option<FieldType>,

    /// Raw field type value as stored
    pub field_type_raw: u16,

    /// Number of values
    pub count: u64,

    /// The raw value/offset field (4 bytes classic, 8 bytes BigTIFF)
    pub value_offset_bytes: Vec<u8>,

    /// Whether the value is stored inline in `value_offset_bytes`
    pub is_inline: bool,

    /// File position of this entry
    pub position: u64,

    /// Offset of the out-of-line value, already widened for NDPI
    pub data_offset: Option<u64>,
}

impl IfdEntry {
    /// Total size of the entry's value in bytes.
    ///
    /// Returns `None` for unknown field types or when the size overflows.
    pub fn value_byte_size(&self) -> Option<u64> {
        let field_type = self.field_type?;
        (field_type.size_in_bytes() as u64).checked_mul(self.count)
    }

    /// Raw value/offset field interpreted as an offset.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        byte_order.decode_uint(&self.value_offset_bytes, self.value_offset_bytes.len())
    }

    /// File position of the count field.
    #[inline]
    pub fn count_position(&self) -> u64 {
        self.position + 4
    }

    /// File position of the value/offset field.
    #[inline]
    pub fn value_slot_position(&self, header: &TiffHeader) -> u64 {
        self.count_position() + header.entry_count_size() as u64
    }

    /// Inline single value as u32 (SHORT or LONG with count 1).
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }

    /// Inline single value as u64 (SHORT, LONG or LONG8 with count 1).
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        if let Some(value) = self.inline_u32(byte_order) {
            return Some(value as u64);
        }
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Long8 | FieldType::Ifd8 if self.value_offset_bytes.len() >= 8 => {
                Some(byte_order.read_u64(&self.value_offset_bytes))
            }
            _ => None,
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ifd {
    /// File offset of this directory (its entry count field)
    pub offset: u64,

    /// Entries in on-disk order
    pub entries: Vec<IfdEntry>,

    /// Offset of the next directory, 0 at the end of the chain
    pub next_ifd_offset: u64,

    /// File position of the next-IFD pointer
    pub next_pointer_position: u64,
}

impl Ifd {
    /// Total byte size of a directory with `entry_count` entries,
    /// including the count field and the next pointer.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> Option<u64> {
        (header.ifd_entry_size() as u64)
            .checked_mul(entry_count)?
            .checked_add(header.ifd_count_size() as u64)?
            .checked_add(header.ifd_next_offset_size() as u64)
    }

    /// Read the entry count from the start of a directory.
    pub fn read_entry_count(bytes: &[u8], header: &TiffHeader) -> u64 {
        header
            .byte_order
            .decode_uint(bytes, header.ifd_count_size())
    }

    /// Parse a directory from `bytes`, which must start at `offset` and
    /// cover the whole directory (see [`Ifd::calculate_size`]).
    pub fn parse(bytes: &[u8], offset: u64, header: &TiffHeader) -> Result<Self, TiffError> {
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let entry_count = Self::read_entry_count(bytes, header);
        let total = Self::calculate_size(entry_count, header)
            .ok_or(TiffError::InvalidIfdOffset(offset))?;
        if (bytes.len() as u64) < total {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let byte_order = header.byte_order;
        let entry_size = header.ifd_entry_size();
        let count_width = header.entry_count_size();
        let slot_width = header.value_offset_size();

        let mut entries = Vec::with_capacity(entry_count as usize);
        for i in 0..entry_count as usize {
            let start = count_size + i * entry_size;
            let raw = &bytes[start..start + entry_size];

            let tag_id = byte_order.read_u16(&raw[0..2]);
            let field_type_raw = byte_order.read_u16(&raw[2..4]);
            let field_type = FieldType::from_u16(field_type_raw);
            let count = byte_order.decode_uint(&raw[4..4 + count_width], count_width);
            let value_offset_bytes = raw[4 + count_width..4 + count_width + slot_width].to_vec();

            let is_inline = field_type.is_some_and(|t| t.fits_inline(count, header.is_bigtiff));

            let data_offset = if is_inline || field_type.is_none() {
                None
            } else {
                let raw_offset = byte_order.decode_uint(&value_offset_bytes, slot_width);
                Some(if header.is_ndpi {
                    fix_ndpi_offset(offset, raw_offset)
                } else {
                    raw_offset
                })
            };

            entries.push(IfdEntry {
                tag_id,
                field_type,
                field_type_raw,
                count,
                value_offset_bytes,
                is_inline,
                position: offset + start as u64,
                data_offset,
            });
        }

        let next_start = count_size + entry_count as usize * entry_size;
        let next_width = header.ifd_next_offset_size();
        let next_ifd_offset =
            byte_order.decode_uint(&bytes[next_start..next_start + next_width], next_width);

        Ok(Ifd {
            offset,
            entries,
            next_ifd_offset,
            next_pointer_position: offset + next_start as u64,
        })
    }

    /// Look up an entry by known tag.
    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.get_entry(tag.as_u16())
    }

    /// Look up an entry by raw tag ID.
    pub fn get_entry(&self, tag_id: u16) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag_id == tag_id)
    }

    /// Byte size of the directory on disk.
    pub fn byte_size(&self, header: &TiffHeader) -> u64 {
        Self::calculate_size(self.entries.len() as u64, header).unwrap_or(0)
    }
}

// =============================================================================
// Tests
// =============================================================================
