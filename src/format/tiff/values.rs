//! TIFF tag value reading.
//!
//! Values can be stored either inline in the IFD entry (for small values)
//! or at an offset in the file (for larger values like arrays and strings).
//! Array values are fetched in a single range request.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{fix_ndpi_offset, ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values from a TIFF file.
///
/// Combines a RangeReader with the header so values are decoded in the
/// file's byte order and dialect.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    /// Create a new ValueReader.
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Get the byte order from the header.
    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Read raw bytes for an IFD entry's value.
    ///
    /// For inline values, returns the bytes from the entry.
    /// For offset values, fetches the bytes from the file.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        match entry.data_offset {
            Some(offset) => {
                let len = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
                    tag: "value",
                    message: format!("value of {} bytes is too large", size),
                })?;
                Ok(self.reader.read_exact_at(offset, len).await?)
            }
            None => Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            )),
        }
    }

    /// Read an array of unsigned values as u64.
    ///
    /// Handles Short, Long, Long8 and the IFD offset types.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        match field_type {
            FieldType::Short
            | FieldType::Long
            | FieldType::Ifd
            | FieldType::Long8
            | FieldType::Ifd8 => Ok(parse_u64_array(
                &bytes,
                entry.count as usize,
                field_type,
                self.header.byte_order,
            )),
            _ => Err(TiffError::InvalidTagValue {
                tag: "array",
                message: format!(
                    "expected Short, Long, or Long8 for array, got {:?}",
                    field_type
                ),
            }),
        }
    }

    /// Read an array of file offsets (StripOffsets, TileOffsets).
    ///
    /// In NDPI files each 32-bit offset is widened relative to the
    /// directory at `directory_offset`.
    pub async fn read_offsets(
        &self,
        entry: &IfdEntry,
        directory_offset: u64,
    ) -> Result<Vec<u64>, TiffError> {
        let values = self.read_u64_array(entry).await?;
        if !self.header.is_ndpi {
            return Ok(values);
        }
        Ok(values
            .into_iter()
            .map(|v| fix_ndpi_offset(directory_offset, v))
            .collect())
    }

    /// Read a string value (ASCII, BYTE or UNDEFINED).
    ///
    /// The value is cut at the first NUL; invalid UTF-8 is replaced.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if !field_type.is_byte_string() {
            return Err(TiffError::InvalidTagValue {
                tag: "string",
                message: format!("expected Ascii type for string, got {:?}", field_type),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read a single numeric value as f64.
    ///
    /// Accepts the integer types and FLOAT/DOUBLE. NDPI SourceLens is a FLOAT.
    pub async fn read_f64(&self, entry: &IfdEntry) -> Result<f64, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.count == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: "number",
                message: "empty value".to_string(),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let order = self.header.byte_order;
        let value = match field_type {
            FieldType::Float => f32::from_bits(order.read_u32(&bytes)) as f64,
            FieldType::Double => f64::from_bits(order.read_u64(&bytes)),
            FieldType::Byte => bytes[0] as f64,
            FieldType::SByte => bytes[0] as i8 as f64,
            FieldType::Short => order.read_u16(&bytes) as f64,
            FieldType::SShort => order.read_u16(&bytes) as i16 as f64,
            FieldType::Long | FieldType::Ifd => order.read_u32(&bytes) as f64,
            FieldType::SLong => order.read_u32(&bytes) as i32 as f64,
            FieldType::Long8 | FieldType::Ifd8 => order.read_u64(&bytes) as f64,
            FieldType::SLong8 => order.read_u64(&bytes) as i64 as f64,
            FieldType::Rational | FieldType::SRational | FieldType::Ascii | FieldType::Undefined => {
                return Err(TiffError::InvalidTagValue {
                    tag: "number",
                    message: format!("expected a numeric type, got {:?}", field_type),
                })
            }
        };
        Ok(value)
    }
}

// =============================================================================
// Convenience functions for reading from bytes directly
// =============================================================================

/// Parse an array of unsigned values from raw bytes.
///
/// Values that would run past the end of `bytes` are dropped.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    if !matches!(width, 2 | 4 | 8) {
        return Vec::new();
    }

    bytes
        .chunks_exact(width)
        .take(count)
        .map(|chunk| byte_order.decode_uint(chunk, width))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
