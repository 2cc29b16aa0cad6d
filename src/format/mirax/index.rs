//! `Index.dat` record lookup.
//!
//! The index file starts with a 5-byte version string and the slide id,
//! followed by two little-endian i32 roots: the hierarchical root at 37 and
//! the non-hierarchical root at 41. The non-hierarchical root points at a
//! table of one i32 per record; each slot points at a list head:
//!
//! ```text
//! list head:  0, page pointer
//! page:       1, (skipped), 0, 0, position, size, file number
//! ```
//!
//! Position and size locate the record's bytes in data file `FILE_<n>`.

use crate::error::FormatError;
use crate::io::{read_i32_le, RangeReader};

/// Offset of the slide id in index and data files
pub const SLIDE_ID_OFFSET: u64 = 5;

/// Offset of the non-hierarchical table root
pub const NONHIER_ROOT_OFFSET: u64 = 41;

const VENDOR: &str = "Mirax";

/// Where a non-hierarchical record's data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLocation {
    /// File position of the record's table slot in Index.dat
    pub slot: u64,
    /// Offset of the data in its data file
    pub position: u64,
    /// Byte length of the data
    pub size: u64,
    /// Index into the `[DATAFILE]` file list
    pub file_number: usize,
}

/// Read a non-negative i32 at `offset`.
async fn read_pointer<R: RangeReader>(reader: &R, offset: u64) -> Result<u64, FormatError> {
    let bytes = reader.read_exact_at(offset, 4).await?;
    let value = read_i32_le(&bytes);
    u64::try_from(value).map_err(|_| {
        FormatError::malformed(VENDOR, format!("negative value {} at offset {}", value, offset))
    })
}

async fn expect_value<R: RangeReader>(
    reader: &R,
    offset: u64,
    expected: i32,
    what: &str,
) -> Result<(), FormatError> {
    let bytes = reader.read_exact_at(offset, 4).await?;
    let value = read_i32_le(&bytes);
    if value != expected {
        return Err(FormatError::malformed(
            VENDOR,
            format!("{} at offset {}: expected {}, found {}", what, offset, expected, value),
        ));
    }
    Ok(())
}

/// File position of the non-hierarchical record table.
pub async fn table_base<R: RangeReader>(reader: &R) -> Result<u64, FormatError> {
    read_pointer(reader, NONHIER_ROOT_OFFSET).await
}

/// Follow the index structure to the data location of `record`.
pub async fn locate_record<R: RangeReader>(
    reader: &R,
    record: usize,
) -> Result<RecordLocation, FormatError> {
    let base = table_base(reader).await?;
    let slot = base + 4 * record as u64;

    let list_head = read_pointer(reader, slot).await?;
    expect_value(reader, list_head, 0, "list head").await?;
    let page = read_pointer(reader, list_head + 4).await?;

    expect_value(reader, page, 1, "page marker").await?;
    expect_value(reader, page + 8, 0, "page padding").await?;
    expect_value(reader, page + 12, 0, "page padding").await?;

    let position = read_pointer(reader, page + 16).await?;
    let size = read_pointer(reader, page + 20).await?;
    let file_number = read_pointer(reader, page + 24).await? as usize;

    Ok(RecordLocation {
        slot,
        position,
        size,
        file_number,
    })
}

/// Rebuild the record table with `removed` records taken out.
///
/// Later slots shift down; the freed slots at the end of the table are
/// zeroed. Returns the new table bytes, to be written at the table base.
pub fn compact_table(table: &[u8], removed: &[usize]) -> Vec<u8> {
    let slots: Vec<&[u8]> = table.chunks_exact(4).collect();
    let mut out: Vec<u8> = slots
        .iter()
        .enumerate()
        .filter(|(i, _)| !removed.contains(i))
        .flat_map(|(_, slot)| slot.iter().copied())
        .collect();
    out.resize(slots.len() * 4, 0);
    out
}
