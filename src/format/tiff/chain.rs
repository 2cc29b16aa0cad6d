//! IFD chain walking.
//!
//! Every TIFF-based slide is a singly linked list of directories: the header
//! points at the first IFD, and each IFD ends with a pointer to the next.
//! The anonymizer needs the whole chain, in order, with each directory's
//! position and next-pointer slot, so it can later repoint links around
//! removed associated images.
//!
//! The walk refuses anything a careless reader would loop on or run off the
//! end of: revisited offsets, directories that do not fit in the file, and
//! chains longer than [`MAX_DIRECTORIES`].

use std::collections::HashSet;

use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{Ifd, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
use super::tags::TiffTag;

/// Maximum number of IFDs accepted in one chain
pub const MAX_DIRECTORIES: usize = 1024;

/// The parsed header and every directory of a TIFF file, in chain order.
#[derive(Debug, Clone)]
pub struct TiffChain {
    pub header: TiffHeader,
    pub ifds: Vec<Ifd>,
}

impl TiffChain {
    /// Read and validate the header of a TIFF file.
    pub async fn read_header<R: RangeReader>(reader: &R) -> Result<TiffHeader, TiffError> {
        let size = reader.size();
        if size < TIFF_HEADER_SIZE as u64 {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: size,
            });
        }
        let len = size.min(BIGTIFF_HEADER_SIZE as u64) as usize;
        let bytes = reader.read_exact_at(0, len).await?;
        TiffHeader::parse(&bytes, size)
    }

    /// Walk the whole directory chain.
    ///
    /// The NDPI dialect is recognized from the first directory: when it
    /// carries the NDPI format flag, the header switches to 8-byte next
    /// pointers and the first directory is re-read.
    pub async fn read<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let mut header = Self::read_header(reader).await?;

        let first = read_ifd(reader, &header, header.first_ifd_offset).await?;
        let first = if !header.is_bigtiff
            && first.get_entry_by_tag(TiffTag::NdpiFormatFlag).is_some()
        {
            debug!("NDPI format flag found, switching to 8-byte next pointers");
            header = header.with_ndpi();
            read_ifd(reader, &header, header.first_ifd_offset).await?
        } else {
            first
        };

        let mut visited = HashSet::new();
        visited.insert(first.offset);

        let mut offset = first.next_ifd_offset;
        let mut ifds = vec![first];

        while offset != 0 {
            if !visited.insert(offset) {
                return Err(TiffError::DirectoryCycle(offset));
            }
            if ifds.len() >= MAX_DIRECTORIES {
                return Err(TiffError::TooManyDirectories(MAX_DIRECTORIES));
            }

            let ifd = read_ifd(reader, &header, offset).await?;
            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        debug!(
            directories = ifds.len(),
            bigtiff = header.is_bigtiff,
            ndpi = header.is_ndpi,
            "walked IFD chain of {}",
            reader.identifier()
        );

        Ok(Self { header, ifds })
    }
}

/// Read a single directory at `offset`, checking that it fits in the file.
async fn read_ifd<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    offset: u64,
) -> Result<Ifd, TiffError> {
    let size = reader.size();
    let count_size = header.ifd_count_size() as u64;
    if offset < header.header_size() as u64
        || offset.checked_add(count_size).map_or(true, |end| end > size)
    {
        return Err(TiffError::InvalidIfdOffset(offset));
    }

    // Read just the entry count first, then the whole directory
    let count_bytes = reader.read_exact_at(offset, count_size as usize).await?;
    let entry_count = Ifd::read_entry_count(&count_bytes, header);

    let ifd_size = Ifd::calculate_size(entry_count, header)
        .filter(|len| offset.checked_add(*len).is_some_and(|end| end <= size))
        .ok_or(TiffError::InvalidIfdOffset(offset))?;

    let ifd_bytes = reader.read_exact_at(offset, ifd_size as usize).await?;
    Ifd::parse(&ifd_bytes, offset, header)
}

// =============================================================================
// Tests
// =============================================================================
