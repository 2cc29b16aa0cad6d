//! TIFF structure reading for slide containers.
//!
//! Aperio, Hamamatsu, Ventana and Philips TIFF slides are all TIFF files
//! underneath. This module reads just enough of them to anonymize: the
//! header, the directory chain and the tag values.
//!
//! # Key Concepts
//!
//! - **Byte order**: TIFF files declare their endianness (II = little-endian, MM = big-endian)
//!   in the header. All multi-byte values must be read and written respecting this order.
//!
//! - **Dialects**: Classic TIFF uses 32-bit offsets, BigTIFF uses 64-bit offsets, and
//!   Hamamatsu NDPI is classic TIFF with 64-bit next-directory pointers.
//!
//! - **IFD (Image File Directory)**: Contains metadata and pointers to image data.
//!   Slides have one IFD per pyramid level plus the label, macro and thumbnail images.
//!
//! - **Inline vs offset values**: Small values are stored inline in the IFD entry,
//!   larger values are stored at an offset pointed to by the entry.

mod chain;
mod parser;
mod tags;
mod values;

pub use chain::{TiffChain, MAX_DIRECTORIES};
pub use parser::{
    fix_ndpi_offset, ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE,
};
pub use tags::{FieldType, TiffTag, TEXT_TAGS};
pub use values::{parse_u64_array, ValueReader};
