//! TIFF tag and field type definitions.
//!
//! This module defines the vocabulary for TIFF parsing, including:
//! - Field types that determine how values are encoded
//! - Tag IDs that identify metadata fields and image data locations
//!
//! The definitions support classic TIFF, BigTIFF and the Hamamatsu NDPI dialect.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// TIFF field types that determine how values are encoded.
///
/// Every type from TIFF 6.0 and BigTIFF is defined: an anonymizer must be able
/// to size (and therefore skip or relocate) any entry, even one whose content
/// it never interprets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// Unsigned 8-bit integer
    Byte = 1,
    /// 8-bit ASCII character, NUL terminated
    Ascii = 2,
    /// Unsigned 16-bit integer
    Short = 3,
    /// Unsigned 32-bit integer
    Long = 4,
    /// Two LONGs: numerator and denominator
    Rational = 5,
    /// Signed 8-bit integer
    SByte = 6,
    /// Undefined byte data
    Undefined = 7,
    /// Signed 16-bit integer
    SShort = 8,
    /// Signed 32-bit integer
    SLong = 9,
    /// Two SLONGs: numerator and denominator
    SRational = 10,
    /// IEEE single precision float
    Float = 11,
    /// IEEE double precision float
    Double = 12,
    /// 32-bit IFD offset
    Ifd = 13,
    /// Unsigned 64-bit integer (BigTIFF)
    Long8 = 16,
    /// Signed 64-bit integer (BigTIFF)
    SLong8 = 17,
    /// 64-bit IFD offset (BigTIFF)
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value of this type in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float | FieldType::Ifd => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }

    /// Create a FieldType from its numeric value.
    ///
    /// Returns `None` for unknown type values.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            6 => Some(FieldType::SByte),
            7 => Some(FieldType::Undefined),
            8 => Some(FieldType::SShort),
            9 => Some(FieldType::SLong),
            10 => Some(FieldType::SRational),
            11 => Some(FieldType::Float),
            12 => Some(FieldType::Double),
            13 => Some(FieldType::Ifd),
            16 => Some(FieldType::Long8),
            17 => Some(FieldType::SLong8),
            18 => Some(FieldType::Ifd8),
            _ => None,
        }
    }

    /// Whether values of this type are byte strings that can carry text
    /// (ASCII, BYTE and UNDEFINED; XMP packets use the latter two).
    #[inline]
    pub const fn is_byte_string(self) -> bool {
        matches!(
            self,
            FieldType::Ascii | FieldType::Byte | FieldType::Undefined
        )
    }

    /// Maximum bytes that can be stored inline in a classic TIFF IFD entry.
    pub const INLINE_THRESHOLD_TIFF: usize = 4;

    /// Maximum bytes that can be stored inline in a BigTIFF IFD entry.
    pub const INLINE_THRESHOLD_BIGTIFF: usize = 8;

    /// Check if a value with this type and count fits inline in a TIFF entry.
    ///
    /// # Arguments
    /// * `count` - Number of values
    /// * `is_bigtiff` - Whether this is a BigTIFF file
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff {
            Self::INLINE_THRESHOLD_BIGTIFF as u64
        } else {
            Self::INLINE_THRESHOLD_TIFF as u64
        };
        (self.size_in_bytes() as u64)
            .checked_mul(count)
            .is_some_and(|total| total <= threshold)
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

/// TIFF tag IDs relevant to anonymization.
///
/// Only tags that either carry identifying text, locate pixel data that may
/// need wiping, or classify a directory are named here. Everything else is
/// carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum TiffTag {
    // -------------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------------
    NewSubfileType = 254,
    ImageWidth = 256,
    ImageLength = 257,
    Compression = 259,

    // -------------------------------------------------------------------------
    // Text tags (candidates for identifying content)
    // -------------------------------------------------------------------------
    DocumentName = 269,
    ImageDescription = 270,
    Make = 271,
    Model = 272,
    PageName = 285,
    Software = 305,
    DateTime = 306,
    Artist = 315,
    HostComputer = 316,
    Copyright = 33432,

    /// XMP packet (Ventana stores its scanner metadata here)
    Xmp = 700,

    // -------------------------------------------------------------------------
    // Pixel data location
    // -------------------------------------------------------------------------
    StripOffsets = 273,
    StripByteCounts = 279,
    TileOffsets = 324,
    TileByteCounts = 325,

    // -------------------------------------------------------------------------
    // Hamamatsu NDPI private tags
    // -------------------------------------------------------------------------
    /// Present in every NDPI file
    NdpiFormatFlag = 65420,
    /// Objective magnification; -1 marks the slide overview image
    NdpiSourceLens = 65421,
}

/// Text tags exposed as `tiff.<Name>` entries in the container model.
pub const TEXT_TAGS: &[TiffTag] = &[
    TiffTag::DocumentName,
    TiffTag::ImageDescription,
    TiffTag::Make,
    TiffTag::Model,
    TiffTag::PageName,
    TiffTag::Software,
    TiffTag::DateTime,
    TiffTag::Artist,
    TiffTag::HostComputer,
    TiffTag::Copyright,
];

impl TiffTag {
    /// Create a TiffTag from its numeric value.
    ///
    /// Returns `None` for unrecognized tags. Unknown tags are not an error;
    /// they are carried through verbatim.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            254 => Some(TiffTag::NewSubfileType),
            256 => Some(TiffTag::ImageWidth),
            257 => Some(TiffTag::ImageLength),
            259 => Some(TiffTag::Compression),
            269 => Some(TiffTag::DocumentName),
            270 => Some(TiffTag::ImageDescription),
            271 => Some(TiffTag::Make),
            272 => Some(TiffTag::Model),
            273 => Some(TiffTag::StripOffsets),
            279 => Some(TiffTag::StripByteCounts),
            285 => Some(TiffTag::PageName),
            305 => Some(TiffTag::Software),
            306 => Some(TiffTag::DateTime),
            315 => Some(TiffTag::Artist),
            316 => Some(TiffTag::HostComputer),
            324 => Some(TiffTag::TileOffsets),
            325 => Some(TiffTag::TileByteCounts),
            700 => Some(TiffTag::Xmp),
            33432 => Some(TiffTag::Copyright),
            65420 => Some(TiffTag::NdpiFormatFlag),
            65421 => Some(TiffTag::NdpiSourceLens),
            _ => None,
        }
    }

    /// Get the numeric tag ID.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Name used in `tiff.<Name>` tag keys.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::NewSubfileType => "NewSubfileType",
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::Compression => "Compression",
            TiffTag::DocumentName => "DocumentName",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::Make => "Make",
            TiffTag::Model => "Model",
            TiffTag::PageName => "PageName",
            TiffTag::Software => "Software",
            TiffTag::DateTime => "DateTime",
            TiffTag::Artist => "Artist",
            TiffTag::HostComputer => "HostComputer",
            TiffTag::Copyright => "Copyright",
            TiffTag::Xmp => "XMP",
            TiffTag::StripOffsets => "StripOffsets",
            TiffTag::StripByteCounts => "StripByteCounts",
            TiffTag::TileOffsets => "TileOffsets",
            TiffTag::TileByteCounts => "TileByteCounts",
            TiffTag::NdpiFormatFlag => "NdpiFormatFlag",
            TiffTag::NdpiSourceLens => "NdpiSourceLens",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
