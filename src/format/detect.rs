//! Vendor detection for whole-slide image files.
//!
//! Detection reads as little of the file as it can: a companion folder for
//! Mirax, the leading XML for iSyntax, and for TIFF-based slides the header
//! plus the tags that carry each vendor's signature.
//!
//! Detection never fails. A path that cannot be read is [`Vendor::Invalid`];
//! a readable file without a known signature is [`Vendor::Unknown`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::{BlockCache, LocalFile, RangeReader};

use super::philips::{is_isyntax_header, ISYNTAX_PROBE_BYTES};
use super::tiff::{Ifd, TiffChain, TiffTag, ValueReader};
use super::ventana::VENTANA_XMP_MARKER;

// =============================================================================
// Vendor
// =============================================================================

/// Slide vendor classification.
///
/// Codes are stable: new vendors get new codes and existing codes are never
/// reused. Codes this build does not know decode to [`Vendor::Future`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vendor {
    Aperio,
    Hamamatsu,
    Mirax,
    Ventana,
    PhilipsISyntax,
    PhilipsTiff,
    /// Readable, but no known signature
    Unknown,
    /// Not readable at all
    Invalid,
    /// A code assigned after this build
    Future(u16),
}

impl Vendor {
    /// Stable numeric code.
    pub const fn code(self) -> u16 {
        match self {
            Vendor::Aperio => 0,
            Vendor::Hamamatsu => 1,
            Vendor::Mirax => 2,
            Vendor::Ventana => 3,
            Vendor::PhilipsISyntax => 4,
            Vendor::PhilipsTiff => 5,
            Vendor::Unknown => 254,
            Vendor::Invalid => 255,
            Vendor::Future(code) => code,
        }
    }

    /// Decode a stable numeric code.
    pub const fn from_code(code: u16) -> Self {
        match code {
            0 => Vendor::Aperio,
            1 => Vendor::Hamamatsu,
            2 => Vendor::Mirax,
            3 => Vendor::Ventana,
            4 => Vendor::PhilipsISyntax,
            5 => Vendor::PhilipsTiff,
            254 => Vendor::Unknown,
            255 => Vendor::Invalid,
            other => Vendor::Future(other),
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Vendor::Aperio => "Aperio",
            Vendor::Hamamatsu => "Hamamatsu",
            Vendor::Mirax => "3DHistech (Mirax)",
            Vendor::Ventana => "Ventana",
            Vendor::PhilipsISyntax => "Philips iSyntax",
            Vendor::PhilipsTiff => "Philips TIFF",
            Vendor::Unknown => "Unknown",
            Vendor::Invalid => "Invalid",
            Vendor::Future(_) => "Unsupported vendor",
        }
    }

    /// Whether this build can anonymize files of this vendor.
    pub const fn is_supported(self) -> bool {
        !matches!(self, Vendor::Unknown | Vendor::Invalid | Vendor::Future(_))
    }

    /// Whether the vendor's slides are TIFF files.
    pub const fn is_tiff_based(self) -> bool {
        matches!(
            self,
            Vendor::Aperio | Vendor::Hamamatsu | Vendor::Ventana | Vendor::PhilipsTiff
        )
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Detection
// =============================================================================

/// Extension of the Mirax slide file
pub const MIRAX_EXTENSION: &str = "mrxs";

/// Name of the Mirax slide description inside the companion folder
pub const MIRAX_SLIDEDAT: &str = "Slidedat.ini";

/// Marker string for Aperio SVS format
const APERIO_MARKER: &str = "Aperio";

/// Prefix of the Software tag written by Philips scanners
const PHILIPS_SOFTWARE_PREFIX: &str = "Philips";

/// Maximum bytes to read from a tag value for detection
const MAX_MARKER_BYTES: u64 = 64 * 1024;

/// Classify the file at `path`.
///
/// Checks run in a fixed order: Mirax, Philips iSyntax, then the TIFF-based
/// vendors (Hamamatsu, Aperio, Ventana, Philips TIFF).
pub async fn sniff(path: &Path) -> Vendor {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) => {
            debug!("cannot stat {}: {}", path.display(), e);
            return Vendor::Invalid;
        }
    };
    if !metadata.is_file() || metadata.len() == 0 {
        debug!("{} is not a readable non-empty file", path.display());
        return Vendor::Invalid;
    }

    if has_extension(path, MIRAX_EXTENSION) {
        return if mirax_companion_dir(path)
            .map(|dir| dir.join(MIRAX_SLIDEDAT).is_file())
            .unwrap_or(false)
        {
            Vendor::Mirax
        } else {
            debug!("{} has no companion Slidedat.ini", path.display());
            Vendor::Unknown
        };
    }

    let file = match LocalFile::open(path).await {
        Ok(f) => f,
        Err(e) => {
            debug!("cannot open {}: {}", path.display(), e);
            return Vendor::Invalid;
        }
    };
    let reader = BlockCache::new(file);

    let probe_len = reader.size().min(ISYNTAX_PROBE_BYTES as u64) as usize;
    match reader.read_exact_at(0, probe_len).await {
        Ok(probe) if is_isyntax_header(&probe) => return Vendor::PhilipsISyntax,
        Ok(_) => {}
        Err(e) => {
            debug!("cannot read {}: {}", path.display(), e);
            return Vendor::Invalid;
        }
    }

    sniff_tiff(&reader).await
}

/// Classify a TIFF-based file.
pub async fn sniff_tiff<R: RangeReader>(reader: &R) -> Vendor {
    // A broken chain still gets classified from whatever was readable, so
    // that parsing later reports it as malformed rather than unknown.
    let (header, ifds) = match TiffChain::read(reader).await {
        Ok(chain) => (chain.header, chain.ifds),
        Err(e) => {
            debug!("TIFF chain of {} unreadable: {}", reader.identifier(), e);
            match first_directory(reader).await {
                Some(found) => found,
                None => return Vendor::Unknown,
            }
        }
    };

    let Some(first) = ifds.first() else {
        return Vendor::Unknown;
    };
    let values = ValueReader::new(reader, &header);

    if first.get_entry_by_tag(TiffTag::NdpiFormatFlag).is_some() {
        return Vendor::Hamamatsu;
    }

    if let Some(description) = read_text(&values, first, TiffTag::ImageDescription).await {
        if description.contains(APERIO_MARKER) {
            return Vendor::Aperio;
        }
    }

    for ifd in &ifds {
        if let Some(xmp) = read_text(&values, ifd, TiffTag::Xmp).await {
            if xmp.contains(VENTANA_XMP_MARKER) {
                return Vendor::Ventana;
            }
        }
    }

    if let Some(software) = read_text(&values, first, TiffTag::Software).await {
        if software.starts_with(PHILIPS_SOFTWARE_PREFIX) {
            return Vendor::PhilipsTiff;
        }
    }

    Vendor::Unknown
}

async fn first_directory<R: RangeReader>(
    reader: &R,
) -> Option<(super::tiff::TiffHeader, Vec<Ifd>)> {
    let header = TiffChain::read_header(reader).await.ok()?;
    let count_size = header.ifd_count_size();
    let count = reader
        .read_exact_at(header.first_ifd_offset, count_size)
        .await
        .ok()?;
    let size = Ifd::calculate_size(Ifd::read_entry_count(&count, &header), &header)?;
    let bytes = reader
        .read_exact_at(header.first_ifd_offset, usize::try_from(size).ok()?)
        .await
        .ok()?;
    let ifd = Ifd::parse(&bytes, header.first_ifd_offset, &header).ok()?;
    Some((header, vec![ifd]))
}

/// Read a text tag, bounded to [`MAX_MARKER_BYTES`]. Any failure is `None`.
async fn read_text<R: RangeReader>(
    values: &ValueReader<'_, R>,
    ifd: &Ifd,
    tag: TiffTag,
) -> Option<String> {
    let entry = ifd.get_entry_by_tag(tag)?;
    if entry.value_byte_size()? > MAX_MARKER_BYTES {
        return None;
    }
    values.read_string(entry).await.ok()
}

/// Case-insensitive extension check.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Companion folder of a Mirax slide: `<dir>/<stem>/`.
pub fn mirax_companion_dir(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?;
    Some(path.with_file_name(stem))
}

// =============================================================================
// Tests
// =============================================================================
