//! Generic model of a slide container.
//!
//! Every vendor format is parsed into the same shape: an ordered list of
//! [`Directory`] values (one per pyramid level or associated image), each
//! holding typed [`TagEntry`] values and the spans of its pixel data. The
//! physical storage of editable values is kept apart as [`Field`]s, so that
//! redaction can rewrite the bytes without knowing the vendor.
//!
//! A container is built fresh for every request, mutated in memory by
//! redaction and unlinking, and then handed to the rewrite engine.

mod isyntax;
mod mirax;
mod tiff;

use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FormatError;
use crate::format::mirax::{IniDocument, MiraxSlide};
use crate::format::tiff::TiffHeader;
use crate::format::Vendor;

// =============================================================================
// Roles
// =============================================================================

/// Associated-image role of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociatedRole {
    Label,
    Macro,
    Thumbnail,
    None,
}

impl AssociatedRole {
    pub const fn name(self) -> &'static str {
        match self {
            AssociatedRole::Label => "label",
            AssociatedRole::Macro => "macro",
            AssociatedRole::Thumbnail => "thumbnail",
            AssociatedRole::None => "none",
        }
    }
}

impl fmt::Display for AssociatedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Files and spans
// =============================================================================

/// Index into [`Container::files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

/// A file that belongs to the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFile {
    pub path: PathBuf,
    /// Lives in the Mirax companion folder
    pub companion: bool,
    pub size: u64,
}

/// A byte range inside one container file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub file: FileId,
    pub offset: u64,
    pub len: u64,
}

impl Span {
    pub fn new(file: FileId, offset: u64, len: u64) -> Self {
        Self { file, offset, len }
    }

    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.len)
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.file == other.file
            && self.len > 0
            && other.len > 0
            && self.offset < other.end()
            && other.offset < self.end()
    }
}

/// Pixel data of a directory, with the byte that blanks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSpan {
    pub span: Span,
    /// `0` for binary data, `b'A'` for base64 text
    pub fill: u8,
}

// =============================================================================
// Fields
// =============================================================================

/// Where a TIFF tag value is referenced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffSlot {
    /// File position of the entry's count field
    pub count_position: u64,
    pub count_width: usize,
    /// File position of the entry's value/offset field
    pub slot_position: u64,
    pub slot_width: usize,
    /// Value is stored in the slot itself
    pub inline: bool,
}

/// How a field's bytes may be rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A byte-string TIFF tag value, which may be relocated when it grows.
    ///
    /// Holds every entry that references the value; directories may share
    /// one out-of-line block.
    TiffValue(Vec<TiffSlot>),
    /// A region of fixed size; shorter content is padded with `pad`
    FixedRegion { pad: u8 },
}

/// Stored bytes of one editable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Original location and size
    pub span: Span,
    pub kind: FieldKind,
    /// Current content; differs from the file once `modified` is set
    pub content: Vec<u8>,
    pub modified: bool,
}

// =============================================================================
// Tag entries
// =============================================================================

/// Typed tag value.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Real(f64),
    DateTime(String),
    /// Opaque payload of the given byte length
    Binary(u64),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Text(s) | TagValue::DateTime(s) => f.write_str(s),
            TagValue::Integer(v) => write!(f, "{}", v),
            TagValue::Real(v) => write!(f, "{}", v),
            TagValue::Binary(len) => write!(f, "<{} bytes>", len),
        }
    }
}

/// Where a tag value's text is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A byte range inside [`Container::fields`]`[field]`
    Field { field: usize, range: Range<usize> },
    /// An entry of the Mirax `Slidedat.ini`
    Ini { group: String, key: String },
}

/// A keyed value of a directory.
#[derive(Debug, Clone, PartialEq)]
pub struct TagEntry {
    pub key: String,
    pub value: TagValue,
    /// Every stored copy of the value; empty when it is not editable
    pub locations: Vec<Location>,
}

impl TagEntry {
    pub fn new(key: impl Into<String>, value: TagValue) -> Self {
        Self {
            key: key.into(),
            value,
            locations: Vec::new(),
        }
    }

    pub fn located(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Text of string-like values.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            TagValue::Text(s) | TagValue::DateTime(s) => Some(s),
            _ => None,
        }
    }
}

// =============================================================================
// Directories
// =============================================================================

/// One pyramid level or associated image.
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
    pub index: usize,
    pub role: AssociatedRole,
    pub name: String,
    /// The directory's own structure on disk (a TIFF IFD)
    pub region: Option<Span>,
    pub data: Vec<DataSpan>,
    pub entries: Vec<TagEntry>,
    /// Taken out of the chain by the unlinker
    pub unlinked: bool,
}

impl Directory {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            role: AssociatedRole::None,
            name: name.into(),
            region: None,
            data: Vec::new(),
            entries: Vec::new(),
            unlinked: false,
        }
    }

    pub fn entry(&self, key: &str) -> Option<&TagEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// Whether any of this directory's bytes overlap `span`.
    pub fn overlaps(&self, span: &Span) -> bool {
        self.region.iter().any(|r| r.overlaps(span))
            || self.data.iter().any(|d| d.span.overlaps(span))
    }
}

// =============================================================================
// Layouts
// =============================================================================

/// Link data of one TIFF directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfdLink {
    /// Directory this IFD was parsed into
    pub directory: usize,
    pub offset: u64,
    pub next_pointer_position: u64,
    pub next_offset: u64,
}

/// TIFF chain structure.
#[derive(Debug, Clone)]
pub struct TiffLayout {
    pub header: TiffHeader,
    pub ifds: Vec<IfdLink>,
}

/// Mirax companion structure.
#[derive(Debug, Clone)]
pub struct MiraxLayout {
    pub slide: MiraxSlide,
    pub slidedat: FileId,
    pub index: FileId,
    /// Position of the non-hierarchical record table in the index file
    pub table_base: u64,
    /// Current table contents, one i32 per record
    pub table: Vec<u8>,
    /// Set when redaction changed an ini value
    pub ini_modified: bool,
    /// Set when levels were taken out of the ini and the table
    pub table_modified: bool,
    /// The ini with every level still listed, once levels are removed.
    /// Redaction edits it alongside `slide.ini`.
    pub linked_ini: Option<IniDocument>,
}

/// Vendor-specific structure needed to rewrite the container.
#[derive(Debug, Clone)]
pub enum Layout {
    Tiff(TiffLayout),
    Mirax(MiraxLayout),
    ISyntax { header_len: u64 },
}

// =============================================================================
// Container
// =============================================================================

/// A parsed slide.
#[derive(Debug, Clone)]
pub struct Container {
    pub vendor: Vendor,
    /// `files[0]` is the file the caller named
    pub files: Vec<ContainerFile>,
    pub layout: Layout,
    pub fields: Vec<Field>,
    pub directories: Vec<Directory>,
    /// Data spans to blank when the container is written
    pub wipes: Vec<DataSpan>,
}

impl Container {
    /// Parse the slide at `path` as a `vendor` container.
    ///
    /// Parsing only reads. A truncated, cyclic or out-of-bounds structure is
    /// a [`FormatError`].
    pub async fn parse(path: &Path, vendor: Vendor) -> Result<Self, FormatError> {
        let container = match vendor {
            Vendor::Aperio | Vendor::Hamamatsu | Vendor::Ventana | Vendor::PhilipsTiff => {
                tiff::parse(path, vendor).await?
            }
            Vendor::Mirax => mirax::parse(path).await?,
            Vendor::PhilipsISyntax => isyntax::parse(path).await?,
            Vendor::Unknown | Vendor::Invalid | Vendor::Future(_) => {
                return Err(FormatError::UnsupportedFormat {
                    reason: format!("{} is not an anonymizable vendor", vendor),
                })
            }
        };

        debug!(
            vendor = %container.vendor,
            directories = container.directories.len(),
            fields = container.fields.len(),
            "parsed container {}",
            path.display()
        );
        Ok(container)
    }

    pub fn primary_path(&self) -> &Path {
        &self.files[0].path
    }

    /// Directories still in the chain.
    pub fn linked(&self) -> impl Iterator<Item = &Directory> {
        self.directories.iter().filter(|d| !d.unlinked)
    }

    /// The linked directory with `role`, if any.
    pub fn associated(&self, role: AssociatedRole) -> Option<&Directory> {
        self.linked().find(|d| d.role == role)
    }

    /// Look up the first entry with `key` across linked directories.
    pub fn entry(&self, key: &str) -> Option<&TagEntry> {
        self.linked().find_map(|d| d.entry(key))
    }

    /// Directories whose region or data overlaps `span`.
    pub fn overlapping(&self, span: &Span) -> impl Iterator<Item = &Directory> + '_ {
        let span = *span;
        self.directories.iter().filter(move |d| d.overlaps(&span))
    }

    /// Key/value pairs for inspection, in directory order.
    ///
    /// Identical pairs repeated by several directories are listed once, and
    /// each linked associated image adds an `associated.<role>` pair.
    pub fn metadata(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        for directory in self.linked() {
            if directory.role != AssociatedRole::None {
                pairs.push((
                    format!("associated.{}", directory.role),
                    directory.name.clone(),
                ));
            }
            for entry in &directory.entries {
                let pair = (entry.key.clone(), entry.value.to_string());
                if !pairs.contains(&pair) {
                    pairs.push(pair);
                }
            }
        }
        pairs
    }

    /// Give `role` to directory `index`, unless another directory already
    /// holds the Label or Macro role.
    pub(crate) fn assign_role(&mut self, index: usize, role: AssociatedRole) {
        let unique = matches!(role, AssociatedRole::Label | AssociatedRole::Macro);
        if unique && self.directories.iter().any(|d| d.role == role) {
            debug!("directory {} would be a second {}, ignored", index, role);
            return;
        }
        if let Some(directory) = self.directories.get_mut(index) {
            directory.role = role;
        }
    }

    /// Add a field and return its index.
    pub(crate) fn push_field(&mut self, field: Field) -> usize {
        self.fields.push(field);
        self.fields.len() - 1
    }
}

/// Text view of a field's content with the same byte offsets.
///
/// Content is cut at the first NUL. Invalid UTF-8 is decoded byte by byte,
/// with every non-ASCII byte shown as `?`.
pub(crate) fn field_text(content: &[u8]) -> String {
    let end = content.iter().position(|&b| b == 0).unwrap_or(content.len());
    let bytes = &content[..end];
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect(),
    }
}

/// Size of a file, as a container file entry.
pub(crate) async fn container_file(path: PathBuf, companion: bool) -> Result<ContainerFile, FormatError> {
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| crate::error::IoError::from_std(path.display(), e))?;
    Ok(ContainerFile {
        path,
        companion,
        size: metadata.len(),
    })
}
