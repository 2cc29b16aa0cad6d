//! Containers for the TIFF-based vendors.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use tracing::debug;

use crate::error::FormatError;
use crate::format::aperio::AperioDescription;
use crate::format::philips::{self, IMAGE_DATA_ATTRIBUTE, PHILIPS_PREFIX};
use crate::format::tiff::{Ifd, IfdEntry, TiffChain, TiffHeader, TiffTag, ValueReader, TEXT_TAGS};
use crate::format::ventana;
use crate::format::{Property, Vendor};
use crate::io::{BlockCache, LocalFile, RangeReader};

use super::{
    container_file, field_text, AssociatedRole, Container, DataSpan, Directory, Field, FieldKind,
    FileId, IfdLink, Layout, Location, Span, TagEntry, TagValue, TiffLayout, TiffSlot,
};

const PRIMARY: FileId = FileId(0);

/// SourceLens value of the Hamamatsu slide overview
const NDPI_OVERVIEW_LENS: f64 = -1.0;

/// Marks an ImageDescription holding Philips XML
const PHILIPS_XML_MARKER: &str = "<DataObject";

pub(super) async fn parse(path: &Path, vendor: Vendor) -> Result<Container, FormatError> {
    let file = LocalFile::open(path).await?;
    let reader = BlockCache::new(file);
    let chain = TiffChain::read(&reader).await?;

    let mut container = Container {
        vendor,
        files: vec![container_file(path.to_path_buf(), false).await?],
        layout: Layout::Tiff(TiffLayout {
            header: chain.header,
            ifds: Vec::new(),
        }),
        fields: Vec::new(),
        directories: Vec::new(),
        wipes: Vec::new(),
    };

    let mut parser = DirectoryParser {
        values: ValueReader::new(&reader, &chain.header),
        header: &chain.header,
        file_size: reader.size(),
        shared: HashMap::new(),
        payloads: Vec::new(),
    };

    let mut links = Vec::with_capacity(chain.ifds.len());
    for (index, ifd) in chain.ifds.iter().enumerate() {
        parser.parse_directory(&mut container, index, ifd).await?;
        links.push(IfdLink {
            directory: index,
            offset: ifd.offset,
            next_pointer_position: ifd.next_pointer_position,
            next_offset: ifd.next_ifd_offset,
        });
    }
    if let Layout::Tiff(layout) = &mut container.layout {
        layout.ifds = links;
    }

    if vendor == Vendor::Aperio {
        assign_aperio_thumbnail(&mut container, &chain.ifds);
    }
    let payloads = std::mem::take(&mut parser.payloads);
    attach_payloads(&mut container, payloads);

    Ok(container)
}

/// Aperio's thumbnail is the second directory, stored in strips.
fn assign_aperio_thumbnail(container: &mut Container, ifds: &[Ifd]) {
    let Some(second) = ifds.get(1) else {
        return;
    };
    let tiled = second.get_entry_by_tag(TiffTag::TileOffsets).is_some();
    if !tiled && container.directories[1].role == AssociatedRole::None {
        container.assign_role(1, AssociatedRole::Thumbnail);
    }
}

/// Give each embedded Philips picture to the directory with its role, or to
/// a directory of its own.
fn attach_payloads(container: &mut Container, payloads: Vec<(AssociatedRole, DataSpan)>) {
    for (role, data) in payloads {
        if let Some(directory) = container.directories.iter_mut().find(|d| d.role == role) {
            directory.data.push(data);
            continue;
        }

        let index = container.directories.len();
        let mut directory = Directory::new(index, format!("{} payload", role));
        directory.data.push(data);
        container.directories.push(directory);
        container.assign_role(index, role);
    }
}

struct DirectoryParser<'a, R: RangeReader> {
    values: ValueReader<'a, R>,
    header: &'a TiffHeader,
    file_size: u64,
    /// Field index by value offset, for values shared between directories
    shared: HashMap<u64, usize>,
    payloads: Vec<(AssociatedRole, DataSpan)>,
}

impl<R: RangeReader> DirectoryParser<'_, R> {
    async fn parse_directory(
        &mut self,
        container: &mut Container,
        index: usize,
        ifd: &Ifd,
    ) -> Result<(), FormatError> {
        let mut directory = Directory::new(index, format!("IFD {}", index));
        directory.region = Some(Span::new(PRIMARY, ifd.offset, ifd.byte_size(self.header)));
        directory.data = self.pixel_data(ifd).await?;

        let byte_order = self.header.byte_order;
        for tag in [TiffTag::ImageWidth, TiffTag::ImageLength] {
            if let Some(value) = ifd.get_entry_by_tag(tag).and_then(|e| e.inline_u64(byte_order)) {
                directory.entries.push(TagEntry::new(
                    format!("tiff.{}", tag.name()),
                    TagValue::Integer(value as i64),
                ));
            }
        }

        let vendor = container.vendor;
        let mut description = None;

        for &tag in TEXT_TAGS {
            let Some(entry) = ifd.get_entry_by_tag(tag) else {
                continue;
            };
            let Some((field, text)) = self.text_field(container, entry).await? else {
                continue;
            };

            let location = Location::Field {
                field,
                range: 0..text.len(),
            };
            let value = match tag {
                TiffTag::DateTime => TagValue::DateTime(text.clone()),
                TiffTag::ImageDescription
                    if vendor == Vendor::PhilipsTiff && text.contains(PHILIPS_XML_MARKER) =>
                {
                    TagValue::Binary(text.len() as u64)
                }
                _ => TagValue::Text(text.clone()),
            };
            directory.entries.push(
                TagEntry::new(format!("tiff.{}", tag.name()), value).located(location),
            );

            if tag == TiffTag::ImageDescription {
                description = Some((field, text));
            }
        }

        let mut role = None;
        match vendor {
            Vendor::Aperio => {
                if let Some((field, text)) = &description {
                    let parsed = AperioDescription::parse(text);
                    role = parsed.role();
                    push_properties(&mut directory, *field, parsed.properties, None);
                }
            }
            Vendor::Ventana => {
                if let Some(entry) = ifd.get_entry_by_tag(TiffTag::Xmp) {
                    if let Some((field, xmp)) = self.text_field(container, entry).await? {
                        let properties = ventana::parse_xmp_attributes(&xmp);
                        push_properties(&mut directory, field, properties, None);
                    }
                }
                role = description
                    .as_ref()
                    .and_then(|(_, text)| ventana::role_from_description(text));
            }
            Vendor::PhilipsTiff => {
                if let Some((field, text)) = &description {
                    role = philips::role_from_description(text);
                    if text.contains(PHILIPS_XML_MARKER) {
                        let properties = philips::parse_attributes(text);
                        for payload in philips::image_payloads(text, &properties) {
                            if let Some(data) = payload_span(&container.fields[*field], &payload.range, text) {
                                self.payloads.push((payload.role, data));
                            }
                        }
                        let binary = format!("{}{}", PHILIPS_PREFIX, IMAGE_DATA_ATTRIBUTE);
                        push_properties(&mut directory, *field, properties, Some(&binary));
                    }
                }
            }
            Vendor::Hamamatsu => {
                if let Some(entry) = ifd.get_entry_by_tag(TiffTag::NdpiSourceLens) {
                    let lens = self.values.read_f64(entry).await?;
                    directory
                        .entries
                        .push(TagEntry::new("hamamatsu.SourceLens", TagValue::Real(lens)));
                    if lens == NDPI_OVERVIEW_LENS {
                        role = Some(AssociatedRole::Label);
                    }
                }
            }
            _ => {}
        }

        debug!(
            directory = index,
            offset = ifd.offset,
            entries = directory.entries.len(),
            data_spans = directory.data.len(),
            role = ?role,
            "parsed directory"
        );

        container.directories.push(directory);
        if let Some(role) = role {
            container.assign_role(index, role);
        }
        Ok(())
    }

    /// Strip or tile spans of a directory.
    async fn pixel_data(&self, ifd: &Ifd) -> Result<Vec<DataSpan>, FormatError> {
        let pairs = [
            (TiffTag::TileOffsets, TiffTag::TileByteCounts),
            (TiffTag::StripOffsets, TiffTag::StripByteCounts),
        ];

        let mut data = Vec::new();
        for (offsets_tag, counts_tag) in pairs {
            let (Some(offsets), Some(counts)) = (
                ifd.get_entry_by_tag(offsets_tag),
                ifd.get_entry_by_tag(counts_tag),
            ) else {
                continue;
            };

            let offsets = self.values.read_offsets(offsets, ifd.offset).await?;
            let counts = self.values.read_u64_array(counts).await?;

            for (&offset, &len) in offsets.iter().zip(&counts) {
                if len == 0 {
                    continue;
                }
                if offset.checked_add(len).map_or(true, |end| end > self.file_size) {
                    return Err(FormatError::malformed(
                        "TIFF",
                        format!(
                            "{} of directory at {} points outside the file ({} + {})",
                            offsets_tag.name(),
                            ifd.offset,
                            offset,
                            len
                        ),
                    ));
                }
                data.push(DataSpan {
                    span: Span::new(PRIMARY, offset, len),
                    fill: 0,
                });
            }
        }
        Ok(data)
    }

    /// Register the value of a byte-string entry as a field.
    ///
    /// Returns the field index and its text, or `None` when the entry is not
    /// a byte string.
    async fn text_field(
        &mut self,
        container: &mut Container,
        entry: &IfdEntry,
    ) -> Result<Option<(usize, String)>, FormatError> {
        if !entry.field_type.is_some_and(|t| t.is_byte_string()) {
            return Ok(None);
        }

        let slot = TiffSlot {
            count_position: entry.count_position(),
            count_width: self.header.entry_count_size(),
            slot_position: entry.value_slot_position(self.header),
            slot_width: self.header.value_offset_size(),
            inline: entry.is_inline,
        };

        if let Some(&field) = entry.data_offset.and_then(|o| self.shared.get(&o)) {
            let shared = &mut container.fields[field];
            if let FieldKind::TiffValue(slots) = &mut shared.kind {
                if !slots.contains(&slot) {
                    slots.push(slot);
                }
            }
            let text = field_text(&shared.content);
            return Ok(Some((field, text)));
        }

        let content = self.values.read_bytes(entry).await?.to_vec();
        let offset = entry.data_offset.unwrap_or(slot.slot_position);

        let text = field_text(&content);
        let field = container.push_field(Field {
            span: Span::new(PRIMARY, offset, content.len() as u64),
            kind: FieldKind::TiffValue(vec![slot]),
            content,
            modified: false,
        });
        if let Some(data_offset) = entry.data_offset {
            self.shared.insert(data_offset, field);
        }
        Ok(Some((field, text)))
    }
}

/// File span of a base64 payload, unless it is already blank.
fn payload_span(field: &Field, range: &Range<usize>, text: &str) -> Option<DataSpan> {
    if text[range.clone()].bytes().all(|b| b == b'A' || b == b'=') {
        return None;
    }
    Some(DataSpan {
        span: Span::new(
            field.span.file,
            field.span.offset + range.start as u64,
            range.len() as u64,
        ),
        fill: b'A',
    })
}

/// Add vendor properties as entries located in `field`.
///
/// Keys equal to `binary_key` are recorded as binary payloads.
fn push_properties(
    directory: &mut Directory,
    field: usize,
    properties: Vec<Property>,
    binary_key: Option<&str>,
) {
    for property in properties {
        let value = if Some(property.key.as_str()) == binary_key {
            TagValue::Binary(property.range.len() as u64)
        } else {
            TagValue::Text(property.value)
        };
        directory.entries.push(
            TagEntry::new(property.key, value).located(Location::Field {
                field,
                range: property.range,
            }),
        );
    }
}
