//! Containers for Philips iSyntax files.
//!
//! The file starts with an XML header terminated by an EOT byte; everything
//! after it is image data that anonymization never touches.

use std::path::Path;

use crate::error::FormatError;
use crate::format::philips::{
    image_payloads, parse_attributes, IMAGE_DATA_ATTRIBUTE, ISYNTAX_EOT, PHILIPS_PREFIX,
};
use crate::format::Vendor;
use crate::io::{LocalFile, RangeReader};

use super::{
    container_file, field_text, Container, DataSpan, Directory, Field, FieldKind, FileId, Layout,
    Location, Span, TagEntry, TagValue,
};

const PRIMARY: FileId = FileId(0);

/// Bytes read per step while searching for the end of the header
const SCAN_CHUNK: usize = 1024 * 1024;

/// Headers larger than this are rejected
const MAX_HEADER_BYTES: u64 = 256 * 1024 * 1024;

pub(super) async fn parse(path: &Path) -> Result<Container, FormatError> {
    let reader = LocalFile::open(path).await?;
    let header = read_header(&reader).await?;
    let header_len = header.len() as u64;

    let text = field_text(&header);
    let properties = parse_attributes(&text);
    let payloads = image_payloads(&text, &properties);

    let mut container = Container {
        vendor: Vendor::PhilipsISyntax,
        files: vec![container_file(path.to_path_buf(), false).await?],
        layout: Layout::ISyntax { header_len },
        fields: Vec::new(),
        directories: Vec::new(),
        wipes: Vec::new(),
    };

    let field = container.push_field(Field {
        span: Span::new(PRIMARY, 0, header_len),
        kind: FieldKind::FixedRegion { pad: b' ' },
        content: header,
        modified: false,
    });

    let binary = format!("{}{}", PHILIPS_PREFIX, IMAGE_DATA_ATTRIBUTE);
    let mut root = Directory::new(0, "Header");
    root.region = Some(Span::new(PRIMARY, 0, header_len));
    for property in properties {
        let value = if property.key == binary {
            TagValue::Binary(property.range.len() as u64)
        } else {
            TagValue::Text(property.value)
        };
        root.entries.push(TagEntry::new(property.key, value).located(Location::Field {
            field,
            range: property.range,
        }));
    }
    container.directories.push(root);

    for payload in payloads {
        let encoded = &text[payload.range.clone()];
        if encoded.bytes().all(|b| b == b'A' || b == b'=') {
            continue;
        }
        let index = container.directories.len();
        let mut directory = Directory::new(index, format!("{} payload", payload.role));
        directory.data.push(DataSpan {
            span: Span::new(
                PRIMARY,
                payload.range.start as u64,
                payload.range.len() as u64,
            ),
            fill: b'A',
        });
        container.directories.push(directory);
        container.assign_role(index, payload.role);
    }

    Ok(container)
}

/// Read the XML header up to, not including, the EOT byte.
async fn read_header<R: RangeReader>(reader: &R) -> Result<Vec<u8>, FormatError> {
    let size = reader.size();
    let limit = size.min(MAX_HEADER_BYTES);
    let mut header = Vec::new();
    let mut offset = 0u64;

    while offset < limit {
        let len = (limit - offset).min(SCAN_CHUNK as u64) as usize;
        let chunk = reader.read_exact_at(offset, len).await?;
        if let Some(end) = chunk.iter().position(|&b| b == ISYNTAX_EOT) {
            header.extend_from_slice(&chunk[..end]);
            return Ok(header);
        }
        header.extend_from_slice(&chunk);
        offset += len as u64;
    }

    Err(FormatError::malformed(
        "iSyntax",
        format!("no end of header within {} bytes", limit),
    ))
}
