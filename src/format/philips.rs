//! Philips metadata XML, shared by iSyntax headers and Philips TIFF
//! ImageDescriptions.
//!
//! Properties are `Attribute` elements; leaves carry a text value and
//! arrays nest further `DataObject`s:
//!
//! ```text
//! <DataObject ObjectType="DPUfsImport">
//!   <Attribute Name="DICOM_DEVICE_SERIAL_NUMBER" Group="0x0018" Element="0x1000" PMSVR="IString">FMT0107</Attribute>
//!   <Attribute Name="PIM_DP_SCANNED_IMAGES" Group="0x301D" Element="0x1003" PMSVR="IDataObjectArray">
//!     <Array>
//!       <DataObject ObjectType="DPScannedImage">
//!         <Attribute Name="PIM_DP_IMAGE_TYPE" ... PMSVR="IString">LABELIMAGE</Attribute>
//!         <Attribute Name="PIM_DP_IMAGE_DATA" ... PMSVR="IString">/9j/4AAQ...</Attribute>
//! ```
//!
//! The label and macro pictures are base64 JPEGs embedded in the XML.

use std::ops::Range;

use crate::container::AssociatedRole;

use super::Property;

/// Key prefix for Philips properties
pub const PHILIPS_PREFIX: &str = "philips.";

/// Root element that identifies an iSyntax file
pub const ISYNTAX_ROOT: &str = r#"<DataObject ObjectType="DPUfsImport">"#;

/// Byte that terminates the iSyntax XML header
pub const ISYNTAX_EOT: u8 = 0x04;

/// Bytes read from the start of a file to look for [`ISYNTAX_ROOT`]
pub const ISYNTAX_PROBE_BYTES: usize = 256;

/// Attribute naming the kind of a scanned image
pub const IMAGE_TYPE_ATTRIBUTE: &str = "PIM_DP_IMAGE_TYPE";

/// Attribute holding a scanned image's base64 payload
pub const IMAGE_DATA_ATTRIBUTE: &str = "PIM_DP_IMAGE_DATA";

const ATTRIBUTE_OPEN: &str = "<Attribute";
const ATTRIBUTE_CLOSE: &str = "</Attribute>";
const NAME_MARKER: &str = "Name=\"";
const SCANNED_IMAGE_MARKER: &str = r#"ObjectType="DPScannedImage""#;

/// UTF-8 byte order mark
const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Whether `bytes` starts with the iSyntax root element, after an optional
/// BOM and whitespace.
pub fn is_isyntax_header(bytes: &[u8]) -> bool {
    let bytes = bytes.strip_prefix(BOM).unwrap_or(bytes);
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(ISYNTAX_ROOT.as_bytes())
}

/// Extract every leaf `Attribute` value.
///
/// Value ranges are byte ranges inside `xml`. Attributes whose content is
/// further markup (arrays) are skipped, but their children are visited.
pub fn parse_attributes(xml: &str) -> Vec<Property> {
    let mut properties = Vec::new();
    let mut i = 0;

    while let Some(open) = xml[i..].find(ATTRIBUTE_OPEN).map(|p| p + i) {
        let Some(tag_end) = xml[open..].find('>').map(|p| p + open) else {
            break;
        };
        i = tag_end + 1;

        let start_tag = &xml[open..tag_end];
        if start_tag.ends_with('/') {
            continue;
        }
        let Some(name) = attribute_name(start_tag) else {
            continue;
        };

        let content_start = tag_end + 1;
        let Some(content_len) = xml[content_start..].find('<') else {
            break;
        };
        let content_end = content_start + content_len;

        // a leaf's text is followed directly by its closing tag
        if !xml[content_end..].starts_with(ATTRIBUTE_CLOSE) {
            continue;
        }

        properties.push(Property {
            key: format!("{}{}", PHILIPS_PREFIX, name),
            value: xml[content_start..content_end].to_string(),
            range: content_start..content_end,
        });
        i = content_end + ATTRIBUTE_CLOSE.len();
    }

    properties
}

fn attribute_name(start_tag: &str) -> Option<&str> {
    let name_start = start_tag.find(NAME_MARKER)? + NAME_MARKER.len();
    let name_len = start_tag[name_start..].find('"')?;
    Some(&start_tag[name_start..name_start + name_len])
}

/// An embedded label or macro picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub role: AssociatedRole,
    /// Byte range of the base64 text inside the XML
    pub range: Range<usize>,
}

/// Locate the label and macro payloads among the parsed attributes.
///
/// Each `DPScannedImage` object is searched for its image type and data
/// leaves, in whichever order they appear.
pub fn image_payloads(xml: &str, properties: &[Property]) -> Vec<ImagePayload> {
    let starts: Vec<usize> = xml
        .match_indices(SCANNED_IMAGE_MARKER)
        .map(|(i, _)| i)
        .collect();

    let type_key = format!("{}{}", PHILIPS_PREFIX, IMAGE_TYPE_ATTRIBUTE);
    let data_key = format!("{}{}", PHILIPS_PREFIX, IMAGE_DATA_ATTRIBUTE);

    starts
        .iter()
        .enumerate()
        .filter_map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(xml.len());
            let inside = |p: &&Property| p.range.start >= start && p.range.end <= end;

            let kind = properties.iter().filter(inside).find(|p| p.key == type_key)?;
            let role = match kind.value.trim() {
                "LABELIMAGE" => AssociatedRole::Label,
                "MACROIMAGE" => AssociatedRole::Macro,
                _ => return None,
            };
            let data = properties.iter().filter(inside).find(|p| p.key == data_key)?;

            Some(ImagePayload {
                role,
                range: data.range.clone(),
            })
        })
        .collect()
}

/// Role of a Philips TIFF directory from its ImageDescription.
pub fn role_from_description(description: &str) -> Option<AssociatedRole> {
    let trimmed = description.trim_start();
    if trimmed.starts_with("Label") {
        Some(AssociatedRole::Label)
    } else if trimmed.starts_with("Macro") {
        Some(AssociatedRole::Macro)
    } else {
        None
    }
}
