//! Ventana BIF metadata.
//!
//! Ventana scanners write an XMP packet (TIFF tag 700) whose `iScan` element
//! carries the scan properties as XML attributes:
//!
//! ```text
//! <iScan BuildDate="12/12/2017" UnitNumber="BI10N0294" UserName="op" Barcode1D="..." .../>
//! ```
//!
//! The associated images are named in each directory's ImageDescription:
//! `Label Image`, `Thumbnail`, and the slide overview (`Macro` or `Overview`).

use crate::container::AssociatedRole;

use super::Property;

/// Substring of the XMP packet that identifies a Ventana slide
pub const VENTANA_XMP_MARKER: &str = "iScan";

/// Key prefix for Ventana properties
pub const VENTANA_PREFIX: &str = "ventana.";

/// Extract every `Name="value"` or `Name='value'` attribute of an XMP packet.
///
/// Value ranges are byte ranges inside `xmp` and exclude the quotes.
pub fn parse_xmp_attributes(xmp: &str) -> Vec<Property> {
    let bytes = xmp.as_bytes();
    let mut properties = Vec::new();
    let mut i = 0;

    while let Some(eq) = xmp[i..].find('=').map(|p| p + i) {
        i = eq + 1;

        // attribute name: identifier characters immediately before '='
        let name_start = xmp[..eq]
            .rfind(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-' | '.')))
            .map(|p| p + 1)
            .unwrap_or(0);
        let name = &xmp[name_start..eq];

        let Some(&quote) = bytes.get(eq + 1) else {
            break;
        };
        if name.is_empty() || (quote != b'"' && quote != b'\'') {
            continue;
        }

        let value_start = eq + 2;
        let Some(len) = xmp[value_start..].find(quote as char) else {
            break;
        };
        let value_end = value_start + len;

        properties.push(Property {
            key: format!("{}{}", VENTANA_PREFIX, name),
            value: xmp[value_start..value_end].to_string(),
            range: value_start..value_end,
        });
        i = value_end + 1;
    }

    properties
}

/// Role of a directory from its ImageDescription.
pub fn role_from_description(description: &str) -> Option<AssociatedRole> {
    let lower = description.to_ascii_lowercase();
    if lower.contains("label image") || lower.contains("label_image") {
        Some(AssociatedRole::Label)
    } else if lower.contains("thumbnail") {
        Some(AssociatedRole::Thumbnail)
    } else if lower.contains("macro") || lower.contains("overview") {
        Some(AssociatedRole::Macro)
    } else {
        None
    }
}
