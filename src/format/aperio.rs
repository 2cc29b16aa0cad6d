//! Aperio SVS ImageDescription parsing.
//!
//! Aperio stores its slide properties in the ImageDescription tag of every
//! directory, as a header segment followed by pipe-separated `Key = Value`
//! pairs:
//!
//! ```text
//! Aperio Image Library v10.0.50
//! 46000x32914 [0,100 46000x32914] (256x256) JPEG/RGB Q=30|AppMag = 20|Filename = CMU-1|Date = 12/29/09
//! ```
//!
//! Associated images carry a short header instead, e.g.
//! `Aperio Image Library v10.0.50\r\nlabel 387x463`.

use crate::container::AssociatedRole;

use super::Property;

/// Key prefix for Aperio properties
pub const APERIO_PREFIX: &str = "aperio.";

/// A parsed ImageDescription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AperioDescription {
    /// Everything before the first `|`
    pub header: String,

    /// `Key = Value` pairs, with each value's byte range in the description
    pub properties: Vec<Property>,
}

impl AperioDescription {
    /// Parse an ImageDescription string.
    ///
    /// Segments without `=` are ignored. Keys are prefixed with `aperio.`.
    pub fn parse(description: &str) -> Self {
        let mut segments = segments(description);
        let header = segments
            .next()
            .map(|(_, s)| s.trim().to_string())
            .unwrap_or_default();

        let mut properties = Vec::new();
        for (start, segment) in segments {
            let Some(eq_pos) = segment.find('=') else {
                continue;
            };
            let key = segment[..eq_pos].trim();
            if key.is_empty() {
                continue;
            }

            let raw_value = &segment[eq_pos + 1..];
            let leading = raw_value.len() - raw_value.trim_start().len();
            let value = raw_value.trim();
            let value_start = start + eq_pos + 1 + leading;

            properties.push(Property {
                key: format!("{}{}", APERIO_PREFIX, key),
                value: value.to_string(),
                range: value_start..value_start + value.len(),
            });
        }

        Self { header, properties }
    }

    /// Role of the directory carrying this description, from its header.
    ///
    /// Matches the words `label` and `macro`, which all Aperio flavors
    /// (classic, GT450, KFBIO) use for their associated images.
    pub fn role(&self) -> Option<AssociatedRole> {
        let header = self.header.to_ascii_lowercase();
        header
            .split(|c: char| !c.is_ascii_alphanumeric())
            .find_map(|word| match word {
                "label" => Some(AssociatedRole::Label),
                "macro" => Some(AssociatedRole::Macro),
                _ => None,
            })
    }

    /// Look up a property value by its full key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

/// Split on `|`, yielding each segment with its starting byte offset.
fn segments(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut start = 0;
    text.split('|').map(move |segment| {
        let at = start;
        start += segment.len() + 1;
        (at, segment)
    })
}
