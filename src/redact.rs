//! Vendor redaction rule tables.
//!
//! Each vendor has an ordered list of rules mapping a tag key pattern to a
//! [`Policy`]. [`redact`] applies the list to every directory of a container
//! that carries a matching key.

use std::collections::BTreeMap;
use std::ops::Range;

use tracing::debug;

use crate::container::{Container, Layout, Location, TagValue};
use crate::format::Vendor;

/// How a value is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Every byte becomes the given character; the length is kept
    Blank(char),
    /// The whole value becomes a fixed string
    Literal(&'static str),
    /// Every ASCII digit becomes `0`
    ZeroDigits,
}

impl Policy {
    /// Apply the policy to a value.
    pub fn apply(&self, value: &str) -> String {
        match self {
            Policy::Blank(c) => c.to_string().repeat(value.len()),
            Policy::Literal(literal) => (*literal).to_string(),
            Policy::ZeroDigits => value
                .chars()
                .map(|c| if c.is_ascii_digit() { '0' } else { c })
                .collect(),
        }
    }
}

/// Which keys a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPattern {
    Exact(&'static str),
    Prefix(&'static str),
}

impl KeyPattern {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(k) => key == *k,
            KeyPattern::Prefix(p) => key.starts_with(p),
        }
    }
}

/// A (key pattern, policy) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactionRule {
    pub pattern: KeyPattern,
    pub policy: Policy,
}

const fn exact(key: &'static str, policy: Policy) -> RedactionRule {
    RedactionRule {
        pattern: KeyPattern::Exact(key),
        policy,
    }
}

const fn prefix(key: &'static str, policy: Policy) -> RedactionRule {
    RedactionRule {
        pattern: KeyPattern::Prefix(key),
        policy,
    }
}

const APERIO_RULES: &[RedactionRule] = &[
    exact("aperio.Filename", Policy::Blank('X')),
    exact("aperio.User", Policy::Blank('X')),
    exact("aperio.Date", Policy::Literal("01/01/00")),
    exact("aperio.Time", Policy::Literal("00:00:00")),
    exact("aperio.Slide", Policy::Literal("0")),
    exact("aperio.Barcode", Policy::Blank('X')),
    exact("aperio.ScanScope ID", Policy::Blank('X')),
    exact("aperio.Rack", Policy::Blank('X')),
];

const HAMAMATSU_RULES: &[RedactionRule] =
    &[exact("tiff.DateTime", Policy::Literal("1900:01:01 00:00:00"))];

const MIRAX_RULES: &[RedactionRule] = &[
    exact("mirax.GENERAL.SLIDE_NAME", Policy::Blank('X')),
    exact("mirax.GENERAL.PROJECT_NAME", Policy::Blank('X')),
    exact("mirax.GENERAL.SLIDE_ID", Policy::ZeroDigits),
    exact(
        "mirax.GENERAL.SLIDE_CREATIONDATETIME",
        Policy::Literal("01/01/00 00:00:00"),
    ),
];

const VENTANA_RULES: &[RedactionRule] = &[
    exact("ventana.UnitNumber", Policy::Blank(' ')),
    exact("ventana.UserName", Policy::Blank(' ')),
    exact("ventana.BuildDate", Policy::Blank(' ')),
    exact("ventana.BaseName", Policy::Blank(' ')),
    exact("ventana.JP2FileName", Policy::Blank(' ')),
    prefix("ventana.Barcode", Policy::Blank(' ')),
    exact("tiff.DateTime", Policy::Blank(' ')),
];

const PHILIPS_RULES: &[RedactionRule] = &[
    exact(
        "philips.DICOM_ACQUISITION_DATETIME",
        Policy::Literal("19000101000000.000000"),
    ),
    exact("philips.DICOM_DEVICE_SERIAL_NUMBER", Policy::Blank('X')),
    exact("philips.DICOM_OPERATOR_ID", Policy::Blank('X')),
    exact("philips.PIM_DP_UFS_BARCODE", Policy::Blank('X')),
    exact("philips.PIM_DP_SOURCE_FILE", Policy::Blank('X')),
    exact("philips.PIM_DP_SCANNER_SLOT", Policy::Blank(' ')),
    exact("philips.PIM_DP_SCANNER_RACK", Policy::Blank(' ')),
];

/// Ordered rules for `vendor`. Unsupported vendors have none.
pub fn redaction_plan(vendor: Vendor) -> &'static [RedactionRule] {
    match vendor {
        Vendor::Aperio => APERIO_RULES,
        Vendor::Hamamatsu => HAMAMATSU_RULES,
        Vendor::Mirax => MIRAX_RULES,
        Vendor::Ventana => VENTANA_RULES,
        Vendor::PhilipsISyntax | Vendor::PhilipsTiff => PHILIPS_RULES,
        Vendor::Unknown | Vendor::Invalid | Vendor::Future(_) => &[],
    }
}

/// Outcome of [`redact`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redaction {
    /// Entries whose value was replaced
    pub entries: usize,
    /// Fields whose content changed
    pub fields: usize,
}

/// Apply `rules` to every matching entry of `container`.
///
/// Entry values are updated, field contents are re-serialized with the
/// substituted text, and the Mirax ini document is edited in place. Absent
/// keys are skipped. Values that are not text (binary payloads) are never
/// touched.
pub fn redact(container: &mut Container, rules: &[RedactionRule]) -> Redaction {
    // field -> range start -> (range, replacement); dedupes fields shared
    // between directories
    let mut substitutions: BTreeMap<usize, BTreeMap<usize, (Range<usize>, String)>> =
        BTreeMap::new();
    let mut ini_edits: Vec<(String, String, String)> = Vec::new();
    let mut outcome = Redaction::default();

    for directory in container.directories.iter_mut() {
        for entry in directory.entries.iter_mut() {
            let Some(rule) = rules.iter().find(|r| r.pattern.matches(&entry.key)) else {
                continue;
            };
            let replacement = match &entry.value {
                TagValue::Text(s) | TagValue::DateTime(s) => rule.policy.apply(s),
                _ => continue,
            };

            for location in &entry.locations {
                match location {
                    Location::Field { field, range } => {
                        substitutions
                            .entry(*field)
                            .or_default()
                            .insert(range.start, (range.clone(), replacement.clone()));
                    }
                    Location::Ini { group, key } => {
                        ini_edits.push((group.clone(), key.clone(), replacement.clone()));
                    }
                }
            }

            debug!(key = %entry.key, directory = directory.index, "redacted entry");
            entry.value = match entry.value {
                TagValue::DateTime(_) => TagValue::DateTime(replacement),
                _ => TagValue::Text(replacement),
            };
            outcome.entries += 1;
        }
    }

    for (field_index, edits) in substitutions {
        let Some(field) = container.fields.get_mut(field_index) else {
            continue;
        };
        let original = field.content.clone();
        // back to front, so earlier ranges stay valid
        for (range, replacement) in edits.into_values().rev() {
            if range.end <= field.content.len() {
                field
                    .content
                    .splice(range, replacement.bytes());
            }
        }
        if field.content != original {
            field.modified = true;
            outcome.fields += 1;
        }
    }

    if let Layout::Mirax(layout) = &mut container.layout {
        for (group, key, value) in ini_edits {
            if layout.slide.ini.get(&group, &key) != Some(value.as_str()) {
                layout.slide.ini.set(&group, &key, &value);
                if let Some(linked) = &mut layout.linked_ini {
                    linked.set(&group, &key, &value);
                }
                layout.ini_modified = true;
            }
        }
    }

    outcome
}
