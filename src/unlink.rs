//! Associated-image removal.
//!
//! The unlinker selects the label (always) and the macro (unless kept),
//! blanks their pixel data and takes their directories out of the chain.
//! Chain pointers themselves are written by the rewrite engine from the
//! directories' `unlinked` flags; Mirax slides are edited here, since their
//! "chain" is the ini document and the index table.
//!
//! Blanking that falls inside an editable field (a base64 picture in Philips
//! XML) is applied to the field content. The unlinker therefore runs before
//! redaction, while field contents still match the file byte for byte.

use tracing::{debug, warn};

use crate::container::{AssociatedRole, Container, DataSpan, Layout, MiraxLayout};
use crate::error::FormatError;
use crate::format::mirax::{compact_table, remove_level};
use crate::format::Vendor;

/// Caller choices for associated images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnlinkOptions {
    /// Keep the macro image
    pub keep_macro: bool,
    /// Leave every directory in the chain; pixel data is still blanked
    pub disable_unlinking: bool,
}

/// What the unlinker did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlinkOutcome {
    /// Roles taken out of the chain
    pub removed: Vec<AssociatedRole>,
    /// Roles of associated images still linked
    pub retained: Vec<AssociatedRole>,
    /// Data spans scheduled for blanking
    pub wiped: usize,
    /// Data spans left alone because a retained directory shares them
    pub skipped: usize,
}

/// Remove the identifying associated images of `container`.
pub fn unlink(
    container: &mut Container,
    options: &UnlinkOptions,
) -> Result<UnlinkOutcome, FormatError> {
    let vendor = container.vendor;
    if vendor == Vendor::Hamamatsu && options.keep_macro {
        warn!("Hamamatsu slides have no separate macro image, keep_macro has no effect");
    }
    if vendor == Vendor::PhilipsISyntax && options.disable_unlinking {
        warn!("iSyntax pictures cannot stay linked once blanked, disable_unlinking is ignored");
    }

    let selected: Vec<usize> = container
        .linked()
        .filter(|d| match d.role {
            AssociatedRole::Label => true,
            AssociatedRole::Macro => !options.keep_macro && vendor != Vendor::Ventana,
            AssociatedRole::Thumbnail | AssociatedRole::None => false,
        })
        .map(|d| d.index)
        .collect();

    let mut outcome = UnlinkOutcome::default();
    for &index in &selected {
        let spans = container.directories[index].data.clone();
        for data in spans {
            if schedule_wipe(container, &selected, index, data) {
                outcome.wiped += 1;
            } else {
                outcome.skipped += 1;
            }
        }
    }

    let unlinking = !options.disable_unlinking || vendor == Vendor::PhilipsISyntax;
    if unlinking {
        if let Layout::Mirax(layout) = &mut container.layout {
            unlink_mirax(layout, &selected)?;
        }
        for &index in &selected {
            let directory = &mut container.directories[index];
            directory.unlinked = true;
            outcome.removed.push(directory.role);
            debug!(directory = index, role = %directory.role, "unlinked directory");
        }
    }

    outcome.retained = container
        .linked()
        .map(|d| d.role)
        .filter(|r| *r != AssociatedRole::None)
        .collect();
    Ok(outcome)
}

/// Queue `data` of directory `owner` for blanking.
///
/// Returns false when a directory that stays in the chain uses the same
/// bytes.
fn schedule_wipe(container: &mut Container, selected: &[usize], owner: usize, data: DataSpan) -> bool {
    let shared = container
        .overlapping(&data.span)
        .find(|d| d.index != owner && !d.unlinked && !selected.contains(&d.index))
        .map(|d| d.index);
    if let Some(other) = shared {
        warn!(
            directory = owner,
            other,
            offset = data.span.offset,
            len = data.span.len,
            "pixel data shared with a retained directory, not blanked"
        );
        return false;
    }

    let field = container.fields.iter_mut().find(|f| {
        f.span.file == data.span.file
            && f.span.offset <= data.span.offset
            && data.span.end() <= f.span.end()
    });
    match field {
        Some(field) => {
            let start = (data.span.offset - field.span.offset) as usize;
            let end = start + data.span.len as usize;
            if let Some(bytes) = field.content.get_mut(start..end) {
                bytes.fill(data.fill);
                field.modified = true;
            }
        }
        None => container.wipes.push(data),
    }
    true
}

/// Take the selected levels out of `Slidedat.ini` and the index table.
fn unlink_mirax(layout: &mut MiraxLayout, selected: &[usize]) -> Result<(), FormatError> {
    // directory 0 is [GENERAL]; level directories follow in record order
    let levels: Vec<_> = layout
        .slide
        .levels()
        .map(|(_, level)| level.clone())
        .collect();
    let mut removed: Vec<_> = selected
        .iter()
        .filter_map(|&index| index.checked_sub(1).and_then(|i| levels.get(i)))
        .cloned()
        .collect();
    if removed.is_empty() {
        return Ok(());
    }
    removed.sort_by(|a, b| b.record.cmp(&a.record));

    if layout.linked_ini.is_none() {
        layout.linked_ini = Some(layout.slide.ini.clone());
    }
    let mut counts: Vec<usize> = layout.slide.layers.iter().map(|l| l.levels.len()).collect();
    for level in &removed {
        let count = counts.get_mut(level.layer).ok_or_else(|| {
            FormatError::malformed("Mirax", format!("level {} has no layer", level.name))
        })?;
        remove_level(&mut layout.slide.ini, level, *count);
        *count -= 1;
        debug!(record = level.record, level = %level.name, "removed Mirax level");
    }

    let records: Vec<usize> = removed.iter().map(|l| l.record).collect();
    layout.table = compact_table(&layout.table, &records);
    layout.table_modified = true;
    Ok(())
}
