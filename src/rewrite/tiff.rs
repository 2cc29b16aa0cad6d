use crate::container::{Container, Field, FileId, TiffLayout, TiffSlot};
use crate::error::FormatError;
use crate::format::tiff::TiffHeader;

use super::{EditOp, MutationPlan, Phase};

/// Relocated values start on this boundary
const VALUE_ALIGNMENT: u64 = 4;

/// Edits that store a modified TIFF value.
///
/// Content that fits the stored value is written over it, NUL-padded, so
/// no entry's count changes. Longer content is appended at `end`, every
/// entry in `slots` is repointed, and the old block is zeroed.
pub(super) fn value_edits(
    plan: &mut MutationPlan,
    header: &TiffHeader,
    field: &Field,
    slots: &[TiffSlot],
    end: &mut u64,
) -> Result<(), FormatError> {
    let file = field.span.file;
    let stored = field.span.len as usize;

    if field.content.len() <= stored {
        let mut data = field.content.clone();
        data.resize(stored, 0);
        plan.push(Phase::Values, file, EditOp::Write {
            offset: field.span.offset,
            data,
        });
        return Ok(());
    }

    let offset = end.div_ceil(VALUE_ALIGNMENT) * VALUE_ALIGNMENT;
    if header.is_ndpi && offset > u64::from(u32::MAX) {
        return Err(FormatError::malformed(
            "Hamamatsu",
            "cannot relocate a value beyond 4 GiB in an NDPI file",
        ));
    }

    let mut block = vec![0u8; (offset - *end) as usize];
    block.extend_from_slice(&field.content);
    plan.push(Phase::Values, file, EditOp::Write {
        offset: *end,
        data: block,
    });
    *end = offset + field.content.len() as u64;

    let order = header.byte_order;
    for slot in slots {
        plan.push(Phase::Values, file, EditOp::Write {
            offset: slot.count_position,
            data: order.encode_uint(field.content.len() as u64, slot.count_width),
        });
        plan.push(Phase::Values, file, EditOp::Write {
            offset: slot.slot_position,
            data: order.encode_uint(offset, slot.slot_width),
        });
    }
    if !slots.iter().any(|s| s.inline) {
        plan.push(Phase::Values, file, EditOp::Fill {
            offset: field.span.offset,
            len: field.span.len,
            byte: 0,
        });
    }
    Ok(())
}

/// Chain pointer edits that skip every unlinked directory.
///
/// The header slot and each retained directory's next pointer are pointed
/// at the next retained directory; pointers that already do are left alone.
pub(super) fn link_edits(
    plan: &mut MutationPlan,
    layout: &TiffLayout,
    container: &Container,
) -> Result<(), FormatError> {
    let unlinked = |directory: usize| {
        container
            .directories
            .get(directory)
            .is_some_and(|d| d.unlinked)
    };
    if !layout.ifds.iter().any(|l| unlinked(l.directory)) {
        return Ok(());
    }

    let retained: Vec<_> = layout.ifds.iter().filter(|l| !unlinked(l.directory)).collect();
    let Some(first) = retained.first() else {
        return Err(FormatError::malformed(
            container.vendor.name(),
            "every directory would be unlinked",
        ));
    };

    let header = &layout.header;
    let order = header.byte_order;
    let file = FileId(0);

    if header.first_ifd_offset != first.offset {
        plan.push(Phase::Links, file, EditOp::Write {
            offset: header.first_ifd_slot(),
            data: order.encode_uint(first.offset, header.first_ifd_slot_size()),
        });
    }

    for (i, link) in retained.iter().enumerate() {
        let next = retained.get(i + 1).map_or(0, |l| l.offset);
        if next != link.next_offset {
            plan.push(Phase::Links, file, EditOp::Write {
                offset: link.next_pointer_position,
                data: order.encode_uint(next, header.ifd_next_offset_size()),
            });
        }
    }
    Ok(())
}
