use crate::container::MiraxLayout;

use super::{EditOp, MutationPlan, Phase};

/// Edits for the ini document and the index table.
///
/// Redacted values are written with the other values. Removed levels leave
/// the ini and the table together with the chain pointers, so until then
/// every level is still listed and intact.
pub(super) fn layout_edits(plan: &mut MutationPlan, layout: &MiraxLayout) {
    if layout.ini_modified {
        let values = layout.linked_ini.as_ref().unwrap_or(&layout.slide.ini);
        plan.push(Phase::Values, layout.slidedat, EditOp::Replace {
            data: values.to_bytes(),
        });
    }
    if layout.table_modified {
        plan.push(Phase::Links, layout.slidedat, EditOp::Replace {
            data: layout.slide.ini.to_bytes(),
        });
        plan.push(Phase::Links, layout.index, EditOp::Write {
            offset: layout.table_base,
            data: layout.table.clone(),
        });
    }
}
