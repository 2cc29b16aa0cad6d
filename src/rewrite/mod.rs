//! Rewrite engine.
//!
//! A mutated [`Container`] is turned into a [`MutationPlan`]: byte edits per
//! container file, grouped in three phases that are applied and flushed in
//! order.
//!
//! 1. [`Phase::Values`]: tag values, relocated blocks, redacted Mirax ini
//!    values, slide-id bytes
//! 2. [`Phase::Wipes`]: associated pixel data
//! 3. [`Phase::Links`]: directory chain pointers, Mirax level removal from
//!    the ini and the index table
//!
//! A crash before the last phase leaves the chain pointing at the original
//! directories, all of which are still intact.
//!
//! Copy mode applies the plan to a staged copy of the source and renames it
//! into place. In-place mode applies it to the source files directly after
//! journaling the bytes it overwrites, and restores them if any edit fails.
//! Both produce the same bytes.

mod journal;
mod mirax;
mod target;
mod tiff;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::container::{Container, FieldKind, FileId, Layout};
use crate::error::{AnonymizeError, FormatError, IoError};
use crate::io::{LocalFile, RangeWriter};

use journal::{file_path, Journal};
pub use target::{validate_label, OutputTarget, Staging};

/// Largest buffer used to fill a region
const FILL_CHUNK: usize = 1024 * 1024;

/// Edit phases, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Values,
    Wipes,
    Links,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Values, Phase::Wipes, Phase::Links];
}

/// A byte-level change to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOp {
    /// Write `data` at `offset`; may extend the file at its end
    Write { offset: u64, data: Vec<u8> },
    /// Overwrite `len` bytes at `offset` with `byte`
    Fill { offset: u64, len: u64, byte: u8 },
    /// Replace the whole file content
    Replace { data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub phase: Phase,
    pub file: FileId,
    pub op: EditOp,
}

/// Ordered byte edits that materialize a mutated container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationPlan {
    pub edits: Vec<Edit>,
}

impl MutationPlan {
    /// Compute the edits for `container`.
    ///
    /// Fails when a fixed-size field grew or a chain cannot be repaired.
    pub fn build(container: &Container) -> Result<Self, FormatError> {
        let mut plan = MutationPlan::default();
        let mut ends: Vec<u64> = container.files.iter().map(|f| f.size).collect();

        for field in container.fields.iter().filter(|f| f.modified) {
            match &field.kind {
                FieldKind::FixedRegion { pad } => {
                    let len = field.span.len as usize;
                    if field.content.len() > len {
                        return Err(FormatError::malformed(
                            vendor_name(container),
                            format!(
                                "value at offset {} grew from {} to {} bytes",
                                field.span.offset,
                                len,
                                field.content.len()
                            ),
                        ));
                    }
                    let mut data = field.content.clone();
                    data.resize(len, *pad);
                    plan.push(Phase::Values, field.span.file, EditOp::Write {
                        offset: field.span.offset,
                        data,
                    });
                }
                FieldKind::TiffValue(slots) => {
                    let Layout::Tiff(layout) = &container.layout else {
                        return Err(FormatError::malformed(
                            vendor_name(container),
                            "TIFF value outside a TIFF container",
                        ));
                    };
                    let end = &mut ends[field.span.file.0];
                    tiff::value_edits(&mut plan, &layout.header, field, slots, end)?;
                }
            }
        }

        if let Layout::Mirax(layout) = &container.layout {
            mirax::layout_edits(&mut plan, layout);
        }

        for wipe in &container.wipes {
            plan.push(Phase::Wipes, wipe.span.file, EditOp::Fill {
                offset: wipe.span.offset,
                len: wipe.span.len,
                byte: wipe.fill,
            });
        }

        if let Layout::Tiff(layout) = &container.layout {
            tiff::link_edits(&mut plan, layout, container)?;
        }

        Ok(plan)
    }

    pub(crate) fn push(&mut self, phase: Phase, file: FileId, op: EditOp) {
        self.edits.push(Edit { phase, file, op });
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Edits of one phase, in plan order.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &Edit> {
        self.edits.iter().filter(move |e| e.phase == phase)
    }

    /// Apply the plan to the files at `paths`, indexed by [`FileId`].
    ///
    /// Every phase is flushed to stable storage before the next begins.
    pub async fn apply(&self, paths: &[PathBuf]) -> Result<(), IoError> {
        self.apply_tracked(paths, &mut Vec::new()).await
    }

    /// [`MutationPlan::apply`], recording the index of every edit that may
    /// have reached a file in `applied`.
    async fn apply_tracked(
        &self,
        paths: &[PathBuf],
        applied: &mut Vec<usize>,
    ) -> Result<(), IoError> {
        for phase in Phase::ALL {
            let mut open: BTreeMap<FileId, LocalFile> = BTreeMap::new();
            let mut count = 0;

            for (index, edit) in self.edits.iter().enumerate().filter(|(_, e)| e.phase == phase) {
                let path = file_path(paths, edit.file)?;

                if let EditOp::Replace { data } = &edit.op {
                    open.remove(&edit.file);
                    applied.push(index);
                    replace_file(path, data).await?;
                    count += 1;
                    continue;
                }

                if !open.contains_key(&edit.file) {
                    open.insert(edit.file, LocalFile::open_writable(path).await?);
                }
                let Some(file) = open.get(&edit.file) else {
                    continue;
                };
                applied.push(index);
                match &edit.op {
                    EditOp::Write { offset, data } => file.write_all_at(*offset, data).await?,
                    EditOp::Fill { offset, len, byte } => fill(file, *offset, *len, *byte).await?,
                    EditOp::Replace { .. } => {}
                }
                count += 1;
            }

            for file in open.values() {
                file.sync().await?;
            }
            if count > 0 {
                debug!(?phase, edits = count, "applied edit phase");
            }
        }
        Ok(())
    }
}

/// Apply `plan` to the source files, putting every overwritten byte back
/// when an edit fails.
async fn apply_in_place(plan: &MutationPlan, paths: &[PathBuf]) -> Result<(), IoError> {
    let journal = Journal::capture(plan, paths).await?;
    let mut applied = Vec::new();

    let Err(e) = plan.apply_tracked(paths, &mut applied).await else {
        return Ok(());
    };
    match journal.restore(paths, &applied).await {
        Ok(()) => warn!(edits = applied.len(), "rolled back in-place edits after: {}", e),
        Err(undo) => warn!("cannot roll back in-place edits: {}", undo),
    }
    Err(e)
}

/// Write `container` out.
///
/// In copy mode the result is `<label>.<ext>` next to the source (plus the
/// `<label>/` companion folder for Mirax); in-place mode edits the source
/// and returns its path. A failed copy leaves no output behind.
pub async fn write(
    container: &Container,
    label: &str,
    in_place: bool,
) -> Result<PathBuf, AnonymizeError> {
    let plan = MutationPlan::build(container)?;

    if in_place {
        let paths: Vec<PathBuf> = container.files.iter().map(|f| f.path.clone()).collect();
        apply_in_place(&plan, &paths).await?;
        info!(edits = plan.edits.len(), "anonymized {} in place", container.primary_path().display());
        return Ok(container.primary_path().to_path_buf());
    }

    let target = OutputTarget::new(container, label)?;
    let staging = Staging::create(container, &target).await?;

    if let Err(e) = plan.apply(staging.paths()).await {
        staging.discard().await;
        return Err(e.into());
    }
    let output = staging.commit().await?;

    info!(edits = plan.edits.len(), "wrote {}", output.display());
    Ok(output)
}

async fn fill(file: &LocalFile, offset: u64, len: u64, byte: u8) -> Result<(), IoError> {
    let chunk = vec![byte; (len as usize).min(FILL_CHUNK)];
    let mut done = 0u64;
    while done < len {
        let n = (len - done).min(chunk.len() as u64) as usize;
        file.write_all_at(offset + done, &chunk[..n]).await?;
        done += n as u64;
    }
    Ok(())
}

/// Replace a whole file through a sibling temporary and a rename.
async fn replace_file(path: &Path, data: &[u8]) -> Result<(), IoError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.partial", name));

    tokio::fs::write(&temp, data)
        .await
        .map_err(|e| IoError::from_std(temp.display(), e))?;
    let file = LocalFile::open_writable(&temp).await?;
    file.sync().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(IoError::from_std(path.display(), e));
    }
    Ok(())
}

fn vendor_name(container: &Container) -> &'static str {
    container.vendor.name()
}
