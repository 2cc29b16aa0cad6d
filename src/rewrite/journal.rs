//! Undo records for in-place rewrites.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::container::FileId;
use crate::error::IoError;
use crate::io::{LocalFile, RangeReader, RangeWriter};

use super::{replace_file, EditOp, MutationPlan};

/// Original bytes under one edit.
#[derive(Debug)]
enum Undo {
    /// Bytes at `offset`, clipped to the original file size
    Range { offset: u64, data: Vec<u8> },
    /// The whole original file
    File(Vec<u8>),
}

#[derive(Debug)]
struct Record {
    file: FileId,
    undo: Undo,
}

/// What the source files held before an in-place rewrite.
///
/// Records line up with the plan's edits. Bytes a relocation appends are
/// undone by truncating to the original size.
#[derive(Debug, Default)]
pub(super) struct Journal {
    records: Vec<Record>,
    sizes: BTreeMap<FileId, u64>,
}

impl Journal {
    /// Read the original bytes under every edit of `plan`.
    pub async fn capture(plan: &MutationPlan, paths: &[PathBuf]) -> Result<Self, IoError> {
        let mut journal = Journal::default();
        let mut open: BTreeMap<FileId, LocalFile> = BTreeMap::new();

        for edit in &plan.edits {
            if !open.contains_key(&edit.file) {
                let file = LocalFile::open(file_path(paths, edit.file)?).await?;
                journal.sizes.insert(edit.file, file.size());
                open.insert(edit.file, file);
            }
            let Some(file) = open.get(&edit.file) else {
                continue;
            };

            let undo = match &edit.op {
                EditOp::Replace { .. } => {
                    Undo::File(file.read_exact_at(0, file.size() as usize).await?.to_vec())
                }
                EditOp::Write { offset, data } => clipped(file, *offset, data.len() as u64).await?,
                EditOp::Fill { offset, len, .. } => clipped(file, *offset, *len).await?,
            };
            journal.records.push(Record {
                file: edit.file,
                undo,
            });
        }
        Ok(journal)
    }

    /// Put back the bytes under the edits at `applied`, newest first.
    ///
    /// Keeps going past failures and reports the first one.
    pub async fn restore(&self, paths: &[PathBuf], applied: &[usize]) -> Result<(), IoError> {
        let mut first_error = None;
        let mut touched: Vec<FileId> = Vec::new();

        for &index in applied.iter().rev() {
            let Some(record) = self.records.get(index) else {
                continue;
            };
            if !touched.contains(&record.file) {
                touched.push(record.file);
            }
            if let Err(e) = restore_record(paths, record).await {
                first_error.get_or_insert(e);
            }
        }

        for file in touched {
            let Some(&size) = self.sizes.get(&file) else {
                continue;
            };
            if let Err(e) = truncate(paths, file, size).await {
                first_error.get_or_insert(e);
            }
        }

        debug!(edits = applied.len(), "restored original bytes");
        first_error.map_or(Ok(()), Err)
    }
}

async fn restore_record(paths: &[PathBuf], record: &Record) -> Result<(), IoError> {
    let path = file_path(paths, record.file)?;
    match &record.undo {
        Undo::File(data) => replace_file(path, data).await,
        Undo::Range { data, .. } if data.is_empty() => Ok(()),
        Undo::Range { offset, data } => {
            let file = LocalFile::open_writable(path).await?;
            file.write_all_at(*offset, data).await?;
            file.sync().await
        }
    }
}

/// Cut `file` back to `size` if edits grew it.
async fn truncate(paths: &[PathBuf], file: FileId, size: u64) -> Result<(), IoError> {
    let path = file_path(paths, file)?;
    let current = LocalFile::open(path).await?;
    if current.size() <= size {
        return Ok(());
    }
    drop(current);

    let file = LocalFile::open_writable(path).await?;
    file.set_len(size).await?;
    file.sync().await
}

/// Original bytes of `[offset, offset + len)` that exist in the file.
async fn clipped(file: &LocalFile, offset: u64, len: u64) -> Result<Undo, IoError> {
    let end = offset.saturating_add(len).min(file.size());
    let data = if end > offset {
        file.read_exact_at(offset, (end - offset) as usize).await?.to_vec()
    } else {
        Vec::new()
    };
    Ok(Undo::Range { offset, data })
}

pub(super) fn file_path(paths: &[PathBuf], file: FileId) -> Result<&Path, IoError> {
    paths
        .get(file.0)
        .map(PathBuf::as_path)
        .ok_or_else(|| IoError::NotFound(format!("container file {}", file.0)))
}
