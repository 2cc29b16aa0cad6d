//! Output naming and staging for copy mode.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::container::Container;
use crate::error::{AnonymizeError, IoError};

/// Check that `label` names a file next to the source and nothing else.
pub fn validate_label(label: &str) -> Result<(), AnonymizeError> {
    let mut components = Path::new(label).components();
    let plain = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == label
    );

    let reason = if label.is_empty() {
        "label is empty"
    } else if label.contains('\0') {
        "label contains a NUL byte"
    } else if label.contains('/') || label.contains('\\') {
        "label contains a path separator"
    } else if !plain {
        "label is not a plain file name"
    } else {
        return Ok(());
    };
    Err(AnonymizeError::InvalidRequest(format!("{}: {:?}", reason, label)))
}

/// Final paths of a copy-mode output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub label: String,
    /// `<label>.<ext>` next to the source
    pub primary: PathBuf,
    /// `<label>/` next to the source, for slides with companion files
    pub companion: Option<PathBuf>,
}

impl OutputTarget {
    pub fn new(container: &Container, label: &str) -> Result<Self, AnonymizeError> {
        validate_label(label)?;

        let source = container.primary_path();
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                AnonymizeError::InvalidRequest(format!(
                    "{} has no extension to reuse",
                    source.display()
                ))
            })?;

        let primary = source.with_file_name(format!("{}.{}", label, extension));
        let companion = companion_dir(container).map(|_| source.with_file_name(label));
        let collides = primary == source
            || companion
                .as_deref()
                .is_some_and(|dir| Some(dir) == companion_dir(container));
        if collides {
            return Err(AnonymizeError::InvalidRequest(format!(
                "label {:?} would overwrite {}",
                label,
                source.display()
            )));
        }

        Ok(Self {
            label: label.to_string(),
            primary,
            companion,
        })
    }
}

/// Folder holding the container's companion files, if it has any.
fn companion_dir(container: &Container) -> Option<&Path> {
    container
        .files
        .iter()
        .find(|f| f.companion)
        .and_then(|f| f.path.parent())
}

/// Hidden copies of the source files that the plan is applied to.
///
/// Nothing at the target paths changes until [`Staging::commit`].
#[derive(Debug)]
pub struct Staging {
    target: OutputTarget,
    primary: PathBuf,
    companion: Option<PathBuf>,
    /// Staged location of every container file, by file id
    paths: Vec<PathBuf>,
    /// Source files; no folder holding one of them is ever removed
    sources: Vec<PathBuf>,
}

impl Staging {
    /// Copy the container's files to hidden siblings of the target.
    pub async fn create(container: &Container, target: &OutputTarget) -> Result<Self, IoError> {
        let primary = hidden_sibling(&target.primary);
        let companion = target.companion.as_deref().map(hidden_sibling);

        let mut staging = Self {
            target: target.clone(),
            primary,
            companion,
            paths: Vec::with_capacity(container.files.len()),
            sources: container.files.iter().map(|f| f.path.clone()).collect(),
        };
        if let Err(e) = staging.copy(container).await {
            staging.discard().await;
            return Err(e);
        }
        Ok(staging)
    }

    async fn copy(&mut self, container: &Container) -> Result<(), IoError> {
        copy_file(container.primary_path(), &self.primary).await?;

        if let Some(dir) = &self.companion {
            remove_output_dir(dir, &self.sources).await?;
            tokio::fs::create_dir(dir)
                .await
                .map_err(|e| IoError::from_std(dir.display(), e))?;

            // the whole companion folder travels, not just the parsed files
            if let Some(source_dir) = companion_dir(container) {
                copy_dir_files(source_dir, dir).await?;
            }
        }

        for file in &container.files {
            let staged = match (&self.companion, file.companion, file.path.file_name()) {
                (Some(dir), true, Some(name)) => dir.join(name),
                _ => self.primary.clone(),
            };
            self.paths.push(staged);
        }
        debug!(
            files = self.paths.len(),
            "staged copy at {}",
            self.primary.display()
        );
        Ok(())
    }

    /// Staged path of every container file, by file id.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Move the staged copies onto the target paths, replacing anything
    /// already there. Returns the primary output path.
    pub async fn commit(self) -> Result<PathBuf, IoError> {
        let result = self.rename_into_place().await;
        if result.is_err() {
            self.discard().await;
        }
        result.map(|_| self.target.primary.clone())
    }

    async fn rename_into_place(&self) -> Result<(), IoError> {
        tokio::fs::rename(&self.primary, &self.target.primary)
            .await
            .map_err(|e| IoError::from_std(self.target.primary.display(), e))?;

        let (Some(staged), Some(target)) = (&self.companion, &self.target.companion) else {
            return Ok(());
        };
        let moved = match remove_output_dir(target, &self.sources).await {
            Ok(()) => tokio::fs::rename(staged, target)
                .await
                .map_err(|e| IoError::from_std(target.display(), e)),
            Err(e) => Err(e),
        };
        if moved.is_err() {
            // no primary output without its companion folder
            if let Err(e) = tokio::fs::remove_file(&self.target.primary).await {
                warn!("cannot remove {}: {}", self.target.primary.display(), e);
            }
        }
        moved
    }

    /// Remove whatever was staged. Failures are only logged.
    pub async fn discard(&self) {
        if let Err(e) = tokio::fs::remove_file(&self.primary).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("cannot remove {}: {}", self.primary.display(), e);
            }
        }
        if let Some(dir) = &self.companion {
            if let Err(e) = remove_output_dir(dir, &self.sources).await {
                warn!("cannot remove {}: {}", dir.display(), e);
            }
        }
    }
}

/// `<dir>/.<name>.partial`
fn hidden_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), IoError> {
    tokio::fs::copy(from, to)
        .await
        .map(|_| ())
        .map_err(|e| IoError::from_std(from.display(), e))
}

/// Copy the regular files of `from` into `to`.
async fn copy_dir_files(from: &Path, to: &Path) -> Result<(), IoError> {
    let mut entries = tokio::fs::read_dir(from)
        .await
        .map_err(|e| IoError::from_std(from.display(), e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| IoError::from_std(from.display(), e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| IoError::from_std(entry.path().display(), e))?;
        if file_type.is_file() {
            copy_file(&entry.path(), &to.join(entry.file_name())).await?;
        }
    }
    Ok(())
}

/// Remove an output folder, refusing one that holds any of `sources`.
async fn remove_output_dir(dir: &Path, sources: &[PathBuf]) -> Result<(), IoError> {
    let resolved = tokio::fs::canonicalize(dir).await.ok();
    for source in sources {
        let holds_source = source.starts_with(dir)
            || match (&resolved, tokio::fs::canonicalize(source).await) {
                (Some(dir), Ok(source)) => source.starts_with(dir),
                _ => false,
            };
        if holds_source {
            return Err(IoError::Os {
                path: dir.display().to_string(),
                message: format!("folder holds source file {}", source.display()),
            });
        }
    }
    remove_dir_if_present(dir).await
}

async fn remove_dir_if_present(dir: &Path) -> Result<(), IoError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IoError::from_std(dir.display(), e)),
    }
}
