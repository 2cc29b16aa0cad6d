//! Anonymization orchestrator.
//!
//! [`Engine`] is the entry point for callers. It sequences sniffing,
//! parsing, unlinking, redaction and the rewrite for one slide at a time:
//! every public operation holds the engine's lock for its whole duration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::container::Container;
use crate::error::AnonymizeError;
use crate::format::{sniff, Vendor};
use crate::redact::{redact, redaction_plan};
use crate::rewrite::{self, validate_label};
use crate::unlink::{unlink, UnlinkOptions};

// =============================================================================
// Constants
// =============================================================================

/// Largest number of pairs returned by [`Engine::get_wsi_data`].
pub const MAX_METADATA_ENTRIES: usize = 4096;

/// Largest total size of keys and values returned by [`Engine::get_wsi_data`].
pub const MAX_METADATA_BYTES: usize = 1024 * 1024;

/// Label used when the caller does not name the output.
pub const DEFAULT_LABEL: &str = "anonymized";

// =============================================================================
// Requests and results
// =============================================================================

/// One anonymization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizationRequest {
    pub path: PathBuf,
    /// Output file stem in copy mode
    pub new_label: String,
    pub keep_macro_image: bool,
    pub disable_unlinking: bool,
    pub do_in_place: bool,
}

impl AnonymizationRequest {
    /// A copy-mode request with default flags.
    pub fn new(path: impl Into<PathBuf>, new_label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            new_label: new_label.into(),
            keep_macro_image: false,
            disable_unlinking: false,
            do_in_place: false,
        }
    }

    fn unlink_options(&self) -> UnlinkOptions {
        UnlinkOptions {
            keep_macro: self.keep_macro_image,
            disable_unlinking: self.disable_unlinking,
        }
    }
}

/// Output path on success; the typed error (with its `-1` code) otherwise.
pub type AnonymizationResult = Result<PathBuf, AnonymizeError>;

/// Ordered key/value pairs with size caps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataList {
    pub entries: Vec<(String, String)>,
    /// Set when pairs were dropped to stay within the caps
    pub truncated: bool,
    #[serde(skip)]
    bytes: usize,
}

impl MetadataList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair, unless a cap has been reached.
    ///
    /// Returns false once the list is truncated.
    pub fn push(&mut self, key: String, value: String) -> bool {
        let size = key.len() + value.len();
        if self.truncated
            || self.entries.len() >= MAX_METADATA_ENTRIES
            || self.bytes + size > MAX_METADATA_BYTES
        {
            self.truncated = true;
            return false;
        }
        self.bytes += size;
        self.entries.push((key, value));
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for MetadataList {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut list = MetadataList::new();
        for (key, value) in iter {
            if !list.push(key, value) {
                break;
            }
        }
        list
    }
}

/// Vendor and pre-redaction attributes of a slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsiData {
    pub vendor: Vendor,
    pub metadata: MetadataList,
}

// =============================================================================
// Engine
// =============================================================================

/// The anonymization engine.
///
/// Operations run one at a time, end to end, whichever files they touch.
#[derive(Debug, Default)]
pub struct Engine {
    lock: Mutex<()>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the file at `path`. Only reads.
    pub async fn check_file_format(&self, path: &Path) -> Vendor {
        let _guard = self.lock.lock().await;
        sniff(path).await
    }

    /// Vendor and attribute list of the slide at `path`. Only reads.
    ///
    /// Unknown and unreadable files yield their classification with no
    /// attributes; a supported file that fails to parse is an error.
    pub async fn get_wsi_data(&self, path: &Path) -> Result<WsiData, AnonymizeError> {
        let _guard = self.lock.lock().await;

        let vendor = sniff(path).await;
        if !vendor.is_supported() {
            return Ok(WsiData {
                vendor,
                metadata: MetadataList::new(),
            });
        }

        let container = Container::parse(path, vendor).await?;
        let metadata: MetadataList = container.metadata().into_iter().collect();
        if metadata.truncated {
            debug!(entries = metadata.len(), "metadata list truncated");
        }
        Ok(WsiData { vendor, metadata })
    }

    /// Anonymize one slide.
    ///
    /// Returns the output path in copy mode and the source path in in-place
    /// mode. Nothing is written unless the slide parses; a failed copy
    /// leaves no output behind.
    pub async fn anonymize_wsi(&self, request: &AnonymizationRequest) -> AnonymizationResult {
        let _guard = self.lock.lock().await;
        self.run(request).await
    }

    #[instrument(name = "anonymize", skip(self, request), fields(path = %request.path.display()))]
    async fn run(&self, request: &AnonymizationRequest) -> AnonymizationResult {
        let path = request.path.as_path();
        let vendor = sniff(path).await;
        match vendor {
            Vendor::Invalid => {
                return Err(AnonymizeError::InvalidInput(format!(
                    "cannot read {}",
                    path.display()
                )))
            }
            v if !v.is_supported() => {
                return Err(AnonymizeError::UnsupportedFormat(format!(
                    "{} is not a supported slide ({})",
                    path.display(),
                    v
                )))
            }
            _ => {}
        }
        if !request.do_in_place {
            validate_label(&request.new_label)?;
        }

        let mut container = Container::parse(path, vendor).await?;
        let unlinked = unlink(&mut container, &request.unlink_options())?;
        let redacted = redact(&mut container, redaction_plan(vendor));
        debug!(
            removed = unlinked.removed.len(),
            wiped = unlinked.wiped,
            entries = redacted.entries,
            fields = redacted.fields,
            "container mutated"
        );

        let output = rewrite::write(&container, &request.new_label, request.do_in_place).await?;
        info!(vendor = %vendor, "anonymized slide written to {}", output.display());
        Ok(output)
    }
}
