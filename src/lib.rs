//! # WSI Anonymizer
//!
//! Removes patient-identifying information from Whole Slide Image files.
//!
//! Slides from Aperio, Hamamatsu, 3DHistech (Mirax), Ventana and Philips
//! scanners carry identifying text in their metadata (file names, barcodes,
//! operators, acquisition dates) and a photograph of the glass label. This
//! library redacts that text and removes the label and macro images while
//! leaving the pixel pyramid byte-identical.
//!
//! ## Architecture
//!
//! - [`mod@format`] - vendor detection and the TIFF, Mirax and Philips readers
//! - [`container`] - the vendor-neutral model every slide is parsed into
//! - [`redact`] - per-vendor redaction rule tables
//! - [`unlink`] - associated-image removal
//! - [`rewrite`] - turns a mutated container into byte edits and applies them
//! - [`engine`] - sequences the above, one request at a time
//! - [`io`] - async range readers and writers over local files
//! - [`config`] - CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_anonymizer::{AnonymizationRequest, Engine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::new();
//!     let request = AnonymizationRequest::new("/data/CMU-1.svs", "case-17");
//!
//!     match engine.anonymize_wsi(&request).await {
//!         Ok(path) => println!("written to {}", path.display()),
//!         Err(e) => eprintln!("failed ({}): {}", e.code(), e),
//!     }
//! }
//! ```

pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod format;
pub mod io;
pub mod redact;
pub mod rewrite;
pub mod unlink;

// Re-export commonly used types
pub use config::{AnonymizeConfig, CheckConfig, Cli, Command, InspectConfig};
pub use container::{AssociatedRole, Container, Directory, TagEntry, TagValue};
pub use engine::{
    AnonymizationRequest, AnonymizationResult, Engine, MetadataList, WsiData,
    MAX_METADATA_BYTES, MAX_METADATA_ENTRIES,
};
pub use error::{AnonymizeError, ErrorKind, FormatError, IoError, TiffError, FAILURE_CODE};
pub use format::{sniff, Vendor};
pub use redact::{redact, redaction_plan, Policy, RedactionRule};
pub use rewrite::{MutationPlan, Phase};
pub use unlink::{unlink, UnlinkOptions, UnlinkOutcome};
