//! Command-line configuration for the anonymizer.
//!
//! Every option can also be set through an environment variable with the
//! `WSI_ANON_` prefix:
//!
//! - `WSI_ANON_NAME` - Output label in copy mode (default: anonymized)
//! - `WSI_ANON_KEEP_MACRO` - Keep the macro image
//! - `WSI_ANON_DISABLE_UNLINKING` - Blank associated images but keep them linked
//! - `WSI_ANON_IN_PLACE` - Edit the source files instead of writing a copy
//!
//! There are no configuration files.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::engine::{AnonymizationRequest, DEFAULT_LABEL};
use crate::rewrite::validate_label;

// =============================================================================
// CLI Arguments
// =============================================================================

/// WSI Anonymizer - removes patient-identifying data from Whole Slide Images.
///
/// Redacts identifying metadata and removes the label and macro images of
/// Aperio, Hamamatsu, Mirax, Ventana and Philips slides, leaving the pixel
/// pyramid untouched.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-anonymizer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the vendor of a slide
    Check(CheckConfig),

    /// Print the vendor and metadata of a slide
    Inspect(InspectConfig),

    /// Anonymize a slide
    Anonymize(AnonymizeConfig),
}

impl Command {
    /// Whether debug logging was requested.
    pub fn verbose(&self) -> bool {
        match self {
            Command::Check(c) => c.verbose,
            Command::Inspect(c) => c.verbose,
            Command::Anonymize(c) => c.verbose,
        }
    }
}

/// Arguments of `check`.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Slide file to classify
    pub path: PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CheckConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_path(&self.path)
    }
}

/// Arguments of `inspect`.
#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// Slide file to inspect
    pub path: PathBuf,

    /// Print JSON instead of aligned text.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl InspectConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_path(&self.path)
    }
}

/// Arguments of `anonymize`.
#[derive(Args, Debug, Clone)]
pub struct AnonymizeConfig {
    /// Slide file to anonymize (the `.mrxs` file for Mirax slides)
    pub path: PathBuf,

    /// Output label; the copy is written as `<name>.<ext>` beside the source.
    #[arg(short = 'n', long = "name", default_value = DEFAULT_LABEL, env = "WSI_ANON_NAME")]
    pub name: String,

    /// Keep the macro image.
    #[arg(short = 'm', long, default_value_t = false, env = "WSI_ANON_KEEP_MACRO")]
    pub keep_macro_image: bool,

    /// Blank associated images but leave them in the directory chain.
    #[arg(short = 'u', long, default_value_t = false, env = "WSI_ANON_DISABLE_UNLINKING")]
    pub disable_unlinking: bool,

    /// Edit the source files instead of writing a copy.
    ///
    /// WARNING: the original metadata cannot be recovered afterwards.
    #[arg(short = 'i', long, default_value_t = false, env = "WSI_ANON_IN_PLACE")]
    pub in_place: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl AnonymizeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_path(&self.path)?;
        if !self.in_place {
            validate_label(&self.name).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// The engine request these arguments describe.
    pub fn request(&self) -> AnonymizationRequest {
        AnonymizationRequest {
            path: self.path.clone(),
            new_label: self.name.clone(),
            keep_macro_image: self.keep_macro_image,
            disable_unlinking: self.disable_unlinking,
            do_in_place: self.in_place,
        }
    }
}

fn validate_path(path: &std::path::Path) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("A slide path is required".to_string());
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
