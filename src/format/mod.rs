//! Readers for the vendor slide formats.
//!
//! - [`detect`] classifies a path into a [`Vendor`]
//! - [`tiff`] reads the TIFF structure shared by Aperio, Hamamatsu, Ventana
//!   and Philips TIFF slides
//! - [`mirax`] reads the `Slidedat.ini` and `Index.dat` companions of a
//!   3DHistech slide
//! - [`aperio`], [`ventana`] and [`philips`] extract vendor properties from
//!   the text they embed in tag values

use std::ops::Range;

pub mod aperio;
pub mod detect;
pub mod mirax;
pub mod philips;
pub mod tiff;
pub mod ventana;

pub use detect::{sniff, Vendor};

/// A vendor property found inside a larger text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Vendor-qualified key, e.g. `aperio.Filename`
    pub key: String,
    pub value: String,
    /// Byte range of the value inside the enclosing text
    pub range: Range<usize>,
}
