//! 3DHistech Mirax (`.mrxs`) slides.
//!
//! A Mirax slide is a small `.mrxs` stub plus a companion folder named after
//! it, holding `Slidedat.ini`, an index file and one or more data files.
//! Associated images are "non-hierarchical" levels described in the
//! `[HIERARCHICAL]` group of `Slidedat.ini`:
//!
//! ```text
//! NONHIER_COUNT = 2
//! NONHIER_0_NAME = Scan data layer
//! NONHIER_0_COUNT = 3
//! NONHIER_0_VAL_0 = ScanDataLayer_SlideThumbnail
//! NONHIER_0_VAL_0_SECTION = NONHIER_0_VAL_0
//! ```
//!
//! Each level's data is found through its record in the index file.

mod index;
mod ini;

use std::path::{Path, PathBuf};

use crate::container::AssociatedRole;
use crate::error::{FormatError, IoError};

pub use index::{
    compact_table, locate_record, table_base, RecordLocation, NONHIER_ROOT_OFFSET, SLIDE_ID_OFFSET,
};
pub use ini::{IniDocument, IniEntry, IniGroup, IniLine};

use super::detect::{mirax_companion_dir, MIRAX_SLIDEDAT};

pub const GENERAL: &str = "GENERAL";
pub const HIERARCHICAL: &str = "HIERARCHICAL";
pub const DATAFILE: &str = "DATAFILE";

/// Layer holding the scanner's overview images
pub const SCAN_DATA_LAYER: &str = "Scan data layer";

const VENDOR: &str = "Mirax";

/// Key of level `level` in layer `layer`: `NONHIER_<layer>_VAL_<level>`.
pub fn level_key(layer: usize, level: usize) -> String {
    format!("NONHIER_{}_VAL_{}", layer, level)
}

/// Role of a level of the scan data layer, by its name.
pub fn role_for_level(layer_name: &str, level_name: &str) -> Option<AssociatedRole> {
    if layer_name != SCAN_DATA_LAYER {
        return None;
    }
    match level_name {
        "ScanDataLayer_SlideBarcode" => Some(AssociatedRole::Label),
        "ScanDataLayer_SlidePreview" => Some(AssociatedRole::Macro),
        "ScanDataLayer_SlideThumbnail" => Some(AssociatedRole::Thumbnail),
        _ => None,
    }
}

/// A non-hierarchical level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiraxLevel {
    pub layer: usize,
    pub index: usize,
    pub name: String,
    /// Group of `Slidedat.ini` holding the level's parameters
    pub section: Option<String>,
    /// Record number in the index file
    pub record: usize,
}

/// A non-hierarchical layer and its levels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiraxLayer {
    pub index: usize,
    pub name: String,
    pub levels: Vec<MiraxLevel>,
}

/// The parsed description of a Mirax slide.
#[derive(Debug, Clone)]
pub struct MiraxSlide {
    pub companion_dir: PathBuf,
    pub ini: IniDocument,
    pub index_file: String,
    pub data_files: Vec<String>,
    pub layers: Vec<MiraxLayer>,
}

impl MiraxSlide {
    /// Load the companion `Slidedat.ini` of the `.mrxs` file at `path`.
    pub async fn open(path: &Path) -> Result<Self, FormatError> {
        let companion_dir = mirax_companion_dir(path).ok_or_else(|| {
            FormatError::malformed(VENDOR, format!("no companion folder for {}", path.display()))
        })?;
        let slidedat = companion_dir.join(MIRAX_SLIDEDAT);
        let bytes = tokio::fs::read(&slidedat)
            .await
            .map_err(|e| IoError::from_std(slidedat.display(), e))?;

        Self::from_ini(companion_dir, IniDocument::parse(&bytes))
    }

    /// Build the layer structure from a parsed `Slidedat.ini`.
    pub fn from_ini(companion_dir: PathBuf, ini: IniDocument) -> Result<Self, FormatError> {
        let index_file = required(&ini, HIERARCHICAL, "INDEXFILE")?.to_string();

        let file_count = number(&ini, DATAFILE, "FILE_COUNT")?;
        let data_files = (0..file_count)
            .map(|i| required(&ini, DATAFILE, &format!("FILE_{}", i)).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;

        let layer_count = number(&ini, HIERARCHICAL, "NONHIER_COUNT")?;
        let mut layers = Vec::with_capacity(layer_count);
        let mut record = 0;

        for layer in 0..layer_count {
            let name = required(&ini, HIERARCHICAL, &format!("NONHIER_{}_NAME", layer))?;
            let count = number(&ini, HIERARCHICAL, &format!("NONHIER_{}_COUNT", layer))?;

            let levels = (0..count)
                .map(|level| {
                    let key = level_key(layer, level);
                    let level = MiraxLevel {
                        layer,
                        index: level,
                        name: required(&ini, HIERARCHICAL, &key)?.to_string(),
                        section: ini
                            .get(HIERARCHICAL, &format!("{}_SECTION", key))
                            .map(str::to_string),
                        record: record + level,
                    };
                    Ok(level)
                })
                .collect::<Result<Vec<_>, FormatError>>()?;
            record += count;

            layers.push(MiraxLayer {
                index: layer,
                name: name.to_string(),
                levels,
            });
        }

        Ok(Self {
            companion_dir,
            ini,
            index_file,
            data_files,
            layers,
        })
    }

    /// Total number of non-hierarchical records.
    pub fn record_count(&self) -> usize {
        self.layers.iter().map(|l| l.levels.len()).sum()
    }

    /// All levels in record order.
    pub fn levels(&self) -> impl Iterator<Item = (&MiraxLayer, &MiraxLevel)> {
        self.layers
            .iter()
            .flat_map(|layer| layer.levels.iter().map(move |level| (layer, level)))
    }

    pub fn index_path(&self) -> PathBuf {
        self.companion_dir.join(&self.index_file)
    }

    pub fn slidedat_path(&self) -> PathBuf {
        self.companion_dir.join(MIRAX_SLIDEDAT)
    }
}

/// Remove a level from `Slidedat.ini`.
///
/// Deletes the level's section group and its `NONHIER_<i>_VAL_<j>*` keys,
/// renames the keys of later levels in the layer down by one, and
/// decrements the layer's count. `level_count` is the layer's count before
/// this removal.
pub fn remove_level(ini: &mut IniDocument, level: &MiraxLevel, level_count: usize) {
    if let Some(section) = &level.section {
        ini.remove_group(section);
    }

    let key = level_key(level.layer, level.index);
    let key_prefix = format!("{}_", key);
    ini.remove_entries(HIERARCHICAL, |k| k == key || k.starts_with(&key_prefix));

    for later in level.index + 1..level_count {
        let old = level_key(level.layer, later);
        let new = level_key(level.layer, later - 1);
        let old_prefix = format!("{}_", old);
        ini.rename_keys(HIERARCHICAL, |k| {
            if k == old {
                Some(new.clone())
            } else {
                k.strip_prefix(&old_prefix)
                    .map(|rest| format!("{}_{}", new, rest))
            }
        });
    }

    let count_key = format!("NONHIER_{}_COUNT", level.layer);
    let new_count = level_count.saturating_sub(1).to_string();
    ini.set(HIERARCHICAL, &count_key, &new_count);
}

fn required<'a>(ini: &'a IniDocument, group: &str, key: &str) -> Result<&'a str, FormatError> {
    ini.get(group, key)
        .ok_or_else(|| FormatError::malformed(VENDOR, format!("missing [{}] {}", group, key)))
}

fn number(ini: &IniDocument, group: &str, key: &str) -> Result<usize, FormatError> {
    let value = required(ini, group, key)?;
    value.parse().map_err(|_| {
        FormatError::malformed(VENDOR, format!("[{}] {} is not a count: {}", group, key, value))
    })
}
