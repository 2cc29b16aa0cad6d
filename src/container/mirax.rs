//! Containers for 3DHistech Mirax slides.
//!
//! File ids: `0` is the `.mrxs` stub, `1` is `Slidedat.ini`, `2` is the index
//! file and the data files follow in `[DATAFILE]` order.

use std::path::Path;

use tracing::debug;

use crate::error::FormatError;
use crate::format::mirax::{
    locate_record, role_for_level, table_base, MiraxSlide, GENERAL, SLIDE_ID_OFFSET,
};
use crate::format::Vendor;
use crate::io::{BlockCache, LocalFile, RangeReader};

use super::{
    container_file, Container, ContainerFile, DataSpan, Directory, Field, FieldKind, FileId,
    Layout, Location, MiraxLayout, Span, TagEntry, TagValue,
};

const SLIDEDAT: FileId = FileId(1);
const INDEX: FileId = FileId(2);
const FIRST_DATA_FILE: usize = 3;

const SLIDE_ID_KEY: &str = "SLIDE_ID";
const CREATION_KEY: &str = "SLIDE_CREATIONDATETIME";

pub(super) async fn parse(path: &Path) -> Result<Container, FormatError> {
    let slide = MiraxSlide::open(path).await?;

    let mut files = vec![
        container_file(path.to_path_buf(), false).await?,
        container_file(slide.slidedat_path(), true).await?,
        container_file(slide.index_path(), true).await?,
    ];
    for name in &slide.data_files {
        files.push(container_file(slide.companion_dir.join(name), true).await?);
    }

    let index = BlockCache::new(LocalFile::open(slide.index_path()).await?);
    let base = table_base(&index).await?;
    let table = index
        .read_exact_at(base, 4 * slide.record_count())
        .await?
        .to_vec();

    let mut fields = Vec::new();
    let mut directories = vec![general_directory(&slide, &files, &mut fields).await?];
    let mut roles = Vec::new();

    for (layer, level) in slide.levels() {
        let location = locate_record(&index, level.record).await?;
        let file = FileId(FIRST_DATA_FILE + location.file_number);
        let Some(data_file) = files.get(file.0) else {
            return Err(FormatError::malformed(
                "Mirax",
                format!(
                    "record {} names data file {} of {}",
                    level.record,
                    location.file_number,
                    slide.data_files.len()
                ),
            ));
        };
        if location.position + location.size > data_file.size {
            return Err(FormatError::malformed(
                "Mirax",
                format!("record {} extends past the end of its data file", level.record),
            ));
        }

        let mut directory = Directory::new(directories.len(), level.name.clone());
        directory.data.push(DataSpan {
            span: Span::new(file, location.position, location.size),
            fill: 0,
        });
        if let Some(section) = &level.section {
            directory.entries = ini_entries(&slide, section);
        }
        if let Some(role) = role_for_level(&layer.name, &level.name) {
            roles.push((directory.index, role));
        }
        debug!(
            record = level.record,
            layer = %layer.name,
            level = %level.name,
            "located non-hierarchical level"
        );
        directories.push(directory);
    }

    let mut container = Container {
        vendor: Vendor::Mirax,
        files,
        layout: Layout::Mirax(MiraxLayout {
            slide,
            slidedat: SLIDEDAT,
            index: INDEX,
            table_base: base,
            table,
            ini_modified: false,
            table_modified: false,
            linked_ini: None,
        }),
        fields,
        directories,
        wipes: Vec::new(),
    };
    for (index, role) in roles {
        container.assign_role(index, role);
    }
    Ok(container)
}

/// The `[GENERAL]` group as directory 0.
///
/// The slide id is also located in the headers of the index and data files
/// wherever those hold the same bytes.
async fn general_directory(
    slide: &MiraxSlide,
    files: &[ContainerFile],
    fields: &mut Vec<Field>,
) -> Result<Directory, FormatError> {
    let mut directory = Directory::new(0, "Slidedat");
    directory.entries = ini_entries(slide, GENERAL);

    let slide_id = match slide.ini.get(GENERAL, SLIDE_ID_KEY) {
        Some(id) if !id.is_empty() => id,
        _ => return Ok(directory),
    };
    let key = format!("mirax.{}.{}", GENERAL, SLIDE_ID_KEY);
    let len = slide_id.len();

    for (i, info) in files.iter().enumerate().skip(INDEX.0) {
        if info.size < SLIDE_ID_OFFSET + len as u64 {
            continue;
        }
        let reader = LocalFile::open(&info.path).await?;
        let bytes = reader.read_exact_at(SLIDE_ID_OFFSET, len).await?;
        if &bytes[..] != slide_id.as_bytes() {
            continue;
        }

        fields.push(Field {
            span: Span::new(FileId(i), SLIDE_ID_OFFSET, len as u64),
            kind: FieldKind::FixedRegion { pad: b'0' },
            content: bytes.to_vec(),
            modified: false,
        });
        let field = fields.len() - 1;
        if let Some(entry) = directory.entries.iter_mut().find(|e| e.key == key) {
            entry.locations.push(Location::Field {
                field,
                range: 0..len,
            });
        }
    }
    Ok(directory)
}

/// Entries of an ini group, keyed `mirax.<group>.<KEY>`.
fn ini_entries(slide: &MiraxSlide, group: &str) -> Vec<TagEntry> {
    let Some(g) = slide.ini.group(group) else {
        return Vec::new();
    };
    g.entries()
        .map(|e| {
            let value = if e.key == CREATION_KEY {
                TagValue::DateTime(e.value.clone())
            } else {
                TagValue::Text(e.value.clone())
            };
            TagEntry::new(format!("mirax.{}.{}", group, e.key), value).located(Location::Ini {
                group: group.to_string(),
                key: e.key.clone(),
            })
        })
        .collect()
}
