//! End-to-end anonymization of Mirax slides and their companion folders.

use std::path::Path;

use super::test_utils::*;
use wsi_anonymizer::{AnonymizationRequest, Engine, Vendor};

fn data_record(data: &[u8], record: usize) -> &[u8] {
    let start = MIRAX_DATA_START + record * MIRAX_RECORD_SIZE;
    &data[start..start + MIRAX_RECORD_SIZE]
}

fn table(index: &[u8]) -> Vec<i32> {
    index[64..64 + 4 * MIRAX_LEVELS.len()]
        .chunks_exact(4)
        .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

#[tokio::test]
async fn test_mirax_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_mirax(dir.path(), "slide");

    let data = Engine::new().get_wsi_data(&path).await.unwrap();
    assert_eq!(data.vendor, Vendor::Mirax);
    assert_eq!(data.metadata.get("mirax.GENERAL.SLIDE_ID"), Some(MIRAX_SLIDE_ID));
    assert_eq!(data.metadata.get("mirax.GENERAL.SLIDE_NAME"), Some("patient-42"));
    assert_eq!(
        data.metadata.get("associated.label"),
        Some("ScanDataLayer_SlideBarcode")
    );
    assert_eq!(
        data.metadata.get("associated.macro"),
        Some("ScanDataLayer_SlidePreview")
    );
    assert_eq!(
        data.metadata.get("associated.thumbnail"),
        Some("ScanDataLayer_SlideThumbnail")
    );
}

#[tokio::test]
async fn test_mirax_copy() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_mirax(dir.path(), "slide");

    let engine = Engine::new();
    let output = engine
        .anonymize_wsi(&AnonymizationRequest::new(&source, "anon"))
        .await
        .unwrap();
    assert_eq!(output, dir.path().join("anon.mrxs"));
    let companion = dir.path().join("anon");
    assert!(companion.join("Slidedat.ini").is_file());

    // the source folder is untouched
    assert_eq!(read(&dir.path().join("slide").join("Index.dat")), mirax_index());
    assert_eq!(read(&dir.path().join("slide").join("Data0000.dat")), mirax_data());

    let data = engine.get_wsi_data(&output).await.unwrap();
    assert_eq!(data.vendor, Vendor::Mirax);
    let metadata = &data.metadata;
    let zeros = "0".repeat(MIRAX_SLIDE_ID.len());
    assert_eq!(metadata.get("mirax.GENERAL.SLIDE_ID"), Some(zeros.as_str()));
    assert_eq!(metadata.get("mirax.GENERAL.SLIDE_NAME"), Some("XXXXXXXXXX"));
    assert_eq!(metadata.get("mirax.GENERAL.PROJECT_NAME"), Some("XXXXXXX"));
    assert_eq!(
        metadata.get("mirax.GENERAL.SLIDE_CREATIONDATETIME"),
        Some("01/01/00 00:00:00")
    );
    assert!(metadata.get("associated.label").is_none());
    assert!(metadata.get("associated.macro").is_none());
    assert!(metadata.get("associated.thumbnail").is_some());

    // the slide id is zeroed in the file headers too
    let index = read(&companion.join("Index.dat"));
    let records = read(&companion.join("Data0000.dat"));
    assert_eq!(&index[5..5 + MIRAX_SLIDE_ID.len()], zeros.as_bytes());
    assert_eq!(&records[5..5 + MIRAX_SLIDE_ID.len()], zeros.as_bytes());

    // removed records are compacted out of the table
    let original = table(&mirax_index());
    assert_eq!(table(&index), vec![original[0], 0, 0]);

    // thumbnail data survives, barcode and preview are zeroed
    let source_data = mirax_data();
    assert_eq!(data_record(&records, 0), data_record(&source_data, 0));
    assert!(data_record(&records, 1).iter().all(|&b| b == 0));
    assert!(data_record(&records, 2).iter().all(|&b| b == 0));

    let ini = std::fs::read_to_string(companion.join("Slidedat.ini")).unwrap();
    assert!(!ini.contains("patient-42"));
    assert!(!ini.contains("ScanDataLayer_SlideBarcode"));
    assert!(!ini.contains("ScanDataLayer_SlidePreview"));
    assert!(ini.contains("NONHIER_0_COUNT = 1"));

    // no staging leftovers
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["anon", "anon.mrxs", "slide", "slide.mrxs"]);
}

#[tokio::test]
async fn test_mirax_keep_macro() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_mirax(dir.path(), "slide");

    let engine = Engine::new();
    let mut request = AnonymizationRequest::new(&source, "anon");
    request.keep_macro_image = true;
    let output = engine.anonymize_wsi(&request).await.unwrap();

    let data = engine.get_wsi_data(&output).await.unwrap();
    assert!(data.metadata.get("associated.label").is_none());
    assert!(data.metadata.get("associated.macro").is_some());

    let records = read(&dir.path().join("anon").join("Data0000.dat"));
    assert_eq!(data_record(&records, 2), data_record(&mirax_data(), 2));
    assert!(data_record(&records, 1).iter().all(|&b| b == 0));
}

#[tokio::test]
async fn test_mirax_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let source = write_mirax(dir.path(), "slide");

    let engine = Engine::new();
    let mut request = AnonymizationRequest::new(&source, "");
    request.do_in_place = true;
    let output = engine.anonymize_wsi(&request).await.unwrap();
    assert_eq!(output, source);

    let ini = std::fs::read_to_string(dir.path().join("slide").join("Slidedat.ini")).unwrap();
    assert!(!ini.contains(MIRAX_SLIDE_ID));

    // a second pass finds nothing left to do
    let index = read(&dir.path().join("slide").join("Index.dat"));
    engine.anonymize_wsi(&request).await.unwrap();
    assert_eq!(read(&dir.path().join("slide").join("Index.dat")), index);
}
