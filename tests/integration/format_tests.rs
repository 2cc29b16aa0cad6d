//! Vendor detection and inspection of synthetic slides.

use super::test_utils::*;
use wsi_anonymizer::{Engine, Vendor};

// =============================================================================
// Detection
// =============================================================================

#[tokio::test]
async fn test_detect_every_vendor() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new();

    let cases = [
        (write_file(dir.path(), "a.svs", &aperio_slide().data), Vendor::Aperio),
        (write_file(dir.path(), "h.ndpi", &hamamatsu_slide().data), Vendor::Hamamatsu),
        (write_file(dir.path(), "v.bif", &ventana_slide().data), Vendor::Ventana),
        (write_file(dir.path(), "p.tiff", &philips_tiff_slide().data), Vendor::PhilipsTiff),
        (write_file(dir.path(), "i.isyntax", &isyntax_file()), Vendor::PhilipsISyntax),
        (write_mirax(dir.path(), "m"), Vendor::Mirax),
    ];

    for (path, expected) in cases {
        assert_eq!(
            engine.check_file_format(&path).await,
            expected,
            "{}",
            path.display()
        );
    }
}

#[tokio::test]
async fn test_detect_big_endian_and_bigtiff() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new();

    let be = aperio_slide_with(ByteOrderType::BigEndian, Dialect::Classic);
    let path = write_file(dir.path(), "be.svs", &be.data);
    assert_eq!(engine.check_file_format(&path).await, Vendor::Aperio);

    let big = aperio_slide_with(ByteOrderType::LittleEndian, Dialect::BigTiff);
    let path = write_file(dir.path(), "big.svs", &big.data);
    assert_eq!(engine.check_file_format(&path).await, Vendor::Aperio);
}

#[tokio::test]
async fn test_detect_plain_tiff_is_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let plain = TiffBuilder::new()
        .add_ifd(
            IfdBuilder::new()
                .dimensions(64, 64)
                .ascii(TAG_IMAGE_DESCRIPTION, "an ordinary picture")
                .strips(vec![pixels(0x10, 32)]),
        )
        .build();
    let path = write_file(dir.path(), "plain.tif", &plain.data);

    let engine = Engine::new();
    assert_eq!(engine.check_file_format(&path).await, Vendor::Unknown);
}

#[tokio::test]
async fn test_detect_mrxs_without_companion() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "lonely.mrxs", b"MRXS stub");

    let engine = Engine::new();
    assert!(!engine.check_file_format(&path).await.is_supported());
}

#[tokio::test]
async fn test_detect_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::new();

    let empty = write_file(dir.path(), "empty.svs", b"");
    assert_eq!(engine.check_file_format(&empty).await, Vendor::Invalid);
    assert_eq!(engine.check_file_format(dir.path()).await, Vendor::Invalid);
}

// =============================================================================
// Inspection
// =============================================================================

#[tokio::test]
async fn test_inspect_aperio() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "CMU-1.svs", &aperio_slide().data);

    let data = Engine::new().get_wsi_data(&path).await.unwrap();
    assert_eq!(data.vendor, Vendor::Aperio);

    let metadata = &data.metadata;
    assert_eq!(metadata.get("aperio.Filename"), Some("CMU-1"));
    assert_eq!(metadata.get("aperio.User"), Some(APERIO_USER));
    assert_eq!(metadata.get("aperio.Date"), Some("12/29/09"));
    assert_eq!(metadata.get("aperio.MPP"), Some("0.4990"));
    assert_eq!(metadata.get("tiff.ImageWidth"), Some("2220"));
    assert!(metadata.get("associated.label").is_some());
    assert!(metadata.get("associated.macro").is_some());
    assert!(metadata.get("associated.thumbnail").is_some());
    assert!(!metadata.truncated);

    // repeated pairs are listed once
    let filenames = metadata
        .iter()
        .filter(|(k, v)| *k == "aperio.Filename" && *v == "CMU-1")
        .count();
    assert_eq!(filenames, 1);
}

#[tokio::test]
async fn test_inspect_hamamatsu() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "slide.ndpi", &hamamatsu_slide().data);

    let data = Engine::new().get_wsi_data(&path).await.unwrap();
    assert_eq!(data.vendor, Vendor::Hamamatsu);
    assert_eq!(data.metadata.get("tiff.DateTime"), Some(NDPI_DATE_TIME));
    assert_eq!(data.metadata.get("tiff.Make"), Some("Hamamatsu"));
    // the overview (lens -1) is the label
    assert!(data.metadata.get("associated.label").is_some());
    assert!(data.metadata.get("associated.macro").is_none());
}

#[tokio::test]
async fn test_inspect_ventana() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "slide.bif", &ventana_slide().data);

    let data = Engine::new().get_wsi_data(&path).await.unwrap();
    assert_eq!(data.vendor, Vendor::Ventana);
    assert_eq!(data.metadata.get("ventana.UnitNumber"), Some("BI10N0294"));
    assert_eq!(data.metadata.get("ventana.Barcode1D"), Some("S19-12345"));
    assert_eq!(data.metadata.get("ventana.ScanRes"), Some("0.25"));
    assert!(data.metadata.get("associated.label").is_some());
    assert!(data.metadata.get("associated.macro").is_some());
    assert!(data.metadata.get("associated.thumbnail").is_some());
}

#[tokio::test]
async fn test_inspect_philips_tiff() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "slide.tiff", &philips_tiff_slide().data);

    let data = Engine::new().get_wsi_data(&path).await.unwrap();
    assert_eq!(data.vendor, Vendor::PhilipsTiff);
    assert_eq!(
        data.metadata.get("philips.DICOM_DEVICE_SERIAL_NUMBER"),
        Some(PHILIPS_SERIAL)
    );
    assert!(data.metadata.get("associated.label").is_some());
    assert!(data.metadata.get("associated.macro").is_some());
}

#[tokio::test]
async fn test_inspect_isyntax() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "slide.isyntax", &isyntax_file());

    let data = Engine::new().get_wsi_data(&path).await.unwrap();
    assert_eq!(data.vendor, Vendor::PhilipsISyntax);
    assert_eq!(
        data.metadata.get("philips.DICOM_ACQUISITION_DATETIME"),
        Some("20200101120000.000000")
    );
    assert_eq!(data.metadata.get("philips.PIM_DP_UFS_BARCODE"), Some("UzE5LTEyMzQ1"));
    assert!(data.metadata.get("associated.label").is_some());
}

#[tokio::test]
async fn test_inspect_unknown_has_no_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "notes.txt", b"nothing to see\n");

    let data = Engine::new().get_wsi_data(&path).await.unwrap();
    assert_eq!(data.vendor, Vendor::Unknown);
    assert!(data.metadata.is_empty());
}
