// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the photo pipeline and sinks

use mirror::backends::camera::types::CameraFrame;
use mirror::backends::camera::virtual_camera::test_pattern;
use mirror::pipelines::photo::{
    EncodingFormat, EncodingQuality, LibrarySink, PhotoEncoder, PhotoPipeline, PhotoSink,
    SaveOutcome, resolve_dialog_path,
};
use std::path::PathBuf;

#[test]
fn test_dialog_extension_picks_format() {
    let (path, format) = resolve_dialog_path(PathBuf::from("shot.png"), EncodingFormat::Jpeg);
    assert_eq!(path, PathBuf::from("shot.png"));
    assert_eq!(format, EncodingFormat::Png);

    let (path, format) = resolve_dialog_path(PathBuf::from("shot.jpeg"), EncodingFormat::Png);
    assert_eq!(path, PathBuf::from("shot.jpeg"));
    assert_eq!(format, EncodingFormat::Jpeg);
}

#[test]
fn test_dialog_without_extension_keeps_photo_format() {
    let (path, format) = resolve_dialog_path(PathBuf::from("shot"), EncodingFormat::Jpeg);
    assert_eq!(path, PathBuf::from("shot.jpg"));
    assert_eq!(format, EncodingFormat::Jpeg);

    let (path, _) = resolve_dialog_path(PathBuf::from("shot.tiff"), EncodingFormat::Png);
    assert_eq!(path, PathBuf::from("shot.tiff.png"));
}

#[test]
fn test_library_sink_writes_developed_photo() {
    let dir = std::env::temp_dir().join(format!("mirror-photos-{}", uuid::Uuid::new_v4()));
    let frame = CameraFrame::from_rgba(8, 4, test_pattern(8, 4), 1);
    let pipeline = PhotoPipeline::new(PhotoEncoder::with(
        EncodingFormat::Png,
        EncodingQuality::High,
    ));
    let photo = pipeline.develop(&frame, true, "virtual:front").unwrap();

    let outcome = LibrarySink::new(&dir).save(&photo).unwrap();
    let SaveOutcome::Saved(path) = outcome else {
        panic!("Library sink never cancels");
    };
    assert_eq!(path.extension().and_then(|ext| ext.to_str()), Some("png"));

    let decoded = image::open(&path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (8, 4));

    std::fs::remove_dir_all(&dir).unwrap();
}
