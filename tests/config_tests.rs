// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use mirror::Config;
use mirror::config::{JsonPreferenceStore, PhotoOutputFormat, PreferenceStore, SaveLocation};
use mirror::constants::keys;
use mirror::pipelines::photo::EncodingQuality;
use mirror::session::SelectionPolicy;
use serde_json::Value;
use std::path::PathBuf;

fn temp_store_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("mirror-config-{}", uuid::Uuid::new_v4()))
        .join("preferences.json")
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(config.mirrored, "Mirroring should be enabled by default");
    assert_eq!(config.selected_camera_id, None);
    assert_eq!(config.photo_format, PhotoOutputFormat::Jpeg);
    assert_eq!(config.save_location, SaveLocation::Library);
}

#[test]
fn test_json_store_round_trip() {
    let path = temp_store_path();

    {
        let store = JsonPreferenceStore::open(&path).unwrap();
        store
            .set(keys::SELECTED_CAMERA_ID, Value::String("v4l2:usb-1:Webcam".into()))
            .unwrap();
        store.set(keys::MIRRORED, Value::Bool(false)).unwrap();
    }
    assert!(path.exists(), "Every write should reach the disk");

    let store = JsonPreferenceStore::open(&path).unwrap();
    let config = Config::load(&store);
    assert_eq!(
        config.selected_camera_id.as_deref(),
        Some("v4l2:usb-1:Webcam")
    );
    assert!(!config.mirrored);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_full_config_survives_reload() {
    let path = temp_store_path();
    let config = Config {
        selected_camera_id: Some("cam".into()),
        mirrored: false,
        photo_format: PhotoOutputFormat::Png,
        jpeg_quality: EncodingQuality::Maximum,
        save_location: SaveLocation::Dialog,
        selection_policy: SelectionPolicy {
            preferred_name_hints: vec!["logitech".into()],
            deprioritized_name_hints: vec![],
        },
    };

    config
        .save_to(&JsonPreferenceStore::open(&path).unwrap())
        .unwrap();
    let reloaded = Config::load(&JsonPreferenceStore::open(&path).unwrap());
    assert_eq!(reloaded, config);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_remove_clears_key_on_disk() {
    let path = temp_store_path();
    let store = JsonPreferenceStore::open(&path).unwrap();
    store
        .set(keys::SELECTED_CAMERA_ID, Value::String("cam".into()))
        .unwrap();
    store.remove(keys::SELECTED_CAMERA_ID).unwrap();

    let reopened = JsonPreferenceStore::open(&path).unwrap();
    assert_eq!(reopened.get(keys::SELECTED_CAMERA_ID), None);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn test_non_object_file_is_rejected() {
    let path = temp_store_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "[1, 2, 3]").unwrap();

    assert!(JsonPreferenceStore::open(&path).is_err());

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}
