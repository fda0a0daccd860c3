use std::collections::HashMap;

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn required_pairs() -> Vec<(&'static str, &'static str)> {
    vec![
        ("FIREBASE_DATABASE_URL", "https://sketch-rtdb.firebaseio.com/"),
        ("FIREBASE_STORAGE_BUCKET", "sketch.appspot.com"),
    ]
}

#[test]
fn defaults_apply_when_only_required_vars_set() {
    let cfg = SketchConfig::from_lookup(lookup_from(&required_pairs())).unwrap();
    assert_eq!(cfg.firebase.database_url, "https://sketch-rtdb.firebaseio.com");
    assert_eq!(cfg.firebase.storage_url, DEFAULT_STORAGE_URL);
    assert_eq!(cfg.firebase.bucket, "sketch.appspot.com");
    assert!(cfg.firebase.auth_token.is_none());
    assert_eq!(cfg.fetch, FetchTimeouts { connect_secs: 10, read_secs: 10 });
    assert_eq!(cfg.placement, PlacementConfig::default());
    assert_eq!(cfg.export, ExportConfig::default());
}

#[test]
fn overrides_are_parsed() {
    let mut pairs = required_pairs();
    pairs.extend([
        ("FIREBASE_AUTH_TOKEN", "tok"),
        ("FIREBASE_STORAGE_URL", "http://localhost:9199/"),
        ("TRAVELSKETCH_FETCH_CONNECT_TIMEOUT_SECS", "3"),
        ("TRAVELSKETCH_FETCH_READ_TIMEOUT_SECS", " 4 "),
        ("TRAVELSKETCH_IMAGE_MAX_EDGE", "800"),
        ("TRAVELSKETCH_VIDEO_WIDTH", "320"),
        ("TRAVELSKETCH_VIDEO_HEIGHT", "180"),
        ("TRAVELSKETCH_TEXT_SIZE", "48.5"),
        ("TRAVELSKETCH_EXPORT_WIDTH", "595"),
        ("TRAVELSKETCH_EXPORT_HEIGHT", "842"),
    ]);
    let cfg = SketchConfig::from_lookup(lookup_from(&pairs)).unwrap();
    assert_eq!(cfg.firebase.auth_token.as_deref(), Some("tok"));
    assert_eq!(cfg.firebase.storage_url, "http://localhost:9199");
    assert_eq!(cfg.fetch, FetchTimeouts { connect_secs: 3, read_secs: 4 });
    assert_eq!(cfg.placement.image_max_edge, 800);
    assert_eq!(cfg.placement.video_size, (320, 180));
    assert!((cfg.placement.text_size - 48.5).abs() < f32::EPSILON);
    assert_eq!(cfg.export.page_width, 595);
    assert_eq!(cfg.export.page_height, 842);
}

#[test]
fn missing_database_url_is_an_error() {
    let result = SketchConfig::from_lookup(lookup_from(&[("FIREBASE_STORAGE_BUCKET", "b")]));
    assert!(matches!(result, Err(ConfigError::Missing("FIREBASE_DATABASE_URL"))));
}

#[test]
fn blank_bucket_counts_as_missing() {
    let result = SketchConfig::from_lookup(lookup_from(&[
        ("FIREBASE_DATABASE_URL", "https://db"),
        ("FIREBASE_STORAGE_BUCKET", "  "),
    ]));
    assert!(matches!(result, Err(ConfigError::Missing("FIREBASE_STORAGE_BUCKET"))));
}

#[test]
fn empty_auth_token_is_ignored() {
    let mut pairs = required_pairs();
    pairs.push(("FIREBASE_AUTH_TOKEN", ""));
    let cfg = SketchConfig::from_lookup(lookup_from(&pairs)).unwrap();
    assert!(cfg.firebase.auth_token.is_none());
}

#[test]
fn invalid_number_reports_key_and_value() {
    let mut pairs = required_pairs();
    pairs.push(("TRAVELSKETCH_IMAGE_MAX_EDGE", "big"));
    let err = SketchConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
    match err {
        ConfigError::Invalid { key, value } => {
            assert_eq!(key, "TRAVELSKETCH_IMAGE_MAX_EDGE");
            assert_eq!(value, "big");
        }
        ConfigError::Missing(_) => panic!("expected Invalid"),
    }
}
