use super::*;
use crate::model::BoxType;

const STORAGE: &str = "https://firebasestorage.googleapis.com";
const BUCKET: &str = "sketch.appspot.com";

// =========================================================================
// record_url
// =========================================================================

#[test]
fn record_url_appends_json_suffix() {
    let url = record_url("https://sketch-rtdb.firebaseio.com", None, &["canvas", "c1", "boxes"]).unwrap();
    assert_eq!(url.as_str(), "https://sketch-rtdb.firebaseio.com/canvas/c1/boxes.json");
}

#[test]
fn record_url_with_box_id_and_auth() {
    let url = record_url("https://db.example", Some("tok"), &["canvas", "c1", "boxes", "b-9"]).unwrap();
    assert_eq!(url.as_str(), "https://db.example/canvas/c1/boxes/b-9.json?auth=tok");
}

#[test]
fn record_url_encodes_segments() {
    let url = record_url("https://db.example", None, &["canvas", "trip/seoul", "boxes"]).unwrap();
    assert_eq!(url.as_str(), "https://db.example/canvas/trip%2Fseoul/boxes.json");
}

#[test]
fn record_url_rejects_garbage_base() {
    let err = record_url("not a url", None, &["canvas"]).unwrap_err();
    assert!(matches!(err, StoreError::InvalidUrl(_)));
}

// =========================================================================
// parse_boxes
// =========================================================================

#[test]
fn parse_boxes_null_is_empty() {
    assert!(parse_boxes("null").unwrap().is_empty());
}

#[test]
fn parse_boxes_takes_ids_from_keys() {
    let json = r#"{
        "b2": {"box_x": 50, "box_y": 50, "type": "IMAGE", "data": "https://img/1", "width": 500, "height": 250},
        "b1": {"box_x": 10, "box_y": 10, "type": "TEXT", "data": "Hi"}
    }"#;
    let boxes = parse_boxes(json).unwrap();
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0].id, "b1");
    assert_eq!(boxes[0].kind, BoxType::Text);
    assert_eq!(boxes[0].data, "Hi");
    assert_eq!(boxes[1].id, "b2");
    assert_eq!(boxes[1].kind, BoxType::Image);
    assert_eq!(boxes[1].width, 500);
}

#[test]
fn parse_boxes_rejects_non_object() {
    assert!(matches!(parse_boxes("[1, 2]").unwrap_err(), StoreError::Parse(_)));
}

// =========================================================================
// storage urls
// =========================================================================

#[test]
fn objects_url_has_bucket_path() {
    let url = objects_url(STORAGE, BUCKET).unwrap();
    assert_eq!(url.as_str(), "https://firebasestorage.googleapis.com/v0/b/sketch.appspot.com/o");
}

#[test]
fn download_url_encodes_name_and_uses_first_token() {
    let json = r#"{"name": "media/images/abc", "bucket": "sketch.appspot.com", "downloadTokens": "t1,t2"}"#;
    let url = download_url(STORAGE, BUCKET, json).unwrap();
    assert_eq!(
        url,
        "https://firebasestorage.googleapis.com/v0/b/sketch.appspot.com/o/media%2Fimages%2Fabc?alt=media&token=t1"
    );
}

#[test]
fn download_url_without_token() {
    let url = download_url(STORAGE, BUCKET, r#"{"name": "media/videos/v.mp4"}"#).unwrap();
    assert!(url.ends_with("/o/media%2Fvideos%2Fv.mp4?alt=media"));
}

#[test]
fn download_url_rejects_bad_json() {
    assert!(matches!(download_url(STORAGE, BUCKET, "{}").unwrap_err(), StoreError::Parse(_)));
}

#[test]
fn object_url_strips_query() {
    let download =
        "https://firebasestorage.googleapis.com/v0/b/sketch.appspot.com/o/media%2Fimages%2Fabc?alt=media&token=t1";
    let url = object_url_from_download(STORAGE, BUCKET, download).unwrap();
    assert_eq!(url.as_str(), "https://firebasestorage.googleapis.com/v0/b/sketch.appspot.com/o/media%2Fimages%2Fabc");
}

#[test]
fn object_url_rejects_other_bucket() {
    let download = "https://firebasestorage.googleapis.com/v0/b/other.appspot.com/o/media%2Fimages%2Fabc?alt=media";
    assert!(matches!(
        object_url_from_download(STORAGE, BUCKET, download).unwrap_err(),
        StoreError::ForeignUrl(_)
    ));
}

#[test]
fn object_url_rejects_other_host() {
    let download = "https://cdn.example/v0/b/sketch.appspot.com/o/media%2Fimages%2Fabc";
    assert!(matches!(
        object_url_from_download(STORAGE, BUCKET, download).unwrap_err(),
        StoreError::ForeignUrl(_)
    ));
}

#[test]
fn new_clients_build_from_config() {
    let config = crate::config::FirebaseConfig {
        database_url: "https://db.example".into(),
        storage_url: STORAGE.into(),
        bucket: BUCKET.into(),
        auth_token: None,
    };
    assert!(FirebaseBoxStore::new(&config).is_ok());
    assert!(FirebaseMediaStore::new(&config).is_ok());
}
