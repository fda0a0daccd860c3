use super::*;

fn text_box(id: &str, z: i32) -> CanvasBox {
    CanvasBox { id: id.into(), z, data: "hello".into(), ..CanvasBox::default() }
}

// =============================================================================
// WIRE FORMAT
// =============================================================================

#[test]
fn box_serializes_with_record_keys() {
    let b = CanvasBox::new("b1".into(), BoxType::Image, 10, 20, 300, 200, "https://img/1".into());
    let json = serde_json::to_value(&b).unwrap();
    assert_eq!(json["box_x"], 10);
    assert_eq!(json["box_y"], 20);
    assert_eq!(json["box_z"], 0);
    assert_eq!(json["width"], 300);
    assert_eq!(json["height"], 200);
    assert_eq!(json["type"], "IMAGE");
    assert_eq!(json["data"], "https://img/1");
    assert!(json.get("id").is_none());
}

#[test]
fn box_deserializes_with_defaults_and_ignores_unknown_keys() {
    let b: CanvasBox = serde_json::from_str(r#"{"box_x": 5, "data": "Hi", "extra": true}"#).unwrap();
    assert_eq!(b.x, 5);
    assert_eq!(b.y, 0);
    assert_eq!(b.kind, BoxType::Text);
    assert_eq!(b.data, "Hi");
    assert!(b.latitude.is_none());
    assert!(b.id.is_empty());
}

#[test]
fn receipt_type_parses_uppercase() {
    let b: CanvasBox = serde_json::from_str(r#"{"type": "RECEIPT"}"#).unwrap();
    assert_eq!(b.kind, BoxType::Receipt);
}

// =============================================================================
// PAYLOAD STATE
// =============================================================================

#[test]
fn media_box_with_sentinel_is_placeholder() {
    let b = CanvasBox::new("v".into(), BoxType::Video, 0, 0, 600, 400, UPLOADING.into());
    assert!(b.is_placeholder());
    assert!(!b.has_resolved_media());
}

#[test]
fn text_box_reading_uploading_is_not_placeholder() {
    let b = CanvasBox::new("t".into(), BoxType::Text, 0, 0, 10, 10, UPLOADING.into());
    assert!(!b.is_placeholder());
}

#[test]
fn resolved_url_rules() {
    assert!(is_resolved_url("https://img/1"));
    assert!(is_resolved_url("http://img/1"));
    assert!(!is_resolved_url(""));
    assert!(!is_resolved_url(UPLOADING));
    assert!(!is_resolved_url("file:///sdcard/a.jpg"));
}

#[test]
fn new_box_ids_are_unique() {
    assert_ne!(new_box_id(), new_box_id());
}

// =============================================================================
// COLLECTION
// =============================================================================

#[test]
fn sorted_orders_by_z_then_id() {
    let mut c = BoxCollection::new();
    c.insert(text_box("b", 1));
    c.insert(text_box("a", 1));
    c.insert(text_box("c", 0));
    let ids: Vec<&str> = c.sorted().iter().map(|b| b.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
}

#[test]
fn next_z_is_zero_when_empty() {
    assert_eq!(BoxCollection::new().next_z(), 0);
}

#[test]
fn next_z_paints_above_existing() {
    let mut c = BoxCollection::new();
    c.insert(text_box("a", 4));
    c.insert(text_box("b", -2));
    assert_eq!(c.next_z(), 5);
}

#[test]
fn load_snapshot_replaces_everything() {
    let mut c = BoxCollection::new();
    c.insert(text_box("old", 0));
    c.load_snapshot(vec![text_box("x", 0), text_box("y", 1)]);
    assert_eq!(c.len(), 2);
    assert!(!c.contains("old"));
    assert!(c.contains("x"));
}

#[test]
fn insert_same_id_replaces() {
    let mut c = BoxCollection::new();
    c.insert(text_box("a", 0));
    let mut updated = text_box("a", 0);
    updated.data = "changed".into();
    c.insert(updated);
    assert_eq!(c.len(), 1);
    assert_eq!(c.get("a").unwrap().data, "changed");
}

#[test]
fn remove_returns_box() {
    let mut c = BoxCollection::new();
    c.insert(text_box("a", 0));
    assert!(c.remove("a").is_some());
    assert!(c.remove("a").is_none());
    assert!(c.is_empty());
}
