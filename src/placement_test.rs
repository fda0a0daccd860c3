use super::*;

#[test]
fn default_is_idle() {
    assert!(Placement::default().is_idle());
}

#[test]
fn take_while_idle_returns_none() {
    let mut p = Placement::Idle;
    assert!(p.take().is_none());
    assert!(p.is_idle());
}

#[test]
fn last_start_wins_across_kinds() {
    let mut p = Placement::Idle;
    p.start_text("first");
    p.start_image("file://a.jpg");
    p.start_video("file://b.mp4");
    p.start_text("last");
    assert_eq!(p, Placement::Text("last".into()));
    assert_eq!(p.take(), Some(Pending::Text("last".into())));
}

#[test]
fn restarting_same_kind_overwrites_payload() {
    let mut p = Placement::Idle;
    p.start_image("file://a.jpg");
    p.start_image("file://b.jpg");
    assert_eq!(p.take(), Some(Pending::Image("file://b.jpg".into())));
}

#[test]
fn take_returns_to_idle() {
    let mut p = Placement::Idle;
    p.start_video("file://clip.mp4");
    assert_eq!(p.take(), Some(Pending::Video("file://clip.mp4".into())));
    assert!(p.is_idle());
    assert!(p.take().is_none());
}

#[test]
fn end_discards_pending_payload() {
    let mut p = Placement::Idle;
    p.start_text("hello");
    p.end();
    assert!(p.is_idle());
    assert!(p.take().is_none());
}
