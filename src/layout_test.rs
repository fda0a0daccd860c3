use super::*;

#[test]
fn landscape_caps_width() {
    assert_eq!(cap_dimensions(1000, 500, 500), (500, 250));
}

#[test]
fn portrait_caps_height() {
    assert_eq!(cap_dimensions(300, 600, 500), (250, 500));
}

#[test]
fn square_caps_both_edges() {
    assert_eq!(cap_dimensions(1200, 1200, 500), (500, 500));
}

#[test]
fn small_images_are_scaled_up_to_max_edge() {
    assert_eq!(cap_dimensions(100, 50, 500), (500, 250));
}

#[test]
fn degenerate_sizes_fall_back_to_square() {
    assert_eq!(cap_dimensions(0, 400, 500), (500, 500));
    assert_eq!(cap_dimensions(400, 0, 500), (500, 500));
}

#[test]
fn centered_on_subtracts_half_size() {
    assert_eq!(centered_on(100.0, 100.0, 500, 250), (-150, -25));
    assert_eq!(centered_on(1000.0, 800.0, 600, 400), (700, 600));
}

#[test]
fn centered_on_truncates_toward_zero() {
    assert_eq!(centered_on(10.0, 10.0, 5, 5), (7, 7));
}

#[test]
fn text_width_grows_with_length() {
    let style = TextStyle::default();
    let (short, h1) = style.measure("Hi");
    let (long, h2) = style.measure("Hello there");
    assert!(long > short);
    assert_eq!(h1, h2);
    assert!(h1 > 0);
}

#[test]
fn empty_text_has_zero_width() {
    let (w, h) = TextStyle::default().measure("");
    assert_eq!(w, 0);
    assert!(h > 0);
}

#[test]
fn hangul_is_wider_than_latin() {
    let style = TextStyle { size: 100.0 };
    let (latin, _) = style.measure("ab");
    let (hangul, _) = style.measure("여행");
    assert!(hangul > latin);
    assert_eq!(hangul, 200);
}
