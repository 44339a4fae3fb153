use super::*;

fn gradient(width: u32, height: u32) -> Image {
    let mut image = Image::new(width, height);
    for y in 0..height {
        for x in 0..width {
            image.set(x, y, Color::from_rgb8(x as u8, y as u8, 0));
        }
    }
    image
}

#[test]
fn flip_reverses_columns() {
    let orig = gradient(5, 3);
    let mut flipped = orig.clone();
    flipped.flip_horizontal_in_place();

    for y in 0..3 {
        for x in 0..5 {
            assert_eq!(flipped.get(x, y), orig.get(4 - x, y));
        }
    }
    assert_eq!(orig.flip_horizontal(), flipped);
}

#[test]
fn from_rgba8_checks_size() {
    let res = Resolution::new(2, 2);
    let image = Image::from_rgba8(res, &[255; 16]).unwrap();
    assert_eq!(image.get(1, 1), Color::WHITE);
    assert!(Image::from_rgba8(res, &[255; 15]).is_err());
}

#[test]
fn sample_outside_is_null() {
    let image = gradient(4, 4);
    assert_eq!(
        image.sample_nearest(Vec2f::new(2.7, 1.2)),
        Color::from_rgb8(2, 1, 0)
    );
    assert_eq!(image.sample_nearest(Vec2f::new(-0.1, 1.0)), Color::NULL);
    assert_eq!(image.sample_nearest(Vec2f::new(1.0, 4.0)), Color::NULL);
}

#[test]
fn clear_fills_everything() {
    let mut image = gradient(3, 3);
    image.clear(Color::BLACK);
    assert!(image.data().chunks(4).all(|px| px == [0, 0, 0, 255]));
}

#[test]
fn draw_line_and_circle() {
    let mut image = Image::new(32, 32);
    draw::line(&mut image, 0, 16, 31, 16).color(Color::RED);
    assert_eq!(image.get(0, 16), Color::RED);
    assert_eq!(image.get(31, 16), Color::RED);
    assert_eq!(image.get(16, 15), Color::NULL);

    draw::circle(&mut image, 8, 8, 3).color(Color::GREEN).filled();
    assert_eq!(image.get(8, 8), Color::GREEN);
    assert_eq!(image.get(8, 12), Color::NULL);

    let mut ring = Image::new(32, 32);
    draw::circle(&mut ring, 16, 16, 6).color(Color::WHITE);
    assert_eq!(ring.get(16, 16), Color::NULL);
    assert!((9..=11).any(|y| ring.get(16, y) == Color::WHITE));
}

#[test]
fn draw_clips_to_image() {
    let mut image = Image::new(8, 8);
    draw::line(&mut image, -100, 4, 100, 4).color(Color::WHITE);
    draw::circle(&mut image, -5, -5, 20).color(Color::WHITE).filled();
    assert_eq!(image.get(7, 4), Color::WHITE);
}

#[test]
fn draw_text_baseline() {
    let mut image = Image::new(64, 40);
    draw::text(&mut image, 2, 30, "Hi")
        .color(Color::BLACK)
        .large()
        .align_left()
        .align_baseline();

    let rows_with_ink = (0..40)
        .filter(|&y| (0..64).any(|x| image.get(x, y) == Color::BLACK))
        .collect::<Vec<_>>();
    assert!(!rows_with_ink.is_empty());
    // Capital letters sit on the baseline.
    assert!(rows_with_ink.iter().all(|&y| y <= 30), "{rows_with_ink:?}");
    assert!((0..2).all(|x| (0..40).all(|y| image.get(x, y) == Color::NULL)));
}
