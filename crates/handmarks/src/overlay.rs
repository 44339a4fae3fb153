//! Frame annotations: the FPS counter and landmark sets.

use crate::{
    hand::landmark::{HandPart, LandmarkIdx},
    image::{draw, Color, Image},
    landmark::LandmarkSet,
};

/// Left edge of the FPS text.
pub const FPS_TEXT_X: i32 = 24;
/// Baseline of the FPS text, from the top of the frame.
pub const FPS_TEXT_Y: i32 = 50;
pub const FPS_TEXT_COLOR: Color = Color::BLACK;

/// Formats the text of the FPS counter.
pub fn fps_text(fps: f32) -> String {
    format!("FPS = {fps:.1}")
}

/// Draws the FPS counter into the top left corner of `image`.
pub fn draw_fps(image: &mut Image, fps: f32) {
    let text = fps_text(fps);
    draw::text(image, FPS_TEXT_X, FPS_TEXT_Y, &text)
        .color(FPS_TEXT_COLOR)
        .large()
        .align_left()
        .align_baseline();
}

/// How to draw a landmark or connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawingSpec {
    pub color: Color,
    /// Line width for connections.
    pub thickness: u32,
    /// Radius of the landmark's disk.
    pub circle_radius: u32,
}

impl DrawingSpec {
    pub const fn new(color: Color, thickness: u32, circle_radius: u32) -> Self {
        Self {
            color,
            thickness,
            circle_radius,
        }
    }
}

const RED: Color = Color::from_rgb8(255, 48, 48);
const PEACH: Color = Color::from_rgb8(255, 229, 180);
const PURPLE: Color = Color::from_rgb8(128, 64, 128);
const YELLOW: Color = Color::from_rgb8(255, 204, 0);
const GREEN: Color = Color::from_rgb8(48, 255, 48);
const BLUE: Color = Color::from_rgb8(21, 101, 192);
const GRAY: Color = Color::from_rgb8(128, 128, 128);

/// Drawing style for hand landmark sets.
///
/// The [`Default`] style is MediaPipe's default hand style: every finger has its own color, the
/// palm is outlined in gray, and every landmark has a white border.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandStyle {
    pub palm: DrawingSpec,
    pub thumb: DrawingSpec,
    pub index_finger: DrawingSpec,
    pub middle_finger: DrawingSpec,
    pub ring_finger: DrawingSpec,
    pub pinky: DrawingSpec,
    /// Used for the palm outline, and for connections outside of the hand topology.
    pub palm_connection: DrawingSpec,
    /// Color of the border drawn around each landmark, one pixel wider than its disk.
    pub border: Color,
}

impl Default for HandStyle {
    fn default() -> Self {
        Self {
            palm: DrawingSpec::new(RED, 2, 5),
            thumb: DrawingSpec::new(PEACH, 2, 5),
            index_finger: DrawingSpec::new(PURPLE, 2, 5),
            middle_finger: DrawingSpec::new(YELLOW, 2, 5),
            ring_finger: DrawingSpec::new(GREEN, 2, 5),
            pinky: DrawingSpec::new(BLUE, 2, 5),
            palm_connection: DrawingSpec::new(GRAY, 3, 0),
            border: Color::WHITE,
        }
    }
}

impl HandStyle {
    fn part(&self, part: HandPart) -> DrawingSpec {
        match part {
            HandPart::Palm => self.palm,
            HandPart::Thumb => self.thumb,
            HandPart::IndexFinger => self.index_finger,
            HandPart::MiddleFinger => self.middle_finger,
            HandPart::RingFinger => self.ring_finger,
            HandPart::Pinky => self.pinky,
        }
    }

    /// Returns the spec to draw landmark `index` with.
    pub fn landmark_spec(&self, index: usize) -> DrawingSpec {
        match LandmarkIdx::from_index(index) {
            Some(idx) => self.part(idx.part()),
            None => self.palm,
        }
    }

    /// Returns the spec to draw the connection between landmarks `a` and `b` with.
    ///
    /// Connections between two palm landmarks are part of the palm outline; any other connection
    /// takes the style of the finger it leads to.
    pub fn connection_spec(&self, a: usize, b: usize) -> DrawingSpec {
        let part = |i| LandmarkIdx::from_index(i).map(LandmarkIdx::part);
        match (part(a), part(b)) {
            (Some(HandPart::Palm), Some(HandPart::Palm)) | (None, _) | (_, None) => {
                self.palm_connection
            }
            (Some(HandPart::Palm), Some(finger)) | (Some(finger), _) => {
                let spec = self.part(finger);
                DrawingSpec::new(spec.color, spec.thickness, 0)
            }
        }
    }
}

/// Draws the connections and landmarks of `set` onto `image`.
///
/// Landmarks outside of the frame are not drawn, and neither are the connections touching them.
pub fn draw_landmarks(image: &mut Image, set: &LandmarkSet, style: &HandStyle) {
    let res = image.resolution();

    for &(a, b) in set.connections() {
        let (start, end) = (set.get(a), set.get(b));
        if !start.is_inside_frame() || !end.is_inside_frame() {
            continue;
        }

        let spec = style.connection_spec(a, b);
        let (sx, sy) = start.to_pixel(res);
        let (ex, ey) = end.to_pixel(res);
        draw::line(image, sx, sy, ex, ey)
            .color(spec.color)
            .stroke_width(spec.thickness);
    }

    for (index, landmark) in set.landmarks().iter().enumerate() {
        if !landmark.is_inside_frame() {
            continue;
        }

        let spec = style.landmark_spec(index);
        let (x, y) = landmark.to_pixel(res);
        draw::circle(image, x, y, spec.circle_radius + 1)
            .color(style.border)
            .filled();
        draw::circle(image, x, y, spec.circle_radius)
            .color(spec.color)
            .filled();
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        hand::landmark::{HAND_CONNECTIONS, NUM_LANDMARKS, PALM_CONNECTIONS},
        landmark::Landmark,
    };

    use super::*;

    const BACKGROUND: Color = Color::from_rgb8(200, 200, 200);

    fn background(width: u32, height: u32) -> Image {
        let mut image = Image::new(width, height);
        image.clear(BACKGROUND);
        image
    }

    /// A spread out hand in the lower part of a 400x400 frame, away from the FPS text.
    fn hand() -> LandmarkSet {
        let mut landmarks = vec![Landmark::new(0.5, 0.95, 0.0)];
        for finger in 0..5 {
            for joint in 0..4 {
                landmarks.push(Landmark::new(
                    0.2 + finger as f32 * 0.15,
                    0.8 - joint as f32 * 0.1,
                    0.0,
                ));
            }
        }
        LandmarkSet::new(landmarks, HAND_CONNECTIONS)
    }

    fn inside_fps_text(x: u32, y: u32) -> bool {
        (20..130).contains(&x) && (25..60).contains(&y)
    }

    #[test]
    fn fps_text_format() {
        assert_eq!(fps_text(0.0), "FPS = 0.0");
        assert_eq!(fps_text(29.96), "FPS = 30.0");
        assert_eq!(fps_text(7.04), "FPS = 7.0");
    }

    #[test]
    fn fps_only_touches_its_corner() {
        let mut image = background(200, 100);
        draw_fps(&mut image, 12.3);

        let mut text_pixels = 0;
        for y in 0..image.height() {
            for x in 0..image.width() {
                let px = image.get(x, y);
                if px != BACKGROUND {
                    assert!(inside_fps_text(x, y), "pixel at {x},{y} was drawn to");
                    assert_eq!(px, FPS_TEXT_COLOR);
                    text_pixels += 1;
                }
            }
        }
        assert!(text_pixels > 0);
    }

    #[test]
    fn draws_every_connection() {
        let set = hand();
        let mut image = background(400, 400);
        draw_landmarks(&mut image, &set, &HandStyle::default());

        let res = image.resolution();
        for &(a, b) in set.connections() {
            let (ax, ay) = set.get(a).to_pixel(res);
            let (bx, by) = set.get(b).to_pixel(res);
            let (mx, my) = ((ax + bx) / 2, (ay + by) / 2);
            assert_ne!(
                image.get(mx as u32, my as u32),
                BACKGROUND,
                "connection {a}-{b} not drawn at {mx},{my}",
            );
        }

        for (i, lm) in set.landmarks().iter().enumerate() {
            let (x, y) = lm.to_pixel(res);
            let spec = HandStyle::default().landmark_spec(i);
            assert_eq!(image.get(x as u32, y as u32), spec.color, "landmark {i}");
        }
    }

    #[test]
    fn skips_landmarks_outside_frame() {
        let mut landmarks = hand().landmarks().to_vec();
        landmarks[LandmarkIdx::IndexFingerTip as usize] = Landmark::new(1.5, 0.5, 0.0);
        let set = LandmarkSet::new(landmarks, HAND_CONNECTIONS);

        let mut image = background(400, 400);
        draw_landmarks(&mut image, &set, &HandStyle::default());

        // The index finger's DIP joint is still drawn, but nothing extends towards the right edge.
        let dip = set.get(LandmarkIdx::IndexFingerDip as usize).to_pixel(image.resolution());
        assert_ne!(image.get(dip.0 as u32, dip.1 as u32), BACKGROUND);
        for x in 390..400 {
            for y in 0..400 {
                assert_eq!(image.get(x, y), BACKGROUND);
            }
        }
    }

    #[test]
    fn default_style() {
        let style = HandStyle::default();
        assert_eq!(style.landmark_spec(0).color, RED);
        assert_eq!(style.landmark_spec(4).color, PEACH);
        assert_eq!(style.landmark_spec(20).color, BLUE);
        assert_eq!(style.landmark_spec(9), style.palm);

        for &(a, b) in &HAND_CONNECTIONS[..PALM_CONNECTIONS] {
            assert_eq!(style.connection_spec(a, b), style.palm_connection);
        }
        let spec = style.connection_spec(9, 10);
        assert_eq!((spec.color, spec.thickness), (YELLOW, 2));
        assert_eq!(style.connection_spec(0, NUM_LANDMARKS), style.palm_connection);
    }
}
