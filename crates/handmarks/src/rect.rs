//! Rectangle types.
//!
//! These are used for letterboxing, detections and the regions of interest fed to the landmark
//! network.

use std::fmt;

use nalgebra::{Rotation2, Vector2};

use crate::image::AspectRatio;

/// A 2D vector with `f32` components.
pub type Vec2f = Vector2<f32>;

/// An axis-aligned rectangle.
///
/// Rectangles are allowed to have zero height and/or width. Negative dimensions are not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Vec2f,
    size: Vec2f,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vec2f::new(x_center, y_center),
            size: Vec2f::new(width, height),
        }
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    /// Computes the (axis-aligned) bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = T>, T: Into<Vec2f>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let first: Vec2f = iter.next()?.into();
        let (mut min, mut max) = (first, first);

        for pt in iter {
            let pt = pt.into();
            min = min.inf(&pt);
            max = max.sup(&pt);
        }

        Some(Self::from_top_left(min.x, min.y, max.x - min.x, max.y - min.y))
    }

    /// Scales the width and height of this [`Rect`] by the given amount.
    ///
    /// The center position of the [`Rect`] remains the same.
    #[must_use]
    pub fn scale(&self, scale: f32) -> Self {
        Self {
            center: self.center,
            size: self.size * scale,
        }
    }

    /// Symmetrically extends one dimension of `self` so that the resulting rectangle has the given
    /// aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        let mut res = *self;
        let target_width = self.height() * target_aspect.as_f32();
        if target_width >= self.width() {
            res.size.x = target_width;
        } else {
            res.size.y = self.width() / target_aspect.as_f32();
        }

        res
    }

    #[must_use]
    pub fn move_by(&self, offset: impl Into<Vec2f>) -> Rect {
        Rect {
            center: self.center + offset.into(),
            ..*self
        }
    }

    #[inline]
    pub fn top_left(&self) -> Vec2f {
        self.center - self.size * 0.5
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.top_left().x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.top_left().y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    #[inline]
    pub fn center(&self) -> Vec2f {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Vec2f {
        self.size
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns [`None`] when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min = self.top_left().sup(&other.top_left());
        let max = (self.top_left() + self.size()).inf(&(other.top_left() + other.size()));
        if min.x > max.x || min.y > max.y {
            return None;
        }

        Rect::bounding([min, max])
    }

    fn intersection_area(&self, other: &Self) -> f32 {
        self.intersection(other).map_or(0.0, |rect| rect.area())
    }

    fn union_area(&self, other: &Self) -> f32 {
        self.area() + other.area() - self.intersection_area(other)
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    ///
    /// Two empty rectangles have an IOU of 0.
    pub fn iou(&self, other: &Self) -> f32 {
        let union = self.union_area(other);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(other) / union
    }

    pub fn contains_point(&self, point: impl Into<Vec2f>) -> bool {
        let p: Vec2f = point.into();
        self.x() <= p.x
            && self.y() <= p.y
            && self.x() + self.width() >= p.x
            && self.y() + self.height() >= p.y
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.center.x, self.center.y, self.size.x, self.size.y
        )
    }
}

/// A [`Rect`], rotated around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    /// Creates a new rotated rectangle.
    ///
    /// `radians` is the clockwise rotation to apply to the [`Rect`].
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Computes the rotated bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<T: Into<Vec2f>, I: IntoIterator<Item = T>>(
        radians: f32,
        points: I,
    ) -> Option<Self> {
        // Rotate every point into the rectangle's frame, take the axis-aligned bounds there, and
        // rotate the resulting center back.
        let into_frame = Rotation2::new(-radians);
        let rotated = Rect::bounding(points.into_iter().map(|p| into_frame * p.into()))?;
        let center = into_frame.inverse() * rotated.center();

        Some(Self::new(
            Rect::from_center(center.x, center.y, rotated.width(), rotated.height()),
            radians,
        ))
    }

    /// Returns the rectangle's clockwise rotation in radians.
    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Returns a reference to the underlying non-rotated rectangle.
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Applies a closure to the underlying non-rotated [`Rect`].
    #[must_use]
    pub fn map(mut self, f: impl FnOnce(Rect) -> Rect) -> Self {
        self.rect = f(self.rect);
        self
    }

    pub fn center(&self) -> Vec2f {
        self.rect.center()
    }

    /// Moves the rectangle along its own (rotated) axes.
    ///
    /// An offset of `(0, -h)` moves it "up" by its height as seen from inside the rectangle.
    #[must_use]
    pub fn shift_local(&self, offset: impl Into<Vec2f>) -> Self {
        let offset = Rotation2::new(self.radians) * offset.into();
        self.map(|rect| rect.move_by(offset))
    }

    pub fn contains_point(&self, point: impl Into<Vec2f>) -> bool {
        let pt = self.transform_in(point);
        let size = self.rect.size();
        Rect::from_top_left(0.0, 0.0, size.x, size.y).contains_point(pt)
    }

    /// Transforms a point from the parent coordinate system into the [`RotatedRect`]'s system.
    ///
    /// The origin of the inner coordinate system is formed by the top left corner of the rectangle.
    pub fn transform_in(&self, pt: impl Into<Vec2f>) -> Vec2f {
        let half = self.rect.size() * 0.5;
        Rotation2::new(-self.radians) * (pt.into() - self.rect.center()) + half
    }

    /// Transforms a point from the [`RotatedRect`]'s coordinate system to the parent system.
    ///
    /// The origin of the inner coordinate system is formed by the top left corner of the rectangle.
    pub fn transform_out(&self, pt: impl Into<Vec2f>) -> Vec2f {
        let half = self.rect.size() * 0.5;
        Rotation2::new(self.radians) * (pt.into() - half) + self.rect.center()
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use approx::assert_relative_eq;

    use super::*;

    fn v(x: f32, y: f32) -> Vec2f {
        Vec2f::new(x, y)
    }

    #[test]
    fn test_contains_point() {
        let rect = Rect::from_top_left(-5.0, 5.0, 10.0, 5.0);
        assert!(rect.contains_point([-5.0, 5.0]));
        assert!(rect.contains_point([-5.0 + 9.0, 5.0 + 4.0]));
        assert!(!rect.contains_point([-5.0 + 11.0, 5.0 + 4.0]));
        assert!(!rect.contains_point([-5.0 + 9.0, 5.0 + 5.0 + 1.0]));
    }

    #[test]
    fn test_iou() {
        let smaller = Rect::from_center(9.0, 9.0, 1.0, 1.0);
        let bigger = Rect::from_center(9.0, 9.0, 2.0, 2.0);

        let intersection = smaller.intersection(&bigger).unwrap();
        assert_eq!(intersection.center(), smaller.center());
        assert_eq!(intersection.size(), smaller.size());

        assert_eq!(smaller.iou(&bigger), 1.0 / 4.0);
        assert_eq!(bigger.iou(&smaller), 1.0 / 4.0);

        let far = Rect::from_center(100.0, 9.0, 2.0, 2.0);
        assert_eq!(far.intersection(&bigger), None);
        assert_eq!(far.iou(&bigger), 0.0);

        let zero = Rect::from_center(0.0, 0.0, 0.0, 0.0);
        assert_eq!(zero.iou(&zero), 0.0);
    }

    #[test]
    fn test_bounding() {
        assert_eq!(
            Rect::bounding([[0.0, 0.0], [1.0, 1.0], [-1.0, -1.0]]).unwrap(),
            Rect::from_center(0.0, 0.0, 2.0, 2.0),
        );
        assert_eq!(
            Rect::bounding([[1.0, 1.0], [2.0, 2.0]]).unwrap(),
            Rect::from_center(1.5, 1.5, 1.0, 1.0),
        );
        assert!(Rect::bounding::<_, Vec2f>([]).is_none());
    }

    #[test]
    fn test_fit_aspect() {
        let square = AspectRatio::SQUARE;
        assert_eq!(
            Rect::from_center(10.0, 10.0, 50.0, 100.0).grow_to_fit_aspect(square),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
        assert_eq!(
            Rect::from_center(10.0, 10.0, 100.0, 50.0).grow_to_fit_aspect(square),
            Rect::from_center(10.0, 10.0, 100.0, 100.0),
        );
    }

    #[test]
    fn test_rotated_rect_transform() {
        let offset = RotatedRect::new(Rect::from_top_left(10.0, 20.0, 1.0, 1.0), 0.0);
        assert_eq!(offset.transform_in([0.0, 0.0]), v(-10.0, -20.0));
        assert_eq!(offset.transform_in([10.0, 20.0]), v(0.0, 0.0));

        // Rotated clockwise by 90°: the top left corner ends up in the top right.
        let right = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 1.0, 1.0), TAU / 4.0);
        assert_relative_eq!(right.transform_in([0.5, 0.5]), v(0.5, 0.5));
        assert_relative_eq!(right.transform_out([0.0, 0.0]), v(1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(right.transform_in([1.0, 0.0]), v(0.0, 0.0), epsilon = 1e-6);

        let rect = RotatedRect::new(Rect::from_top_left(10.0, 20.0, 1.0, 1.0), TAU / 2.0);
        assert_relative_eq!(rect.transform_in([11.0, 21.0]), v(0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(rect.transform_out([0.0, 0.0]), v(11.0, 21.0), epsilon = 1e-5);
    }

    #[test]
    fn rotated_transform_roundtrips() {
        for _ in 0..100 {
            let rect = RotatedRect::new(
                Rect::from_center(
                    fastrand::f32() * 100.0,
                    fastrand::f32() * 100.0,
                    fastrand::f32() * 50.0 + 1.0,
                    fastrand::f32() * 50.0 + 1.0,
                ),
                fastrand::f32() * TAU,
            );
            let pt = v(fastrand::f32() * 100.0, fastrand::f32() * 100.0);
            let back = rect.transform_out(rect.transform_in(pt));
            assert_relative_eq!(back, pt, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_rotated_rect_contains_point() {
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 51.0, 1.0), TAU / 4.0);
        assert!(rect.contains_point([0.0, 0.0]));
        assert!(rect.contains_point([0.0, 25.0]));
        assert!(!rect.contains_point([0.0, 26.0]));
        assert!(rect.contains_point([0.0, -25.0]));
        assert!(!rect.contains_point([1.0, 0.0]));
    }

    #[test]
    fn test_rotated_rect_bounding() {
        assert!(RotatedRect::bounding::<Vec2f, _>(0.0, []).is_none());

        let rect = RotatedRect::bounding(0.0, [[0.0, 0.0], [10.0, 4.0]]).unwrap();
        assert_eq!(rect, Rect::from_top_left(0.0, 0.0, 10.0, 4.0).into());

        let points = [[0.0, 0.0], [9.0, 9.0], [3.0, 7.0]];
        let rect = RotatedRect::bounding(TAU / 8.0, points).unwrap();
        let dilated = rect.map(|rect| rect.scale(1.01));
        for pt in points {
            assert!(dilated.contains_point(pt), "{dilated:?} does not contain {pt:?}");
        }
    }

    #[test]
    fn shift_local_follows_rotation() {
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 2.0, 2.0), TAU / 4.0);
        // "Up" inside a rect rotated clockwise by 90° is "right" on screen.
        let shifted = rect.shift_local([0.0, -1.0]);
        assert_relative_eq!(shifted.center(), v(1.0, 0.0), epsilon = 1e-6);
    }
}
