//! Rectangle types.
//!
//! These describe palm detections and the regions of interest that hands are tracked in.

use std::fmt;

use nalgebra::{Rotation2, Vector2};

use super::AspectRatio;

type Vec2 = Vector2<f32>;

/// An axis-aligned rectangle.
///
/// Rectangles are allowed to have zero height and/or width. Negative dimensions are not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Vec2,
    size: Vec2,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vec2::new(x_center, y_center),
            size: Vec2::new(width, height),
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

    /// Computes the bounding rectangle that encompasses `points`.
    ///
    /// Returns [`None`] if `points` is an empty iterator.
    pub fn bounding<I: IntoIterator<Item = T>, T: Into<Vec2>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();

        let first: Vec2 = iter.next()?.into();
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
            size: self.size * scale,
            ..*self
        }
    }

    /// Adds `amount` times the width and height to every side of `self`.
    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.scale(1.0 + 2.0 * amount)
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

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.center.x - self.size.x * 0.5
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.center.y - self.size.y * 0.5
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
    pub fn x_center(&self) -> f32 {
        self.center.x
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.center.y
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Vec2 {
        self.size
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    #[must_use]
    pub fn move_by(&self, x: f32, y: f32) -> Self {
        Self {
            center: self.center + Vec2::new(x, y),
            ..*self
        }
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns [`None`] if the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x_min = self.x().max(other.x());
        let y_min = self.y().max(other.y());
        let x_max = (self.x() + self.width()).min(other.x() + other.width());
        let y_max = (self.y() + self.height()).min(other.y() + other.height());
        if x_min > x_max || y_min > y_max {
            return None;
        }

        Some(Rect::from_top_left(
            x_min,
            y_min,
            x_max - x_min,
            y_max - y_min,
        ))
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |rect| rect.area());
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({:.1},{:.1})/{:.1}x{:.1}",
            self.x(),
            self.y(),
            self.width(),
            self.height()
        )
    }
}

/// A [`Rect`], rotated around its center.
///
/// Positive angles rotate clockwise as seen on screen (where Y points down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Computes the smallest rectangle rotated by `radians` that contains all of `points`.
    ///
    /// Returns [`None`] if `points` is empty.
    pub fn bounding<T: Into<Vec2>, I: IntoIterator<Item = T>>(
        radians: f32,
        points: I,
    ) -> Option<Self> {
        // Undo the rotation, compute the axis-aligned bounds there, then rotate the center back.
        let undo = Rotation2::new(-radians);
        let rect = Rect::bounding(points.into_iter().map(|p| {
            let p: Vec2 = p.into();
            undo * p
        }))?;
        let center = Rotation2::new(radians) * rect.center();
        Some(Self {
            rect: Rect {
                center,
                size: rect.size,
            },
            radians,
        })
    }

    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Returns the underlying unrotated [`Rect`].
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Applies a closure to the underlying [`Rect`], keeping the rotation.
    #[must_use]
    pub fn map(mut self, f: impl FnOnce(Rect) -> Rect) -> Self {
        self.rect = f(self.rect);
        self
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.rect.center()
    }

    #[must_use]
    pub fn grow_rel(&self, amount: f32) -> Self {
        self.map(|rect| rect.grow_rel(amount))
    }

    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        self.map(|rect| rect.grow_to_fit_aspect(target_aspect))
    }

    /// Moves the rectangle along its own (rotated) axes.
    ///
    /// `x` and `y` are given in the rotated coordinate system, so a negative `y` moves the
    /// rectangle towards its own top side.
    #[must_use]
    pub fn shift(&self, x: f32, y: f32) -> Self {
        let offset = Rotation2::new(self.radians) * Vec2::new(x, y);
        self.map(|rect| rect.move_by(offset.x, offset.y))
    }

    /// Transforms a point from the rectangle's coordinate system into the parent's.
    ///
    /// The origin of the inner coordinate system is the top left corner of the unrotated
    /// rectangle.
    pub fn transform_out(&self, pt: impl Into<Vec2>) -> Vec2 {
        let half = self.rect.size() * 0.5;
        Rotation2::new(self.radians) * (pt.into() - half) + self.rect.center()
    }

    /// Transforms a point from the parent coordinate system into the rectangle's.
    pub fn transform_in(&self, pt: impl Into<Vec2>) -> Vec2 {
        let half = self.rect.size() * 0.5;
        Rotation2::new(-self.radians) * (pt.into() - self.rect.center()) + half
    }

    /// Returns the axis-aligned bounding [`Rect`] of the rotated corners.
    pub fn bounding_rect(&self) -> Rect {
        let [w, h] = [self.rect.width(), self.rect.height()];
        let corners = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]];
        Rect::bounding(corners.map(|c| self.transform_out(c))).expect("4 corners")
    }
}

impl From<Rect> for RotatedRect {
    #[inline]
    fn from(rect: Rect) -> Self {
        Self { rect, radians: 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn iou() {
        let a = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&a.move_by(10.0, 0.0)), 0.0);

        let b = Rect::from_top_left(1.0, 0.0, 2.0, 2.0);
        assert_relative_eq!(a.iou(&b), 2.0 / 6.0);
    }

    #[test]
    fn grow() {
        let rect = Rect::from_center(1.0, 1.0, 2.0, 4.0);
        let grown = rect.grow_rel(0.5);
        assert_eq!(grown.center(), rect.center());
        assert_eq!(grown.width(), 4.0);
        assert_eq!(grown.height(), 8.0);

        let square = rect.grow_to_fit_aspect(AspectRatio::SQUARE);
        assert_eq!(square.width(), 4.0);
        assert_eq!(square.height(), 4.0);
    }

    #[test]
    fn transform_roundtrip() {
        let rect = RotatedRect::new(Rect::from_center(10.0, 20.0, 4.0, 6.0), 0.7);
        let inner = Vec2::new(1.0, 5.0);
        let outer = rect.transform_out(inner);
        assert_relative_eq!(rect.transform_in(outer), inner, epsilon = 1e-4);
    }

    #[test]
    fn quarter_turn() {
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 2.0, 2.0), FRAC_PI_2);
        // The rectangle's top edge center ends up on the right side of the parent.
        let top = rect.transform_out([1.0, 0.0]);
        assert_relative_eq!(top, Vec2::new(1.0, 0.0), epsilon = 1e-6);

        let shifted = rect.shift(0.0, -1.0);
        assert_relative_eq!(shifted.center(), Vec2::new(1.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn rotated_bounding() {
        let points = [[0.0, 0.0], [2.0, 0.0], [2.0, 1.0], [0.0, 1.0]];
        let rect = RotatedRect::bounding(0.0, points).unwrap();
        assert_relative_eq!(rect.center(), Vec2::new(1.0, 0.5));
        assert_relative_eq!(rect.rect().width(), 2.0);

        let rect = RotatedRect::bounding(FRAC_PI_2, points).unwrap();
        assert_relative_eq!(rect.center(), Vec2::new(1.0, 0.5), epsilon = 1e-5);
        assert_relative_eq!(rect.rect().width(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(rect.rect().height(), 2.0, epsilon = 1e-5);
        assert!(RotatedRect::bounding(0.0, Vec::<[f32; 2]>::new()).is_none());
    }
}
