use std::fmt;

use super::rect::Rect;

/// Resolution (`width x height`) of a frame, window, or camera.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// 720p resolution: `1280x720`
    pub const RES_720P: Self = Self {
        width: 1280,
        height: 720,
    };

    /// VGA resolution: `640x480`, which virtually every webcam supports.
    pub const RES_VGA: Self = Self {
        width: 640,
        height: 480,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Computes the [`AspectRatio`] of this [`Resolution`].
    ///
    /// If `self` has a width or height of 0, `None` is returned.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width(), self.height())
    }

    /// Returns a [`Rect`] covering every pixel of an image with this resolution.
    pub fn rect(&self) -> Rect {
        Rect::from_top_left(0.0, 0.0, self.width as f32, self.height as f32)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Ratio of a width to a height of an image.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Invariant: nonzero and reduced (GCD of 1).
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1 aspect ratio, used by both hand tracking networks.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Creates the aspect ratio representing `width:height`.
    ///
    /// If either `width` or `height` is `0`, returns `None`.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let gcd = gcd(width, height);
        Some(Self {
            width: width / gcd,
            height: height / gcd,
        })
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b > 0 {
        let t = b;
        b = a % b;
        a = t;
    }

    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_is_reduced() {
        let ratio = AspectRatio::new(640, 480).unwrap();
        assert_eq!(ratio, AspectRatio::new(4, 3).unwrap());
        assert_eq!(ratio.to_string(), "4:3");
        assert_eq!(AspectRatio::new(224, 224), Some(AspectRatio::SQUARE));
        assert_eq!(AspectRatio::new(0, 480), None);
    }

    #[test]
    fn full_rect() {
        let rect = Resolution::RES_VGA.rect();
        assert_eq!(rect.x(), 0.0);
        assert_eq!(rect.y(), 0.0);
        assert_eq!(rect.width(), 640.0);
        assert_eq!(rect.height(), 480.0);
    }
}
