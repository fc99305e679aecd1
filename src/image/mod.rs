//! Camera frames and color handling.
//!
//! This module provides:
//!
//! - The [`Frame`] type, an owned `height x width x 3` array of 8-bit pixel intensities tagged with
//!   its [`ChannelOrder`].
//! - [`convert`], which reorders a frame's color channels.
//! - A variety of [`draw`] functions to quickly visualize objects.
//! - [`Rect`] and [`RotatedRect`], floating-point rectangles describing regions of a frame.
//!
//! [`Rect`]: rect::Rect
//! [`RotatedRect`]: rect::RotatedRect

pub mod draw;
pub mod rect;
mod resolution;

#[cfg(test)]
mod tests;

use std::fmt;

use anyhow::anyhow;
use embedded_graphics::{pixelcolor::raw::RawU24, prelude::PixelColor};
use ndarray::Array3;

pub use resolution::*;

use self::rect::RotatedRect;

/// The order in which a [`Frame`] stores its three color channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    /// Blue, green, red. This is what camera frames use.
    Bgr,
    /// Red, green, blue. This is what the hand tracking networks consume.
    Rgb,
}

impl ChannelOrder {
    /// Returns the channel index holding the red component.
    #[inline]
    fn red(self) -> usize {
        match self {
            Self::Bgr => 2,
            Self::Rgb => 0,
        }
    }

    /// Returns the channel index holding the blue component.
    #[inline]
    fn blue(self) -> usize {
        2 - self.red()
    }
}

/// A video frame: a 3-dimensional array of pixel intensities (`height x width x 3`).
///
/// The meaning of the 3 channels is given by the frame's [`ChannelOrder`]. Pixel accessors like
/// [`Frame::get`] and [`Frame::set`] take the order into account, so drawing code does not need to.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Array3<u8>,
    order: ChannelOrder,
}

impl Frame {
    /// Creates a black frame with the given resolution.
    pub fn new(res: Resolution, order: ChannelOrder) -> Self {
        Self {
            data: Array3::zeros((res.height() as usize, res.width() as usize, 3)),
            order,
        }
    }

    /// Creates a frame from tightly packed, row-major pixel data.
    ///
    /// Returns an error if `data` does not hold exactly `width * height * 3` bytes.
    pub fn from_raw(res: Resolution, order: ChannelOrder, data: Vec<u8>) -> anyhow::Result<Self> {
        let data = Array3::from_shape_vec((res.height() as usize, res.width() as usize, 3), data)
            .map_err(|e| anyhow!("invalid frame data for {res} frame: {e}"))?;
        Ok(Self { data, order })
    }

    /// Decodes a JFIF JPEG or Motion JPEG from a byte slice into a frame with the given channel
    /// order.
    pub fn decode_jpeg(data: &[u8], order: ChannelOrder) -> anyhow::Result<Self> {
        let buf = image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)?.to_rgb8();
        let res = Resolution::new(buf.width(), buf.height());
        let frame = Self::from_raw(res, ChannelOrder::Rgb, buf.into_raw())?;
        Ok(convert(&frame, order))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.data.dim().1 as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.data.dim().0 as u32
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    #[inline]
    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Returns the raw pixel intensities, indexed as `[y, x, channel]`.
    #[inline]
    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    /// Reads the color of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside of the frame.
    pub fn get(&self, x: u32, y: u32) -> Color {
        let (x, y) = (x as usize, y as usize);
        Color([
            self.data[[y, x, self.order.red()]],
            self.data[[y, x, 1]],
            self.data[[y, x, self.order.blue()]],
        ])
    }

    /// Sets the pixel at `(x, y)` to `color`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside of the frame.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        let (x, y) = (x as usize, y as usize);
        self.data[[y, x, self.order.red()]] = color.r();
        self.data[[y, x, 1]] = color.g();
        self.data[[y, x, self.order.blue()]] = color.b();
    }

    /// Samples the frame at relative coordinates `(u, v)` inside of `rect`.
    ///
    /// `u` and `v` range from 0.0 to 1.0, with `(0.0, 0.0)` being the rectangle's (unrotated) top
    /// left corner. Pixels outside of the frame are black.
    pub(crate) fn sample(&self, rect: &RotatedRect, u: f32, v: f32) -> Color {
        let size = rect.rect().size();
        let pt = rect.transform_out([u * size.x, v * size.y]);
        let (x, y) = (pt.x.round(), pt.y.round());
        if x < 0.0 || y < 0.0 || x >= self.width() as f32 || y >= self.height() as f32 {
            return Color::BLACK;
        }
        self.get(x as u32, y as u32)
    }

    /// Returns the frame's pixels as tightly packed RGBA bytes, as needed for GPU upload.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width() as usize * self.height() as usize * 4);
        for px in self.data.rows() {
            out.extend_from_slice(&[px[self.order.red()], px[1], px[self.order.blue()], 255]);
        }
        out
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({}, {:?})", self.resolution(), self.order)
    }
}

/// Converts `frame` to the `target` channel order.
///
/// The conversion is a pure reordering of color channels: converting to another order and back
/// yields the original frame. If `frame` already uses `target`, an identical copy is returned.
pub fn convert(frame: &Frame, target: ChannelOrder) -> Frame {
    let mut data = frame.data.clone();
    if frame.order != target {
        // BGR <-> RGB swaps the outer channels and keeps green in place.
        for mut px in data.rows_mut() {
            px.swap(0, 2);
        }
    }
    Frame {
        data,
        order: target,
    }
}

/// An 8-bit sRGB color.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color([u8; 3]);

impl Color {
    pub const BLACK: Self = Self([0, 0, 0]);
    pub const WHITE: Self = Self([255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0]);
    pub const GREEN: Self = Self([0, 255, 0]);
    pub const BLUE: Self = Self([0, 0, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r(), self.g(), self.b())
    }
}

impl PixelColor for Color {
    type Raw = RawU24;
}
