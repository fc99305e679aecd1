//! Hand landmark estimation.

use std::{fmt, ops::Index, path::Path};

use anyhow::bail;
use nalgebra::{Point2, Rotation2, Vector2};

use crate::image::{draw, rect::RotatedRect, AspectRatio, Color, Frame, Resolution};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::timer::Timer;

/// Number of landmarks estimated per hand.
pub const NUM_LANDMARKS: usize = 21;

/// Names for the hand pose landmarks, in the order the landmark network outputs them.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl LandmarkIdx {
    /// All landmarks, ordered by their index.
    pub const ALL: [Self; NUM_LANDMARKS] = {
        use LandmarkIdx::*;
        [
            Wrist,
            ThumbCmc,
            ThumbMcp,
            ThumbIp,
            ThumbTip,
            IndexFingerMcp,
            IndexFingerPip,
            IndexFingerDip,
            IndexFingerTip,
            MiddleFingerMcp,
            MiddleFingerPip,
            MiddleFingerDip,
            MiddleFingerTip,
            RingFingerMcp,
            RingFingerPip,
            RingFingerDip,
            RingFingerTip,
            PinkyMcp,
            PinkyPip,
            PinkyDip,
            PinkyTip,
        ]
    };

    /// Returns the position of this landmark in a [`LandmarkSet`].
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The skeletal topology of a hand: every pair of landmarks that is connected by a bone (or by the
/// outline of the palm).
pub const CONNECTIVITY: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Surround the palm:
        (Wrist, ThumbCmc),
        (Wrist, IndexFingerMcp),
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, PinkyMcp),
        (PinkyMcp, Wrist),
        // Thumb:
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};

const CONNECTION_COLOR: Color = Color::from_rgb8(224, 224, 224);
const LANDMARK_COLOR: Color = Color::RED;

/// A landmark in 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Landmark {
    x: f32,
    y: f32,
    z: f32,
}

impl Landmark {
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    /// Returns the Y coordinate. Y points down, so smaller values are higher up in the frame.
    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.z
    }
}

impl From<Landmark> for Vector2<f32> {
    fn from(lm: Landmark) -> Self {
        Self::new(lm.x, lm.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// The 21 landmarks of one hand, together with the network's confidence values.
///
/// Whether the coordinates are normalized or in pixels depends on where the set comes from:
/// [`LandmarkDetector`]s hand out normalized sets, while [`LandmarkNetwork::estimate`] works in the
/// frame's pixel coordinates.
///
/// [`LandmarkDetector`]: super::LandmarkDetector
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    landmarks: [Landmark; NUM_LANDMARKS],
    presence: f32,
    raw_handedness: f32,
}

impl Default for LandmarkSet {
    fn default() -> Self {
        Self::new([Landmark::default(); NUM_LANDMARKS])
    }
}

impl LandmarkSet {
    /// Creates a landmark set with full presence confidence.
    pub fn new(landmarks: [Landmark; NUM_LANDMARKS]) -> Self {
        Self {
            landmarks,
            presence: 1.0,
            raw_handedness: 0.5,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_presence(&mut self, presence: f32) {
        self.presence = presence;
    }

    #[inline]
    pub fn get(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks[idx.index()]
    }

    #[inline]
    pub fn set(&mut self, idx: LandmarkIdx, landmark: Landmark) {
        self.landmarks[idx.index()] = landmark;
    }

    /// Returns all landmarks, indexed by [`LandmarkIdx::index`].
    #[inline]
    pub fn landmarks(&self) -> &[Landmark; NUM_LANDMARKS] {
        &self.landmarks
    }

    /// Returns the network's confidence that a hand is visible in its input, from 0.0 to 1.0.
    #[inline]
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the estimated handedness of the hand.
    ///
    /// This assumes that the camera image is passed in as-is (not mirrored), and should only be
    /// relied on when the [`presence`][Self::presence] is high enough.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    /// Computes the clockwise rotation of the palm compared to an upright position.
    ///
    /// A rotation of 0° means that fingers are pointed upwards.
    pub fn rotation_radians(&self) -> f32 {
        let p = self.get(LandmarkIdx::MiddleFingerMcp);
        let finger = Point2::new(p.x, p.y);
        let p = self.get(LandmarkIdx::Wrist);
        let wrist = Point2::new(p.x, p.y);

        let rel = wrist - finger;
        Rotation2::rotation_between(&Vector2::y(), &rel).angle()
    }

    /// Returns the pairs of landmarks connected in the hand's skeleton, as listed in
    /// [`CONNECTIVITY`].
    pub fn segments(&self) -> impl Iterator<Item = (Landmark, Landmark)> + '_ {
        CONNECTIVITY
            .iter()
            .map(|&(a, b)| (self.get(a), self.get(b)))
    }

    /// Applies `f` to every landmark.
    pub fn map_landmarks(&mut self, f: impl FnMut(Landmark) -> Landmark) {
        self.landmarks = self.landmarks.map(f);
    }

    /// Draws the hand's skeleton onto `frame`.
    ///
    /// The landmarks must be normalized; they are scaled by the frame's width and height.
    pub fn draw(&self, frame: &mut Frame) {
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let px = |lm: Landmark| ((lm.x * w).round() as i32, (lm.y * h).round() as i32);

        for (a, b) in self.segments() {
            let ((ax, ay), (bx, by)) = (px(a), px(b));
            draw::line(frame, ax, ay, bx, by)
                .color(CONNECTION_COLOR)
                .stroke_width(2);
        }
        for &lm in &self.landmarks {
            let (x, y) = px(lm);
            draw::marker(frame, x, y).color(LANDMARK_COLOR);
        }
    }
}

impl Index<LandmarkIdx> for LandmarkSet {
    type Output = Landmark;

    fn index(&self, idx: LandmarkIdx) -> &Landmark {
        &self.landmarks[idx.index()]
    }
}

/// The full-range hand landmark network.
///
/// Takes a square crop of the hand and outputs 21 landmarks, a hand presence flag, and the
/// handedness of the hand.
pub struct LandmarkNetwork {
    cnn: Cnn,
    t_infer: Timer,
}

impl LandmarkNetwork {
    /// File name of the network inside the model directory.
    pub const FILE_NAME: &'static str = "hand_landmark_full.onnx";

    /// Loads the network from an ONNX file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::debug!("loading hand landmark network from {}", path.display());
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?.load()?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self {
            cnn,
            t_infer: Timer::new("landmarks"),
        })
    }

    /// Returns the expected input resolution of the network.
    pub fn input_resolution(&self) -> Resolution {
        self.cnn.input_resolution()
    }

    pub fn timer(&self) -> &Timer {
        &self.t_infer
    }

    /// Estimates the landmarks of the hand inside `roi`.
    ///
    /// The region is first enlarged to match the network's aspect ratio. The returned landmarks
    /// are in `frame`'s pixel coordinates; Z uses the same scale as X.
    pub fn estimate(&self, frame: &Frame, roi: &RotatedRect) -> anyhow::Result<LandmarkSet> {
        let input_res = self.input_resolution();
        let aspect = input_res.aspect_ratio().unwrap_or(AspectRatio::SQUARE);
        let view_rect = roi.grow_to_fit_aspect(aspect);

        let outputs = self.t_infer.time(|| self.cnn.estimate(frame, &view_rect))?;
        let mut set = extract(&outputs)?;

        // Network input coordinates -> `view_rect` coordinates -> frame coordinates.
        let scale_x = view_rect.rect().width() / input_res.width() as f32;
        let scale_y = view_rect.rect().height() / input_res.height() as f32;
        set.map_landmarks(|lm| {
            let pos = view_rect.transform_out([lm.x * scale_x, lm.y * scale_y]);
            Landmark::new(pos.x, pos.y, lm.z * scale_x)
        });
        Ok(set)
    }
}

impl fmt::Debug for LandmarkNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LandmarkNetwork({})", self.input_resolution())
    }
}

/// Decodes the landmark network's outputs.
///
/// Outputs are, in order: screen landmarks `[1, 63]`, presence `[1, 1]`, handedness `[1, 1]` and
/// metric world landmarks `[1, 63]`. The world landmarks are ignored.
fn extract(outputs: &Outputs) -> anyhow::Result<LandmarkSet> {
    if outputs.len() < 3 {
        bail!("hand landmark network returned {} outputs, expected at least 3", outputs.len());
    }
    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];
    let handedness = &outputs[2];

    if screen_landmarks.shape() != [1, NUM_LANDMARKS * 3]
        || presence_flag.shape() != [1, 1]
        || handedness.shape() != [1, 1]
    {
        bail!(
            "unexpected hand landmark output shapes {:?}, {:?}, {:?}",
            screen_landmarks.shape(),
            presence_flag.shape(),
            handedness.shape(),
        );
    }

    let coords = screen_landmarks.index([0]).as_slice();
    let mut landmarks = [Landmark::default(); NUM_LANDMARKS];
    for (out, xyz) in landmarks.iter_mut().zip(coords.chunks_exact(3)) {
        *out = Landmark::new(xyz[0], xyz[1], xyz[2]);
    }

    Ok(LandmarkSet {
        landmarks,
        presence: presence_flag.index([0, 0]).as_singular(),
        raw_handedness: handedness.index([0, 0]).as_singular(),
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::image::{ChannelOrder, Resolution};
    use crate::nn::tensor::Tensor;

    use super::*;

    #[test]
    fn landmark_indices_match_names() {
        for (i, idx) in LandmarkIdx::ALL.into_iter().enumerate() {
            assert_eq!(idx.index(), i);
        }
        assert_eq!(LandmarkIdx::IndexFingerPip.index(), 6);
        assert_eq!(LandmarkIdx::IndexFingerTip.index(), 8);
        assert_eq!(LandmarkIdx::MiddleFingerPip.index(), 10);
        assert_eq!(LandmarkIdx::MiddleFingerTip.index(), 12);
    }

    #[test]
    fn topology() {
        assert_eq!(CONNECTIVITY.len(), 21);
        // Every landmark is part of the skeleton.
        for idx in LandmarkIdx::ALL {
            assert!(CONNECTIVITY.iter().any(|&(a, b)| a == idx || b == idx), "{idx:?}");
        }
        // No duplicate bones.
        for (i, a) in CONNECTIVITY.iter().enumerate() {
            for b in &CONNECTIVITY[i + 1..] {
                assert!(a != b && (a.0, a.1) != (b.1, b.0), "{a:?}");
            }
        }
    }

    #[test]
    fn segments_follow_topology() {
        let mut landmarks = [Landmark::default(); NUM_LANDMARKS];
        for (i, lm) in landmarks.iter_mut().enumerate() {
            *lm = Landmark::new(i as f32, 0.0, 0.0);
        }
        let set = LandmarkSet::new(landmarks);
        let segments = set.segments().collect::<Vec<_>>();
        assert_eq!(segments.len(), CONNECTIVITY.len());
        for ((a, b), (ia, ib)) in segments.iter().zip(CONNECTIVITY) {
            assert_eq!(a.x() as usize, ia.index());
            assert_eq!(b.x() as usize, ib.index());
        }
    }

    #[test]
    fn rotation() {
        let mut set = LandmarkSet::default();
        set.set(LandmarkIdx::Wrist, Landmark::new(0.5, 0.9, 0.0));
        set.set(LandmarkIdx::MiddleFingerMcp, Landmark::new(0.5, 0.5, 0.0));
        assert_relative_eq!(set.rotation_radians(), 0.0);

        set.set(LandmarkIdx::MiddleFingerMcp, Landmark::new(0.9, 0.9, 0.0));
        assert_relative_eq!(set.rotation_radians().abs(), std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn draw_scales_to_pixels() {
        let mut set = LandmarkSet::default();
        for idx in LandmarkIdx::ALL {
            set.set(idx, Landmark::new(0.5, 0.5, 0.0));
        }
        set.set(LandmarkIdx::ThumbCmc, Landmark::new(0.5, 0.0, 0.0));

        let mut frame = Frame::new(Resolution::new(40, 20), ChannelOrder::Bgr);
        set.draw(&mut frame);
        assert_eq!(frame.get(20, 10), LANDMARK_COLOR);
        assert_eq!(frame.get(20, 5), CONNECTION_COLOR);
        assert_eq!(frame.get(2, 2), Color::BLACK);
    }

    #[test]
    fn extract_outputs() {
        let outputs = [
            Tensor::from_array_shape_fn([1, 63], |[_, i]| i as f32),
            Tensor::from_array_shape_fn([1, 1], |_| 0.75),
            Tensor::from_array_shape_fn([1, 1], |_| 0.9),
            Tensor::from_array_shape_fn([1, 63], |_| 0.0),
        ]
        .into_iter()
        .collect::<Outputs>();

        let set = extract(&outputs).unwrap();
        assert_eq!(set.presence(), 0.75);
        assert_eq!(set.handedness(), Handedness::Right);
        assert_eq!(set.get(LandmarkIdx::Wrist), Landmark::new(0.0, 1.0, 2.0));
        assert_eq!(set.get(LandmarkIdx::PinkyTip), Landmark::new(60.0, 61.0, 62.0));
    }

    #[test]
    fn extract_rejects_wrong_shapes() {
        let outputs = [
            Tensor::from_array_shape_fn([1, 42], |_| 0.0),
            Tensor::from_array_shape_fn([1, 1], |_| 0.0),
            Tensor::from_array_shape_fn([1, 1], |_| 0.0),
        ]
        .into_iter()
        .collect::<Outputs>();
        assert!(extract(&outputs).is_err());
    }
}
