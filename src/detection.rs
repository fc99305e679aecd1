//! Common functionality for object detection.
//!
//! The palm detector is a Single Shot MultiBox Detector (SSD). The decoding machinery for such
//! networks lives here, so that the network-specific code only needs to describe its anchors and
//! output layout.

pub mod nms;
pub mod ssd;

use crate::image::{rect::Rect, Frame};
use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// Trait implemented by neural networks that detect objects in an input image.
pub trait Network: Send + Sync + 'static {
    /// Returns the [`Cnn`] to use for detection.
    fn cnn(&self) -> &Cnn;

    /// Extracts all detections with confidence above `threshold` from the network's output.
    ///
    /// Keypoint and detection positions are expected to be in the coordinate system of the
    /// network's input.
    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()>;
}

/// A generic single-class object detector.
///
/// This type wraps a [`Network`] for object detection and takes care of letterboxing the input
/// frame, filtering duplicate detections, and mapping the results back into frame coordinates.
pub struct Detector {
    network: Box<dyn Network>,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_nms: Timer,
    thresh: f32,
    nms: NonMaxSuppression,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            detections: Vec::new(),
            t_infer: Timer::new("detect"),
            t_nms: Timer::new("nms"),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
        }
    }

    /// Sets the minimum confidence a detection needs to be reported.
    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Runs the detector on `frame`, returning the detected objects in pixel coordinates.
    pub fn detect(&mut self, frame: &Frame) -> anyhow::Result<&[Detection]> {
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let Some(input_aspect) = input_res.aspect_ratio() else {
            anyhow::bail!("detector has degenerate input resolution {input_res}");
        };

        // If the frame's aspect ratio doesn't match the CNN's input, sample an oversized region
        // that does. The area outside of the frame is black.
        let rect = frame.resolution().rect().grow_to_fit_aspect(input_aspect);
        let outputs = self.t_infer.time(|| cnn.estimate(frame, &rect.into()))?;
        log::trace!("inference result: {:?}", outputs);

        self.network
            .extract(&outputs, self.thresh, &mut self.detections)?;

        self.t_nms.time(|| {
            let filtered = self.nms.process(&mut self.detections).collect::<Vec<_>>();
            self.detections = filtered;
        });

        // Map all coordinates from the network's input coordinate system back into the frame.
        let scale = rect.width() / input_res.width() as f32;
        for det in &mut self.detections {
            let center = det.rect.center() * scale;
            let size = det.rect.size() * scale;
            det.rect = Rect::from_center(center.x, center.y, size.x, size.y)
                .move_by(rect.x(), rect.y());
            for kp in &mut det.keypoints {
                kp.x = kp.x * scale + rect.x();
                kp.y = kp.y * scale + rect.y();
            }
        }

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_nms].into_iter()
    }
}

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value, an
/// optional rotation angle of the object, and a possibly empty set of located keypoints.
///
/// Per convention, the confidence value lies between 0.0 and 1.0, which can be achieved by passing
/// the raw network output through [`crate::num::sigmoid`]. The confidence value is used as the
/// weight when averaging overlapping detections, so it has to have the expected range.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the angle of the detected object, in radians, clockwise.
    ///
    /// Networks that do not compute the object angle leave this at 0.0.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Sets the angle of the detected object, in radians, clockwise.
    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The meaning of a keypoint depends on the specific detector and on its index in the keypoint
/// list. The palm detector uses them to orient the region that the landmark network looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}

impl From<Keypoint> for nalgebra::Vector2<f32> {
    fn from(kp: Keypoint) -> Self {
        Self::new(kp.x, kp.y)
    }
}
