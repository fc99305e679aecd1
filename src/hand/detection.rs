//! Palm detection.

use std::path::Path;

use anyhow::bail;
use nalgebra::{Point2, Rotation2, Vector2};
use once_cell::sync::Lazy;

use crate::detection::{
    ssd::{Anchor, Anchors, LayerInfo},
    Detection, Keypoint, Network,
};
use crate::image::{rect::Rect, Resolution};
use crate::nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PalmKeypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;
const BOX_PARAMS: usize = 4 + 2 * NUM_KEYPOINTS;

static ANCHORS: Lazy<Anchors> =
    Lazy::new(|| Anchors::calculate(&[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)]));

/// The full-range palm detection network.
///
/// Takes a 192x192 image and outputs 2016 candidate palm boxes, each with 7 keypoints.
pub struct PalmNetwork {
    cnn: Cnn,
}

impl PalmNetwork {
    /// File name of the network inside the model directory.
    pub const FILE_NAME: &'static str = "palm_detection_full.onnx";

    /// Loads the network from an ONNX file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::debug!("loading palm detection network from {}", path.display());
        let cnn = Cnn::new(
            NeuralNetwork::from_path(path)?.load()?,
            CnnInputShape::NCHW,
            ColorMapper::linear(0.0..=1.0),
        )?;
        Ok(Self { cnn })
    }
}

impl Network for PalmNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()> {
        extract_outputs(
            self.cnn.input_resolution(),
            outputs,
            threshold,
            detections,
        )
    }
}

fn extract_outputs(
    input_res: Resolution,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    if outputs.len() != 2 {
        bail!("palm detection network returned {} outputs, expected 2", outputs.len());
    }

    let num_anchors = ANCHORS.anchor_count();
    let boxes = &outputs[0];
    let confidences = &outputs[1];

    if boxes.shape() != [1, num_anchors, BOX_PARAMS] || confidences.shape() != [1, num_anchors, 1] {
        bail!(
            "unexpected palm detection output shapes {:?} and {:?}",
            boxes.shape(),
            confidences.shape(),
        );
    }

    for (index, view) in confidences.index([0]).iter().enumerate() {
        let conf = sigmoid(view.as_slice()[0]);
        if conf < thresh {
            continue;
        }

        let box_params = boxes.index([0, index]).as_slice();
        detections.push(extract_detection(
            &ANCHORS[index],
            input_res,
            box_params,
            conf,
        ));
    }

    Ok(())
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let input_w = input_res.width() as f32;
    let input_h = input_res.height() as f32;

    // Box and keypoint positions are offsets from the anchor center.
    let xc = box_params[0] + anchor.x_center() * input_w;
    let yc = box_params[1] + anchor.y_center() * input_h;
    let w = box_params[2];
    let h = box_params[3];
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| {
            Keypoint::new(
                xy[0] + anchor.x_center() * input_w,
                xy[1] + anchor.y_center() * input_h,
            )
        })
        .collect::<Vec<_>>();

    let mut det = Detection::with_keypoints(confidence, Rect::from_center(xc, yc, w, h), keypoints);
    det.set_angle(palm_angle(&det));
    det
}

/// Computes the clockwise rotation of a detected palm, with 0.0 meaning fingers point upwards.
fn palm_angle(det: &Detection) -> f32 {
    let a = det.keypoints()[PalmKeypoint::MiddleFingerMcp as usize];
    let finger = Point2::new(a.x(), a.y());
    let b = det.keypoints()[PalmKeypoint::Wrist as usize];
    let wrist = Point2::new(b.x(), b.y());

    let rel = wrist - finger;
    Rotation2::rotation_between(&Vector2::y(), &rel).angle()
}
