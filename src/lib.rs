//! Webcam hand tracking with "scissors" hand sign recognition.
//!
//! Every camera frame goes through the same linear pipeline: it is read from a [`FrameSource`],
//! converted to the channel order the [`LandmarkDetector`] expects, searched for hands, annotated
//! with each hand's skeleton, classified, and finally shown in a window by a [`FrameSink`]. See
//! [`pipeline::Pipeline`] for the loop driving all of this.
//!
//! # Coordinates
//!
//! Landmarks handed out by a [`LandmarkDetector`] are *normalized*: X and Y lie in range 0.0 to 1.0
//! relative to the frame's width and height, with Y pointing *down*. Z is a relative depth that
//! uses roughly the same scale as X, with smaller values being closer to the camera.
//!
//! # Environment Variables
//!
//! * `SCISSORS_MODEL_DIR`: Directory containing the `palm_detection_full.onnx` and
//!   `hand_landmark_full.onnx` networks. Defaults to `models`.
//! * `SCISSORS_WEBCAM_NAME`: Forces the device to use for [`Webcam`]s instead of opening the device
//!   with the configured index.
//! * `RUST_LOG`: Overrides the log filter installed by [`init_logger!`].
//!
//! [`FrameSource`]: video::FrameSource
//! [`FrameSink`]: gui::FrameSink
//! [`LandmarkDetector`]: hand::LandmarkDetector
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod detection;
pub mod gesture;
pub mod gui;
pub mod hand;
pub mod image;
pub mod nn;
pub mod num;
pub mod pipeline;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .target(env_logger::Target::Stdout)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stdout*.
///
/// The calling crate and this library will log at *debug* level, `wgpu` at *warn* level. The
/// `RUST_LOG` environment variable can be used to override this.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
