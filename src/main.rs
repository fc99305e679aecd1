use std::{env, path::PathBuf};

use scissors::{
    gui::Display,
    hand::tracking::{HandTracker, TrackerConfig},
    pipeline::Pipeline,
    video::webcam::{Webcam, WebcamOptions},
};

const WINDOW_TITLE: &str = "My AI Interaction";

const ENV_VAR_MODEL_DIR: &str = "SCISSORS_MODEL_DIR";
const DEFAULT_MODEL_DIR: &str = "models";

fn main() -> anyhow::Result<()> {
    scissors::init_logger!();

    let model_dir = env::var_os(ENV_VAR_MODEL_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR));
    log::debug!("loading models from {}", model_dir.display());
    let tracker = HandTracker::load(TrackerConfig::default(), &model_dir)?;

    let webcam = Webcam::open(WebcamOptions::default())?;
    let display = Display::open(WINDOW_TITLE)?;

    Pipeline::new(webcam, tracker, display).run()
}
