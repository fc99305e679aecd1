//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::{cmp::Reverse, env, path::PathBuf};

use anyhow::{bail, Context};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{ChannelOrder, Frame, Resolution};
use crate::timer::Timer;

use super::FrameSource;

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the maximum resolution at the
/// desired frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ParamPreference {
    /// Prefer increased resolution over higher frame rates.
    #[default]
    Resolution,
    /// Prefer higher frame rate over higher image resolution.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Device selection and format negotiation options.
#[derive(Debug, Default)]
pub struct WebcamOptions {
    index: u32,
    name: Option<String>,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Sets the index of the video device to open (`/dev/video<index>`).
    ///
    /// Defaults to 0, the first video device. Ignored when a device name is configured.
    #[inline]
    pub fn index(self, index: u32) -> Self {
        Self { index, ..self }
    }

    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver the desired resolution.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver the desired frame rate.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects whether to prefer a higher resolution or frame rate.
    ///
    /// When the camera cannot deliver the desired frame rate and resolution, this controls which
    /// one will be maintained.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }

    fn device_path(&self) -> PathBuf {
        PathBuf::from(format!("/dev/video{}", self.index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

fn negotiate_format(device: &Device, mut prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                for rate in intervals {
                    formats.push(FrameFormat {
                        resolution: Resolution::new(size.width(), size.height()),
                        frame_interval: *rate.fract(),
                    });
                }
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    loop {
        if let Some(fmt) = negotiate_format_step(&formats, prefs) {
            return Ok((
                PixFormat::new(
                    fmt.resolution.width(),
                    fmt.resolution.height(),
                    pixel_format,
                ),
                fmt.frame_interval,
            ));
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        if !relax(&mut prefs) {
            break;
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }

    bail!("failed to negotiate a webcam format")
}

/// Drops the least important frame preference. Returns `false` if there was nothing left to drop.
fn relax(prefs: &mut FramePrefs) -> bool {
    match prefs.pref {
        ParamPreference::Resolution => {
            prefs.fps.take().is_some() || prefs.resolution.take().is_some()
        }
        ParamPreference::Framerate => {
            prefs.resolution.take().is_some() || prefs.fps.take().is_some()
        }
    }
}

fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut formats = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();
    match prefs.pref {
        ParamPreference::Resolution => {
            formats.sort_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.frame_interval)))
        }
        ParamPreference::Framerate => {
            formats.sort_by_key(|fmt| (Reverse(fmt.frame_interval), fmt.resolution.num_pixels()))
        }
    }
    formats.last().copied()
}

const ENV_VAR_WEBCAM_NAME: &str = "SCISSORS_WEBCAM_NAME";

/// A webcam yielding a stream of BGR [`Frame`]s.
///
/// The device stays open until the [`Webcam`] is dropped.
pub struct Webcam {
    stream: ReadStream,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the webcam selected by `options`.
    ///
    /// If a device name is configured (either via [`WebcamOptions::name`] or the
    /// `SCISSORS_WEBCAM_NAME` environment variable), all video devices are searched for a webcam
    /// with that name. Otherwise, the device with the configured index is opened.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        let name = match options.name.clone() {
            Some(name) => Some(name),
            None => match env::var(ENV_VAR_WEBCAM_NAME) {
                Ok(name) => {
                    log::debug!("webcam override: `{ENV_VAR_WEBCAM_NAME}` is set to '{name}'");
                    Some(name)
                }
                Err(_) => None,
            },
        };

        match name {
            Some(name) => Self::open_by_name(&name, &options),
            None => {
                let path = options.device_path();
                let dev = Device::open(&path)
                    .with_context(|| format!("failed to open video device {}", path.display()))?;
                match Self::open_impl(dev, &options)? {
                    Some(webcam) => Ok(webcam),
                    None => bail!("{} is not a video capture device", path.display()),
                }
            }
        }
    }

    fn open_by_name(name: &str, options: &WebcamOptions) -> anyhow::Result<Self> {
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => {
                    if dev.capabilities()?.card() != name {
                        continue;
                    }
                    match Self::open_impl(dev, options) {
                        Ok(Some(webcam)) => return Ok(webcam),
                        Ok(None) => {}
                        Err(e) => log::debug!("{e}"),
                    }
                }
                Err(e) => log::warn!("{e}"),
            }
        }

        bail!("no supported webcam named '{name}' found")
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;
        let capture = dev.video_capture(pixfmt)?;
        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream(2)?;

        Ok(Some(Self {
            stream,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Reads the next frame from the camera, in BGR channel order.
    ///
    /// If no frame is available, this method will block until one is. Webcams occasionally produce
    /// corrupted Motion JPEG frames; those are reported as errors, as are device errors.
    pub fn read(&mut self) -> anyhow::Result<Frame> {
        let dequeue_guard = self.t_dequeue.start();
        let t_decode = &self.t_decode;
        let decoded = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            Ok(t_decode.time(|| Frame::decode_jpeg(&buf, ChannelOrder::Bgr)))
        })?;
        decoded.context("webcam decode error")
    }
}

impl FrameSource for Webcam {
    fn read(&mut self) -> Option<Frame> {
        match Webcam::read(self) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::debug!("{e:#}");
                None
            }
        }
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        log::debug!("releasing webcam");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(w: u32, h: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(w, h),
            frame_interval: Fract::new(1, fps),
        }
    }

    fn formats() -> Vec<FrameFormat> {
        vec![
            format(640, 480, 30),
            format(640, 480, 60),
            format(1280, 720, 30),
            format(1920, 1080, 5),
        ]
    }

    #[test]
    fn prefers_resolution() {
        let prefs = FramePrefs::default();
        assert_eq!(
            negotiate_format_step(&formats(), prefs),
            Some(format(1920, 1080, 5))
        );

        let prefs = FramePrefs {
            fps: Some(30),
            ..prefs
        };
        assert_eq!(
            negotiate_format_step(&formats(), prefs),
            Some(format(1280, 720, 30))
        );
    }

    #[test]
    fn prefers_framerate() {
        let prefs = FramePrefs {
            pref: ParamPreference::Framerate,
            ..Default::default()
        };
        assert_eq!(
            negotiate_format_step(&formats(), prefs),
            Some(format(640, 480, 60))
        );
    }

    #[test]
    fn unsatisfiable() {
        let mut prefs = FramePrefs {
            resolution: Some(Resolution::new(1920, 1080)),
            fps: Some(60),
            pref: ParamPreference::Resolution,
        };
        assert_eq!(negotiate_format_step(&formats(), prefs), None);

        // Frame rate is given up first.
        assert!(relax(&mut prefs));
        assert_eq!(prefs.fps, None);
        assert_eq!(
            negotiate_format_step(&formats(), prefs),
            Some(format(1920, 1080, 5))
        );

        assert!(relax(&mut prefs));
        assert!(!relax(&mut prefs));
    }

    #[test]
    fn default_device() {
        assert_eq!(
            WebcamOptions::default().device_path(),
            PathBuf::from("/dev/video0")
        );
        assert_eq!(
            WebcamOptions::default().index(2).device_path(),
            PathBuf::from("/dev/video2")
        );
    }
}
