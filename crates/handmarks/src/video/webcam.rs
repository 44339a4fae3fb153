//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::{cmp::Reverse, path::PathBuf};

use anyhow::{bail, Context};
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{
    image::{self, Image, Resolution},
    timer::Timer,
};

use super::FrameSource;

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the maximum resolution at the
/// desired frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    /// Prefer increased resolution over higher frame rates.
    #[default]
    Resolution,
    /// Prefer higher frame rate over higher image resolution.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Device selection and format negotiation options.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WebcamOptions {
    index: u32,
    frame: FramePrefs,
}

impl WebcamOptions {
    /// Selects the device `/dev/video{index}`. Defaults to 0.
    #[inline]
    pub fn index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    /// Sets the desired image resolution.
    ///
    /// A larger resolution is selected if the webcam can deliver one, a smaller one if it cannot
    /// deliver the desired resolution at all.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects whether to prefer a higher resolution or frame rate.
    ///
    /// When the camera cannot deliver the desired frame rate and resolution, this controls which
    /// one is kept. Otherwise it controls which one is maximized.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }

    fn path(&self) -> PathBuf {
        PathBuf::from(format!("/dev/video{}", self.index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

fn negotiate_format(device: &Device, prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixelformat() == Pixelformat::JPEG || format.pixelformat() == Pixelformat::MJPG {
            pixel_format = Some(format.pixelformat());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("device offers no JPEG or MJPG format");
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

    let fmt = select_format(&formats, prefs).context("failed to negotiate a webcam format")?;
    Ok((
        PixFormat::new(
            fmt.resolution.width(),
            fmt.resolution.height(),
            pixel_format,
        ),
        fmt.frame_interval,
    ))
}

/// Picks the best format, dropping preferences one at a time until something matches.
///
/// The preference that [`ParamPreference`] does not favor is dropped first.
fn select_format(formats: &[FrameFormat], mut prefs: FramePrefs) -> Option<FrameFormat> {
    loop {
        if let Some(fmt) = negotiate_format_step(formats, prefs) {
            return Some(fmt);
        }

        log::debug!("failed to negotiate format with prefs {:?}", prefs);
        match prefs.pref {
            ParamPreference::Resolution => {
                if prefs.fps.take().is_none() && prefs.resolution.take().is_none() {
                    return None;
                }
            }
            ParamPreference::Framerate => {
                if prefs.resolution.take().is_none() && prefs.fps.take().is_none() {
                    return None;
                }
            }
        }
        log::debug!("retrying with new prefs {:?}", prefs);
    }
}

fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let eligible = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied();
    let mut formats = eligible.collect::<Vec<_>>();

    match (prefs.pref, prefs.resolution) {
        // With a requested resolution, pick the smallest one covering it, then the highest rate.
        (ParamPreference::Resolution, Some(_)) => formats.sort_by_key(|fmt| {
            (Reverse(fmt.resolution.num_pixels()), Reverse(fmt.frame_interval))
        }),
        (ParamPreference::Resolution, None) => {
            formats.sort_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.frame_interval)))
        }
        (ParamPreference::Framerate, _) => {
            formats.sort_by_key(|fmt| (Reverse(fmt.frame_interval), fmt.resolution.num_pixels()))
        }
    }
    formats.last().copied()
}

/// A webcam yielding a stream of [`Image`]s.
///
/// Dropping the webcam stops the stream and closes the device.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the webcam selected by `options`.
    ///
    /// Fails before touching the device if `HANDMARKS_JPEG_BACKEND` names an unknown decoder.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        // Frames are decoded one by one later, where a bad backend would only yield blank frames.
        image::check_backend()?;

        let path = options.path();
        for res in linuxvideo::list()? {
            match res {
                Ok(dev) => {
                    if dev.path()? == path {
                        return Self::open_device(dev, &options)
                            .with_context(|| format!("failed to open {}", path.display()));
                    }
                }
                Err(e) => {
                    log::warn!("{}", e);
                }
            }
        }

        bail!("no video device found at {}", path.display())
    }

    fn open_device(dev: Device, options: &WebcamOptions) -> anyhow::Result<Self> {
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
            bail!("{} is not a video capture device", caps.card());
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

        Ok(Self {
            stream,
            resolution,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        })
    }

    /// Returns the negotiated frame size.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let resolution = self.resolution;
        let t_decode = &self.t_decode;
        self.stream
            .dequeue(|buf| {
                drop(dequeue_guard);
                let image = match t_decode.time(|| Image::decode_jpeg(&buf)) {
                    Ok(image) => image,
                    Err(e) => {
                        // USB cameras produce the occasional corrupted MJPG frame. A blank frame
                        // keeps latency steady, skipping would double it.
                        log::error!("webcam decode error: {}", e);
                        Image::new(resolution.width(), resolution.height())
                    }
                };
                Ok(image)
            })
            .map_err(Into::into)
    }
}

impl FrameSource for Webcam {
    fn read(&mut self) -> anyhow::Result<Image> {
        Webcam::read(self)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_dequeue, &self.t_decode]
    }
}
