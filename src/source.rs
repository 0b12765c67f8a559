use opencv::{core::Mat, prelude::*, videoio};

use crate::config::Source;
use crate::error::Error;

pub const DEFAULT_FPS: f64 = 20.0;
pub const DEFAULT_WIDTH: i32 = 640;
pub const DEFAULT_HEIGHT: i32 = 480;

/// Anything that yields decoded BGR frames one at a time.
pub trait FrameSource {
    /// Reads the next frame into `frame`. Returns `false` once the stream is over.
    fn read(&mut self, frame: &mut Mat) -> Result<bool, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamProperties {
    pub fps: f64,
    pub width: i32,
    pub height: i32,
}

impl StreamProperties {
    /// Sources that do not know their rate or size report zero; those get defaults.
    pub fn from_reported(fps: f64, width: f64, height: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            DEFAULT_FPS
        };

        let dim = |v: f64, default: i32| {
            if v.is_finite() && v >= 1.0 {
                v as i32
            } else {
                default
            }
        };

        Self {
            fps,
            width: dim(width, DEFAULT_WIDTH),
            height: dim(height, DEFAULT_HEIGHT),
        }
    }

    #[inline]
    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }
}

pub struct Capture {
    cam: Option<videoio::VideoCapture>,
}

impl Capture {
    pub fn open(source: &Source) -> Result<Self, Error> {
        let cam = match source {
            Source::Webcam(index) => videoio::VideoCapture::new(*index, videoio::CAP_ANY),
            Source::File(path) => {
                videoio::VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
            }
        };

        // a missing file is reported either as an error or as a closed capture
        let cam = match cam {
            Ok(cam) if cam.is_opened().unwrap_or(false) => cam,
            Ok(_) => return Err(Error::SourceOpen(source.to_string())),
            Err(err) => {
                log::debug!("capture backend refused {}: {}", source, err);
                return Err(Error::SourceOpen(source.to_string()));
            }
        };

        Ok(Self { cam: Some(cam) })
    }

    pub fn properties(&self) -> Result<StreamProperties, Error> {
        let cam = match &self.cam {
            Some(cam) => cam,
            None => return Ok(StreamProperties::from_reported(0.0, 0.0, 0.0)),
        };

        Ok(StreamProperties::from_reported(
            cam.get(videoio::CAP_PROP_FPS)?,
            cam.get(videoio::CAP_PROP_FRAME_WIDTH)?,
            cam.get(videoio::CAP_PROP_FRAME_HEIGHT)?,
        ))
    }

    /// Frame count as reported by the container, if it knows one.
    pub fn frame_count(&self) -> Option<u64> {
        let total = self.cam.as_ref()?.get(videoio::CAP_PROP_FRAME_COUNT).ok()?;
        if total.is_finite() && total >= 1.0 {
            Some(total as u64)
        } else {
            None
        }
    }

    pub fn release(&mut self) {
        if let Some(mut cam) = self.cam.take() {
            if let Err(err) = cam.release() {
                log::warn!("failed to release capture: {}", err);
            }
        }
    }
}

impl FrameSource for Capture {
    fn read(&mut self, frame: &mut Mat) -> Result<bool, Error> {
        let cam = match self.cam.as_mut() {
            Some(cam) => cam,
            None => return Ok(false),
        };

        match cam.read(frame) {
            Ok(true) => Ok(frame.rows() > 0 && frame.cols() > 0),
            Ok(false) => Ok(false),
            Err(err) => {
                log::warn!("cannot read frame: {}", err);
                Ok(false)
            }
        }
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        self.release();
    }
}
