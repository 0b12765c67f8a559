pub mod bbox;
pub mod config;
pub mod detection;
pub mod detector;
pub mod display;
pub mod draw;
pub mod error;
pub mod frame_skip;
pub mod names;
pub mod pipeline;
pub mod source;
pub mod writer;

pub use config::{Config, Device, Source};
pub use detection::Detection;
pub use detector::{YoloDetector, YoloDetectorConfig};
pub use error::Error;
pub use names::{ClassFilter, ClassNames};
pub use pipeline::{Annotator, Summary};

use opencv::core::Mat;

/// Turns one BGR frame into detections in frame pixel coordinates.
pub trait Detect {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, Error>;
}

impl<T: Detect + ?Sized> Detect for &mut T {
    #[inline]
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, Error> {
        (**self).detect(frame)
    }
}

impl<T: Detect + ?Sized> Detect for Box<T> {
    #[inline]
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, Error> {
        (**self).detect(frame)
    }
}
