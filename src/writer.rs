use std::path::{Path, PathBuf};

use opencv::{
    core::{self, Mat},
    prelude::*,
    videoio,
};

use crate::error::Error;

/// Consumer of finished frames.
pub trait FrameSink {
    fn write(&mut self, frame: &Mat) -> Result<(), Error>;
}

/// mp4 output; the frame size is fixed when the file is opened.
pub struct VideoWriter {
    writer: Option<videoio::VideoWriter>,
    size: (i32, i32),
    out_file: PathBuf,
    size_warned: bool,
}

impl VideoWriter {
    pub fn open<P: AsRef<Path>>(out_file: P, fps: f64, size: (i32, i32)) -> Result<Self, Error> {
        let out_file = out_file.as_ref().to_path_buf();
        let fourcc = videoio::VideoWriter::fourcc(b'm' as _, b'p' as _, b'4' as _, b'v' as _)?;

        let writer = videoio::VideoWriter::new(
            &out_file.to_string_lossy(),
            fourcc,
            fps,
            core::Size::new(size.0, size.1),
            true,
        );

        let writer = match writer {
            Ok(w) if w.is_opened().unwrap_or(false) => w,
            Ok(_) => return Err(Error::OutputOpen(out_file)),
            Err(err) => {
                log::debug!("video writer refused {}: {}", out_file.display(), err);
                return Err(Error::OutputOpen(out_file));
            }
        };

        log::debug!(
            "writing {}x{} @ {:.2} fps to {}",
            size.0,
            size.1,
            fps,
            out_file.display()
        );

        Ok(Self {
            writer: Some(writer),
            size,
            out_file,
            size_warned: false,
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.out_file
    }

    #[inline]
    pub fn size(&self) -> (i32, i32) {
        self.size
    }

    pub fn release(&mut self) {
        if let Some(mut w) = self.writer.take() {
            if let Err(err) = w.release() {
                log::warn!("failed to finalize {}: {}", self.out_file.display(), err);
            }
        }
    }
}

impl FrameSink for VideoWriter {
    fn write(&mut self, frame: &Mat) -> Result<(), Error> {
        let writer = match self.writer.as_mut() {
            Some(w) => w,
            None => return Ok(()),
        };

        let size = (frame.cols(), frame.rows());
        if size != self.size && !self.size_warned {
            log::warn!(
                "frame size {}x{} differs from output size {}x{}",
                size.0,
                size.1,
                self.size.0,
                self.size.1
            );
            self.size_warned = true;
        }

        writer.write(frame)?;
        Ok(())
    }
}

impl Drop for VideoWriter {
    fn drop(&mut self) {
        self.release();
    }
}
