use std::fmt;
use std::time::{Duration, Instant};

use opencv::core::Mat;

use crate::config::Config;
use crate::display::{Display, Headless, KeyAction, Window};
use crate::draw;
use crate::error::Error;
use crate::frame_skip::FrameSkip;
use crate::names::{ClassFilter, ClassNames};
use crate::source::{Capture, FrameSource};
use crate::writer::{FrameSink, VideoWriter};
use crate::Detect;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub frames_read: u64,
    pub frames_annotated: u64,
    pub frames_passed_through: u64,
    pub frames_written: u64,
    pub detections: u64,
    pub quit_requested: bool,
    pub elapsed: Duration,
}

impl Summary {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_read as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames read, {} annotated, {} passed through, {} written, {} detections in {:.1?} ({:.1} fps)",
            self.frames_read,
            self.frames_annotated,
            self.frames_passed_through,
            self.frames_written,
            self.detections,
            self.elapsed,
            self.fps(),
        )
    }
}

pub struct Annotator<D> {
    config: Config,
    detector: D,
    names: ClassNames,
    filter: ClassFilter,
    skip: FrameSkip,
}

impl<D: Detect> Annotator<D> {
    pub fn new(config: Config, detector: D, names: ClassNames) -> Self {
        let filter = ClassFilter::new(&names, &config.classes);
        let skip = FrameSkip::new(config.frame_skip);

        Self {
            config,
            detector,
            names,
            filter,
            skip,
        }
    }

    /// Opens the capture, the output file and (optionally) the window, then
    /// annotates until the stream ends or the user quits.
    pub fn run(&mut self) -> Result<Summary, Error> {
        let mut capture = Capture::open(&self.config.source)?;

        let props = capture.properties()?;
        log::info!(
            "source {} is {}x{} @ {:.2} fps",
            self.config.source,
            props.width,
            props.height,
            props.fps
        );
        if let Some(total) = capture.frame_count() {
            log::debug!("source reports {} frames", total);
        }

        let mut writer = match VideoWriter::open(&self.config.output, props.fps, props.size()) {
            Ok(writer) => writer,
            Err(err) => {
                capture.release();
                return Err(err);
            }
        };
        let (out_w, out_h) = writer.size();
        log::info!("writing {}x{} video to {}", out_w, out_h, writer.path().display());

        let summary = if self.config.display {
            let mut window = Window::open()?;
            log::info!("Press 'q' to quit the window.");

            let summary = self.process(&mut capture, &mut writer, &mut window);
            window.release();
            summary
        } else {
            self.process(&mut capture, &mut writer, &mut Headless)
        };

        capture.release();
        writer.release();

        summary
    }

    /// The frame loop. Every frame read is written exactly once, annotated or not.
    pub fn process<S, W, V>(
        &mut self,
        source: &mut S,
        sink: &mut W,
        display: &mut V,
    ) -> Result<Summary, Error>
    where
        S: FrameSource + ?Sized,
        W: FrameSink + ?Sized,
        V: Display + ?Sized,
    {
        let started = Instant::now();
        let mut summary = Summary::default();
        let mut frame = Mat::default();
        let mut frame_idx = 0u64;

        loop {
            if !source.read(&mut frame)? {
                log::info!("End of stream or cannot read frame.");
                break;
            }
            summary.frames_read += 1;

            if !self.skip.should_annotate(frame_idx) {
                sink.write(&frame)?;
                summary.frames_passed_through += 1;
                summary.frames_written += 1;
                frame_idx += 1;
                continue;
            }

            let mut dets = self.detector.detect(&frame)?;
            self.filter.retain(&mut dets);
            log::trace!("frame #{}: {} detections", frame_idx, dets.len());

            draw::annotate(&mut frame, &dets, &self.names)?;
            summary.frames_annotated += 1;
            summary.detections += dets.len() as u64;

            let action = display.show(&frame)?;

            sink.write(&frame)?;
            summary.frames_written += 1;

            if action == KeyAction::Quit {
                log::info!("'q' pressed, exiting.");
                summary.quit_requested = true;
                break;
            }

            frame_idx += 1;
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }
}
