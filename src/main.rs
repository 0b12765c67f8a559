use anyhow::{Context, Result};
use clap::Parser;

use qannotate::config::Args;
use qannotate::{Annotator, ClassNames, Config, Error, YoloDetector, YoloDetectorConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from(Args::parse());

    log::info!("Using source: {}", config.source);
    log::info!("Saving annotated video to: {}", config.output.display());
    log::info!("Classes: {:?}", config.classes);
    log::info!("Confidence threshold: {}", config.confidence);
    if config.frame_skip > 0 {
        log::info!("Annotating every {} frame(s)", config.frame_skip + 1);
    }

    let names = match &config.names {
        Some(path) => ClassNames::from_file(path)
            .with_context(|| format!("failed to read class names from {}", path.display()))?,
        None => ClassNames::coco(),
    };

    let detector = YoloDetector::new(
        &config.model,
        YoloDetectorConfig::new(config.confidence, config.iou, config.imgsz),
        config.device,
    )
    .with_context(|| format!("failed to load model {}", config.model.display()))?;

    let mut annotator = Annotator::new(config, detector, names);

    match annotator.run() {
        Ok(summary) => {
            log::info!("{}", summary);
            log::info!("Demo finished.");
            Ok(())
        }
        Err(err) => match open_failure(&err) {
            Some(message) => {
                log::error!("{}", message);
                log::debug!("{}", err);
                Ok(())
            }
            None => Err(err.into()),
        },
    }
}

/// Open failures end the run quietly with one line instead of an error exit.
fn open_failure(err: &Error) -> Option<&'static str> {
    match err {
        Error::SourceOpen(_) => Some("Could not open video source."),
        Error::OutputOpen(_) => Some("Could not open output video for writing."),
        _ => None,
    }
}
