use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("OpenCV Error: {0}")]
    OpenCvError(#[from] opencv::Error),

    #[error("Model Error: {0}")]
    ModelError(#[from] tract_onnx::prelude::TractError),

    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("could not open video source `{0}`")]
    SourceOpen(String),

    #[error("could not open output video `{}` for writing", .0.display())]
    OutputOpen(PathBuf),

    #[error("unexpected model output shape {0:?}")]
    ModelOutputShape(Vec<usize>),
}
