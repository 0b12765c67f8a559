use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::names::parse_class_list;

/// Video origin: a webcam index or a file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Webcam(i32),
    File(PathBuf),
}

impl Source {
    /// `"0"` becomes webcam 0, anything that is not an integer is a path.
    pub fn parse(input: &str) -> Self {
        match input.trim().parse::<i32>() {
            Ok(index) => Source::Webcam(index),
            Err(_) => Source::File(PathBuf::from(input)),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Webcam(index) => write!(f, "{}", index),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Device {
    Cpu,
    Cuda,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Real-Time Object Tracker & Video Annotator")]
pub struct Args {
    /// Input source: webcam index (e.g. 0) or path to a video file.
    #[arg(short, long, default_value = "0", env = "QANNOTATE_INPUT")]
    pub input: String,

    /// Output video file (mp4). Written for both webcam and file input.
    #[arg(
        short,
        long,
        default_value = "annotated_output.mp4",
        env = "QANNOTATE_OUTPUT"
    )]
    pub output: PathBuf,

    /// YOLO detector exported to ONNX.
    #[arg(short, long, default_value = "yolo11n.onnx", env = "QANNOTATE_MODEL")]
    pub model: PathBuf,

    /// Confidence threshold.
    #[arg(long, default_value_t = 0.35, value_parser = parse_unit_interval, env = "QANNOTATE_CONF")]
    pub conf: f32,

    /// Comma-separated list of class names to keep. Empty keeps every class.
    #[arg(long, default_value = "person,dog,cat", env = "QANNOTATE_CLASSES")]
    pub classes: String,

    /// Inference device. Unset lets the backend decide.
    #[arg(long, value_enum, env = "QANNOTATE_DEVICE")]
    pub device: Option<Device>,

    /// Do not open a display window (useful for servers).
    #[arg(long, env = "QANNOTATE_NO_DISPLAY")]
    pub no_display: bool,

    /// Annotate every N+1th frame, passing the others through (0 = every frame).
    #[arg(long, default_value_t = 0, env = "QANNOTATE_FRAME_SKIP")]
    pub frame_skip: u32,

    /// IoU threshold for non-maximum suppression.
    #[arg(long, default_value_t = 0.45, value_parser = parse_unit_interval, env = "QANNOTATE_IOU")]
    pub iou: f32,

    /// Square model input size in pixels.
    #[arg(long, default_value_t = 640, value_parser = parse_imgsz, env = "QANNOTATE_IMGSZ")]
    pub imgsz: u32,

    /// Class names, one per line. Defaults to the COCO-80 table.
    #[arg(long, env = "QANNOTATE_NAMES")]
    pub names: Option<PathBuf>,
}

pub fn parse_unit_interval(s: &str) -> Result<f32, String> {
    let v: f32 = s.parse().map_err(|e| format!("`{}` is not a number: {}", s, e))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("`{}` is not within [0, 1]", s))
    }
}

pub fn parse_imgsz(s: &str) -> Result<u32, String> {
    let v: u32 = s.parse().map_err(|e| format!("`{}` is not a size: {}", s, e))?;
    if v > 0 && v % 32 == 0 {
        Ok(v)
    } else {
        Err(format!("`{}` must be a positive multiple of 32", s))
    }
}

/// Run configuration, fixed for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: Source,
    pub output: PathBuf,
    pub model: PathBuf,
    pub confidence: f32,
    pub iou: f32,
    pub imgsz: u32,
    pub classes: BTreeSet<String>,
    pub device: Option<Device>,
    pub display: bool,
    pub frame_skip: u32,
    pub names: Option<PathBuf>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            source: Source::parse(&args.input),
            output: args.output,
            model: args.model,
            confidence: args.conf,
            iou: args.iou,
            imgsz: args.imgsz,
            classes: parse_class_list(&args.classes),
            device: args.device,
            display: !args.no_display,
            frame_skip: args.frame_skip,
            names: args.names,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: Source::Webcam(0),
            output: PathBuf::from("annotated_output.mp4"),
            model: PathBuf::from("yolo11n.onnx"),
            confidence: 0.35,
            iou: 0.45,
            imgsz: 640,
            classes: parse_class_list("person,dog,cat"),
            device: None,
            display: true,
            frame_skip: 0,
            names: None,
        }
    }
}
