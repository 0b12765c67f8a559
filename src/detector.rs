use std::path::Path;

use anyhow::Context;
use ndarray::{Array3, Axis};
use opencv::{
    core::{self, Mat},
    dnn, imgproc,
    prelude::*,
};
use tract_onnx::prelude::*;

use crate::bbox::BBox;
use crate::config::Device;
use crate::detection::Detection;
use crate::error::Error;
use crate::Detect;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

const LETTERBOX_FILL: f64 = 114.0;

pub struct YoloDetectorConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
    pub max_detections: usize,
}

impl YoloDetectorConfig {
    pub fn new(confidence_threshold: f32, iou_threshold: f32, input_size: u32) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            input_size,
            max_detections: 300,
        }
    }
}

/// Mapping between frame pixels and the padded square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub new_w: i32,
    pub new_h: i32,
    pub pad_left: i32,
    pub pad_top: i32,
    pub input_size: i32,
}

impl Letterbox {
    pub fn new(frame_width: i32, frame_height: i32, input_size: u32) -> Self {
        let input_size = input_size as i32;
        let scale = (input_size as f32 / frame_width as f32)
            .min(input_size as f32 / frame_height as f32);

        let new_w = ((frame_width as f32 * scale).round() as i32).clamp(1, input_size);
        let new_h = ((frame_height as f32 * scale).round() as i32).clamp(1, input_size);

        Self {
            scale,
            new_w,
            new_h,
            pad_left: (input_size - new_w) / 2,
            pad_top: (input_size - new_h) / 2,
            input_size,
        }
    }

    #[inline]
    pub fn pad_right(&self) -> i32 {
        self.input_size - self.new_w - self.pad_left
    }

    #[inline]
    pub fn pad_bottom(&self) -> i32 {
        self.input_size - self.new_h - self.pad_top
    }

    /// Model input coordinates back to frame coordinates.
    #[inline]
    pub fn unmap(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_left as f32) / self.scale,
            (y - self.pad_top as f32) / self.scale,
        )
    }
}

pub struct YoloDetector {
    model: Plan,
    config: YoloDetectorConfig,
}

impl YoloDetector {
    pub fn new<P: AsRef<Path>>(
        model_src: P,
        config: YoloDetectorConfig,
        device: Option<Device>,
    ) -> Result<Self, Error> {
        let model_src = model_src.as_ref();

        match device {
            Some(Device::Cuda) => {
                log::warn!("CUDA requested but the ONNX backend is CPU-only, running on CPU")
            }
            Some(Device::Cpu) | None => log::debug!("running inference on CPU"),
        }

        let size = config.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_src)
            .with_context(|| format!("failed to load ONNX model from {}", model_src.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!("loaded model {} ({}x{} input)", model_src.display(), size, size);

        Ok(Self { model, config })
    }

    fn preprocess(&self, frame: &Mat) -> Result<(Tensor, Letterbox), Error> {
        let lb = Letterbox::new(frame.cols(), frame.rows(), self.config.input_size);

        let mut resized = Mat::default();
        imgproc::resize(
            frame,
            &mut resized,
            core::Size::new(lb.new_w, lb.new_h),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut padded = Mat::default();
        core::copy_make_border(
            &resized,
            &mut padded,
            lb.pad_top,
            lb.pad_bottom(),
            lb.pad_left,
            lb.pad_right(),
            core::BORDER_CONSTANT,
            core::Scalar::all(LETTERBOX_FILL),
        )?;

        // BGR -> RGB, [0, 255] -> [0, 1], HWC -> NCHW
        let blob = dnn::blob_from_image(
            &padded,
            1.0 / 255.0,
            core::Size::new(lb.input_size, lb.input_size),
            core::Scalar::all(0.0),
            true,
            false,
            core::CV_32F,
        )?;

        let size = lb.input_size as usize;
        let tensor = Tensor::from_shape(&[1, 3, size, size], blob.data_typed::<f32>()?)?;

        Ok((tensor, lb))
    }

    pub fn detect_frame(&self, frame: &Mat) -> Result<Vec<Detection>, Error> {
        let (input, lb) = self.preprocess(frame)?;
        let mut outputs = self.model.run(tvec!(input.into()))?;
        if outputs.is_empty() {
            return Err(Error::ModelOutputShape(vec![]));
        }

        let output = outputs.remove(0);
        let view = output.to_array_view::<f32>()?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 {
            return Err(Error::ModelOutputShape(shape));
        }

        let preds = Array3::from_shape_vec(
            (shape[0], shape[1], shape[2]),
            view.iter().copied().collect(),
        )
        .map_err(|_| Error::ModelOutputShape(shape.clone()))?;

        let mut batches = self.postprocess(preds, &lb, frame.cols(), frame.rows())?;

        Ok(batches.pop().unwrap_or_default())
    }

    #[inline]
    pub fn postprocess(
        &self,
        preds: Array3<f32>,
        lb: &Letterbox,
        frame_width: i32,
        frame_height: i32,
    ) -> Result<Vec<Vec<Detection>>, Error> {
        decode(&self.config, preds, lb, frame_width, frame_height)
    }
}

/// Decodes raw predictions into per-image detections.
///
/// Accepts both `[batch, 4 + nc, anchors]` (the YOLOv8/YOLO11 export layout)
/// and `[batch, anchors, 4 + nc]`. Boxes are center-xywh in model input pixels.
pub fn decode(
    config: &YoloDetectorConfig,
    preds: Array3<f32>,
    lb: &Letterbox,
    frame_width: i32,
    frame_height: i32,
) -> Result<Vec<Vec<Detection>>, Error> {
    let preds = if preds.shape()[1] < preds.shape()[2] {
        preds.permuted_axes([0, 2, 1])
    } else {
        preds
    };

    let shape = preds.shape();
    let nbatches = shape[0];
    let pred_size = shape[2];
    if pred_size <= 4 {
        return Err(Error::ModelOutputShape(shape.to_vec()));
    }

    let nclasses = pred_size - 4;
    let mut results: Vec<Vec<Detection>> = (0..nbatches).map(|_| vec![]).collect();

    for (batch, results) in results.iter_mut().enumerate() {
        // The bounding boxes grouped by (maximum) class index.
        let mut bboxes: Vec<Vec<Detection>> = (0..nclasses).map(|_| vec![]).collect();

        for pred in preds.index_axis(Axis(0), batch).outer_iter() {
            let mut class_index = -1;
            let mut confidence = 0.0;

            for (idx, val) in pred.iter().skip(4).copied().enumerate() {
                if val > confidence {
                    class_index = idx as i32;
                    confidence = val;
                }
            }

            if class_index < 0 || confidence <= config.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (pred[0], pred[1], pred[2], pred[3]);
            let (left, top) = lb.unmap(cx - w / 2.0, cy - h / 2.0);
            let (right, bottom) = lb.unmap(cx + w / 2.0, cy + h / 2.0);

            let bbox = BBox::ltrb(left, top, right, bottom)
                .clip(frame_width as f32, frame_height as f32);
            if bbox.area() <= 0.0 {
                continue;
            }

            bboxes[class_index as usize].push(Detection::from_ltrb(
                bbox,
                confidence,
                class_index,
            ));
        }

        for mut dets in bboxes.into_iter() {
            if dets.is_empty() {
                continue;
            }

            if dets.len() == 1 {
                results.append(&mut dets);
                continue;
            }

            let indices = non_maximum_supression(&mut dets, config.iou_threshold);

            results.extend(
                dets.drain(..)
                    .enumerate()
                    .filter_map(|(idx, item)| indices.contains(&idx).then_some(item)),
            );
        }

        results.sort_unstable_by(|a, b| b.confidence.total_cmp(&a.confidence));
        results.truncate(config.max_detections);
    }

    Ok(results)
}

impl Detect for YoloDetector {
    fn detect(&mut self, frame: &Mat) -> Result<Vec<Detection>, Error> {
        self.detect_frame(frame)
    }
}

/// Sorts `dets` by confidence and returns the indices that survive suppression.
pub fn non_maximum_supression(dets: &mut [Detection], iou_threshold: f32) -> Vec<usize> {
    dets.sort_unstable_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut suppressed = vec![false; dets.len()];
    for idx in 0..dets.len() {
        if suppressed[idx] {
            continue;
        }

        for other in idx + 1..dets.len() {
            if !suppressed[other] && dets[idx].iou(&dets[other]) > iou_threshold {
                suppressed[other] = true;
            }
        }
    }

    (0..dets.len()).filter(|&i| !suppressed[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, confidence: f32) -> Detection {
        Detection {
            x,
            y: 50.0,
            w: 20.0,
            h: 20.0,
            confidence,
            class: 0,
        }
    }

    fn run(
        conf: f32,
        preds: Array3<f32>,
        lb: &Letterbox,
        fw: i32,
        fh: i32,
    ) -> Vec<Vec<Detection>> {
        let config = YoloDetectorConfig::new(conf, 0.45, 640);
        decode(&config, preds, lb, fw, fh).unwrap()
    }

    #[test]
    fn letterbox_landscape() {
        let lb = Letterbox::new(1280, 720, 640);
        assert_eq!(lb.scale, 0.5);
        assert_eq!((lb.new_w, lb.new_h), (640, 360));
        assert_eq!((lb.pad_left, lb.pad_top), (0, 140));
        assert_eq!(lb.pad_bottom(), 140);
        assert_eq!(lb.unmap(320.0, 320.0), (640.0, 360.0));
    }

    #[test]
    fn letterbox_odd_padding() {
        let lb = Letterbox::new(100, 61, 64);
        assert_eq!(lb.pad_top + lb.new_h + lb.pad_bottom(), 64);
        assert_eq!(lb.pad_left + lb.new_w + lb.pad_right(), 64);
    }

    #[test]
    fn nms_drops_overlapping() {
        let mut dets = vec![det(50.0, 0.6), det(52.0, 0.9), det(200.0, 0.7)];
        let keep = non_maximum_supression(&mut dets, 0.45);

        let kept: Vec<_> = keep.iter().map(|&i| dets[i].confidence).collect();
        assert_eq!(kept, [0.9, 0.7]);
    }

    #[test]
    fn nms_keeps_disjoint() {
        let mut dets = vec![det(0.0, 0.5), det(100.0, 0.5), det(200.0, 0.5)];
        assert_eq!(non_maximum_supression(&mut dets, 0.45).len(), 3);
    }

    /// Builds a `[1, 4 + nc, n]` tensor from (cx, cy, w, h, class, score) rows,
    /// padded with empty anchors so anchors outnumber channels as in real exports.
    fn yolo_output(nc: usize, rows: &[(f32, f32, f32, f32, usize, f32)]) -> Array3<f32> {
        let anchors = rows.len().max(4 + nc + 1);
        let mut arr = Array3::<f32>::zeros((1, 4 + nc, anchors));
        for (i, &(cx, cy, w, h, class, score)) in rows.iter().enumerate() {
            arr[[0, 0, i]] = cx;
            arr[[0, 1, i]] = cy;
            arr[[0, 2, i]] = w;
            arr[[0, 3, i]] = h;
            arr[[0, 4 + class, i]] = score;
        }
        arr
    }

    #[test]
    fn decodes_channel_first_layout() {
        let lb = Letterbox::new(640, 640, 640);
        let preds = yolo_output(
            3,
            &[
                (100.0, 100.0, 40.0, 20.0, 2, 0.8),
                (300.0, 300.0, 40.0, 40.0, 1, 0.1),
            ],
        );

        let out = run(0.35, preds, &lb, 640, 640);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 1);

        let d = out[0][0];
        assert_eq!(d.class, 2);
        assert_eq!((d.x, d.y, d.w, d.h), (100.0, 100.0, 40.0, 20.0));
    }

    #[test]
    fn decodes_anchor_first_layout() {
        let lb = Letterbox::new(640, 640, 640);
        let preds = yolo_output(2, &[(100.0, 100.0, 40.0, 20.0, 1, 0.8)])
            .permuted_axes([0, 2, 1])
            .as_standard_layout()
            .into_owned();

        let out = run(0.35, preds, &lb, 640, 640);
        assert_eq!(out[0].len(), 1);
        assert_eq!(out[0][0].class, 1);
    }

    #[test]
    fn undoes_letterbox_and_clips() {
        // 1280x720 frame: scale 0.5, 140 px of padding on top
        let lb = Letterbox::new(1280, 720, 640);
        let preds = yolo_output(
            1,
            &[
                (320.0, 320.0, 100.0, 100.0, 0, 0.9),
                (630.0, 150.0, 40.0, 40.0, 0, 0.9),
            ],
        );

        let out = run(0.35, preds, &lb, 1280, 720);
        let mut dets = out[0].clone();
        dets.sort_by(|a, b| a.x.total_cmp(&b.x));

        assert_eq!(
            (dets[0].x, dets[0].y, dets[0].w, dets[0].h),
            (640.0, 360.0, 200.0, 200.0)
        );
        // right edge at (650 - 0) / 0.5 = 1300 is clipped to 1280
        assert_eq!(dets[1].xmax(), 1280.0);
        assert_eq!(dets[1].ymin(), 0.0);
    }

    #[test]
    fn classwise_nms() {
        let lb = Letterbox::new(640, 640, 640);
        let preds = yolo_output(
            2,
            &[
                (100.0, 100.0, 40.0, 40.0, 0, 0.9),
                (102.0, 100.0, 40.0, 40.0, 0, 0.8),
                (102.0, 100.0, 40.0, 40.0, 1, 0.7),
            ],
        );

        let out = run(0.35, preds, &lb, 640, 640);
        let found: Vec<_> = out[0].iter().map(|d| (d.class, d.confidence)).collect();
        assert_eq!(found, [(0, 0.9), (1, 0.7)]);
    }

    #[test]
    fn rejects_boxless_output() {
        let lb = Letterbox::new(640, 640, 640);
        let config = YoloDetectorConfig::new(0.35, 0.45, 640);
        let preds = Array3::<f32>::zeros((1, 10, 4));

        assert!(matches!(
            decode(&config, preds, &lb, 640, 640),
            Err(Error::ModelOutputShape(_))
        ));
    }
}
