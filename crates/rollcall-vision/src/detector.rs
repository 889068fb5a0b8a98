//! UltraFace face detector via ONNX Runtime.
//!
//! Runs the version-RFB-320 UltraFace model: one forward pass yields
//! per-anchor confidence scores `[1, N, 2]` and corner-form boxes
//! `[1, N, 4]` normalized to [0, 1] over the input. Post-processing is a
//! score filter followed by NMS.

use crate::VisionError;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::types::{FaceBox, Frame};
use std::path::Path;

const ULTRAFACE_INPUT_WIDTH: u32 = 320;
const ULTRAFACE_INPUT_HEIGHT: u32 = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_SCORE_THRESHOLD: f32 = 0.7;
const ULTRAFACE_IOU_THRESHOLD: f32 = 0.3;

/// One raw detection before embedding extraction.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Bounds in the coordinate space of the analyzed frame.
    pub bounds: FaceBox,
    pub score: f32,
}

/// UltraFace-based face detector.
pub struct FaceDetector {
    session: Session,
}

impl FaceDetector {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, VisionError> {
        if !Path::new(model_path).exists() {
            return Err(VisionError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded UltraFace model"
        );

        Ok(Self { session })
    }

    /// Detect faces in a grayscale frame, strongest first.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, VisionError> {
        let input = preprocess(frame)?;

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::InferenceFailed(format!("boxes: {e}")))?;

        let candidates = decode(
            scores,
            boxes,
            frame.width,
            frame.height,
            ULTRAFACE_SCORE_THRESHOLD,
        );
        Ok(nms(candidates, ULTRAFACE_IOU_THRESHOLD))
    }
}

/// Resize to the fixed 320x240 input and normalize into a NCHW tensor,
/// replicating the grayscale channel into all three inputs.
fn preprocess(frame: &Frame) -> Result<Array4<f32>, VisionError> {
    let Some(img) = image::GrayImage::from_raw(frame.width, frame.height, frame.data.clone())
    else {
        return Err(VisionError::InferenceFailed(format!(
            "frame buffer length {} does not match {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    };
    let resized = image::imageops::resize(
        &img,
        ULTRAFACE_INPUT_WIDTH,
        ULTRAFACE_INPUT_HEIGHT,
        image::imageops::FilterType::Triangle,
    );

    let w = ULTRAFACE_INPUT_WIDTH as usize;
    let h = ULTRAFACE_INPUT_HEIGHT as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
    for (y, row) in resized.rows().enumerate() {
        for (x, pixel) in row.enumerate() {
            let normalized = (pixel.0[0] as f32 - ULTRAFACE_MEAN) / ULTRAFACE_STD;
            tensor[[0, 0, y, x]] = normalized;
            tensor[[0, 1, y, x]] = normalized;
            tensor[[0, 2, y, x]] = normalized;
        }
    }
    Ok(tensor)
}

/// Map the model's normalized corner-form boxes onto frame coordinates,
/// keeping only candidates above the score threshold.
///
/// Scores are `[background, face]` pairs per anchor.
fn decode(
    scores: &[f32],
    boxes: &[f32],
    frame_width: u32,
    frame_height: u32,
    threshold: f32,
) -> Vec<Detection> {
    let anchors = scores.len() / 2;
    let w = frame_width as f32;
    let h = frame_height as f32;

    let mut detections = Vec::new();
    for idx in 0..anchors {
        let score = scores[idx * 2 + 1];
        if score <= threshold {
            continue;
        }
        let off = idx * 4;
        if off + 3 >= boxes.len() {
            break;
        }
        detections.push(Detection {
            bounds: FaceBox {
                top: boxes[off + 1] * h,
                right: boxes[off + 2] * w,
                bottom: boxes[off + 3] * h,
                left: boxes[off] * w,
            },
            score,
        });
    }
    detections
}

/// Non-maximum suppression: strongest detection wins, overlaps drop.
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for det in detections {
        if kept
            .iter()
            .all(|k| iou(&k.bounds, &det.bounds) <= iou_threshold)
        {
            kept.push(det);
        }
    }
    kept
}

/// Intersection-over-union of two boxes.
fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let inter_w = (a.right.min(b.right) - a.left.max(b.left)).max(0.0);
    let inter_h = (a.bottom.min(b.bottom) - a.top.max(b.top)).max(0.0);
    let inter = inter_w * inter_h;

    let union = a.width() * a.height() + b.width() * b.height() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
