//! rollcall-vision — ONNX-backed face detection and embedding extraction.
//!
//! Implements the core's `FaceAnalyzer` capability with two models running
//! via ONNX Runtime on CPU: the UltraFace RFB-320 detector and a
//! MobileFaceNet-style 128-d embedder.

pub mod detector;
pub mod embedder;

use detector::FaceDetector;
use embedder::FaceEmbedder;
use rollcall_core::types::{AnalyzeError, DetectedFace, FaceAnalyzer, Frame};
use thiserror::Error;

/// Expected detector model filename under the model directory.
pub const DETECTOR_MODEL_FILE: &str = "version-RFB-320.onnx";

/// Expected embedder model filename under the model directory.
pub const EMBEDDER_MODEL_FILE: &str = "mobilefacenet.onnx";

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("model file not found: {0} — download from the ONNX model zoo and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Detector + embedder pipeline: one embedding per detected face.
pub struct OnnxFaceAnalyzer {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl OnnxFaceAnalyzer {
    /// Load both models, failing fast if either file is missing.
    pub fn load(detector_path: &str, embedder_path: &str) -> Result<Self, VisionError> {
        let detector = FaceDetector::load(detector_path)?;
        let embedder = FaceEmbedder::load(embedder_path)?;
        Ok(Self { detector, embedder })
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, AnalyzeError> {
        let detections = self
            .detector
            .detect(frame)
            .map_err(|e| AnalyzeError::Inference(e.to_string()))?;

        let mut faces = Vec::with_capacity(detections.len());
        for det in detections {
            let embedding = self
                .embedder
                .embed(frame, &det.bounds)
                .map_err(|e| AnalyzeError::Inference(e.to_string()))?;
            faces.push(DetectedFace {
                bounds: det.bounds,
                embedding,
            });
        }
        Ok(faces)
    }
}
