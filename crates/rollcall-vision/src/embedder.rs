//! Face embedding extraction via ONNX Runtime.
//!
//! Crops the detected face with a margin, resizes to the canonical 112x112
//! input, and runs a MobileFaceNet-style model producing a 128-dimensional
//! L2-normalized embedding.

use crate::VisionError;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::types::{Embedding, FaceBox, Frame};
use std::path::Path;

const EMBED_INPUT_SIZE: u32 = 112;
const EMBED_MEAN: f32 = 127.5;
const EMBED_STD: f32 = 128.0;
const EMBED_DIM: usize = 128;
/// Fraction of box width/height added on each side before cropping; the
/// detector's boxes hug the face tighter than the embedding model expects.
const CROP_MARGIN: f32 = 0.2;

/// MobileFaceNet-style face embedder.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the embedding ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, VisionError> {
        if !Path::new(model_path).exists() {
            return Err(VisionError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = model_path, "loaded face embedding model");
        Ok(Self { session })
    }

    /// Extract an embedding for the face at `bounds` in `frame`.
    pub fn embed(&mut self, frame: &Frame, bounds: &FaceBox) -> Result<Embedding, VisionError> {
        let crop = crop_face(frame, bounds)?;
        let input = preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::InferenceFailed(format!("embedding: {e}")))?;

        if raw.len() != EMBED_DIM {
            return Err(VisionError::InferenceFailed(format!(
                "expected {EMBED_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::new(l2_normalize(raw.to_vec())))
    }
}

/// Cut the face region (expanded by `CROP_MARGIN`, clamped to the frame)
/// and resize it to the model input size.
fn crop_face(frame: &Frame, bounds: &FaceBox) -> Result<image::GrayImage, VisionError> {
    let margin_x = bounds.width() * CROP_MARGIN;
    let margin_y = bounds.height() * CROP_MARGIN;
    let expanded = FaceBox {
        top: bounds.top - margin_y,
        right: bounds.right + margin_x,
        bottom: bounds.bottom + margin_y,
        left: bounds.left - margin_x,
    }
    .clamped(frame.width, frame.height);

    let x = expanded.left.floor() as u32;
    let y = expanded.top.floor() as u32;
    let w = (expanded.width().ceil() as u32).min(frame.width.saturating_sub(x));
    let h = (expanded.height().ceil() as u32).min(frame.height.saturating_sub(y));
    if w == 0 || h == 0 {
        return Err(VisionError::InferenceFailed(format!(
            "degenerate face box {expanded:?}"
        )));
    }

    let Some(img) = image::GrayImage::from_raw(frame.width, frame.height, frame.data.clone())
    else {
        return Err(VisionError::InferenceFailed(format!(
            "frame buffer length {} does not match {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        )));
    };

    let crop = image::imageops::crop_imm(&img, x, y, w, h).to_image();
    Ok(image::imageops::resize(
        &crop,
        EMBED_INPUT_SIZE,
        EMBED_INPUT_SIZE,
        image::imageops::FilterType::Triangle,
    ))
}

/// Normalize a 112x112 grayscale crop into a NCHW tensor, replicating the
/// channel into all three inputs.
fn preprocess(crop: &image::GrayImage) -> Array4<f32> {
    let size = EMBED_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (y, row) in crop.rows().enumerate() {
        for (x, pixel) in row.enumerate() {
            let normalized = (pixel.0[0] as f32 - EMBED_MEAN) / EMBED_STD;
            tensor[[0, 0, y, x]] = normalized;
            tensor[[0, 1, y, x]] = normalized;
            tensor[[0, 2, y, x]] = normalized;
        }
    }
    tensor
}

fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let data = (0..width * height).map(|i| (i % 251) as u8).collect();
        Frame { data, width, height }
    }

    #[test]
    fn crop_face_yields_model_input_size() {
        let frame = gradient_frame(640, 480);
        let bounds = FaceBox { top: 100.0, right: 300.0, bottom: 300.0, left: 100.0 };
        let crop = crop_face(&frame, &bounds).unwrap();
        assert_eq!(crop.dimensions(), (EMBED_INPUT_SIZE, EMBED_INPUT_SIZE));
    }

    #[test]
    fn crop_face_clamps_boxes_hanging_off_the_frame() {
        let frame = gradient_frame(640, 480);
        let bounds = FaceBox { top: -50.0, right: 700.0, bottom: 200.0, left: 500.0 };
        let crop = crop_face(&frame, &bounds).unwrap();
        assert_eq!(crop.dimensions(), (EMBED_INPUT_SIZE, EMBED_INPUT_SIZE));
    }

    #[test]
    fn crop_face_rejects_degenerate_boxes() {
        let frame = gradient_frame(640, 480);
        let bounds = FaceBox { top: 100.0, right: 100.0, bottom: 100.0, left: 100.0 };
        assert!(crop_face(&frame, &bounds).is_err());
    }

    #[test]
    fn l2_normalize_unit_length() {
        let normalized = l2_normalize(vec![3.0, 4.0]);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_zero_vector_is_untouched() {
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn preprocess_replicates_channels() {
        let crop = image::GrayImage::from_pixel(EMBED_INPUT_SIZE, EMBED_INPUT_SIZE, image::Luma([200]));
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
        let expected = (200.0 - EMBED_MEAN) / EMBED_STD;
        for c in 0..3 {
            assert!((tensor[[0, c, 50, 50]] - expected).abs() < 1e-6);
        }
    }
}
