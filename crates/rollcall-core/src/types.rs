use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A grayscale frame, either captured from the camera or decoded from a
/// registration image.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes, row-major).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    pub fn from_luma(img: image::GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
        }
    }

    /// Downscale by `factor` (0 < factor <= 1) using triangle filtering.
    pub fn downscale(&self, factor: f32) -> Frame {
        let factor = factor.clamp(f32::MIN_POSITIVE, 1.0);
        let new_w = ((self.width as f32 * factor).round() as u32).max(1);
        let new_h = ((self.height as f32 * factor).round() as u32).max(1);
        if new_w == self.width && new_h == self.height {
            return self.clone();
        }

        let Some(img) =
            image::GrayImage::from_raw(self.width, self.height, self.data.clone())
        else {
            // Buffer length disagrees with the dimensions; pass through.
            return self.clone();
        };
        let small = image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Triangle);
        Frame::from_luma(small)
    }
}

/// Face location as (top, right, bottom, left) edges, in the coordinate
/// space of the frame the detection ran on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl FaceBox {
    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    /// Multiply all four edges by `factor`.
    pub fn scaled(&self, factor: f32) -> FaceBox {
        FaceBox {
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
            left: self.left * factor,
        }
    }

    /// Clamp all edges into a `width` x `height` frame.
    pub fn clamped(&self, width: u32, height: u32) -> FaceBox {
        let w = width as f32;
        let h = height as f32;
        FaceBox {
            top: self.top.clamp(0.0, h),
            right: self.right.clamp(0.0, w),
            bottom: self.bottom.clamp(0.0, h),
            left: self.left.clamp(0.0, w),
        }
    }
}

/// Face embedding vector (128-dimensional for the bundled embedder).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance between two embeddings. Lower = more similar.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One face found in a frame by the analyzer, discarded after matching.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bounds: FaceBox,
    pub embedding: Embedding,
}

/// One matched face as held in the result cache. `name: None` means the
/// face did not match any known identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedFace {
    pub bounds: FaceBox,
    pub name: Option<String>,
    pub distance: f32,
}

impl MatchedFace {
    /// Display label: the identity name, or "Unknown".
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown")
    }
}

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Detection + embedding extraction, consumed as an opaque capability:
/// zero or more fixed-length vectors per frame.
pub trait FaceAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, AnalyzeError>;
}
