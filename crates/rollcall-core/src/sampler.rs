//! Frame decimation and the held-over result cache.
//!
//! Detection and matching run on every Nth frame only; intermediate frames
//! reuse the previously published results so the overlay stays stable
//! between sampled ticks.

use crate::types::{Frame, MatchedFace};

/// Run detection/matching on every Nth frame.
pub const DEFAULT_SAMPLE_INTERVAL: u32 = 5;

/// Downscale factor applied to a frame before detection.
pub const DEFAULT_DOWNSCALE: f32 = 0.25;

/// Whether a frame runs full detection or reuses the cached results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Sample,
    HoldOver,
}

/// Owns the frame counter and the last published match results.
#[derive(Debug)]
pub struct FrameSampler {
    interval: u64,
    downscale: f32,
    frames_seen: u64,
    cache: Vec<MatchedFace>,
}

impl FrameSampler {
    pub fn new(interval: u32, downscale: f32) -> Self {
        Self {
            interval: interval.max(1) as u64,
            downscale: downscale.clamp(f32::MIN_POSITIVE, 1.0),
            frames_seen: 0,
            cache: Vec::new(),
        }
    }

    /// Count a new frame and classify it.
    pub fn advance(&mut self) -> Tick {
        self.frames_seen += 1;
        if self.frames_seen % self.interval == 0 {
            Tick::Sample
        } else {
            Tick::HoldOver
        }
    }

    /// Downscale a full-resolution frame for detection.
    pub fn shrink(&self, frame: &Frame) -> Frame {
        frame.downscale(self.downscale)
    }

    /// Replace the cache with a sampled tick's results.
    ///
    /// Boxes arrive in detection-scale coordinates and are corrected to
    /// full resolution here, exactly once; held-over reads never rescale.
    pub fn publish(&mut self, results: Vec<MatchedFace>) {
        let upscale = 1.0 / self.downscale;
        self.cache = results
            .into_iter()
            .map(|mut m| {
                m.bounds = m.bounds.scaled(upscale);
                m
            })
            .collect();
    }

    /// Current overlay data, in full-resolution coordinates.
    pub fn overlay(&self) -> &[MatchedFace] {
        &self.cache
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn downscale_factor(&self) -> f32 {
        self.downscale
    }
}
