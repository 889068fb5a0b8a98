//! rollcall-core — sampled face recognition and attendance marking.
//!
//! The pipeline: a [`FaceRegistry`] of known identities is built once per
//! activation, a [`FrameSampler`] decimates the incoming frame stream and
//! caches results for held-over frames, a [`NearestMatcher`] maps each
//! detected embedding to an identity or Unknown, and an
//! [`AttendanceSession`] marks each identity present at most once.
//!
//! Detection and embedding extraction are consumed through the
//! [`FaceAnalyzer`](types::FaceAnalyzer) trait; see `rollcall-vision` for
//! the ONNX-backed implementation.

pub mod matcher;
pub mod registry;
pub mod sampler;
pub mod session;
pub mod types;

pub use matcher::{MatchDecision, NearestMatcher, DEFAULT_MATCH_THRESHOLD};
pub use registry::{FaceRegistry, KnownIdentity, RegistryError};
pub use sampler::{FrameSampler, Tick, DEFAULT_DOWNSCALE, DEFAULT_SAMPLE_INTERVAL};
pub use session::AttendanceSession;
pub use types::{AnalyzeError, DetectedFace, Embedding, FaceAnalyzer, FaceBox, Frame, MatchedFace};
