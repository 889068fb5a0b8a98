//! Session engine — the recognition loop on a dedicated OS thread.
//!
//! Resources are acquired fail-fast before the thread spawns: camera,
//! both ONNX models, and the face registry (an empty registry aborts the
//! start). The loop exclusively owns the sampler's result cache and the
//! session's pending set; side effects and status snapshots leave over
//! channels, so observers never touch loop state.

use crate::config::Config;
use rollcall_core::{
    AttendanceSession, FaceRegistry, FrameSampler, MatchedFace, NearestMatcher, RegistryError,
    Tick,
};
use rollcall_hw::{Camera, CameraError};
use rollcall_store::AttendanceRecord;
use rollcall_vision::{OnnxFaceAnalyzer, VisionError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("vision error: {0}")]
    Vision(#[from] VisionError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("no registered faces — enroll at least one identity first")]
    EmptyRegistry,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Snapshot of loop state, published after every frame.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub started_at: String,
    pub running: bool,
    pub frames_seen: u64,
    pub pending: Vec<String>,
    pub marked: Vec<String>,
    /// Current overlay data, in full-resolution coordinates.
    pub overlay: Vec<MatchedFace>,
}

/// Handle held by the daemon while a session runs.
pub struct SessionHandle {
    stop: Arc<AtomicBool>,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    /// Ask the loop to stop at its next frame boundary.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Latest status snapshot.
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status.borrow().running
    }
}

/// Acquire resources, build the registry, and start the recognition loop.
///
/// Marked identities are sent as [`AttendanceRecord`]s over `events`;
/// the loop never waits on their downstream processing.
pub fn spawn_session(
    config: &Config,
    events: mpsc::Sender<AttendanceRecord>,
) -> Result<SessionHandle, EngineError> {
    let camera = Camera::open(&config.camera.device)?;
    let mut analyzer = OnnxFaceAnalyzer::load(
        &config.models.detector_model_path(),
        &config.models.embedder_model_path(),
    )?;

    let registry = FaceRegistry::build(&config.storage.faces_dir, &mut analyzer)?;
    if registry.is_empty() {
        return Err(EngineError::EmptyRegistry);
    }

    let matcher = NearestMatcher::new(config.matching.threshold);
    let sampler = FrameSampler::new(config.sampling.interval, config.sampling.downscale);
    let session = AttendanceSession::new(registry.names().map(String::from));

    tracing::info!(
        session = %session.id(),
        identities = registry.len(),
        threshold = matcher.threshold(),
        "attendance session starting"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let (status_tx, status_rx) = watch::channel(snapshot(&session, &sampler, true));

    let stop_flag = stop.clone();
    let warmup_frames = config.camera.warmup_frames;
    std::thread::Builder::new()
        .name("rollcall-session".into())
        .spawn(move || {
            run_session(
                camera,
                analyzer,
                registry,
                matcher,
                sampler,
                session,
                warmup_frames,
                events,
                status_tx,
                stop_flag,
            );
        })
        .expect("failed to spawn session thread");

    Ok(SessionHandle {
        stop,
        status: status_rx,
    })
}

#[allow(clippy::too_many_arguments)]
fn run_session(
    camera: Camera,
    mut analyzer: OnnxFaceAnalyzer,
    registry: FaceRegistry,
    matcher: NearestMatcher,
    mut sampler: FrameSampler,
    mut session: AttendanceSession,
    warmup_frames: usize,
    events: mpsc::Sender<AttendanceRecord>,
    status: watch::Sender<SessionStatus>,
    stop: Arc<AtomicBool>,
) {
    let mut stream = match camera.start_stream() {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(error = %err, "failed to start capture stream");
            let _ = status.send(snapshot(&session, &sampler, false));
            return;
        }
    };
    stream.warmup(warmup_frames);

    while !stop.load(Ordering::Relaxed) {
        // The blocking read paces the loop; one frame, one iteration.
        let frame = match stream.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                // Camera loss ends the session like an operator stop.
                tracing::warn!(error = %err, "frame read failed, stopping session");
                break;
            }
        };

        if sampler.advance() == Tick::Sample {
            let small = sampler.shrink(&frame);
            match analyzer.analyze(&small) {
                Ok(faces) => {
                    let mut results = Vec::with_capacity(faces.len());
                    for face in faces {
                        let decision = matcher.identify(&face.embedding, &registry);
                        if let Some(name) = decision.name.as_deref() {
                            if session.observe(name) {
                                let record = AttendanceRecord::now(name);
                                tracing::info!(
                                    name,
                                    distance = decision.distance,
                                    "marked present"
                                );
                                if events.blocking_send(record).is_err() {
                                    tracing::warn!("event channel closed, side effects lost");
                                }
                            }
                        }
                        results.push(MatchedFace {
                            bounds: face.bounds,
                            name: decision.name,
                            distance: decision.distance,
                        });
                    }
                    sampler.publish(results);
                }
                Err(err) => {
                    // Hold the previous overlay; the next sampled tick retries.
                    tracing::warn!(error = %err, "analysis failed on sampled frame");
                }
            }
        }

        let _ = status.send(snapshot(&session, &sampler, true));
    }

    tracing::info!(
        session = %session.id(),
        marked = session.marked().len(),
        pending = session.pending().len(),
        "attendance session ended"
    );
    let _ = status.send(snapshot(&session, &sampler, false));
    // Dropping the stream and camera releases the device on every exit path.
}

fn snapshot(session: &AttendanceSession, sampler: &FrameSampler, running: bool) -> SessionStatus {
    SessionStatus {
        session_id: session.id().to_string(),
        started_at: session.started_at().to_rfc3339(),
        running,
        frames_seen: sampler.frames_seen(),
        pending: session.pending().iter().cloned().collect(),
        marked: session.marked().to_vec(),
        overlay: sampler.overlay().to_vec(),
    }
}

/// Capture a single frame and save it as the registration image for
/// `name`. Used by enrollment; fails if the camera is held by a session.
pub fn capture_registration_image(config: &Config, name: &str) -> Result<PathBuf, EngineError> {
    let camera = Camera::open(&config.camera.device)?;
    let mut stream = camera.start_stream()?;
    stream.warmup(config.camera.warmup_frames);
    let frame = stream.read_frame()?;
    drop(stream);

    std::fs::create_dir_all(&config.storage.faces_dir)?;
    let path = config.storage.faces_dir.join(format!("{name}.png"));

    let img = image::GrayImage::from_raw(frame.width, frame.height, frame.data).ok_or_else(
        || {
            EngineError::Camera(CameraError::CaptureFailed(
                "frame buffer length mismatch".to_string(),
            ))
        },
    )?;
    img.save(&path)?;

    tracing::info!(name, path = %path.display(), "registration image captured");
    Ok(path)
}
