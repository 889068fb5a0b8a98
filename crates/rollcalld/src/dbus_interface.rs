//! D-Bus interface for the Rollcall attendance daemon.
//!
//! Bus name: org.rollcall.Attendance1
//! Object path: /org/rollcall/Attendance1

use crate::announcer::Announcer;
use crate::config::Config;
use crate::engine::{self, SessionHandle};
use rollcall_store::AttendanceStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use zbus::interface;

/// Capacity of the per-session side-effect channel. The loop only ever
/// enqueues; the recorder task drains.
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct AttendanceService {
    config: Config,
    store: AttendanceStore,
    announcer: Arc<Announcer>,
    active: Mutex<Option<SessionHandle>>,
}

impl AttendanceService {
    pub fn new(config: Config, store: AttendanceStore, announcer: Announcer) -> Self {
        Self {
            config,
            store,
            announcer: Arc::new(announcer),
            active: Mutex::new(None),
        }
    }
}

#[interface(name = "org.rollcall.Attendance1")]
impl AttendanceService {
    /// Build the face registry and start a recognition session.
    /// Returns the session id.
    async fn start_session(&self) -> zbus::fdo::Result<String> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|h| h.is_running()) {
            return Err(zbus::fdo::Error::Failed(
                "a session is already running".into(),
            ));
        }

        let (events_tx, mut events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let store = self.store.clone();
        let announcer = self.announcer.clone();
        tokio::spawn(async move {
            while let Some(record) = events_rx.recv().await {
                if let Err(err) = store.append(&record).await {
                    tracing::error!(
                        error = %err,
                        name = %record.name,
                        "failed to persist attendance record"
                    );
                }
                announcer.announce(&record.name);
            }
        });

        // Camera open, model load, and registry build all block.
        let config = self.config.clone();
        let handle = tokio::task::spawn_blocking(move || engine::spawn_session(&config, events_tx))
            .await
            .map_err(|e| zbus::fdo::Error::Failed(format!("engine startup panicked: {e}")))?
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;

        let id = handle.status().session_id;
        *active = Some(handle);
        Ok(id)
    }

    /// Stop the running session. Returns false if none was running.
    async fn stop_session(&self) -> zbus::fdo::Result<bool> {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(handle) => {
                handle.stop();
                tracing::info!("session stop requested");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Daemon and session state as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let active = self.active.lock().await;
        let session = active.as_ref().map(|h| h.status());
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "session": session,
        })
        .to_string())
    }

    /// All attendance records as a JSON array.
    async fn records(&self) -> zbus::fdo::Result<String> {
        let records = self
            .store
            .records()
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        serde_json::to_string(&records).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Export all attendance records to a CSV file. Returns the row count.
    async fn export_csv(&self, path: &str) -> zbus::fdo::Result<u32> {
        let rows = self
            .store
            .export_csv(Path::new(path))
            .await
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok(rows as u32)
    }

    /// Capture one frame and save it as the registration image for `name`.
    /// Returns the saved path.
    async fn enroll(&self, name: &str) -> zbus::fdo::Result<String> {
        validate_name(name).map_err(zbus::fdo::Error::InvalidArgs)?;

        let active = self.active.lock().await;
        if active.as_ref().is_some_and(|h| h.is_running()) {
            return Err(zbus::fdo::Error::Failed(
                "stop the running session before enrolling".into(),
            ));
        }
        drop(active);

        let config = self.config.clone();
        let name = name.to_string();
        let path =
            tokio::task::spawn_blocking(move || engine::capture_registration_image(&config, &name))
                .await
                .map_err(|e| zbus::fdo::Error::Failed(format!("enrollment panicked: {e}")))?
                .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok(path.display().to_string())
    }

    /// Remove the registration image(s) for `name`. Returns false when
    /// nothing was registered under that name.
    async fn remove_face(&self, name: &str) -> zbus::fdo::Result<bool> {
        validate_name(name).map_err(zbus::fdo::Error::InvalidArgs)?;
        remove_face_files(&self.config.storage.faces_dir, name)
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    /// Names with a registration image on disk.
    async fn roster(&self) -> zbus::fdo::Result<Vec<String>> {
        rollcall_core::registry::roster(&self.config.storage.faces_dir)
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }
}

/// Identity names become filenames; keep them out of parent directories.
fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name must not be empty".into());
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err("name must not contain path separators".into());
    }
    Ok(())
}

fn remove_face_files(faces_dir: &Path, name: &str) -> std::io::Result<bool> {
    let mut removed = false;
    for ext in ["png", "jpg", "jpeg"] {
        let path: PathBuf = faces_dir.join(format!("{name}.{ext}"));
        if path.exists() {
            std::fs::remove_file(&path)?;
            tracing::info!(path = %path.display(), "removed registration image");
            removed = true;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_with_separators_are_rejected() {
        assert!(validate_name("alice").is_ok());
        assert!(validate_name("mary-jane.w").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
        assert!(validate_name("../etc/passwd").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
    }

    #[test]
    fn remove_face_files_deletes_all_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alice.png"), b"x").unwrap();
        std::fs::write(dir.path().join("alice.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("bob.png"), b"x").unwrap();

        assert!(remove_face_files(dir.path(), "alice").unwrap());
        assert!(!dir.path().join("alice.png").exists());
        assert!(!dir.path().join("alice.jpg").exists());
        assert!(dir.path().join("bob.png").exists());
    }

    #[test]
    fn remove_face_files_reports_missing_names() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!remove_face_files(dir.path(), "nobody").unwrap());
    }
}
