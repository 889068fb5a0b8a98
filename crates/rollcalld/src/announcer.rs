//! Fire-and-forget spoken announcements via a text-to-speech subprocess.

use tokio::process::Command;

pub struct Announcer {
    /// Program to spawn; `None` when announcements are disabled.
    command: Option<String>,
}

impl Announcer {
    pub fn new(command: &str, enabled: bool) -> Self {
        let command = (enabled && !command.is_empty()).then(|| command.to_string());
        if command.is_none() {
            tracing::info!("announcements disabled");
        }
        Self { command }
    }

    /// Speak the attendance greeting for `name`.
    ///
    /// Never blocks beyond process spawn; spawn failures are logged and
    /// dropped. Must be called from within a tokio runtime.
    pub fn announce(&self, name: &str) {
        let Some(program) = &self.command else {
            return;
        };
        let message = format!("Hello {name}, your attendance is marked");
        match Command::new(program).arg(&message).spawn() {
            Ok(mut child) => {
                // Reap the child without waiting on it here.
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
            }
            Err(err) => {
                tracing::warn!(program = %program, error = %err, "announcement failed to spawn");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_announcer_is_a_noop() {
        // No runtime needed: a disabled announcer returns before spawning.
        Announcer::new("espeak", false).announce("alice");
        Announcer::new("", true).announce("alice");
    }

    #[tokio::test]
    async fn missing_program_does_not_panic() {
        Announcer::new("/nonexistent/tts-program", true).announce("alice");
    }
}
