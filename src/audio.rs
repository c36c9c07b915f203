//! Asking the host to stop whatever is playing.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::AudioError;

pub const DEFAULT_INTERRUPT_COMMAND: &str = "playerctl pause";

/// Requests that ambient playback stop. Fire-and-forget: success means the
/// request was issued, not that audio actually stopped.
pub trait AudioInterrupt: Send + Sync {
    fn request_interrupt(&self) -> Result<(), AudioError>;
}

/// Runs an external command (e.g. `playerctl pause`) without waiting for it.
///
/// Must be called from within a tokio runtime; the child is reaped by a
/// background task that logs its exit status.
#[derive(Debug, Clone)]
pub struct CommandAudioInterrupt {
    program: String,
    args: Vec<String>,
}

impl CommandAudioInterrupt {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line. `None` when blank.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl AudioInterrupt for CommandAudioInterrupt {
    fn request_interrupt(&self) -> Result<(), AudioError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| AudioError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        debug!(program = %self.program, pid = ?child.id(), "Audio interrupt command spawned");

        let program = self.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => warn!(%program, %status, "Audio interrupt command failed"),
                Err(e) => warn!(%program, error = %e, "Audio interrupt command could not be awaited"),
            }
        });
        Ok(())
    }
}

/// Used when no interrupt command is configured: only records the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAudioInterrupt;

impl AudioInterrupt for LogAudioInterrupt {
    fn request_interrupt(&self) -> Result<(), AudioError> {
        info!("Audio interrupt requested (no command configured)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_line() {
        let cmd = CommandAudioInterrupt::from_command_line("playerctl  --all-players pause").unwrap();
        assert_eq!(cmd.program(), "playerctl");
        assert_eq!(cmd.args(), ["--all-players", "pause"]);
    }

    #[test]
    fn blank_command_line_is_none() {
        assert!(CommandAudioInterrupt::from_command_line("").is_none());
        assert!(CommandAudioInterrupt::from_command_line("   ").is_none());
    }

    #[tokio::test]
    async fn spawns_command() {
        let cmd = CommandAudioInterrupt::new("true", Vec::new());
        cmd.request_interrupt().unwrap();
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let cmd = CommandAudioInterrupt::new("drift-off-no-such-program", Vec::new());
        assert!(matches!(
            cmd.request_interrupt(),
            Err(AudioError::Spawn { .. })
        ));
    }

    #[test]
    fn log_interrupt_always_succeeds() {
        LogAudioInterrupt.request_interrupt().unwrap();
    }
}
