//! Delivery targets for finished recordings.
//!
//! The core only promises the file is complete on disk before `deliver` is
//! called. Retrying, uploading, and cleanup belong to the sink.

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::process::Command;
use std::thread;
use std::time::Duration;

const DELIVER_RETRY_PAUSE: Duration = Duration::from_secs(2);

pub trait Sink: Send {
    /// Hand over a fully written recording.
    fn deliver(&mut self, file_path: &Path, label: &str) -> Result<()>;

    /// Forward a human-readable status notice.
    fn report_status(&mut self, message: &str);

    fn name(&self) -> &'static str {
        "unknown_sink"
    }
}

/// Default sink: records deliveries in the log and nothing else.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl Sink for LogSink {
    fn deliver(&mut self, file_path: &Path, label: &str) -> Result<()> {
        tracing::info!(path = %file_path.display(), label, "recording ready");
        Ok(())
    }

    fn report_status(&mut self, message: &str) {
        tracing::info!(message, "status");
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Runs an external program for each delivery and status notice:
///
/// - `PROGRAM ARGS.. deliver PATH LABEL`
/// - `PROGRAM ARGS.. status MESSAGE`
///
/// A delivery is retried up to `attempts` times while the program exits
/// non-zero or fails to start.
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    attempts: u32,
    retry_pause: Duration,
}

impl CommandSink {
    /// Parse a shell-style command line such as `notify --chat 42`.
    pub fn from_command_line(command_line: &str, attempts: u32) -> Result<Self> {
        let mut words = shell_words::split(command_line)
            .with_context(|| format!("invalid --sink-cmd '{command_line}'"))?;
        if words.is_empty() {
            bail!("--sink-cmd must not be empty");
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
            attempts: attempts.max(1),
            retry_pause: DELIVER_RETRY_PAUSE,
        })
    }

    pub fn with_retry_pause(mut self, pause: Duration) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, extra: &[&str]) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .args(extra)
            .status()
            .with_context(|| format!("failed to run sink command '{}'", self.program))?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("sink command '{}' exited with {status}", self.program))
        }
    }
}

impl Sink for CommandSink {
    fn deliver(&mut self, file_path: &Path, label: &str) -> Result<()> {
        let path = file_path.to_string_lossy();
        let mut last_err = None;
        for attempt in 1..=self.attempts {
            match self.run(&["deliver", &path, label]) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(attempt, attempts = self.attempts, error = %err, "delivery attempt failed");
                    last_err = Some(err);
                    if attempt < self.attempts {
                        thread::sleep(self.retry_pause);
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| anyhow!("delivery never attempted"))
            .context(format!("giving up on '{path}' after {} attempts", self.attempts)))
    }

    fn report_status(&mut self, message: &str) {
        if let Err(err) = self.run(&["status", message]) {
            tracing::warn!(error = %err, "status notice not delivered");
        }
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_sink_splits_arguments() {
        let sink = CommandSink::from_command_line("notify --chat '42 43'", 3).unwrap();
        assert_eq!(sink.program(), "notify");
        assert_eq!(sink.args, vec!["--chat".to_string(), "42 43".to_string()]);
        assert_eq!(sink.attempts, 3);
    }

    #[test]
    fn command_sink_rejects_empty_command() {
        assert!(CommandSink::from_command_line("   ", 1).is_err());
        assert!(CommandSink::from_command_line("unterminated 'quote", 1).is_err());
    }

    #[test]
    fn command_sink_clamps_attempts_to_one() {
        let sink = CommandSink::from_command_line("true", 0).unwrap();
        assert_eq!(sink.attempts, 1);
    }

    #[cfg(unix)]
    #[test]
    fn command_sink_retries_then_reports_failure() {
        let mut sink = CommandSink::from_command_line("false", 2)
            .unwrap()
            .with_retry_pause(Duration::from_millis(1));
        let err = sink
            .deliver(Path::new("/tmp/none.wav"), "label")
            .expect_err("false always fails");
        assert!(format!("{err:#}").contains("after 2 attempts"));
    }

    #[cfg(unix)]
    #[test]
    fn command_sink_delivers_on_success() {
        let mut sink = CommandSink::from_command_line("true", 1).unwrap();
        assert!(sink.deliver(Path::new("/tmp/none.wav"), "label").is_ok());
    }
}
