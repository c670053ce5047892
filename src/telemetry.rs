use crate::config::AppConfig;
use std::fs;
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

const LOG_MAX_BYTES: u64 = 5 * 1024 * 1024;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Append-only log file that starts over once it would exceed `max_bytes`,
/// so an unattended recorder never fills its disk with logs.
pub(crate) struct LogWriter {
    path: PathBuf,
    file: fs::File,
    max_bytes: u64,
    bytes_written: u64,
}

impl LogWriter {
    pub(crate) fn new(path: &Path, max_bytes: u64) -> io::Result<Self> {
        let mut bytes_written = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        if bytes_written > max_bytes {
            let _ = fs::remove_file(path);
            bytes_written = 0;
        }
        let file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            max_bytes,
            bytes_written,
        })
    }

    fn rotate_if_needed(&mut self, next_len: usize) {
        if self.bytes_written.saturating_add(next_len as u64) <= self.max_bytes {
            return;
        }
        if let Ok(file) = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
        {
            self.file = file;
            self.bytes_written = 0;
        }
    }

    #[cfg(test)]
    pub(crate) fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.rotate_if_needed(buf.len());
        let written = self.file.write(buf)?;
        self.bytes_written = self.bytes_written.saturating_add(written as u64);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Install the global subscriber once. Logs go to stderr unless `--log-file`
/// is set; a file that cannot be opened falls back to stderr with a warning.
pub fn init_tracing(config: &AppConfig) {
    let _ = TRACING_INIT.get_or_init(|| {
        let mut open_error = None;
        let writer = match config.log_file.as_deref() {
            Some(path) => match LogWriter::new(path, LOG_MAX_BYTES) {
                Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
                Err(err) => {
                    open_error = Some((path.to_path_buf(), err));
                    BoxMakeWriter::new(io::stderr)
                }
            },
            None => BoxMakeWriter::new(io::stderr),
        };

        let builder = tracing_subscriber::fmt()
            .with_max_level(config.log_level.as_tracing())
            .with_timer(UtcTime::rfc_3339())
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false);
        let installed = if config.log_json {
            let subscriber = builder
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber).is_ok()
        } else {
            tracing::subscriber::set_global_default(builder.finish()).is_ok()
        };

        if installed {
            install_panic_hook();
        }
        if let Some((path, err)) = open_error {
            tracing::warn!(path = %path.display(), error = %err, "log file unavailable; logging to stderr");
        }
    });
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|text| (*text).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        let thread = std::thread::current();
        tracing::error!(
            thread = thread.name().unwrap_or("unnamed"),
            location = %location,
            payload = %payload,
            "panic"
        );
        previous(info);
    }));
}
