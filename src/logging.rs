//! Logging setup: console output plus a size-rotated log file.

use crate::settings::LogSettings;
use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Rotate once the active file would grow past this.
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Rotated files older than this are deleted.
pub const LOG_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Install the global subscriber. `RUST_LOG` overrides the configured
/// level; `verbose` forces debug output.
pub fn init(settings: &LogSettings, verbose: bool) -> Result<()> {
    let directive = if verbose {
        "debug"
    } else {
        level_directive(&settings.level)
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    let file = match RotatingFileWriter::open(&settings.file, MAX_LOG_BYTES, LOG_RETENTION) {
        Ok(writer) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        ),
        Err(e) => {
            eprintln!(
                "⚠️  Cannot open log file {}: {} (logging to console only)",
                settings.file.display(),
                e
            );
            None
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to set tracing subscriber")?;

    Ok(())
}

/// Map a level name (including `WARNING` and `CRITICAL`) to a filter
/// directive. Unknown names fall back to `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" => "error",
        _ => "info",
    }
}

/// Append-only log file that rolls over by size.
///
/// Cloning shares the underlying file, so one writer can back every event.
#[derive(Clone)]
pub struct RotatingFileWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

struct RotatingFile {
    path: PathBuf,
    file: File,
    size: u64,
    max_bytes: u64,
    retention: Duration,
}

impl RotatingFileWriter {
    pub fn open(path: &Path, max_bytes: u64, retention: Duration) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = open_append(path)?;
        let size = file.metadata()?.len();

        let rotating = RotatingFile {
            path: path.to_path_buf(),
            file,
            size,
            max_bytes,
            retention,
        };
        rotating.prune();

        Ok(Self {
            inner: Arc::new(Mutex::new(rotating)),
        })
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, RotatingFile>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write_record(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl RotatingFile {
    fn write_record(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }

        self.file.write_all(buf)?;
        self.size += buf.len() as u64;
        Ok(buf.len())
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, rotated_path(&self.path))?;
        self.file = open_append(&self.path)?;
        self.size = 0;
        self.prune();
        Ok(())
    }

    /// Delete rotated siblings past the retention window. Failures are
    /// ignored; pruning is retried on the next rotation.
    fn prune(&self) {
        let Some(prefix) = rotated_prefix(&self.path) else {
            return;
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let Ok(entries) = fs::read_dir(&dir) else {
            return;
        };
        let now = SystemTime::now();

        for entry in entries.flatten() {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(&prefix) {
                continue;
            }
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > self.retention);
            if expired {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn rotated_prefix(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| format!("{}.", name.to_string_lossy()))
}

/// `research_crew.log` becomes `research_crew.log.20240105-091500.123`.
fn rotated_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d-%H%M%S%.3f");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());

    let mut candidate = path.with_file_name(format!("{name}.{stamp}"));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{name}.{stamp}.{n}"));
        n += 1;
    }
    candidate
}
