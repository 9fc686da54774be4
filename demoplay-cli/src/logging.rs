//! Log panel feed.
//!
//! Records come from two places: the `log` facade (the player, analysis and
//! visualizer modules, plus the decoder and output crates underneath) and raw
//! stderr written by the audio backend while the interface owns the terminal.
//! Both end up as [`LogLine`]s tagged with where they came from.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::os::unix::io::{FromRawFd, RawFd};
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

use log::{Level, LevelFilter, Log, Metadata, Record};

const LOG_CAPACITY: usize = 500;
/// Decoder and output crates are chatty; only their problems reach the panel.
const DEPENDENCY_LEVEL: LevelFilter = LevelFilter::Warn;

/// Where a panel line came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSource {
    /// A library module such as `playback` or `visualizer`.
    Library(String),
    Cli,
    /// Another crate, named by its root module.
    Dependency(String),
    /// Raw stderr output captured from the audio backend.
    Backend,
}

impl LogSource {
    pub fn from_target(target: &str) -> Self {
        let mut parts = target.split("::");
        match parts.next() {
            Some("demoplay_lib") => LogSource::Library(parts.next().unwrap_or("core").to_string()),
            Some("demoplay") | Some("") | None => LogSource::Cli,
            Some(other) => LogSource::Dependency(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            LogSource::Library(module) => module,
            LogSource::Cli => "cli",
            LogSource::Dependency(name) => name,
            LogSource::Backend => "backend",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub source: LogSource,
    pub message: String,
}

impl LogLine {
    pub fn render(&self) -> String {
        format!("{:<5} {:<10} {}", self.level, self.source.label(), self.message)
    }
}

/// Bounded, shared history of panel lines. The oldest line goes first.
#[derive(Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<VecDeque<LogLine>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CAPACITY))),
        }
    }

    pub fn push(&self, line: LogLine) {
        let mut lines = self.lines.lock().unwrap();
        if lines.len() >= LOG_CAPACITY {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap().iter().cloned().collect()
    }
}

struct PanelLogger {
    level: LevelFilter,
    buffer: LogBuffer,
    echo_stderr: bool,
}

impl PanelLogger {
    fn allows(&self, level: Level, source: &LogSource) -> bool {
        let ceiling = match source {
            LogSource::Dependency(_) => self.level.min(DEPENDENCY_LEVEL),
            _ => self.level,
        };
        level <= ceiling
    }
}

impl Log for PanelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.allows(metadata.level(), &LogSource::from_target(metadata.target()))
    }

    fn log(&self, record: &Record) {
        let source = LogSource::from_target(record.target());
        if !self.allows(record.level(), &source) {
            return;
        }
        let line = LogLine {
            level: record.level(),
            source,
            message: record.args().to_string(),
        };
        if self.echo_stderr {
            eprintln!("{}", line.render());
        }
        self.buffer.push(line);
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<PanelLogger> = OnceLock::new();

/// `DEMOPLAY_LOG`, then `RUST_LOG`, then `info`.
fn level_from_env() -> LevelFilter {
    ["DEMOPLAY_LOG", "RUST_LOG"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find_map(|value| LevelFilter::from_str(value.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the panel logger and return the buffer it fills.
///
/// `DEMOPLAY_LOG_STDERR` set to anything but `0` also echoes each line to
/// stderr, for runs without the interface.
pub fn init() -> LogBuffer {
    let echo_stderr = std::env::var("DEMOPLAY_LOG_STDERR")
        .map(|value| value != "0")
        .unwrap_or(false);
    let level = level_from_env();

    let logger = LOGGER.get_or_init(|| PanelLogger {
        level,
        buffer: LogBuffer::new(),
        echo_stderr,
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(level);
    }
    logger.buffer.clone()
}

/// Level for a raw backend line. Output streams report underruns and
/// device trouble as free text.
pub fn classify_backend_line(line: &str) -> Level {
    let lower = line.to_ascii_lowercase();
    if lower.contains("error") || lower.contains("failed") || lower.contains("cannot") {
        Level::Error
    } else if lower.contains("underrun") || lower.contains("xrun") || lower.contains("warn") {
        Level::Warn
    } else {
        Level::Info
    }
}

fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

fn close_all(fds: &[RawFd]) {
    for fd in fds {
        unsafe {
            libc::close(*fd);
        }
    }
}

/// Redirects the process stderr into the panel until dropped.
pub struct BackendStderr {
    saved_fd: RawFd,
    reader: Option<JoinHandle<()>>,
}

impl BackendStderr {
    pub fn capture(buffer: LogBuffer) -> io::Result<Self> {
        let mut fds = [0; 2];
        check(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
        let (read_fd, write_fd) = (fds[0], fds[1]);

        let saved_fd = match check(unsafe { libc::dup(libc::STDERR_FILENO) }) {
            Ok(fd) => fd,
            Err(err) => {
                close_all(&[read_fd, write_fd]);
                return Err(err);
            }
        };
        if let Err(err) = check(unsafe { libc::dup2(write_fd, libc::STDERR_FILENO) }) {
            close_all(&[read_fd, write_fd, saved_fd]);
            return Err(err);
        }
        // stderr now holds the only write end; restoring it closes the pipe.
        close_all(&[write_fd]);

        let spawned = std::thread::Builder::new()
            .name("demoplay-stderr".to_string())
            .spawn(move || {
                let pipe = unsafe { File::from_raw_fd(read_fd) };
                for line in BufReader::new(pipe).lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    let message = line.trim_end();
                    if message.is_empty() {
                        continue;
                    }
                    buffer.push(LogLine {
                        level: classify_backend_line(message),
                        source: LogSource::Backend,
                        message: message.to_string(),
                    });
                }
            });

        match spawned {
            Ok(handle) => Ok(Self {
                saved_fd,
                reader: Some(handle),
            }),
            Err(err) => {
                unsafe {
                    libc::dup2(saved_fd, libc::STDERR_FILENO);
                }
                close_all(&[saved_fd, read_fd]);
                Err(err)
            }
        }
    }
}

impl Drop for BackendStderr {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.saved_fd, libc::STDERR_FILENO);
        }
        close_all(&[self.saved_fd]);
        if let Some(handle) = self.reader.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(message: &str) -> LogLine {
        LogLine {
            level: Level::Info,
            source: LogSource::Cli,
            message: message.to_string(),
        }
    }

    #[test]
    fn buffer_keeps_the_newest_lines() {
        let buffer = LogBuffer::new();
        for index in 0..(LOG_CAPACITY + 20) {
            buffer.push(line(&format!("line {}", index)));
        }
        let lines = buffer.snapshot();
        assert_eq!(lines.len(), LOG_CAPACITY);
        assert_eq!(lines[0].message, "line 20");
        assert_eq!(lines.last().map(|l| l.message.as_str()), Some("line 519"));
    }

    #[test]
    fn targets_map_to_sources() {
        assert_eq!(
            LogSource::from_target("demoplay_lib::playback::binder"),
            LogSource::Library("playback".to_string())
        );
        assert_eq!(LogSource::from_target("demoplay::runner"), LogSource::Cli);
        assert_eq!(
            LogSource::from_target("symphonia_core::formats"),
            LogSource::Dependency("symphonia_core".to_string())
        );
        assert_eq!(LogSource::Backend.label(), "backend");
    }

    #[test]
    fn dependencies_only_report_problems() {
        let logger = PanelLogger {
            level: LevelFilter::Debug,
            buffer: LogBuffer::new(),
            echo_stderr: false,
        };
        let dependency = LogSource::Dependency("rodio".to_string());
        assert!(!logger.allows(Level::Info, &dependency));
        assert!(logger.allows(Level::Warn, &dependency));
        assert!(logger.allows(Level::Debug, &LogSource::Library("analysis".to_string())));
        assert!(!logger.allows(Level::Trace, &LogSource::Cli));
    }

    #[test]
    fn backend_lines_are_classified() {
        assert_eq!(classify_backend_line("ALSA lib pcm.c: underrun occurred"), Level::Warn);
        assert_eq!(classify_backend_line("Failed to open device"), Level::Error);
        assert_eq!(classify_backend_line("using default output"), Level::Info);
    }

    #[test]
    fn rendered_line_names_its_source() {
        let line = LogLine {
            level: Level::Warn,
            source: LogSource::Library("playback".to_string()),
            message: "retrying load".to_string(),
        };
        assert_eq!(line.render(), "WARN  playback   retrying load");
    }
}
