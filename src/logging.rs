// src/logging.rs
use chrono::Local;
use log::info;
use std::io::{self, Write};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

pub const LOG_PREFIX: &str = "movie_agent";
pub const LOG_SUFFIX: &str = "log";

/// Writes every log line to stderr and to the rolling log file.
struct TeeWriter {
    file: RollingFileAppender,
}

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Daily `movie_agent.YYYY-MM-DD.log` files in `log_dir`, keeping the newest
/// `max_files`. The file rolls over at midnight (UTC) while the server runs.
pub fn file_appender(log_dir: &Path, max_files: usize) -> io::Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix(LOG_SUFFIX)
        .max_log_files(max_files.max(1))
        .build(log_dir)
        .map_err(io::Error::other)
}

/// Installs the global logger.
pub fn init(log_dir: &Path, max_files: usize) -> io::Result<()> {
    let file = file_appender(log_dir, max_files)?;

    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(TeeWriter { file })))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .init();

    info!(
        "Logging to {}/{}.<date>.{} (keeping {} files)",
        log_dir.display(),
        LOG_PREFIX,
        LOG_SUFFIX,
        max_files.max(1)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn appender_writes_dated_file() {
        let dir = tempdir().unwrap();
        let mut appender = file_appender(dir.path(), 3).unwrap();
        appender.write_all(b"2026-01-01 00:00:00,000 - app - INFO - hello\n").unwrap();
        appender.flush().unwrap();

        let names = log_files(dir.path());
        assert_eq!(names.len(), 1);
        let name = &names[0];
        assert!(name.starts_with("movie_agent."), "{name}");
        assert!(name.ends_with(".log"), "{name}");
        // movie_agent.YYYY-MM-DD.log
        assert_eq!(name.len(), "movie_agent.".len() + 10 + ".log".len());

        let content = fs::read_to_string(dir.path().join(name)).unwrap();
        assert!(content.contains("hello"));
    }

    #[test]
    fn appender_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("logs");
        let mut appender = file_appender(&nested, 0).unwrap();
        appender.write_all(b"line\n").unwrap();
        appender.flush().unwrap();
        assert_eq!(log_files(&nested).len(), 1);
    }
}
