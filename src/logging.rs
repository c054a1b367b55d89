//! Process logger.
//!
//! Every record goes to stdout and is appended to `logs/pip_reroller.log`,
//! prefixed with a local timestamp and the level.

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const LOG_FILE_NAME: &str = "pip_reroller.log";

struct AppLogger {
    path: PathBuf,
    level: LevelFilter,
    // Serializes appends so lines from different threads never interleave
    write_lock: Mutex<()>,
}

impl Log for AppLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(record.level(), &record.args().to_string());
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        print!("{}", line);
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = file.write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

fn format_line(level: Level, msg: &str) -> String {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    format!("[{}] {:<5} {}\n", timestamp, level, msg)
}

/// Installs the process logger writing into `log_dir`.
///
/// Debug records are kept in debug builds only.
pub fn init(log_dir: &Path) -> Result<(), log::SetLoggerError> {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    log::set_boxed_logger(Box::new(AppLogger {
        path: log_dir.join(LOG_FILE_NAME),
        level,
        write_lock: Mutex::new(()),
    }))?;
    log::set_max_level(level);
    Ok(())
}

/// Records panics in the log file before the process dies.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();

        // Written directly; the logger may not be installed yet
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = crate::paths::get_logs_dir().join(LOG_FILE_NAME);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        let line = format_line(Level::Warn, "window lost");
        assert!(line.starts_with('['));
        assert!(line.ends_with("] WARN  window lost\n"));
    }
}
