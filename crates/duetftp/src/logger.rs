//! # Logger
//!
//! The transfer log: an append-only transcript of everything that crosses a
//! control channel, one microsecond-stamped line per event. The server keeps
//! a rolling set of these under its log directory; the client writes a plain
//! file named on its command line.

use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;

const LOG_BASE: &str = "ftpsrv";
const LOG_EXT: &str = ".log";

/// Timestamp layout, microsecond precision: `Jul  9 16:04:05.123456`
const STAMP_FORMAT: &str = "%b %e %H:%M:%S%.6f";

/// Shared transcript sink.
///
/// Concurrent sessions write through one `TransferLog`; the mutex keeps
/// individual lines intact while allowing lines from different sessions to
/// interleave. Write failures are swallowed: a full disk must not take the
/// control channel down with it.
#[derive(Debug)]
pub struct TransferLog {
    file: Mutex<File>,
}

impl TransferLog {
    /// Open `path` for appending, creating it if needed (client side).
    pub fn append(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().append(true).create(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Rotate the logs under `dir` and open a fresh `ftpsrv.log` (server side).
    ///
    /// Every existing `ftpsrv-NNN.log` is shifted up by one, with the shift
    /// stopping at `max` so the oldest file beyond the retention count is
    /// overwritten; the previous `ftpsrv.log` then becomes `ftpsrv-000.log`.
    pub fn rolling(dir: &Path, max: usize) -> std::io::Result<Self> {
        roll_files(dir, 0, max)?;

        if !dir.exists() {
            fs::create_dir_all(dir)?;
        } else {
            let current = dir.join(format!("{LOG_BASE}{LOG_EXT}"));
            if current.exists() {
                fs::rename(&current, dir.join(rolled_name(0)))?;
            }
        }

        Self::append(&dir.join(format!("{LOG_BASE}{LOG_EXT}")))
    }

    /// Log a free-form event.
    pub fn message(&self, msg: &str) {
        self.write_line(msg);
    }

    /// Log a line written to the control channel.
    pub fn sent(&self, msg: &str) {
        self.write_line(&format!("Sent {}", msg.trim_end_matches(['\r', '\n'])));
    }

    /// Log a line read from the control channel, CRLF stripped.
    pub fn received(&self, msg: &str) {
        self.write_line(&format!("Received {}", msg.trim_end_matches(['\r', '\n'])));
    }

    /// Log an error.
    pub fn error(&self, err: &dyn Display) {
        self.write_line(&format!("Error: {err}"));
    }

    fn write_line(&self, event: &str) {
        let Ok(mut file) = self.file.lock() else {
            return;
        };
        let stamp = Local::now().format(STAMP_FORMAT);
        let _ = writeln!(file, "{stamp}: {event}");
    }
}

fn rolled_name(n: usize) -> String {
    format!("{LOG_BASE}-{n:03}{LOG_EXT}")
}

/// Shift `ftpsrv-<current>.log` and everything above it up by one slot.
fn roll_files(dir: &Path, current: usize, max: usize) -> std::io::Result<()> {
    let cur = dir.join(rolled_name(current));
    if current == max || !cur.exists() {
        return Ok(());
    }

    roll_files(dir, current + 1, max)?;
    fs::rename(cur, dir.join(rolled_name(current + 1)))
}

#[cfg(test)]
mod test {

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn should_append_stamped_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.log");
        let log = TransferLog::append(&path).unwrap();

        log.message("Connecting to localhost:21");
        log.sent("USER alice");
        log.received("230 Login successful.\r\n");
        log.error(&"boom");

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with(": Connecting to localhost:21"));
        assert!(lines[1].ends_with(": Sent USER alice"));
        assert!(lines[2].ends_with(": Received 230 Login successful."));
        assert!(lines[3].ends_with(": Error: boom"));
        // stamp carries microsecond precision
        assert!(lines[0].split(": ").next().unwrap().contains('.'));
    }

    #[test]
    fn should_rotate_existing_logs_on_startup() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ftpsrv.log"), "current\n").unwrap();
        fs::write(dir.path().join("ftpsrv-000.log"), "previous\n").unwrap();
        fs::write(dir.path().join("ftpsrv-001.log"), "oldest\n").unwrap();

        let log = TransferLog::rolling(dir.path(), 5).unwrap();
        log.message("fresh start");

        assert_eq!(
            fs::read_to_string(dir.path().join("ftpsrv-000.log")).unwrap(),
            "current\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("ftpsrv-001.log")).unwrap(),
            "previous\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("ftpsrv-002.log")).unwrap(),
            "oldest\n"
        );
        assert!(fs::read_to_string(dir.path().join("ftpsrv.log"))
            .unwrap()
            .ends_with("fresh start\n"));
    }

    #[test]
    fn should_drop_logs_beyond_retention() {
        let dir = TempDir::new().unwrap();
        for n in 0..3 {
            fs::write(dir.path().join(rolled_name(n)), format!("log {n}\n")).unwrap();
        }

        // max = 2: the shift stops at slot 2, so old slot 2 is overwritten
        TransferLog::rolling(dir.path(), 2).unwrap();

        assert!(!dir.path().join(rolled_name(3)).exists());
        assert_eq!(
            fs::read_to_string(dir.path().join(rolled_name(2))).unwrap(),
            "log 1\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join(rolled_name(1))).unwrap(),
            "log 0\n"
        );
    }

    #[test]
    fn should_create_missing_log_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("logs");
        let log = TransferLog::rolling(&nested, 5).unwrap();
        log.message("hello");
        assert!(nested.join("ftpsrv.log").exists());
    }
}
