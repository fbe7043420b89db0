//! Daily usage log files and API error dumps.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use tracing::warn;

use skyhook_core::client::UsageStats;
use skyhook_core::progress::UsageRecorder;

/// Appends session activity to `<log_dir>/<YYYY-MM-DD>.log` and dumps the
/// full request/response of failed API calls to `<log_dir>/err/`.
///
/// One file per day; concurrent writers serialize on an internal mutex so
/// interleaved lines stay whole.
pub struct UsageLog {
    log_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl UsageLog {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = match self.write_lock.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = self.try_append(line) {
            warn!(error = %e, "Failed to write usage log");
        }
    }

    fn try_append(&self, line: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.log_dir)?;
        let path = self
            .log_dir
            .join(format!("{}.log", Local::now().format("%Y-%m-%d")));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "[{}] {line}", Local::now().format("%H:%M:%S"))
    }

    /// Write a full error dump and return its path for the log line.
    fn dump_api_error(&self, request_body: &str, response_body: &str) -> std::io::Result<PathBuf> {
        let err_dir = self.log_dir.join("err");
        fs::create_dir_all(&err_dir)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = err_dir.join(format!(
            "ERR_{}_{}.txt",
            Local::now().format("%Y%m%d_%H%M%S"),
            &id[..8]
        ));
        let contents = format!(
            "=== REQUEST ===\n{request_body}\n\n=== RESPONSE ===\n{response_body}\n"
        );
        fs::write(&path, contents)?;
        Ok(path)
    }
}

impl UsageRecorder for UsageLog {
    fn record_round(&self, model: &str, elapsed_ms: u64, usage: &UsageStats) {
        self.append_line(&format!(
            "ROUND model={model} elapsed={elapsed_ms}ms prompt={} response={} total={}",
            usage.prompt_tokens, usage.response_tokens, usage.total_tokens
        ));
    }

    fn record_action(&self, tool: &str, summary: &str) {
        self.append_line(&format!("ACTION {tool}: {summary}"));
    }

    fn record_error(&self, message: &str) {
        self.append_line(&format!("ERROR {message}"));
    }

    fn record_api_error(&self, message: &str, request_body: &str, response_body: &str) {
        match self.dump_api_error(request_body, response_body) {
            Ok(path) => {
                self.append_line(&format!("API_ERROR {message} (dump: {})", path.display()))
            }
            Err(e) => {
                warn!(error = %e, "Failed to write API error dump");
                self.append_line(&format!("API_ERROR {message} (dump failed)"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today_log(dir: &std::path::Path) -> PathBuf {
        dir.join(format!("{}.log", Local::now().format("%Y-%m-%d")))
    }

    #[test]
    fn round_appends_to_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = UsageLog::new(dir.path());

        let usage = UsageStats {
            prompt_tokens: 120,
            response_tokens: 40,
            total_tokens: 160,
        };
        log.record_round("gemini-2.5-flash", 850, &usage);

        let contents = fs::read_to_string(today_log(dir.path())).unwrap();
        assert!(contents.contains("model=gemini-2.5-flash"));
        assert!(contents.contains("total=160"));
    }

    #[test]
    fn lines_accumulate_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = UsageLog::new(dir.path());

        log.record_action("list_files", "docs");
        log.record_error("something broke");

        let contents = fs::read_to_string(today_log(dir.path())).unwrap();
        let action_at = contents.find("ACTION list_files: docs").unwrap();
        let error_at = contents.find("ERROR something broke").unwrap();
        assert!(action_at < error_at);
    }

    #[test]
    fn api_error_writes_dump_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = UsageLog::new(dir.path());

        log.record_api_error("API error: HTTP 500", "{\"contents\":[]}", "oops");

        let err_dir = dir.path().join("err");
        let dumps: Vec<_> = fs::read_dir(&err_dir).unwrap().collect();
        assert_eq!(dumps.len(), 1);
        let dump = fs::read_to_string(dumps[0].as_ref().unwrap().path()).unwrap();
        assert!(dump.contains("=== REQUEST ==="));
        assert!(dump.contains("oops"));

        let contents = fs::read_to_string(today_log(dir.path())).unwrap();
        assert!(contents.contains("API_ERROR API error: HTTP 500"));
    }

    #[test]
    fn missing_log_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs").join("deeper");
        let log = UsageLog::new(&nested);
        log.record_error("first line");
        assert!(today_log(&nested).exists());
    }
}
