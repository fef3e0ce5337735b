// src/logging.rs

use crate::errors::{IntellexError, IntellexResult};
use crate::models::ApiCallLog;
use flexi_logger::{detailed_format, FileSpec, Logger, LoggerHandle, WriteMode};
use log::info;
use std::path::Path;

pub const API_LOG_TARGET: &str = "intellex::api";

/// Starts file logging under `log_dir`. The returned handle must be kept alive
/// for the lifetime of the process or buffered lines are lost.
pub fn init_logging(level: &str, log_dir: &Path) -> IntellexResult<LoggerHandle> {
    Logger::try_with_str(level)
        .and_then(|logger| {
            logger
                .log_to_file(FileSpec::default().directory(log_dir).basename("intellex"))
                .format_for_files(detailed_format)
                .write_mode(WriteMode::BufferAndFlush)
                .start()
        })
        .map_err(|e| IntellexError::config_error(format!("Failed to start logger: {}", e)))
}

/// Formats one API call as a single log line.
pub fn format_api_call(log: &ApiCallLog) -> String {
    format!(
        "[{}] {} - {} - Status: {} - Time: {}ms",
        log.timestamp.to_rfc3339(),
        log.endpoint,
        log.request_summary,
        log.response_status,
        log.response_time_ms
    )
}

/// Logs an API call under the `intellex::api` target.
pub fn log_api_call(log: &ApiCallLog) {
    info!(target: API_LOG_TARGET, "{}", format_api_call(log));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_api_call() {
        let log = ApiCallLog {
            timestamp: Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap(),
            endpoint: "/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
            request_summary: "generate (text)".to_string(),
            response_status: 200,
            response_time_ms: 42,
        };

        assert_eq!(
            format_api_call(&log),
            "[2025-02-01T12:00:00+00:00] /v1beta/models/gemini-2.0-flash:generateContent - generate (text) - Status: 200 - Time: 42ms"
        );
    }
}
