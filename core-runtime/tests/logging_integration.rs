//! Integration tests for the logging bootstrap
//!
//! `init_logging` installs a process-wide subscriber, so everything that
//! needs it lives in a single test.

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[test]
fn test_init_logging_forwards_to_sink_once() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::debug!(target: "core_sync::lister", "below the sink level");
    tracing::warn!(
        target: "provider_webdav::client",
        authorization = "Basic YWxpY2U6c2VjcmV0",
        status = 503,
        "listing failed"
    );
    tracing::info!(target: "hyper::proto", "filtered out entirely");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].message, "listing failed");
        assert_eq!(
            entries[0].fields.get("authorization"),
            Some(&"[REDACTED]".to_string())
        );
        assert_eq!(entries[0].fields.get("status"), Some(&"503".to_string()));
    }

    let second = init_logging(LoggingConfig::default());
    assert!(matches!(second, Err(Error::Config(_))));
}

#[test]
fn test_invalid_filter_is_a_config_error() {
    let config = LoggingConfig::default().with_filter("core_sync=loudest");
    assert!(matches!(init_logging(config), Err(Error::Config(_))));
}

#[test]
fn test_redaction_leaves_ordinary_fields_alone() {
    assert_eq!(redact_if_sensitive("api_key", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("refresh_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("profile_id", "nas"), "nas");
    assert_eq!(redact_if_sensitive("path", "/Music/A.mp3"), "/Music/A.mp3");
}
