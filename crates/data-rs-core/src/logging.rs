//! Logging integration for data-rs.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-command spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level is read from `settings.log_level` (e.g. "debug", "info",
/// "`data_rs_sqlserver=trace`"). In debug mode a pretty, human-readable format
/// is used; otherwise a structured JSON format is used. Installing a second
/// subscriber is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for one database command.
///
/// `kind` is a short label such as `"select"` or `"bulk_insert"`;
/// `statement_id` is the command tree's identity, or 0 for ad-hoc SQL.
///
/// # Examples
///
/// ```
/// use data_rs_core::logging::command_span;
///
/// let span = command_span("select", 42);
/// let _guard = span.enter();
/// tracing::debug!("executing");
/// ```
pub fn command_span(kind: &str, statement_id: u64) -> tracing::Span {
    tracing::info_span!("command", kind = kind, statement_id = statement_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_twice_is_harmless() {
        let settings = Settings::default();
        setup_logging(&settings);
        setup_logging(&settings);
    }

    #[test]
    fn test_command_span_enter() {
        let span = command_span("insert", 7);
        let _guard = span.enter();
        tracing::debug!("inside command span");
    }
}
