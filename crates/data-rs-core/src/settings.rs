//! Settings for data-rs.
//!
//! [`Settings`] holds logging configuration plus a [`DatabaseSettings`]
//! block describing the SQL Server connection and dialect. Every field has a
//! default so partial configuration files are accepted by
//! [`settings_loader`](crate::settings_loader).

use serde::{Deserialize, Serialize};

/// Database connection and dialect configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The ADO-style connection string handed to the driver shim.
    pub connection_string: String,
    /// The target dialect version: `"Sql13"`, `"Sql14"`, `"130"`, or `"140"`.
    pub version: String,
    /// Command timeout in seconds. Zero means no timeout.
    pub command_timeout_secs: u64,
    /// Whether executed SQL text is logged at debug level.
    pub trace_sql: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            version: "Sql13".to_string(),
            command_timeout_secs: 30,
            trace_sql: false,
        }
    }
}

/// The complete set of engine settings.
///
/// # Examples
///
/// ```
/// use data_rs_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.database.version, "Sql13");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
    /// The tracing filter directive (e.g. "info", "`data_rs_sqlserver=debug`").
    pub log_level: String,
    /// The database connection block.
    pub database: DatabaseSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            log_level: "info".to_string(),
            database: DatabaseSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let s = Settings::default();
        assert!(s.debug);
        assert_eq!(s.log_level, "info");
        assert!(s.database.connection_string.is_empty());
        assert_eq!(s.database.version, "Sql13");
        assert_eq!(s.database.command_timeout_secs, 30);
        assert!(!s.database.trace_sql);
    }

    #[test]
    fn test_settings_serde_roundtrip() {
        let mut s = Settings::default();
        s.database.version = "Sql14".to_string();
        let json = serde_json::to_string(&s).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
