//! Dialect version tags.

use std::fmt;
use std::str::FromStr;

use data_rs_core::{DataError, DataResult};

/// The SQL Server dialect version a generator targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SqlVersion {
    /// SQL Server 2016 (compatibility level 130).
    #[default]
    Sql13,
    /// SQL Server 2017 and later (compatibility level 140).
    Sql14,
}

impl SqlVersion {
    /// Returns the compatibility level number.
    pub const fn level(self) -> u16 {
        match self {
            Self::Sql13 => 130,
            Self::Sql14 => 140,
        }
    }

    /// Looks a version up by compatibility level.
    pub fn from_level(level: u16) -> DataResult<Self> {
        match level {
            130 => Ok(Self::Sql13),
            140 => Ok(Self::Sql14),
            other => Err(DataError::NotSupported(format!(
                "SQL Server version {other} (supported: 130, 140)"
            ))),
        }
    }

    /// Returns `true` when `TRIM` and `STRING_AGG` are available.
    pub const fn has_2017_functions(self) -> bool {
        matches!(self, Self::Sql14)
    }
}

impl FromStr for SqlVersion {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Sql13" | "sql13" | "130" => Ok(Self::Sql13),
            "Sql14" | "sql14" | "140" => Ok(Self::Sql14),
            other => Err(DataError::NotSupported(format!(
                "SQL Server version '{other}' (supported: Sql13, Sql14)"
            ))),
        }
    }
}

impl fmt::Display for SqlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sql13 => f.write_str("Sql13"),
            Self::Sql14 => f.write_str("Sql14"),
        }
    }
}
