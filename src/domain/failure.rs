//! Failure kinds: the closed classification of injected faults.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MenderError;

/// Closed classification of a service fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Missing null guard: attribute access on a `None` value
    NullPointer,
    /// Query references a column the schema does not have
    SqlError,
    /// Runaway loop exhausting memory
    InfiniteLoop,
    /// Classification was inconclusive
    Unknown,
}

impl FailureKind {
    /// Kinds that can be injected into the target and triggered
    pub const INJECTABLE: [FailureKind; 3] = [
        FailureKind::NullPointer,
        FailureKind::SqlError,
        FailureKind::InfiniteLoop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NullPointer => "null_pointer",
            FailureKind::SqlError => "sql_error",
            FailureKind::InfiniteLoop => "infinite_loop",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Parse a trigger token, accepting only injectable kinds
    pub fn parse_injectable(token: &str) -> Result<Self, MenderError> {
        match token.parse::<FailureKind>()? {
            FailureKind::Unknown => Err(MenderError::UnknownFailureKind(token.to_string())),
            kind => Ok(kind),
        }
    }

    /// Label shown when a failure is injected
    pub fn display_label(&self) -> &'static str {
        match self {
            FailureKind::NullPointer => "NULL DEREFERENCE  (broken_module.py:18)",
            FailureKind::SqlError => "SCHEMA VIOLATION  (database.py:41)",
            FailureKind::InfiniteLoop => "MEMORY OVERFLOW   (broken_module.py:52)",
            FailureKind::Unknown => "UNCLASSIFIED FAILURE",
        }
    }

    /// One-line symptom for help and usage text
    pub fn symptom(&self) -> &'static str {
        match self {
            FailureKind::NullPointer => "AttributeError: NoneType",
            FailureKind::SqlError => "OperationalError: column",
            FailureKind::InfiniteLoop => "MemoryError: loop",
            FailureKind::Unknown => "unclassified",
        }
    }

    /// Traceback written to the service log when this failure is injected
    pub fn failure_log_lines(&self) -> &'static [&'static str] {
        match self {
            FailureKind::NullPointer => &[
                "ERROR - Traceback (most recent call last):",
                "ERROR -   File \"app/broken_module.py\", line 18, in process_user_data",
                "ERROR -     result = user_data.get('name')",
                "ERROR - AttributeError: 'NoneType' object has no attribute 'get'",
            ],
            FailureKind::SqlError => &[
                "ERROR - Traceback (most recent call last):",
                "ERROR -   File \"app/database.py\", line 41, in get_user_by_id",
                "ERROR -     cursor.execute('SELECT id, usr_email FROM users WHERE id=?', (user_id,))",
                "ERROR - sqlite3.OperationalError: no such column: usr_email",
            ],
            FailureKind::InfiniteLoop => &[
                "ERROR - Traceback (most recent call last):",
                "ERROR -   File \"app/broken_module.py\", line 52, in calculate_stats",
                "ERROR -     while counter != target:",
                "ERROR - MemoryError: Process killed — memory limit exceeded (infinite loop detected)",
            ],
            FailureKind::Unknown => &[],
        }
    }

    /// Minimal log stub synthesized when the service log is missing
    pub fn stub_log_lines(&self) -> &'static [&'static str] {
        match self {
            FailureKind::NullPointer | FailureKind::Unknown => &[
                "ERROR - AttributeError: 'NoneType' object has no attribute 'get'",
                "ERROR -   File \"app/broken_module.py\", line 18",
            ],
            FailureKind::SqlError => &[
                "ERROR - sqlite3.OperationalError: no such column: usr_email",
                "ERROR -   File \"app/database.py\", line 41",
            ],
            FailureKind::InfiniteLoop => &[
                "ERROR - MemoryError: Process killed — memory limit exceeded",
                "ERROR -   File \"app/broken_module.py\", line 52",
            ],
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailureKind {
    type Err = MenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "null_pointer" => Ok(FailureKind::NullPointer),
            "sql_error" => Ok(FailureKind::SqlError),
            "infinite_loop" => Ok(FailureKind::InfiniteLoop),
            "unknown" => Ok(FailureKind::Unknown),
            other => Err(MenderError::UnknownFailureKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_through_as_str() {
        for kind in FailureKind::INJECTABLE {
            assert_eq!(kind.as_str().parse::<FailureKind>().unwrap(), kind);
        }
        assert_eq!("unknown".parse::<FailureKind>().unwrap(), FailureKind::Unknown);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("SQL_ERROR".parse::<FailureKind>().unwrap(), FailureKind::SqlError);
    }

    #[test]
    fn test_parse_injectable_rejects_unknown() {
        assert!(matches!(
            FailureKind::parse_injectable("unknown"),
            Err(MenderError::UnknownFailureKind(_))
        ));
        assert!(matches!(
            FailureKind::parse_injectable("disk_full"),
            Err(MenderError::UnknownFailureKind(_))
        ));
        assert_eq!(
            FailureKind::parse_injectable("infinite_loop").unwrap(),
            FailureKind::InfiniteLoop
        );
    }

    #[test]
    fn test_every_injectable_kind_has_log_lines() {
        for kind in FailureKind::INJECTABLE {
            assert!(!kind.failure_log_lines().is_empty());
            assert!(kind.failure_log_lines().iter().all(|l| l.starts_with("ERROR")));
            assert_eq!(kind.stub_log_lines().len(), 2);
        }
        assert!(FailureKind::Unknown.failure_log_lines().is_empty());
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&FailureKind::InfiniteLoop).unwrap();
        assert_eq!(json, "\"infinite_loop\"");
    }
}
