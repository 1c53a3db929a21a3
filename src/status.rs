//! Status values for the planning and compilation pipeline
//!
//! Pipeline failures are not Rust errors: they are `Status` values attached
//! to the plan node where they occurred. Errors accumulate; a single run
//! reports every problem found in a document tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a pipeline status.
///
/// `Error` and `Fatal` block compilation (subject to the accept-all flag);
/// `Warning` and `Ok` do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Ok,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLevel::Ok => write!(f, "ok"),
            StatusLevel::Warning => write!(f, "warning"),
            StatusLevel::Error => write!(f, "error"),
            StatusLevel::Fatal => write!(f, "fatal"),
        }
    }
}

/// A level plus a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub level: StatusLevel,
    pub description: String,
}

impl Status {
    pub fn ok(description: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Ok,
            description: description.into(),
        }
    }

    pub fn warning(description: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            description: description.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            description: description.into(),
        }
    }

    pub fn fatal(description: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Fatal,
            description: description.into(),
        }
    }

    /// Whether this status blocks compilation.
    pub fn is_blocking(&self) -> bool {
        matches!(self.level, StatusLevel::Error | StatusLevel::Fatal)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.description)
    }
}

/// Returns true if any status in the slice is an ERROR or FATAL.
pub fn has_blocking(statuses: &[Status]) -> bool {
    statuses.iter().any(Status::is_blocking)
}

/// Returns true if any status in the slice is FATAL.
pub fn has_fatal(statuses: &[Status]) -> bool {
    statuses.iter().any(|s| s.level == StatusLevel::Fatal)
}
