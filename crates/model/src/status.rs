use serde::{Deserialize, Serialize};
use std::fmt;

/// Submission lifecycle state, persisted as an integer in the queue table.
///
/// The numeric values are part of the external wire contract (§6) and must
/// never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum StatusCode {
    New = 0,
    Assigned = 1,
    InProgress = 2,
    Success = 3,
    UnknownFailure = 4,
    XmlParseFailed = 5,
    SystemRegFailed = 6,
    RterIdRegFailed = 7,
    GeneralDbFailed = 8,
    RunRegFailed = 9,
    CyclicRegFailed = 10,
    FileMoveFailed = 11,
    FileTooBig = 12,
}

impl StatusCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::New,
            1 => Self::Assigned,
            2 => Self::InProgress,
            3 => Self::Success,
            4 => Self::UnknownFailure,
            5 => Self::XmlParseFailed,
            6 => Self::SystemRegFailed,
            7 => Self::RterIdRegFailed,
            8 => Self::GeneralDbFailed,
            9 => Self::RunRegFailed,
            10 => Self::CyclicRegFailed,
            11 => Self::FileMoveFailed,
            12 => Self::FileTooBig,
            _ => return None,
        })
    }

    /// Whether this status is a final state for a submission.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::New | Self::Assigned | Self::InProgress)
    }

    /// The SQL column set touched by `UPDATE submissionqueue ...` for this
    /// status, per the fixed mapping in §4.1.
    pub fn update_class(self) -> UpdateClass {
        match self {
            Self::Assigned
            | Self::RterIdRegFailed
            | Self::FileMoveFailed
            | Self::XmlParseFailed
            | Self::FileTooBig => UpdateClass::StatusOnly,
            Self::InProgress => UpdateClass::WithParseStart,
            Self::Success
            | Self::UnknownFailure
            | Self::SystemRegFailed
            | Self::GeneralDbFailed
            | Self::RunRegFailed
            | Self::CyclicRegFailed => UpdateClass::WithParseEnd,
            Self::New => UpdateClass::Rejected,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::UnknownFailure => "unknown_failure",
            Self::XmlParseFailed => "xml_parse_failed",
            Self::SystemRegFailed => "system_reg_failed",
            Self::RterIdRegFailed => "rterid_reg_failed",
            Self::GeneralDbFailed => "general_db_failed",
            Self::RunRegFailed => "run_reg_failed",
            Self::CyclicRegFailed => "cyclic_reg_failed",
            Self::FileMoveFailed => "file_move_failed",
            Self::FileTooBig => "file_too_big",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateClass {
    StatusOnly,
    WithParseStart,
    WithParseEnd,
    /// Setting this status from application code is a programming error.
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_code() {
        for raw in 0..=12 {
            let status = StatusCode::from_i32(raw).expect("known code");
            assert_eq!(status.as_i32(), raw);
        }
        assert!(StatusCode::from_i32(13).is_none());
    }

    #[test]
    fn new_is_not_terminal_and_success_is() {
        assert!(!StatusCode::New.is_terminal());
        assert!(!StatusCode::Assigned.is_terminal());
        assert!(!StatusCode::InProgress.is_terminal());
        assert!(StatusCode::Success.is_terminal());
        assert!(StatusCode::FileTooBig.is_terminal());
    }

    #[test]
    fn new_is_rejected_as_an_update_target() {
        assert_eq!(StatusCode::New.update_class(), UpdateClass::Rejected);
    }
}
