/// The unit of work handed from the dispatcher to a worker.
///
/// `None` signals "no submission available" and is also reused as the
/// shutdown nudge sent to unblock workers that are parked on a receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDescriptor {
    None,
    Available(Job),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub submission_id: u64,
    pub client_id: String,
    pub file_path: String,
}

impl JobDescriptor {
    pub fn available(submission_id: u64, client_id: String, file_path: String) -> Self {
        Self::Available(Job {
            submission_id,
            client_id,
            file_path,
        })
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn job(&self) -> Option<&Job> {
        match self {
            Self::Available(job) => Some(job),
            Self::None => None,
        }
    }
}

/// Client identifiers longer than this are truncated when claimed off the
/// queue table (§4.1).
pub const MAX_CLIENT_ID_BYTES: usize = 254;
/// File paths longer than this are truncated when claimed off the queue
/// table (§4.1).
pub const MAX_FILE_PATH_BYTES: usize = 4094;

/// Truncates `s` to at most `max_bytes` bytes without splitting a UTF-8
/// character.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_not_available() {
        assert!(!JobDescriptor::None.is_available());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let s = "h\u{e9}llo"; // 'é' is 2 bytes
        let truncated = truncate_bytes(s, 2);
        assert!(truncated.len() <= 2);
        assert!(String::from_utf8(truncated.into_bytes()).is_ok());
    }
}
