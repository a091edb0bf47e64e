//! Error classification shared by every remote call site.
//!
//! All message matching lives here so the rules can be tested in one place.
//! Matching is case-insensitive and evaluated in a fixed order: user rejection
//! always wins over anything that would otherwise look retryable.

use std::fmt;

/// Class of a failed remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The user explicitly rejected the request in their wallet
    UserRejected,
    /// The execution provider has no record of the batch handle
    UnknownHandle,
    /// HTTP 429 or an equivalent provider throttle
    RateLimited,
    /// Timeouts, resets and name resolution failures
    Network,
    /// 5xx and generic upstream/RPC failures
    Upstream,
    /// Anything else; never retried
    Fatal,
}

impl ErrorClass {
    /// Whether `with_retry` may attempt the operation again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorClass::RateLimited | ErrorClass::Network | ErrorClass::Upstream
        )
    }

    /// Whether a failure of this class counts against a circuit breaker.
    ///
    /// Wallet rejections and forgotten handles say nothing about provider health.
    pub fn trips_breaker(&self) -> bool {
        !matches!(self, ErrorClass::UserRejected | ErrorClass::UnknownHandle)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::UserRejected => "user_rejected",
            ErrorClass::UnknownHandle => "unknown_handle",
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::Network => "network",
            ErrorClass::Upstream => "upstream",
            ErrorClass::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can be classified for retry and breaker decisions
pub trait Classify {
    fn classify(&self) -> ErrorClass;
}

impl Classify for str {
    fn classify(&self) -> ErrorClass {
        classify_error(self)
    }
}

impl Classify for String {
    fn classify(&self) -> ErrorClass {
        classify_error(self)
    }
}

impl<T: Classify + ?Sized> Classify for &T {
    fn classify(&self) -> ErrorClass {
        (**self).classify()
    }
}

const USER_REJECTED_PATTERNS: &[&str] = &[
    "user denied",
    "user rejected",
    "rejected by user",
    "action_rejected",
];

const SUBMISSION_REJECTED_PATTERNS: &[&str] = &["rejected", "denied", "cancelled", "canceled"];

const UNKNOWN_HANDLE_PATTERNS: &[&str] = &[
    "unknown bundle",
    "unknown batch",
    "unknown call bundle",
    "bundle id not found",
    "batch not found",
];

const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "too many requests"];

const NETWORK_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "econnreset",
    "connection refused",
    "econnrefused",
    "enotfound",
    "dns",
    "network error",
    "failed to fetch",
    "socket hang up",
];

const UPSTREAM_PATTERNS: &[&str] = &[
    "internal server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "rpc error",
];

/// Classify an error message.
pub fn classify_error(message: &str) -> ErrorClass {
    let msg = message.to_lowercase();

    if contains_any(&msg, USER_REJECTED_PATTERNS) || contains_code(&msg, "4001") {
        return ErrorClass::UserRejected;
    }

    if contains_any(&msg, UNKNOWN_HANDLE_PATTERNS) || contains_code(&msg, "5730") {
        return ErrorClass::UnknownHandle;
    }

    if contains_any(&msg, RATE_LIMIT_PATTERNS)
        || contains_code(&msg, "429")
        || contains_code(&msg, "-32005")
    {
        return ErrorClass::RateLimited;
    }

    if contains_any(&msg, NETWORK_PATTERNS) {
        return ErrorClass::Network;
    }

    if contains_any(&msg, UPSTREAM_PATTERNS)
        || ["500", "502", "503", "504", "-32603"]
            .iter()
            .any(|code| contains_code(&msg, code))
    {
        return ErrorClass::Upstream;
    }

    ErrorClass::Fatal
}

/// Classify an error raised while submitting a batch.
///
/// Wallets phrase rejection loosely at signing time, so any rejection-like
/// wording counts as the user cancelling.
pub fn classify_submission_error(message: &str) -> ErrorClass {
    let msg = message.to_lowercase();
    if contains_any(&msg, SUBMISSION_REJECTED_PATTERNS) {
        return ErrorClass::UserRejected;
    }
    classify_error(message)
}

fn contains_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}

/// Match a numeric code that is not part of a longer number or hex string.
fn contains_code(haystack: &str, code: &str) -> bool {
    let bytes = haystack.as_bytes();
    haystack.match_indices(code).any(|(start, _)| {
        let end = start + code.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let after_ok = end == bytes.len() || !bytes[end].is_ascii_alphanumeric();
        before_ok && after_ok
    })
}
