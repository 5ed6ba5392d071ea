//! Shared constants used across the application.

/// User agent sent with every outbound request.
pub const USER_AGENT: &str = concat!("likes-archiver/", env!("CARGO_PKG_VERSION"));

/// Extension used for downloaded files whose URL carried none.
pub const UNKNOWN_EXTENSION: &str = "unk";

/// How long to wait after a 429 when the API sends no reset time.
pub const RATE_LIMIT_FALLBACK_SECS: u64 = 60;
