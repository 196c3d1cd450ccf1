//! Environment variable names read by
//! [`NormalizeConfig::from_env`](crate::config::NormalizeConfig::from_env).
//!
//! These are purely helpers; the normalizers themselves never touch the
//! environment.

/// Body capture policy: `off`, `errors`, `transactions` or `all`.
pub const APM_CAPTURE_BODY_ENV: &str = "APM_CAPTURE_BODY";

/// Lines of source context attached to application frames.
pub const APM_SOURCE_LINES_ERROR_APP_FRAMES_ENV: &str = "APM_SOURCE_LINES_ERROR_APP_FRAMES";

/// Lines of source context attached to library frames.
pub const APM_SOURCE_LINES_ERROR_LIBRARY_FRAMES_ENV: &str = "APM_SOURCE_LINES_ERROR_LIBRARY_FRAMES";

/// Upper bound on stack resolution, in milliseconds.
pub const APM_STACK_RESOLVE_TIMEOUT_MS_ENV: &str = "APM_STACK_RESOLVE_TIMEOUT_MS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
