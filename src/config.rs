use crate::env::{
    env_or, APM_CAPTURE_BODY_ENV, APM_SOURCE_LINES_ERROR_APP_FRAMES_ENV,
    APM_SOURCE_LINES_ERROR_LIBRARY_FRAMES_ENV, APM_STACK_RESOLVE_TIMEOUT_MS_ENV,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

const MIN_RESOLVE_TIMEOUT: Duration = Duration::from_millis(10);
const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 1000;

/// What kind of report a capture belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Error,
    Transaction,
}

/// Body capture policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureBody {
    #[default]
    Off,
    Errors,
    Transactions,
    All,
}

impl CaptureBody {
    /// Whether bodies may be recorded for a report of `kind`.
    pub fn allows(self, kind: EventKind) -> bool {
        match (self, kind) {
            (CaptureBody::All, _) => true,
            (CaptureBody::Errors, EventKind::Error) => true,
            (CaptureBody::Transactions, EventKind::Transaction) => true,
            _ => false,
        }
    }
}

impl FromStr for CaptureBody {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(CaptureBody::Off),
            "errors" => Ok(CaptureBody::Errors),
            "transactions" => Ok(CaptureBody::Transactions),
            "all" => Ok(CaptureBody::All),
            _ => Err(ConfigError::InvalidCaptureBody(s.to_string())),
        }
    }
}

/// Normalizer settings.
///
/// **Fields**
/// - `capture_body`: policy deciding when request bodies are recorded.
/// - `source_lines_app_frames`: lines of source context attached to
///   application frames (0 disables).
/// - `source_lines_library_frames`: same for library frames.
/// - `stack_resolve_timeout`: upper bound on asynchronous stack resolution;
///   values below 10ms are raised to 10ms.
#[derive(Clone, Debug)]
pub struct NormalizeConfig {
    pub capture_body: CaptureBody,
    pub source_lines_app_frames: usize,
    pub source_lines_library_frames: usize,
    pub stack_resolve_timeout: Duration,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            capture_body: CaptureBody::Off,
            source_lines_app_frames: 5,
            source_lines_library_frames: 0,
            stack_resolve_timeout: Duration::from_millis(DEFAULT_RESOLVE_TIMEOUT_MS),
        }
    }
}

impl NormalizeConfig {
    /// Build a config from `APM_*` environment variables, falling back to
    /// [`NormalizeConfig::default`] for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let capture_body = env_or(APM_CAPTURE_BODY_ENV, "off").parse()?;
        let source_lines_app_frames =
            parse_number(APM_SOURCE_LINES_ERROR_APP_FRAMES_ENV, defaults.source_lines_app_frames)?;
        let source_lines_library_frames = parse_number(
            APM_SOURCE_LINES_ERROR_LIBRARY_FRAMES_ENV,
            defaults.source_lines_library_frames,
        )?;
        let timeout_ms = parse_number(APM_STACK_RESOLVE_TIMEOUT_MS_ENV, DEFAULT_RESOLVE_TIMEOUT_MS)?;

        Ok(Self {
            capture_body,
            source_lines_app_frames,
            source_lines_library_frames,
            stack_resolve_timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Effective resolution bound, with the minimum enforced.
    pub fn resolve_timeout(&self) -> Duration {
        self.stack_resolve_timeout.max(MIN_RESOLVE_TIMEOUT)
    }

    /// Source context lines for a frame of the given kind.
    pub fn source_lines(&self, library_frame: bool) -> usize {
        if library_frame {
            self.source_lines_library_frames
        } else {
            self.source_lines_app_frames
        }
    }
}

/// Parse a numeric variable in its target type, so values that do not fit
/// are rejected instead of truncated.
fn parse_number<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + ToString,
{
    let raw = env_or(key, &default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { key, value: raw })
}

/// Error returned when configuration values cannot be parsed.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid capture body mode {0:?}, expected off, errors, transactions or all")]
    InvalidCaptureBody(String),

    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_body_policy_matrix() {
        assert!(!CaptureBody::Off.allows(EventKind::Error));
        assert!(!CaptureBody::Off.allows(EventKind::Transaction));
        assert!(CaptureBody::Errors.allows(EventKind::Error));
        assert!(!CaptureBody::Errors.allows(EventKind::Transaction));
        assert!(!CaptureBody::Transactions.allows(EventKind::Error));
        assert!(CaptureBody::Transactions.allows(EventKind::Transaction));
        assert!(CaptureBody::All.allows(EventKind::Error));
        assert!(CaptureBody::All.allows(EventKind::Transaction));
    }

    #[test]
    fn capture_body_parses_case_insensitively() {
        assert_eq!(" ALL ".parse::<CaptureBody>(), Ok(CaptureBody::All));
        assert_eq!("Errors".parse::<CaptureBody>(), Ok(CaptureBody::Errors));
        assert_eq!(
            "sometimes".parse::<CaptureBody>(),
            Err(ConfigError::InvalidCaptureBody("sometimes".to_string()))
        );
    }

    #[test]
    fn capture_body_serde_is_lowercase() {
        let json = serde_json::to_string(&CaptureBody::Transactions).unwrap();
        assert_eq!(json, "\"transactions\"");
        let back: CaptureBody = serde_json::from_str("\"errors\"").unwrap();
        assert_eq!(back, CaptureBody::Errors);
    }

    #[test]
    fn resolve_timeout_has_a_floor() {
        let config = NormalizeConfig {
            stack_resolve_timeout: Duration::from_millis(1),
            ..NormalizeConfig::default()
        };
        assert_eq!(config.resolve_timeout(), Duration::from_millis(10));
        assert_eq!(NormalizeConfig::default().resolve_timeout(), Duration::from_secs(1));
    }

    // The only test touching APM_* variables, so it cannot race with others.
    #[test]
    fn from_env_reads_overrides_and_rejects_garbage() {
        let vars = [
            APM_CAPTURE_BODY_ENV,
            APM_SOURCE_LINES_ERROR_APP_FRAMES_ENV,
            APM_SOURCE_LINES_ERROR_LIBRARY_FRAMES_ENV,
            APM_STACK_RESOLVE_TIMEOUT_MS_ENV,
        ];
        for var in vars {
            std::env::remove_var(var);
        }

        let defaults = NormalizeConfig::from_env().unwrap();
        assert_eq!(defaults.capture_body, CaptureBody::Off);
        assert_eq!(defaults.source_lines_app_frames, 5);
        assert_eq!(defaults.source_lines_library_frames, 0);
        assert_eq!(defaults.stack_resolve_timeout, Duration::from_secs(1));

        std::env::set_var(APM_CAPTURE_BODY_ENV, "Transactions");
        std::env::set_var(APM_SOURCE_LINES_ERROR_APP_FRAMES_ENV, "7");
        std::env::set_var(APM_SOURCE_LINES_ERROR_LIBRARY_FRAMES_ENV, " 3 ");
        std::env::set_var(APM_STACK_RESOLVE_TIMEOUT_MS_ENV, "250");
        let config = NormalizeConfig::from_env().unwrap();
        assert_eq!(config.capture_body, CaptureBody::Transactions);
        assert_eq!(config.source_lines_app_frames, 7);
        assert_eq!(config.source_lines_library_frames, 3);
        assert_eq!(config.stack_resolve_timeout, Duration::from_millis(250));

        std::env::set_var(APM_SOURCE_LINES_ERROR_APP_FRAMES_ENV, "-1");
        assert_eq!(
            NormalizeConfig::from_env().unwrap_err(),
            ConfigError::InvalidNumber {
                key: APM_SOURCE_LINES_ERROR_APP_FRAMES_ENV,
                value: "-1".to_string(),
            }
        );

        std::env::set_var(APM_SOURCE_LINES_ERROR_APP_FRAMES_ENV, "5");
        std::env::set_var(APM_STACK_RESOLVE_TIMEOUT_MS_ENV, "99999999999999999999");
        assert!(matches!(
            NormalizeConfig::from_env(),
            Err(ConfigError::InvalidNumber { key: APM_STACK_RESOLVE_TIMEOUT_MS_ENV, .. })
        ));

        std::env::set_var(APM_CAPTURE_BODY_ENV, "sometimes");
        assert_eq!(
            NormalizeConfig::from_env().unwrap_err(),
            ConfigError::InvalidCaptureBody("sometimes".to_string())
        );

        for var in vars {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn source_lines_depend_on_frame_kind() {
        let config = NormalizeConfig::default();
        assert_eq!(config.source_lines(false), 5);
        assert_eq!(config.source_lines(true), 0);
    }
}
