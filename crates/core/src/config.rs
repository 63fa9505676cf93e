//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the controller and
//! the HTTP client. Nothing in this crate reads environment variables; the binary hands the raw
//! values to the `*_from_env_value` helpers below.

use crate::auth::AuthScheme;
use crate::constants::{DEFAULT_BASE_URL, DEFAULT_RANDOM_PATIENT_MAX, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::{ConsultError, ConsultResult};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    base_url: String,
    request_timeout: Duration,
    random_patient_max: u32,
    auth_scheme: AuthScheme,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The base URL must be an absolute `http`/`https` URL; a trailing slash is stripped.
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        random_patient_max: u32,
        auth_scheme: AuthScheme,
    ) -> ConsultResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ConsultError::InvalidConfig("base URL cannot be empty".into()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConsultError::InvalidConfig(format!(
                "base URL must start with http:// or https:// (got {base_url})"
            )));
        }
        if request_timeout.is_zero() {
            return Err(ConsultError::InvalidConfig(
                "request timeout must be greater than zero".into(),
            ));
        }
        if random_patient_max == 0 {
            return Err(ConsultError::InvalidConfig(
                "random patient range must contain at least one identifier".into(),
            ));
        }

        Ok(Self {
            base_url,
            request_timeout,
            random_patient_max,
            auth_scheme,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join a relative endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn random_patient_max(&self) -> u32 {
        self.random_patient_max
    }

    pub fn auth_scheme(&self) -> AuthScheme {
        self.auth_scheme
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            random_patient_max: DEFAULT_RANDOM_PATIENT_MAX,
            auth_scheme: AuthScheme::Bearer,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Resolve the base URL from an optional raw value, falling back to the default.
pub fn base_url_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Parse the request timeout (whole seconds) from an optional raw value.
pub fn request_timeout_from_env_value(value: Option<String>) -> ConsultResult<Duration> {
    match non_blank(value) {
        None => Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        Some(v) => v.parse::<u64>().map(Duration::from_secs).map_err(|_| {
            ConsultError::InvalidConfig(format!("request timeout must be whole seconds (got {v})"))
        }),
    }
}

/// Parse the upper bound for random patient identifiers from an optional raw value.
pub fn random_patient_max_from_env_value(value: Option<String>) -> ConsultResult<u32> {
    match non_blank(value) {
        None => Ok(DEFAULT_RANDOM_PATIENT_MAX),
        Some(v) => v.parse::<u32>().map_err(|_| {
            ConsultError::InvalidConfig(format!("random patient max must be a number (got {v})"))
        }),
    }
}

/// Parse the credential scheme from an optional raw value. Blank means `bearer`.
pub fn auth_scheme_from_env_value(value: Option<String>) -> ConsultResult<AuthScheme> {
    non_blank(value)
        .map(|v| v.parse::<AuthScheme>())
        .transpose()
        .map(|scheme| scheme.unwrap_or(AuthScheme::Bearer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_strips_trailing_slash() {
        let cfg = CoreConfig::new(
            "http://localhost:8000/",
            Duration::from_secs(5),
            10,
            AuthScheme::Token,
        )
        .unwrap();

        assert_eq!(cfg.base_url(), "http://localhost:8000");
        assert_eq!(cfg.endpoint("/getkeywords/"), "http://localhost:8000/getkeywords/");
    }

    #[test]
    fn test_new_rejects_relative_url() {
        let result = CoreConfig::new("localhost:8000", Duration::from_secs(5), 10, AuthScheme::Bearer);
        assert!(matches!(result, Err(ConsultError::InvalidConfig(_))));
    }

    #[test]
    fn test_new_rejects_zero_timeout_and_empty_range() {
        assert!(CoreConfig::new("http://x", Duration::ZERO, 10, AuthScheme::Bearer).is_err());
        assert!(CoreConfig::new("http://x", Duration::from_secs(1), 0, AuthScheme::Bearer).is_err());
    }

    #[test]
    fn test_env_value_defaults() {
        assert_eq!(base_url_from_env_value(None), DEFAULT_BASE_URL);
        assert_eq!(base_url_from_env_value(Some("   ".into())), DEFAULT_BASE_URL);
        assert_eq!(
            request_timeout_from_env_value(None).unwrap(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert_eq!(
            random_patient_max_from_env_value(Some("".into())).unwrap(),
            DEFAULT_RANDOM_PATIENT_MAX
        );
        assert_eq!(auth_scheme_from_env_value(None).unwrap(), AuthScheme::Bearer);
    }

    #[test]
    fn test_env_value_parsing() {
        assert_eq!(
            request_timeout_from_env_value(Some(" 12 ".into())).unwrap(),
            Duration::from_secs(12)
        );
        assert!(request_timeout_from_env_value(Some("soon".into())).is_err());
        assert!(random_patient_max_from_env_value(Some("-4".into())).is_err());
        assert_eq!(
            auth_scheme_from_env_value(Some("Token".into())).unwrap(),
            AuthScheme::Token
        );
        assert!(auth_scheme_from_env_value(Some("basic".into())).is_err());
    }
}
