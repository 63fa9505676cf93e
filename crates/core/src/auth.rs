//! Authentication context shared by every outbound request.
//!
//! The credential is obtained outside this crate (login, token store, environment) and is only
//! ever read here. The controller holds a single `AuthContext` and hands a reference to each
//! call it makes.

use crate::{ConsultError, ConsultResult};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Prefix used in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <credential>`
    Bearer,
    /// `Authorization: Token <credential>` (Django REST framework style)
    Token,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Bearer => "Bearer",
            AuthScheme::Token => "Token",
        }
    }
}

impl FromStr for AuthScheme {
    type Err = ConsultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(AuthScheme::Bearer),
            "token" => Ok(AuthScheme::Token),
            other => Err(ConsultError::InvalidConfig(format!(
                "unknown auth scheme '{other}' (expected bearer or token)"
            ))),
        }
    }
}

/// Read-only credential plus the scheme it is presented with.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthContext {
    scheme: AuthScheme,
    credential: Arc<str>,
}

impl AuthContext {
    /// Wrap a credential. Blank credentials are rejected; an unauthenticated session should not
    /// be constructed at all.
    pub fn new(scheme: AuthScheme, credential: impl AsRef<str>) -> ConsultResult<Self> {
        let credential = credential.as_ref().trim();
        if credential.is_empty() {
            return Err(ConsultError::Authentication("no credential available".into()));
        }
        Ok(Self {
            scheme,
            credential: Arc::from(credential),
        })
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.scheme.as_str(), self.credential)
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("scheme", &self.scheme)
            .field("credential", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value_uses_scheme() {
        let bearer = AuthContext::new(AuthScheme::Bearer, "abc").unwrap();
        let token = AuthContext::new(AuthScheme::Token, " abc ").unwrap();

        assert_eq!(bearer.header_value(), "Bearer abc");
        assert_eq!(token.header_value(), "Token abc");
    }

    #[test]
    fn test_blank_credential_rejected() {
        let result = AuthContext::new(AuthScheme::Bearer, "  ");
        assert!(matches!(result, Err(ConsultError::Authentication(_))));
    }

    #[test]
    fn test_debug_redacts_credential() {
        let ctx = AuthContext::new(AuthScheme::Bearer, "super-secret").unwrap();
        let rendered = format!("{ctx:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }
}
