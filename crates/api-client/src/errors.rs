//! Mapping of HTTP outcomes onto `ConsultError`.

use consult_core::ConsultError;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

pub(crate) fn transport(e: reqwest::Error) -> ConsultError {
    if e.is_timeout() {
        ConsultError::Network(format!("request timed out: {e}"))
    } else if e.is_connect() {
        ConsultError::Network(format!("could not connect to backend: {e}"))
    } else if e.is_decode() {
        ConsultError::MalformedResponse(e.to_string())
    } else {
        ConsultError::Network(e.to_string())
    }
}

/// Message for a rejected request: the body's `detail` field when present, else the raw body.
pub(crate) fn rejection_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_owned));
    match detail {
        Some(detail) => detail,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    }
}

/// Pass successful responses through; turn everything else into an error.
pub(crate) async fn check_status(response: Response) -> Result<Response, ConsultError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = rejection_message(status, &body);
    if status == StatusCode::UNAUTHORIZED {
        return Err(ConsultError::Authentication(message));
    }
    Err(ConsultError::ServerRejection {
        status: status.as_u16(),
        message,
    })
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ConsultError> {
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| ConsultError::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_prefers_detail() {
        let msg = rejection_message(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "keywords must not be empty"}"#,
        );
        assert_eq!(msg, "keywords must not be empty");
    }

    #[test]
    fn test_rejection_falls_back_to_body_then_reason() {
        assert_eq!(
            rejection_message(StatusCode::BAD_GATEWAY, "  upstream down \n"),
            "upstream down"
        );
        assert_eq!(
            rejection_message(StatusCode::SERVICE_UNAVAILABLE, ""),
            "Service Unavailable"
        );
        assert_eq!(
            rejection_message(StatusCode::BAD_REQUEST, r#"{"error": "nope"}"#),
            r#"{"error": "nope"}"#
        );
    }
}
