//! reqwest-backed consultation API.

use crate::errors::{check_status, decode, rejection_message, transport};
use crate::wire::{
    KeywordsRequest, KeywordsResponse, LoginRequest, LoginResponse, RelatedRecordsRequest,
    RelatedRecordsResponse,
};
use async_trait::async_trait;
use consult_core::constants::{
    GENERATE_PRESCRIPTION_PATH, KEYWORDS_PATH, LOGIN_PATH, PATIENT_DETAIL_PATH,
    PATIENT_HISTORY_PATH, PATIENT_LIST_PATH, RELATED_RECORDS_PATH, SEND_TO_PHARMACY_PATH,
};
use consult_core::{
    Acknowledgement, AuthContext, ConsultError, ConsultResult, ConsultationApi, CoreConfig,
    GenerationRequest, Patient, PatientHistory, PatientId, PharmacyOrder, PrescriptionDraft,
    RelatedRecord,
};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// HTTP client for the consultation backend.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct HttpConsultationApi {
    client: reqwest::Client,
    config: Arc<CoreConfig>,
}

impl HttpConsultationApi {
    pub fn new(config: Arc<CoreConfig>) -> ConsultResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConsultError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Resolve a `{id}` path template. The id is pushed as a single, percent-encoded segment.
    fn patient_url(&self, template: &str, id: &PatientId) -> ConsultResult<reqwest::Url> {
        let invalid = || {
            ConsultError::InvalidConfig(format!(
                "base URL cannot carry a path: {}",
                self.config.base_url()
            ))
        };
        let mut url = reqwest::Url::parse(self.config.base_url()).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(template.split('/').map(|segment| match segment {
                "{id}" => id.as_str(),
                other => other,
            }));
        Ok(url)
    }

    /// Exchange username and password for a credential.
    pub async fn login(&self, username: &str, password: &str) -> ConsultResult<AuthContext> {
        let url = self.config.endpoint(LOGIN_PATH);
        tracing::info!(%username, "logging in");
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "login rejected");
            return Err(ConsultError::Authentication(format!(
                "invalid username or password ({})",
                rejection_message(status, &body)
            )));
        }
        let login: LoginResponse = decode(check_status(response).await?).await?;
        AuthContext::new(self.config.auth_scheme(), login.key)
    }

    async fn get_json<T: DeserializeOwned>(&self, auth: &AuthContext, url: &str) -> ConsultResult<T> {
        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, auth.header_value())
            .send()
            .await
            .map_err(transport)?;
        decode(check_status(response).await?).await
    }

    async fn post_json<B, T>(&self, auth: &AuthContext, url: &str, body: &B) -> ConsultResult<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(%url, "POST");
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, auth.header_value())
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(check_status(response).await?).await
    }
}

#[async_trait]
impl ConsultationApi for HttpConsultationApi {
    async fn list_patients(&self, auth: &AuthContext) -> ConsultResult<Vec<Patient>> {
        self.get_json(auth, &self.config.endpoint(PATIENT_LIST_PATH))
            .await
    }

    async fn fetch_patient(&self, auth: &AuthContext, id: &PatientId) -> ConsultResult<Patient> {
        let url = self.patient_url(PATIENT_DETAIL_PATH, id)?;
        self.get_json(auth, url.as_str()).await
    }

    async fn fetch_patient_history(
        &self,
        auth: &AuthContext,
        id: &PatientId,
    ) -> ConsultResult<PatientHistory> {
        let url = self.patient_url(PATIENT_HISTORY_PATH, id)?;
        self.get_json(auth, url.as_str()).await
    }

    async fn fetch_keyword_candidates(
        &self,
        auth: &AuthContext,
        selection: &[String],
    ) -> ConsultResult<Vec<String>> {
        let body = KeywordsRequest {
            keywords: selection,
        };
        let response: KeywordsResponse = self
            .post_json(auth, &self.config.endpoint(KEYWORDS_PATH), &body)
            .await?;
        Ok(response.into_keywords())
    }

    async fn fetch_related_records(
        &self,
        auth: &AuthContext,
        id: &PatientId,
        keywords: &str,
    ) -> ConsultResult<Vec<RelatedRecord>> {
        let body = RelatedRecordsRequest {
            patient_id: id,
            keywords,
        };
        let response: RelatedRecordsResponse = self
            .post_json(auth, &self.config.endpoint(RELATED_RECORDS_PATH), &body)
            .await?;
        Ok(response.related_records)
    }

    async fn generate_prescription(
        &self,
        auth: &AuthContext,
        request: &GenerationRequest,
    ) -> ConsultResult<PrescriptionDraft> {
        self.post_json(auth, &self.config.endpoint(GENERATE_PRESCRIPTION_PATH), request)
            .await
    }

    async fn send_to_pharmacy(
        &self,
        auth: &AuthContext,
        order: &PharmacyOrder,
    ) -> ConsultResult<Acknowledgement> {
        self.post_json(auth, &self.config.endpoint(SEND_TO_PHARMACY_PATH), order)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use consult_core::AuthScheme;
    use serde_json::{json, Value};
    use std::time::Duration;

    const TOKEN: &str = "abc123";

    async fn serve(app: Router) -> HttpConsultationApi {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let config = CoreConfig::new(
            format!("http://{addr}"),
            Duration::from_secs(5),
            10,
            AuthScheme::Token,
        )
        .unwrap();
        HttpConsultationApi::new(Arc::new(config)).unwrap()
    }

    fn auth() -> AuthContext {
        AuthContext::new(AuthScheme::Token, TOKEN).unwrap()
    }

    fn authorised(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Token {TOKEN}"))
            .unwrap_or(false)
    }

    fn unauthorised() -> Response {
        (
            axum::http::StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid token."})),
        )
            .into_response()
    }

    #[tokio::test]
    async fn test_login_returns_context_with_configured_scheme() {
        let app = Router::new().route(
            "/auth/login/",
            post(|Json(body): Json<Value>| async move {
                if body["username"] == "drsmith" && body["password"] == "pw" {
                    Json(json!({"key": TOKEN})).into_response()
                } else {
                    (
                        axum::http::StatusCode::BAD_REQUEST,
                        Json(json!({"non_field_errors": ["Unable to log in"]})),
                    )
                        .into_response()
                }
            }),
        );
        let api = serve(app).await;

        let ctx = api.login("drsmith", "pw").await.unwrap();
        assert_eq!(ctx.header_value(), "Token abc123");

        let err = api.login("drsmith", "wrong").await.unwrap_err();
        assert!(matches!(err, ConsultError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_list_patients_sends_credential() {
        let app = Router::new().route(
            "/patients/list",
            get(|headers: HeaderMap| async move {
                if !authorised(&headers) {
                    return unauthorised();
                }
                Json(json!([
                    {"id": 1, "name": "Ana Silva", "age": 34, "case_summary": "migraine"},
                    {"id": "P-7", "name": "Ben Okafor"}
                ]))
                .into_response()
            }),
        );
        let api = serve(app).await;

        let patients = api.list_patients(&auth()).await.unwrap();
        assert_eq!(patients.len(), 2);
        assert_eq!(patients[0].id, PatientId::from(1));
        assert_eq!(patients[0].case_summary, "migraine");
        assert_eq!(patients[1].id.as_str(), "P-7");

        let wrong = AuthContext::new(AuthScheme::Token, "other").unwrap();
        let err = api.list_patients(&wrong).await.unwrap_err();
        assert_eq!(err, ConsultError::Authentication("Invalid token.".into()));
    }

    #[tokio::test]
    async fn test_patient_detail_and_history_paths() {
        let app = Router::new()
            .route(
                "/patients/:id/",
                get(|Path(id): Path<String>| async move {
                    Json(json!({"id": id.parse::<u64>().unwrap(), "name": "Cara", "caseSummary": "asthma"}))
                }),
            )
            .route(
                "/patients/:id/history/",
                get(|| async {
                    Json(json!({
                        "previousDiagnosis": ["Asthma"],
                        "allergies": ["Penicillin"],
                        "medications": [],
                        "reports": [{"type": "Spirometry", "date": "2024-10-01", "status": "Normal"}]
                    }))
                }),
            );
        let api = serve(app).await;
        let id = PatientId::from(42);

        let patient = api.fetch_patient(&auth(), &id).await.unwrap();
        assert_eq!(patient.id, id);
        assert_eq!(patient.case_summary, "asthma");

        let history = api.fetch_patient_history(&auth(), &id).await.unwrap();
        assert_eq!(history.diagnoses, vec!["Asthma"]);
        assert_eq!(history.reports[0].kind, "Spirometry");
    }

    #[tokio::test]
    async fn test_opaque_patient_id_stays_one_path_segment() {
        let app = Router::new().route(
            "/patients/:id/",
            get(|Path(id): Path<String>| async move { Json(json!({"id": id, "name": "Dev"})) }),
        );
        let api = serve(app).await;
        let id = PatientId::new("A/B?x#1").unwrap();

        let url = api.patient_url(PATIENT_HISTORY_PATH, &id).unwrap();
        assert!(url.as_str().ends_with("/patients/A%2FB%3Fx%231/history/"));

        let patient = api.fetch_patient(&auth(), &id).await.unwrap();
        assert_eq!(patient.id.as_str(), "A/B?x#1");
    }

    #[tokio::test]
    async fn test_keyword_candidates_both_shapes() {
        let app = Router::new().route(
            "/getkeywords/",
            post(|Json(body): Json<Value>| async move {
                let selection = body["keywords"].as_array().cloned().unwrap_or_default();
                if selection.is_empty() {
                    Json(json!(["fever", "cough"]))
                } else {
                    Json(json!({"keywords": ["chills"], "echo": selection}))
                }
            }),
        );
        let api = serve(app).await;

        let initial = api.fetch_keyword_candidates(&auth(), &[]).await.unwrap();
        assert_eq!(initial, vec!["fever", "cough"]);

        let next = api
            .fetch_keyword_candidates(&auth(), &["fever".to_string()])
            .await
            .unwrap();
        assert_eq!(next, vec!["chills"]);
    }

    #[tokio::test]
    async fn test_related_records_request_body() {
        let app = Router::new().route(
            "/getrelatedrecords/",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["patient_id"], json!(5));
                assert_eq!(body["keywords"], json!("fever,cough"));
                Json(json!({"related_records": [{"id": 9, "content": "2021 pneumonia"}]}))
            }),
        );
        let api = serve(app).await;

        let records = api
            .fetch_related_records(&auth(), &PatientId::from(5), "fever,cough")
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "2021 pneumonia");
    }

    #[tokio::test]
    async fn test_generation_rejection_carries_detail() {
        let app = Router::new().route(
            "/generateprescription/",
            post(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"detail": "model offline"})),
                )
            }),
        );
        let api = serve(app).await;
        let request = GenerationRequest {
            case_summary: "cough".into(),
            transcript: String::new(),
            keyword_list: vec!["cough".into()],
            medical_history: None,
        };

        let err = api.generate_prescription(&auth(), &request).await.unwrap_err();
        assert_eq!(
            err,
            ConsultError::ServerRejection {
                status: 500,
                message: "model offline".into()
            }
        );
    }

    #[tokio::test]
    async fn test_generation_parses_draft() {
        let app = Router::new().route(
            "/generateprescription/",
            post(|Json(body): Json<Value>| async move {
                assert!(body.get("medical_history").is_none());
                Json(json!({
                    "diagnosis": "Acute bronchitis",
                    "medications": [
                        {"name": "Dextromethorphan", "dosage": "10ml", "eatingTiming": "After food"}
                    ],
                    "recommendations": ["Rest"]
                }))
            }),
        );
        let api = serve(app).await;
        let request = GenerationRequest {
            case_summary: "cough".into(),
            transcript: "dry cough".into(),
            keyword_list: vec!["cough".into()],
            medical_history: None,
        };

        let draft = api.generate_prescription(&auth(), &request).await.unwrap();
        assert_eq!(draft.diagnosis, "Acute bronchitis");
        assert_eq!(draft.medications[0].timing, "After food");
        assert_eq!(draft.recommendations, vec!["Rest"]);
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let app = Router::new().route("/patients/list", get(|| async { "not json" }));
        let api = serve(app).await;

        let err = api.list_patients(&auth()).await.unwrap_err();
        assert!(matches!(err, ConsultError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let config = CoreConfig::new(
            format!("http://{addr}"),
            Duration::from_secs(2),
            10,
            AuthScheme::Bearer,
        )
        .unwrap();
        let api = HttpConsultationApi::new(Arc::new(config)).unwrap();

        let err = api.list_patients(&auth()).await.unwrap_err();
        assert!(matches!(err, ConsultError::Network(_)));
    }
}
