//! Request and response bodies that only exist on the wire.

use consult_core::{PatientId, RelatedRecord};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    pub key: String,
}

#[derive(Serialize)]
pub(crate) struct KeywordsRequest<'a> {
    pub keywords: &'a [String],
}

/// The keyword endpoint answers with either a bare list or a wrapped one.
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum KeywordsResponse {
    List(Vec<String>),
    Wrapped { keywords: Vec<String> },
}

impl KeywordsResponse {
    pub fn into_keywords(self) -> Vec<String> {
        match self {
            KeywordsResponse::List(k) | KeywordsResponse::Wrapped { keywords: k } => k,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct RelatedRecordsRequest<'a> {
    pub patient_id: &'a PatientId,
    pub keywords: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct RelatedRecordsResponse {
    #[serde(default)]
    pub related_records: Vec<RelatedRecord>,
}
