//! Remote service seam.
//!
//! Every call carries the clinician's [`AuthContext`]. Implementations map their transport
//! failures onto [`ConsultError`](crate::ConsultError) variants; the session never sees raw
//! transport errors.

use crate::auth::AuthContext;
use crate::models::{
    Acknowledgement, GenerationRequest, Patient, PatientHistory, PatientId, PharmacyOrder,
    PrescriptionDraft, RelatedRecord,
};
use crate::ConsultResult;
use async_trait::async_trait;

#[async_trait]
pub trait ConsultationApi: Send + Sync {
    async fn list_patients(&self, auth: &AuthContext) -> ConsultResult<Vec<Patient>>;

    async fn fetch_patient(&self, auth: &AuthContext, id: &PatientId) -> ConsultResult<Patient>;

    async fn fetch_patient_history(
        &self,
        auth: &AuthContext,
        id: &PatientId,
    ) -> ConsultResult<PatientHistory>;

    /// Next candidate set for the given ordered selection.
    async fn fetch_keyword_candidates(
        &self,
        auth: &AuthContext,
        selection: &[String],
    ) -> ConsultResult<Vec<String>>;

    /// Records related to `keywords` (comma-joined).
    async fn fetch_related_records(
        &self,
        auth: &AuthContext,
        id: &PatientId,
        keywords: &str,
    ) -> ConsultResult<Vec<RelatedRecord>>;

    async fn generate_prescription(
        &self,
        auth: &AuthContext,
        request: &GenerationRequest,
    ) -> ConsultResult<PrescriptionDraft>;

    async fn send_to_pharmacy(
        &self,
        auth: &AuthContext,
        order: &PharmacyOrder,
    ) -> ConsultResult<Acknowledgement>;
}
