//! Consultation session state machine.
//!
//! The session owns all consultation state and decides which responses may be applied. It does
//! no I/O itself: each operation is split into a `begin_*` call, which validates the transition
//! and returns the request to send together with its [`Ticket`], and a `complete_*` call, which
//! applies the response only if that ticket is still current.
//!
//! ```text
//! Idle --load--> Keywords --finish--> GeneratingPrescription --ok--> Prescription
//!                   ^                          |
//!                   +---------- error ---------+
//! ```
//!
//! A pending patient load is reported as `LoadingPatient`; if it fails the committed step is
//! untouched. A successful load bumps the session generation, which supersedes every request
//! issued for the previous patient.

use crate::composer::PrescriptionComposer;
use crate::history::MedicalHistoryChannel;
use crate::keywords::KeywordLoop;
use crate::models::{
    Acknowledgement, GenerationRequest, Patient, PatientHistory, PatientId, PharmacyOrder,
    PrescriptionDraft, RelatedRecord,
};
use crate::sequence::{RequestSequencer, Ticket};
use crate::{ConsultError, ConsultResult};
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

/// Result of feeding a response back into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Failed(ConsultError),
    /// A newer request (or a newer patient) made this response irrelevant; it was discarded.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    LoadingPatient,
    Keywords,
    GeneratingPrescription,
    Prescription,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::LoadingPatient => "loading patient",
            SessionState::Keywords => "keywords",
            SessionState::GeneratingPrescription => "generating prescription",
            SessionState::Prescription => "prescription",
        };
        f.write_str(name)
    }
}

/// Committed step; `LoadingPatient` is an overlay derived from the load channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Idle,
    Keywords,
    GeneratingPrescription,
    Prescription,
}

/// Where the next patient comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientSource {
    /// Identity already known (e.g. picked from the patient list).
    Known(Patient),
    /// Fetch the record first; keyword candidates are then seeded with an empty selection.
    Lookup(PatientId),
}

/// Everything a successful load produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPatient {
    pub patient: Patient,
    pub history: PatientHistory,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PendingLoad {
    pub ticket: Ticket,
    pub source: PatientSource,
}

#[derive(Debug, Clone)]
pub struct KeywordRefresh {
    pub ticket: Ticket,
    pub selection: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RelatedSearch {
    pub ticket: Ticket,
    pub patient_id: PatientId,
    pub keywords: Vec<String>,
}

impl RelatedSearch {
    /// Keywords in the comma-joined form the records service expects.
    pub fn joined_keywords(&self) -> String {
        self.keywords.join(",")
    }
}

#[derive(Debug, Clone)]
pub struct PendingGeneration {
    pub ticket: Ticket,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone)]
pub struct PendingDispatch {
    pub ticket: Ticket,
    pub order: PharmacyOrder,
}

/// Confirmation of a dispatched pharmacy order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub order_id: Uuid,
    pub medication_count: usize,
    pub message: String,
}

#[derive(Debug)]
pub struct ConsultationSession {
    generation: u64,
    step: Step,
    patient: Option<Patient>,
    keywords: KeywordLoop,
    history: MedicalHistoryChannel,
    transcript: String,
    composer: Option<PrescriptionComposer>,
    loads: RequestSequencer,
    refreshes: RequestSequencer,
    generations: RequestSequencer,
    dispatches: RequestSequencer,
    dispatching: Option<(Uuid, usize)>,
    last_error: Option<ConsultError>,
    last_receipt: Option<DispatchReceipt>,
}

impl Default for ConsultationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsultationSession {
    pub fn new() -> Self {
        Self {
            generation: 0,
            step: Step::Idle,
            patient: None,
            keywords: KeywordLoop::new(),
            history: MedicalHistoryChannel::new(),
            transcript: String::new(),
            composer: None,
            loads: RequestSequencer::new(),
            refreshes: RequestSequencer::new(),
            generations: RequestSequencer::new(),
            dispatches: RequestSequencer::new(),
            dispatching: None,
            last_error: None,
            last_receipt: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.loads.is_pending() {
            return SessionState::LoadingPatient;
        }
        match self.step {
            Step::Idle => SessionState::Idle,
            Step::Keywords => SessionState::Keywords,
            Step::GeneratingPrescription => SessionState::GeneratingPrescription,
            Step::Prescription => SessionState::Prescription,
        }
    }

    /// Bumped each time a new patient is committed.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn patient(&self) -> Option<&Patient> {
        self.patient.as_ref()
    }

    pub fn patient_history(&self) -> Option<&PatientHistory> {
        self.history.snapshot()
    }

    pub fn selected_keywords(&self) -> &[String] {
        self.keywords.selected()
    }

    pub fn candidates(&self) -> Vec<&str> {
        self.keywords.candidates()
    }

    pub fn keyword_loop(&self) -> &KeywordLoop {
        &self.keywords
    }

    pub fn is_refreshing_keywords(&self) -> bool {
        self.refreshes.is_pending()
    }

    pub fn history(&self) -> &MedicalHistoryChannel {
        &self.history
    }

    pub fn related_records(&self) -> &[RelatedRecord] {
        self.history.related_records()
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn composer(&self) -> Option<&PrescriptionComposer> {
        self.composer.as_ref()
    }

    /// Mutable access to the edit overlay; only while in the prescription step.
    pub fn composer_mut(&mut self) -> ConsultResult<&mut PrescriptionComposer> {
        if self.state() != SessionState::Prescription {
            return Err(ConsultError::validation(
                "prescription editing is only available in the prescription step",
            ));
        }
        self.composer
            .as_mut()
            .ok_or_else(|| ConsultError::validation("no prescription draft loaded"))
    }

    pub fn is_dispatching(&self) -> bool {
        self.dispatches.is_pending()
    }

    pub fn last_error(&self) -> Option<&ConsultError> {
        self.last_error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn last_receipt(&self) -> Option<&DispatchReceipt> {
        self.last_receipt.as_ref()
    }

    /// Append committed dictation to the session transcript.
    pub fn record_transcript(&mut self, committed: &str) {
        let committed = committed.trim();
        if committed.is_empty() {
            return;
        }
        if !self.transcript.is_empty() {
            self.transcript.push(' ');
        }
        self.transcript.push_str(committed);
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
    }

    /// Drop the patient and everything derived from it. The transcript is kept.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.step = Step::Idle;
        self.patient = None;
        self.keywords.reset(Vec::new());
        self.history.reset(None);
        self.composer = None;
        self.loads.invalidate();
        self.invalidate_patient_requests();
        self.last_error = None;
        self.last_receipt = None;
    }

    fn invalidate_patient_requests(&mut self) {
        self.refreshes.invalidate();
        self.generations.invalidate();
        self.dispatches.invalidate();
        self.dispatching = None;
    }

    fn require_keywords_step(&self, action: &str) -> ConsultResult<()> {
        match self.state() {
            SessionState::Keywords => Ok(()),
            SessionState::GeneratingPrescription => Err(ConsultError::validation(format!(
                "cannot {action}: prescription generation is in progress"
            ))),
            other => Err(ConsultError::validation(format!(
                "cannot {action} while {other}"
            ))),
        }
    }

    // ---- patient load -------------------------------------------------------------------

    /// Start loading a patient. A newer load supersedes an older pending one.
    pub fn begin_load(&mut self, source: PatientSource) -> PendingLoad {
        let ticket = self.loads.issue(self.generation);
        tracing::debug!(sequence = ticket.sequence(), "patient load issued");
        PendingLoad { ticket, source }
    }

    pub fn complete_load(
        &mut self,
        ticket: Ticket,
        result: ConsultResult<LoadedPatient>,
    ) -> Completion {
        if !self.loads.settle(ticket, self.generation) {
            tracing::debug!(sequence = ticket.sequence(), "discarding stale patient load");
            return Completion::Superseded;
        }

        match result {
            Ok(loaded) => {
                self.generation += 1;
                tracing::info!(
                    patient_id = %loaded.patient.id,
                    candidates = loaded.candidates.len(),
                    "patient loaded"
                );
                self.patient = Some(loaded.patient);
                self.keywords.reset(loaded.candidates);
                self.history.reset(Some(loaded.history));
                self.composer = None;
                self.invalidate_patient_requests();
                self.step = Step::Keywords;
                self.last_error = None;
                self.last_receipt = None;
                Completion::Applied
            }
            Err(e) => {
                tracing::warn!(error = %e, "patient load failed");
                self.last_error = Some(e.clone());
                Completion::Failed(e)
            }
        }
    }

    // ---- keyword loop -------------------------------------------------------------------

    pub fn begin_keyword(&mut self, keyword: &str) -> ConsultResult<KeywordRefresh> {
        self.require_keywords_step("select a keyword")?;
        let selection = self.keywords.select(keyword)?;
        let ticket = self.refreshes.issue(self.generation);
        tracing::debug!(
            sequence = ticket.sequence(),
            selected = selection.len(),
            "keyword refresh issued"
        );
        Ok(KeywordRefresh { ticket, selection })
    }

    pub fn complete_keyword(
        &mut self,
        ticket: Ticket,
        result: ConsultResult<Vec<String>>,
    ) -> Completion {
        if !self.refreshes.settle(ticket, self.generation) {
            tracing::debug!(sequence = ticket.sequence(), "discarding stale keyword candidates");
            return Completion::Superseded;
        }

        match result {
            Ok(candidates) => {
                self.keywords.replace_candidates(candidates);
                Completion::Applied
            }
            Err(e) => {
                tracing::warn!(error = %e, "keyword refresh failed");
                self.last_error = Some(e.clone());
                Completion::Failed(e)
            }
        }
    }

    // ---- related records ----------------------------------------------------------------

    pub fn begin_related_search(&mut self) -> ConsultResult<RelatedSearch> {
        self.require_keywords_step("fetch medical history")?;
        let patient_id = self
            .patient
            .as_ref()
            .map(|p| p.id.clone())
            .ok_or_else(|| ConsultError::validation("no patient loaded"))?;
        let keywords = self.keywords.selected().to_vec();
        let ticket = self.history.begin_search(self.generation, &keywords)?;
        Ok(RelatedSearch {
            ticket,
            patient_id,
            keywords,
        })
    }

    pub fn complete_related_search(
        &mut self,
        ticket: Ticket,
        result: ConsultResult<Vec<RelatedRecord>>,
    ) -> Completion {
        self.history.complete_search(self.generation, ticket, result)
    }

    // ---- prescription generation --------------------------------------------------------

    pub fn begin_generation(&mut self) -> ConsultResult<PendingGeneration> {
        self.require_keywords_step("finish selection")?;
        if self.keywords.selected().is_empty() {
            return Err(ConsultError::validation(
                "select at least one keyword before finishing",
            ));
        }
        let patient = self
            .patient
            .as_ref()
            .ok_or_else(|| ConsultError::validation("no patient loaded"))?;

        let request = GenerationRequest {
            case_summary: patient.case_summary.clone(),
            transcript: self.transcript.clone(),
            keyword_list: self.keywords.selected().to_vec(),
            medical_history: self.history.first_record_content(),
        };
        let ticket = self.generations.issue(self.generation);
        self.step = Step::GeneratingPrescription;
        self.last_error = None;
        tracing::info!(keywords = request.keyword_list.len(), "prescription generation issued");
        Ok(PendingGeneration { ticket, request })
    }

    pub fn complete_generation(
        &mut self,
        ticket: Ticket,
        result: ConsultResult<PrescriptionDraft>,
    ) -> Completion {
        if !self.generations.settle(ticket, self.generation) {
            tracing::debug!(sequence = ticket.sequence(), "discarding stale prescription draft");
            return Completion::Superseded;
        }

        match result {
            Ok(draft) => {
                tracing::info!(medications = draft.medications.len(), "prescription draft received");
                self.composer = Some(PrescriptionComposer::new(Arc::new(draft)));
                self.step = Step::Prescription;
                Completion::Applied
            }
            Err(e) => {
                tracing::warn!(error = %e, "prescription generation failed");
                self.step = Step::Keywords;
                self.last_error = Some(e.clone());
                Completion::Failed(e)
            }
        }
    }

    // ---- pharmacy dispatch --------------------------------------------------------------

    pub fn begin_dispatch(&mut self, issued_on: NaiveDate) -> ConsultResult<PendingDispatch> {
        if self.state() != SessionState::Prescription {
            return Err(ConsultError::validation(
                "nothing to dispatch outside the prescription step",
            ));
        }
        if self.dispatches.is_pending() {
            return Err(ConsultError::validation("a pharmacy dispatch is already in progress"));
        }
        let patient_id = self
            .patient
            .as_ref()
            .map(|p| p.id.clone())
            .ok_or_else(|| ConsultError::validation("no patient loaded"))?;
        let composer = self
            .composer
            .as_ref()
            .ok_or_else(|| ConsultError::validation("no prescription draft loaded"))?;

        let order = composer.build_order(&patient_id, issued_on)?;
        let ticket = self.dispatches.issue(self.generation);
        self.dispatching = Some((order.order_id, order.medications.len()));
        Ok(PendingDispatch { ticket, order })
    }

    pub fn complete_dispatch(
        &mut self,
        ticket: Ticket,
        result: ConsultResult<Acknowledgement>,
    ) -> Completion {
        if !self.dispatches.settle(ticket, self.generation) {
            tracing::debug!(sequence = ticket.sequence(), "discarding stale pharmacy acknowledgement");
            return Completion::Superseded;
        }
        let dispatched = self.dispatching.take();

        match (result, dispatched) {
            (Ok(ack), Some((order_id, medication_count))) => {
                tracing::info!(%order_id, medication_count, "prescription sent to pharmacy");
                self.last_receipt = Some(DispatchReceipt {
                    order_id,
                    medication_count,
                    message: ack.message,
                });
                Completion::Applied
            }
            (Ok(_), None) => Completion::Superseded,
            (Err(e), _) => {
                tracing::warn!(error = %e, "pharmacy dispatch failed");
                self.last_error = Some(e.clone());
                Completion::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Medication;

    fn patient(id: u32, summary: &str) -> Patient {
        Patient {
            id: PatientId::from(id),
            name: format!("Patient {id}"),
            age: Some(40),
            gender: "Female".into(),
            phone: "555-0100".into(),
            last_visit: "2024-12-15".into(),
            case_summary: summary.into(),
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn loaded(id: u32, summary: &str, candidates: &[&str]) -> LoadedPatient {
        LoadedPatient {
            patient: patient(id, summary),
            history: PatientHistory::default(),
            candidates: strings(candidates),
        }
    }

    fn draft() -> PrescriptionDraft {
        PrescriptionDraft {
            diagnosis: "Viral infection".into(),
            medications: vec![
                Medication {
                    name: "Paracetamol".into(),
                    ..Medication::default()
                },
                Medication {
                    name: "Cough Syrup".into(),
                    ..Medication::default()
                },
            ],
            ..PrescriptionDraft::default()
        }
    }

    fn session_in_keywords(candidates: &[&str]) -> ConsultationSession {
        let mut s = ConsultationSession::new();
        let load = s.begin_load(PatientSource::Known(patient(1, "fever")));
        assert_eq!(
            s.complete_load(load.ticket, Ok(loaded(1, "fever", candidates))),
            Completion::Applied
        );
        s
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 15).unwrap()
    }

    #[test]
    fn test_initial_state_is_idle() {
        let s = ConsultationSession::new();
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.patient().is_none());
    }

    #[test]
    fn test_load_enters_keywords() {
        let mut s = ConsultationSession::new();
        let load = s.begin_load(PatientSource::Known(patient(1, "fever")));
        assert_eq!(s.state(), SessionState::LoadingPatient);

        s.complete_load(load.ticket, Ok(loaded(1, "fever", &["fever", "chills"])));

        assert_eq!(s.state(), SessionState::Keywords);
        assert_eq!(s.candidates(), vec!["fever", "chills"]);
        assert!(s.selected_keywords().is_empty());
    }

    #[test]
    fn test_failed_load_keeps_prior_state_then_retry() {
        let mut s = ConsultationSession::new();
        let load = s.begin_load(PatientSource::Lookup(PatientId::from(9)));
        let outcome = s.complete_load(load.ticket, Err(ConsultError::Network("refused".into())));

        assert!(matches!(outcome, Completion::Failed(ConsultError::Network(_))));
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.patient().is_none());
        assert!(s.last_error().is_some());

        let retry = s.begin_load(PatientSource::Lookup(PatientId::from(9)));
        s.complete_load(retry.ticket, Ok(loaded(9, "", &["cough"])));
        assert_eq!(s.state(), SessionState::Keywords);
        assert!(s.last_error().is_none());
    }

    #[test]
    fn test_failed_reload_keeps_current_patient() {
        let mut s = session_in_keywords(&["fever"]);
        s.begin_keyword("fever").unwrap();

        let load = s.begin_load(PatientSource::Lookup(PatientId::from(2)));
        s.complete_load(load.ticket, Err(ConsultError::Authentication("401".into())));

        assert_eq!(s.state(), SessionState::Keywords);
        assert_eq!(s.patient().unwrap().id, PatientId::from(1));
        assert_eq!(s.selected_keywords(), &strings(&["fever"])[..]);
    }

    #[test]
    fn test_newer_load_supersedes_older() {
        let mut s = ConsultationSession::new();
        let first = s.begin_load(PatientSource::Lookup(PatientId::from(1)));
        let second = s.begin_load(PatientSource::Lookup(PatientId::from(2)));

        assert_eq!(
            s.complete_load(second.ticket, Ok(loaded(2, "", &["a"]))),
            Completion::Applied
        );
        assert_eq!(
            s.complete_load(first.ticket, Ok(loaded(1, "", &["b"]))),
            Completion::Superseded
        );
        assert_eq!(s.patient().unwrap().id, PatientId::from(2));
    }

    #[test]
    fn test_select_only_in_keywords_step() {
        let mut s = ConsultationSession::new();
        assert!(s.begin_keyword("fever").is_err());

        let mut s = session_in_keywords(&["fever"]);
        s.begin_load(PatientSource::Lookup(PatientId::from(3)));
        assert!(s.begin_keyword("fever").is_err());
    }

    #[test]
    fn test_stale_keyword_response_discarded() {
        let mut s = session_in_keywords(&["fever", "cough", "fatigue"]);
        let first = s.begin_keyword("fever").unwrap();
        let second = s.begin_keyword("cough").unwrap();

        assert_eq!(second.selection, strings(&["fever", "cough"]));
        assert_eq!(
            s.complete_keyword(second.ticket, Ok(strings(&["dry cough", "wheezing"]))),
            Completion::Applied
        );
        assert_eq!(
            s.complete_keyword(first.ticket, Ok(strings(&["chills", "sweating"]))),
            Completion::Superseded
        );
        assert_eq!(s.candidates(), vec!["dry cough", "wheezing"]);
        assert!(!s.is_refreshing_keywords());
    }

    #[test]
    fn test_keyword_failure_keeps_selection() {
        let mut s = session_in_keywords(&["fever"]);
        let refresh = s.begin_keyword("fever").unwrap();
        let outcome = s.complete_keyword(refresh.ticket, Err(ConsultError::Network("x".into())));

        assert!(matches!(outcome, Completion::Failed(_)));
        assert_eq!(s.selected_keywords(), &strings(&["fever"])[..]);
        assert_eq!(s.state(), SessionState::Keywords);
    }

    #[test]
    fn test_new_patient_supersedes_outstanding_requests() {
        let mut s = session_in_keywords(&["fever"]);
        let refresh = s.begin_keyword("fever").unwrap();
        let search = s.begin_related_search().unwrap();

        let load = s.begin_load(PatientSource::Known(patient(2, "rash")));
        s.complete_load(load.ticket, Ok(loaded(2, "rash", &["itching"])));

        assert_eq!(
            s.complete_keyword(refresh.ticket, Ok(strings(&["chills"]))),
            Completion::Superseded
        );
        assert_eq!(
            s.complete_related_search(search.ticket, Ok(Vec::new())),
            Completion::Superseded
        );
        assert_eq!(s.candidates(), vec!["itching"]);
    }

    #[test]
    fn test_finish_rejected_without_keywords() {
        let mut s = session_in_keywords(&["fever"]);
        let result = s.begin_generation();

        assert!(matches!(result, Err(ConsultError::Validation(_))));
        assert_eq!(s.state(), SessionState::Keywords);
    }

    #[test]
    fn test_second_finish_rejected_while_pending() {
        let mut s = session_in_keywords(&["fever"]);
        s.begin_keyword("fever").unwrap();
        s.begin_generation().unwrap();

        assert_eq!(s.state(), SessionState::GeneratingPrescription);
        assert!(s.begin_generation().is_err());
        assert!(s.begin_related_search().is_err());
    }

    #[test]
    fn test_generation_request_contents() {
        let mut s = session_in_keywords(&["fever"]);
        s.record_transcript("  patient reports fever ");
        s.record_transcript("since Monday");
        s.begin_keyword("fever").unwrap();
        let search = s.begin_related_search().unwrap();
        assert_eq!(search.joined_keywords(), "fever");
        s.complete_related_search(
            search.ticket,
            Ok(vec![RelatedRecord {
                id: serde_json::json!(11),
                content: "2019: pneumonia".into(),
            }]),
        );

        let pending = s.begin_generation().unwrap();
        assert_eq!(pending.request.case_summary, "fever");
        assert_eq!(pending.request.transcript, "patient reports fever since Monday");
        assert_eq!(pending.request.keyword_list, strings(&["fever"]));
        assert_eq!(pending.request.medical_history.as_deref(), Some("2019: pneumonia"));
    }

    #[test]
    fn test_generation_failure_returns_to_keywords() {
        let mut s = session_in_keywords(&["fever"]);
        s.begin_keyword("fever").unwrap();
        let pending = s.begin_generation().unwrap();
        let outcome = s.complete_generation(
            pending.ticket,
            Err(ConsultError::ServerRejection {
                status: 500,
                message: "model offline".into(),
            }),
        );

        assert!(matches!(outcome, Completion::Failed(_)));
        assert_eq!(s.state(), SessionState::Keywords);
        assert_eq!(s.selected_keywords(), &strings(&["fever"])[..]);
        assert!(s.begin_generation().is_ok());
    }

    #[test]
    fn test_full_scenario_to_dispatch() {
        let mut s = session_in_keywords(&["fever", "headache"]);
        let r1 = s.begin_keyword("fever").unwrap();
        s.complete_keyword(r1.ticket, Ok(strings(&["fever", "cough", "chills"])));
        assert!(!s.candidates().contains(&"fever"));

        let r2 = s.begin_keyword("cough").unwrap();
        s.complete_keyword(r2.ticket, Ok(strings(&["wheezing"])));

        let pending = s.begin_generation().unwrap();
        s.complete_generation(pending.ticket, Ok(draft()));
        assert_eq!(s.state(), SessionState::Prescription);
        assert!(s.begin_keyword("wheezing").is_err());

        s.composer_mut().unwrap().toggle_select(0).unwrap();
        assert_eq!(s.composer().unwrap().selected_medications(), vec![0]);

        let dispatch = s.begin_dispatch(day()).unwrap();
        assert!(s.begin_dispatch(day()).is_err());
        let outcome = s.complete_dispatch(
            dispatch.ticket,
            Ok(Acknowledgement {
                message: "queued".into(),
            }),
        );

        assert_eq!(outcome, Completion::Applied);
        let receipt = s.last_receipt().unwrap();
        assert_eq!(receipt.order_id, dispatch.order.order_id);
        assert_eq!(receipt.medication_count, 1);
    }

    #[test]
    fn test_dispatch_requires_selection() {
        let mut s = session_in_keywords(&["fever"]);
        s.begin_keyword("fever").unwrap();
        let pending = s.begin_generation().unwrap();
        s.complete_generation(pending.ticket, Ok(draft()));

        assert!(matches!(s.begin_dispatch(day()), Err(ConsultError::Validation(_))));
        assert!(!s.is_dispatching());
    }

    #[test]
    fn test_new_draft_starts_with_empty_edits() {
        let mut s = session_in_keywords(&["fever"]);
        s.begin_keyword("fever").unwrap();
        let pending = s.begin_generation().unwrap();
        s.complete_generation(pending.ticket, Ok(draft()));
        s.composer_mut().unwrap().toggle_select(1).unwrap();

        let load = s.begin_load(PatientSource::Known(patient(2, "cough")));
        s.complete_load(load.ticket, Ok(loaded(2, "cough", &["cough"])));
        assert!(s.composer().is_none());
        assert!(s.composer_mut().is_err());

        s.begin_keyword("cough").unwrap();
        let pending = s.begin_generation().unwrap();
        s.complete_generation(pending.ticket, Ok(draft()));
        assert!(s.composer().unwrap().selected_medications().is_empty());
    }

    #[test]
    fn test_transcript_survives_patient_load() {
        let mut s = session_in_keywords(&["fever"]);
        s.record_transcript("ongoing notes");

        let load = s.begin_load(PatientSource::Known(patient(2, "")));
        s.complete_load(load.ticket, Ok(loaded(2, "", &[])));
        assert_eq!(s.transcript(), "ongoing notes");

        s.clear_transcript();
        assert!(s.transcript().is_empty());
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut s = session_in_keywords(&["fever"]);
        let refresh = s.begin_keyword("fever").unwrap();
        s.reset();

        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.patient().is_none());
        assert_eq!(
            s.complete_keyword(refresh.ticket, Ok(Vec::new())),
            Completion::Superseded
        );
    }
}
