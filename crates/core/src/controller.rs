//! Consultation session controller.
//!
//! Binds a [`ConsultationSession`] to a [`ConsultationApi`]. Each operation validates the
//! transition synchronously, spawns the remote call on the tokio runtime and returns right away.
//! Responses come back over a channel and are applied one at a time by [`next_event`], so the
//! session is only ever mutated from the caller's task.
//!
//! [`next_event`]: ConsultationController::next_event

use crate::api::ConsultationApi;
use crate::auth::AuthContext;
use crate::composer::PrescriptionComposer;
use crate::config::CoreConfig;
use crate::models::{Acknowledgement, Patient, PatientId, PrescriptionDraft, RelatedRecord};
use crate::sequence::Ticket;
use crate::session::{Completion, ConsultationSession, LoadedPatient, PatientSource};
use crate::transcript::{CaptureCapability, TranscriptAccumulator};
use crate::{ConsultError, ConsultResult};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Which kind of request a [`SessionEvent`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    PatientLoad,
    KeywordRefresh,
    RelatedRecords,
    Generation,
    Dispatch,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestKind::PatientLoad => "patient load",
            RequestKind::KeywordRefresh => "keyword refresh",
            RequestKind::RelatedRecords => "related records",
            RequestKind::Generation => "prescription generation",
            RequestKind::Dispatch => "pharmacy dispatch",
        };
        f.write_str(name)
    }
}

/// A response that has been fed back into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub kind: RequestKind,
    pub completion: Completion,
}

enum Reply {
    Load(Ticket, ConsultResult<LoadedPatient>),
    Keywords(Ticket, ConsultResult<Vec<String>>),
    Related(Ticket, ConsultResult<Vec<RelatedRecord>>),
    Generation(Ticket, ConsultResult<PrescriptionDraft>),
    Dispatch(Ticket, ConsultResult<Acknowledgement>),
}

pub struct ConsultationController {
    api: Arc<dyn ConsultationApi>,
    auth: AuthContext,
    config: Arc<CoreConfig>,
    session: ConsultationSession,
    transcript: TranscriptAccumulator,
    replies_tx: mpsc::UnboundedSender<Reply>,
    replies_rx: mpsc::UnboundedReceiver<Reply>,
    in_flight: usize,
}

impl ConsultationController {
    pub fn new(
        api: Arc<dyn ConsultationApi>,
        auth: AuthContext,
        config: Arc<CoreConfig>,
        capture: CaptureCapability,
    ) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self {
            api,
            auth,
            config,
            session: ConsultationSession::new(),
            transcript: TranscriptAccumulator::new(capture),
            replies_tx,
            replies_rx,
            in_flight: 0,
        }
    }

    pub fn session(&self) -> &ConsultationSession {
        &self.session
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Number of spawned requests whose responses have not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn transcript(&self) -> &TranscriptAccumulator {
        &self.transcript
    }

    pub fn transcript_mut(&mut self) -> &mut TranscriptAccumulator {
        &mut self.transcript
    }

    pub fn composer_mut(&mut self) -> ConsultResult<&mut PrescriptionComposer> {
        self.session.composer_mut()
    }

    pub async fn list_patients(&self) -> ConsultResult<Vec<Patient>> {
        self.api.list_patients(&self.auth).await
    }

    /// Run `request` on its own task. If that task dies without replying, `recover` builds the
    /// reply instead so every spawned request is answered exactly once.
    fn spawn<F, R>(&mut self, request: F, recover: R)
    where
        F: Future<Output = Reply> + Send + 'static,
        R: FnOnce(ConsultError) -> Reply + Send + 'static,
    {
        let tx = self.replies_tx.clone();
        self.in_flight += 1;
        let task = tokio::spawn(request);
        tokio::spawn(async move {
            let reply = match task.await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(error = %e, "request task failed");
                    recover(ConsultError::Network("request task failed".into()))
                }
            };
            // Receiver only goes away with the controller.
            let _ = tx.send(reply);
        });
    }

    // ---- operations ---------------------------------------------------------------------

    /// Load `patient`, or a random patient from the configured range when `None`.
    pub fn load_patient(&mut self, patient: Option<Patient>) {
        let source = match patient {
            Some(patient) => PatientSource::Known(patient),
            None => {
                let id = rand::thread_rng().gen_range(1..=self.config.random_patient_max());
                tracing::info!(patient_id = id, "loading random patient");
                PatientSource::Lookup(PatientId::from(id))
            }
        };
        self.load(source);
    }

    pub fn load_patient_by_id(&mut self, id: PatientId) {
        self.load(PatientSource::Lookup(id));
    }

    fn load(&mut self, source: PatientSource) {
        let pending = self.session.begin_load(source);
        let ticket = pending.ticket;
        let api = Arc::clone(&self.api);
        let auth = self.auth.clone();
        self.spawn(
            async move {
                Reply::Load(ticket, fetch_patient_bundle(api.as_ref(), &auth, pending.source).await)
            },
            move |e| Reply::Load(ticket, Err(e)),
        );
    }

    pub fn select_keyword(&mut self, keyword: &str) -> ConsultResult<()> {
        let refresh = self.session.begin_keyword(keyword)?;
        let ticket = refresh.ticket;
        let api = Arc::clone(&self.api);
        let auth = self.auth.clone();
        self.spawn(
            async move {
                let result = api.fetch_keyword_candidates(&auth, &refresh.selection).await;
                Reply::Keywords(ticket, result)
            },
            move |e| Reply::Keywords(ticket, Err(e)),
        );
        Ok(())
    }

    pub fn fetch_medical_history(&mut self) -> ConsultResult<()> {
        let search = self.session.begin_related_search()?;
        let ticket = search.ticket;
        let api = Arc::clone(&self.api);
        let auth = self.auth.clone();
        self.spawn(
            async move {
                let keywords = search.joined_keywords();
                let result = api
                    .fetch_related_records(&auth, &search.patient_id, &keywords)
                    .await;
                Reply::Related(ticket, result)
            },
            move |e| Reply::Related(ticket, Err(e)),
        );
        Ok(())
    }

    pub fn finish_selection(&mut self) -> ConsultResult<()> {
        let pending = self.session.begin_generation()?;
        let ticket = pending.ticket;
        let api = Arc::clone(&self.api);
        let auth = self.auth.clone();
        self.spawn(
            async move {
                let result = api.generate_prescription(&auth, &pending.request).await;
                Reply::Generation(ticket, result)
            },
            move |e| Reply::Generation(ticket, Err(e)),
        );
        Ok(())
    }

    pub fn send_to_pharmacy(&mut self) -> ConsultResult<()> {
        let today = chrono::Local::now().date_naive();
        let pending = self.session.begin_dispatch(today)?;
        let ticket = pending.ticket;
        tracing::info!(
            order_id = %pending.order.order_id,
            medications = pending.order.medications.len(),
            "sending prescription to pharmacy"
        );
        let api = Arc::clone(&self.api);
        let auth = self.auth.clone();
        self.spawn(
            async move {
                let result = api.send_to_pharmacy(&auth, &pending.order).await;
                Reply::Dispatch(ticket, result)
            },
            move |e| Reply::Dispatch(ticket, Err(e)),
        );
        Ok(())
    }

    /// Move captured final text into the session transcript.
    pub fn commit_transcript(&mut self) -> Option<String> {
        let committed = self.transcript.commit()?;
        self.session.record_transcript(&committed);
        Some(committed)
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.session.clear_transcript();
    }

    pub fn reset(&mut self) {
        self.session.reset();
    }

    // ---- responses ----------------------------------------------------------------------

    /// Wait for the next response and apply it. Returns `None` when nothing is in flight.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let reply = self.replies_rx.recv().await?;
        self.in_flight -= 1;
        Some(self.apply(reply))
    }

    /// Apply every outstanding response, in arrival order.
    pub async fn settle(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await {
            events.push(event);
        }
        events
    }

    fn apply(&mut self, reply: Reply) -> SessionEvent {
        let (kind, completion) = match reply {
            Reply::Load(ticket, result) => (
                RequestKind::PatientLoad,
                self.session.complete_load(ticket, result),
            ),
            Reply::Keywords(ticket, result) => (
                RequestKind::KeywordRefresh,
                self.session.complete_keyword(ticket, result),
            ),
            Reply::Related(ticket, result) => (
                RequestKind::RelatedRecords,
                self.session.complete_related_search(ticket, result),
            ),
            Reply::Generation(ticket, result) => (
                RequestKind::Generation,
                self.session.complete_generation(ticket, result),
            ),
            Reply::Dispatch(ticket, result) => (
                RequestKind::Dispatch,
                self.session.complete_dispatch(ticket, result),
            ),
        };
        SessionEvent { kind, completion }
    }
}

/// Patient record, history snapshot and first candidate set, fetched as one unit.
///
/// History and candidates are requested concurrently; either failing fails the whole load.
async fn fetch_patient_bundle(
    api: &dyn ConsultationApi,
    auth: &AuthContext,
    source: PatientSource,
) -> ConsultResult<LoadedPatient> {
    let (patient, seed) = match source {
        PatientSource::Known(patient) => {
            let seed = patient.keyword_seed();
            (patient, seed)
        }
        PatientSource::Lookup(id) => (api.fetch_patient(auth, &id).await?, Vec::new()),
    };

    let (history, candidates) = tokio::try_join!(
        api.fetch_patient_history(auth, &patient.id),
        api.fetch_keyword_candidates(auth, &seed),
    )?;

    Ok(LoadedPatient {
        patient,
        history,
        candidates,
    })
}
