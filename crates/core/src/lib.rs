//! # Consult Core
//!
//! Clinician consultation workflow: patient load, keyword recommendation loop, medical history
//! side-channel, prescription composition and pharmacy dispatch.
//!
//! The crate holds no transport code. Remote calls go through the [`ConsultationApi`] trait,
//! implemented over HTTP by `api-client`.
//!
//! - [`session`]: synchronous state machine that owns all consultation state
//! - [`controller`]: drives the session on a tokio runtime and applies responses in order
//! - [`transcript`]: dictation buffer fed by an external speech engine

pub mod api;
pub mod auth;
pub mod composer;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod history;
pub mod keywords;
pub mod models;
pub mod sequence;
pub mod session;
pub mod transcript;

pub use api::ConsultationApi;
pub use auth::{AuthContext, AuthScheme};
pub use composer::PrescriptionComposer;
pub use config::CoreConfig;
pub use controller::{ConsultationController, RequestKind, SessionEvent};
pub use error::{ConsultError, ConsultResult};
pub use models::{
    Acknowledgement, GenerationRequest, Medication, MedicationField, Patient, PatientHistory,
    PatientId, PharmacyOrder, PrescriptionDraft, RelatedRecord, Report,
};
pub use session::{Completion, ConsultationSession, SessionState};
pub use transcript::{CaptureCapability, CaptureEngine, TranscriptAccumulator};
