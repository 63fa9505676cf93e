//! Medical history side-channel.
//!
//! Holds the history snapshot taken at patient load and the related-record search results.
//! Search failures only touch this channel's own error flag; they never affect the main step.

use crate::models::{PatientHistory, RelatedRecord};
use crate::sequence::{RequestSequencer, Ticket};
use crate::session::Completion;
use crate::{ConsultError, ConsultResult};

#[derive(Debug, Default)]
pub struct MedicalHistoryChannel {
    snapshot: Option<PatientHistory>,
    records: Vec<RelatedRecord>,
    records_keywords: Vec<String>,
    requested_keywords: Vec<String>,
    error: Option<ConsultError>,
    search: RequestSequencer,
}

impl MedicalHistoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the channel with a freshly loaded snapshot and no related records.
    pub fn reset(&mut self, snapshot: Option<PatientHistory>) {
        self.snapshot = snapshot;
        self.records.clear();
        self.records_keywords.clear();
        self.requested_keywords.clear();
        self.error = None;
        self.search.invalidate();
    }

    pub fn snapshot(&self) -> Option<&PatientHistory> {
        self.snapshot.as_ref()
    }

    pub fn related_records(&self) -> &[RelatedRecord] {
        &self.records
    }

    /// Keyword selection the visible related records were produced for.
    pub fn records_keywords(&self) -> &[String] {
        &self.records_keywords
    }

    /// Whether the visible records were produced for exactly `selection`.
    pub fn records_match(&self, selection: &[String]) -> bool {
        !self.records.is_empty() && self.records_keywords == selection
    }

    /// Content of the first related record, used as history text for generation.
    pub fn first_record_content(&self) -> Option<String> {
        self.records.first().map(|r| r.content.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.search.is_pending()
    }

    pub fn error(&self) -> Option<&ConsultError> {
        self.error.as_ref()
    }

    /// Start a related-record search, superseding any pending one.
    pub fn begin_search(&mut self, generation: u64, keywords: &[String]) -> ConsultResult<Ticket> {
        if keywords.is_empty() {
            return Err(ConsultError::validation(
                "select at least one keyword before fetching medical history",
            ));
        }
        self.error = None;
        self.requested_keywords = keywords.to_vec();
        Ok(self.search.issue(generation))
    }

    pub fn complete_search(
        &mut self,
        generation: u64,
        ticket: Ticket,
        result: ConsultResult<Vec<RelatedRecord>>,
    ) -> Completion {
        if !self.search.settle(ticket, generation) {
            tracing::debug!(sequence = ticket.sequence(), "discarding stale related-record response");
            return Completion::Superseded;
        }

        match result {
            Ok(records) => {
                tracing::info!(count = records.len(), "related records fetched");
                self.records = records;
                self.records_keywords = std::mem::take(&mut self.requested_keywords);
                Completion::Applied
            }
            Err(e) => {
                tracing::warn!(error = %e, "related-record search failed");
                self.records.clear();
                self.records_keywords.clear();
                self.requested_keywords.clear();
                self.error = Some(e.clone());
                Completion::Failed(e)
            }
        }
    }
}
