//! Prescription composer.
//!
//! Layers local, unsaved clinician edits over an immutable server draft. The merged medication
//! list is the draft's medications followed by custom ones; index `i` always addresses the same
//! entry for the lifetime of the edit state.
//!
//! Draft medications are copy-on-write: edits land in a per-index override map that is resolved
//! at read time, so the draft itself is never touched. Custom medications are owned by the edit
//! state and are edited in place.

use crate::constants::DEFAULT_ROUTE;
use crate::models::{Medication, MedicationField, PatientId, PharmacyOrder, PrescriptionDraft};
use crate::{ConsultError, ConsultResult};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

/// Field-level overrides for one draft medication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedicationOverride {
    fields: BTreeMap<MedicationField, String>,
}

impl MedicationOverride {
    fn apply(&self, base: &Medication) -> Medication {
        let mut resolved = base.clone();
        for (field, value) in &self.fields {
            resolved.set_field(*field, value.clone());
        }
        resolved
    }
}

/// Session-scoped overlay over a [`PrescriptionDraft`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrescriptionEditState {
    selected: BTreeSet<usize>,
    custom_medications: Vec<Medication>,
    overrides: BTreeMap<usize, MedicationOverride>,
    custom_recommendations: Vec<String>,
}

/// A blank custom medication with the default route pre-filled.
pub fn blank_custom_medication() -> Medication {
    Medication {
        route: DEFAULT_ROUTE.to_string(),
        ..Medication::default()
    }
}

#[derive(Debug, Clone)]
pub struct PrescriptionComposer {
    draft: Arc<PrescriptionDraft>,
    edits: PrescriptionEditState,
}

impl PrescriptionComposer {
    /// Start editing `draft` with an empty overlay.
    pub fn new(draft: Arc<PrescriptionDraft>) -> Self {
        Self {
            draft,
            edits: PrescriptionEditState::default(),
        }
    }

    pub fn draft(&self) -> &PrescriptionDraft {
        &self.draft
    }

    pub fn edit_state(&self) -> &PrescriptionEditState {
        &self.edits
    }

    pub fn medication_count(&self) -> usize {
        self.draft.medications.len() + self.edits.custom_medications.len()
    }

    pub fn is_draft_index(&self, index: usize) -> bool {
        index < self.draft.medications.len()
    }

    fn check_index(&self, index: usize) -> ConsultResult<()> {
        if index < self.medication_count() {
            Ok(())
        } else {
            Err(ConsultError::validation(format!(
                "medication index {index} out of range (0..{})",
                self.medication_count()
            )))
        }
    }

    /// Resolved medication at `index`.
    pub fn medication(&self, index: usize) -> ConsultResult<Medication> {
        self.check_index(index)?;
        let draft_len = self.draft.medications.len();
        if index < draft_len {
            let base = &self.draft.medications[index];
            Ok(match self.edits.overrides.get(&index) {
                Some(overlay) => overlay.apply(base),
                None => base.clone(),
            })
        } else {
            Ok(self.edits.custom_medications[index - draft_len].clone())
        }
    }

    /// Merged list: draft medications (with overrides) followed by custom medications.
    pub fn medications(&self) -> Vec<Medication> {
        (0..self.medication_count())
            .filter_map(|i| self.medication(i).ok())
            .collect()
    }

    /// Whether the draft medication at `index` carries local edits.
    pub fn is_modified(&self, index: usize) -> bool {
        self.edits.overrides.contains_key(&index)
    }

    /// Flip selection of `index`. Returns whether it is now selected.
    pub fn toggle_select(&mut self, index: usize) -> ConsultResult<bool> {
        self.check_index(index)?;
        if self.edits.selected.remove(&index) {
            Ok(false)
        } else {
            self.edits.selected.insert(index);
            Ok(true)
        }
    }

    /// Append a custom medication and return its index in the merged list.
    pub fn add_custom_medication(&mut self, medication: Medication) -> usize {
        if medication.name.trim().is_empty() {
            tracing::debug!("custom medication added without a name");
        }
        self.edits.custom_medications.push(medication);
        self.medication_count() - 1
    }

    pub fn update_medication(
        &mut self,
        index: usize,
        field: MedicationField,
        value: impl Into<String>,
    ) -> ConsultResult<()> {
        self.check_index(index)?;
        let value = value.into();
        let draft_len = self.draft.medications.len();
        if index < draft_len {
            let overlay = self.edits.overrides.entry(index).or_default();
            if self.draft.medications[index].field(field) == value {
                overlay.fields.remove(&field);
            } else {
                overlay.fields.insert(field, value);
            }
            if overlay.fields.is_empty() {
                self.edits.overrides.remove(&index);
            }
        } else {
            self.edits.custom_medications[index - draft_len].set_field(field, value);
        }
        Ok(())
    }

    /// Drop local edits of a draft medication.
    pub fn revert_medication(&mut self, index: usize) -> ConsultResult<()> {
        self.check_index(index)?;
        if !self.is_draft_index(index) {
            return Err(ConsultError::validation(
                "only draft medications can be reverted",
            ));
        }
        self.edits.overrides.remove(&index);
        Ok(())
    }

    pub fn add_custom_recommendation(&mut self, text: impl Into<String>) -> usize {
        self.edits.custom_recommendations.push(text.into());
        self.edits.custom_recommendations.len() - 1
    }

    pub fn update_custom_recommendation(
        &mut self,
        index: usize,
        text: impl Into<String>,
    ) -> ConsultResult<()> {
        let slot = self
            .edits
            .custom_recommendations
            .get_mut(index)
            .ok_or_else(|| {
                ConsultError::validation(format!("recommendation index {index} out of range"))
            })?;
        *slot = text.into();
        Ok(())
    }

    /// Add a common recommendation unless already present. Returns whether it was added.
    pub fn toggle_common_recommendation(&mut self, text: &str) -> bool {
        if self.edits.custom_recommendations.iter().any(|r| r == text) {
            return false;
        }
        self.edits.custom_recommendations.push(text.to_string());
        true
    }

    pub fn remove_custom_recommendation(&mut self, index: usize) -> ConsultResult<String> {
        if index >= self.edits.custom_recommendations.len() {
            return Err(ConsultError::validation(format!(
                "recommendation index {index} out of range"
            )));
        }
        Ok(self.edits.custom_recommendations.remove(index))
    }

    pub fn custom_recommendations(&self) -> &[String] {
        &self.edits.custom_recommendations
    }

    /// Draft recommendations followed by non-blank custom ones.
    pub fn recommendations(&self) -> Vec<String> {
        self.draft
            .recommendations
            .iter()
            .cloned()
            .chain(
                self.edits
                    .custom_recommendations
                    .iter()
                    .filter(|r| !r.trim().is_empty())
                    .cloned(),
            )
            .collect()
    }

    /// Selected indices in ascending order.
    pub fn selected_medications(&self) -> Vec<usize> {
        self.edits.selected.iter().copied().collect()
    }

    /// Build the pharmacy order for the current selection.
    pub fn build_order(
        &self,
        patient_id: &PatientId,
        issued_on: NaiveDate,
    ) -> ConsultResult<PharmacyOrder> {
        let indices = self.selected_medications();
        if indices.is_empty() {
            return Err(ConsultError::validation(
                "select at least one medication before sending to the pharmacy",
            ));
        }
        let medications = indices
            .iter()
            .map(|&i| self.medication(i))
            .collect::<ConsultResult<Vec<_>>>()?;

        Ok(PharmacyOrder {
            order_id: Uuid::new_v4(),
            patient_id: patient_id.clone(),
            issued_on,
            diagnosis: self.draft.diagnosis.clone(),
            medication_indices: indices,
            medications,
            recommendations: self.recommendations(),
        })
    }
}
