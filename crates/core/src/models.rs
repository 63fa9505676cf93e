//! Wire and domain types exchanged with the consultation backend.
//!
//! Field names follow the backend's JSON (snake_case), with aliases for the camelCase spellings
//! some endpoints still emit. Everything not strictly required defaults to empty so that sparse
//! server payloads still deserialise.

use crate::{ConsultError, ConsultResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

/// Patient identifier as issued by the patient directory.
///
/// The directory hands out numeric identifiers for some records and opaque strings for others,
/// so the identifier is kept as text and written back in the shape it arrived in. Equality and
/// hashing only look at the text.
#[derive(Debug, Clone)]
pub struct PatientId {
    text: String,
    numeric: bool,
}

impl PatientId {
    /// An identifier typed as text, serialised back as a JSON string.
    pub fn new(input: impl AsRef<str>) -> ConsultResult<Self> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ConsultError::validation("patient id cannot be empty"));
        }
        Ok(Self {
            text: trimmed.to_owned(),
            numeric: false,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }
}

impl From<u32> for PatientId {
    fn from(value: u32) -> Self {
        Self {
            text: value.to_string(),
            numeric: true,
        }
    }
}

impl PartialEq for PatientId {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for PatientId {}

impl Hash for PatientId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl FromStr for PatientId {
    type Err = ConsultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl Serialize for PatientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if self.numeric {
            if let Ok(n) = self.text.parse::<u64>() {
                return serializer.serialize_u64(n);
            }
        }
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for PatientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self {
                text: n.to_string(),
                numeric: true,
            }),
            Raw::Text(s) => PatientId::new(s).map_err(serde::de::Error::custom),
        }
    }
}

/// A patient as loaded into a consultation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, alias = "lastVisit")]
    pub last_visit: String,
    #[serde(default, alias = "caseSummary")]
    pub case_summary: String,
}

impl Patient {
    /// Seed used for the first keyword request of a known patient.
    ///
    /// A blank case summary seeds nothing rather than an empty keyword.
    pub fn keyword_seed(&self) -> Vec<String> {
        let summary = self.case_summary.trim();
        if summary.is_empty() {
            Vec::new()
        } else {
            vec![summary.to_string()]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub status: String,
}

/// Fixed-shape history snapshot fetched when a patient is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientHistory {
    #[serde(default, alias = "previousDiagnosis", alias = "previous_diagnosis")]
    pub diagnoses: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub reports: Vec<Report>,
}

/// A record returned by the related-record search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedRecord {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub content: String,
}

/// One prescribed medication. Equality is structural.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub route: String,
    #[serde(default, alias = "eatingTiming", alias = "eating_timing")]
    pub timing: String,
}

impl Medication {
    pub fn field(&self, field: MedicationField) -> &str {
        match field {
            MedicationField::Name => &self.name,
            MedicationField::Dosage => &self.dosage,
            MedicationField::Frequency => &self.frequency,
            MedicationField::Duration => &self.duration,
            MedicationField::Instructions => &self.instructions,
            MedicationField::Route => &self.route,
            MedicationField::Timing => &self.timing,
        }
    }

    pub fn set_field(&mut self, field: MedicationField, value: impl Into<String>) {
        let value = value.into();
        match field {
            MedicationField::Name => self.name = value,
            MedicationField::Dosage => self.dosage = value,
            MedicationField::Frequency => self.frequency = value,
            MedicationField::Duration => self.duration = value,
            MedicationField::Instructions => self.instructions = value,
            MedicationField::Route => self.route = value,
            MedicationField::Timing => self.timing = value,
        }
    }
}

/// Editable attributes of a [`Medication`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MedicationField {
    Name,
    Dosage,
    Frequency,
    Duration,
    Instructions,
    Route,
    Timing,
}

impl MedicationField {
    pub const ALL: [MedicationField; 7] = [
        MedicationField::Name,
        MedicationField::Dosage,
        MedicationField::Frequency,
        MedicationField::Duration,
        MedicationField::Instructions,
        MedicationField::Route,
        MedicationField::Timing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MedicationField::Name => "name",
            MedicationField::Dosage => "dosage",
            MedicationField::Frequency => "frequency",
            MedicationField::Duration => "duration",
            MedicationField::Instructions => "instructions",
            MedicationField::Route => "route",
            MedicationField::Timing => "timing",
        }
    }
}

impl FromStr for MedicationField {
    type Err = ConsultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        MedicationField::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| ConsultError::validation(format!("unknown medication field '{s}'")))
    }
}

/// Server-generated prescription content. Never mutated after it is received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrescriptionDraft {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub medications: Vec<Medication>,
}

/// Payload of the prescription generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub case_summary: String,
    pub transcript: String,
    pub keyword_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_history: Option<String>,
}

/// Payload of the pharmacy dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacyOrder {
    pub order_id: Uuid,
    pub patient_id: PatientId,
    pub issued_on: NaiveDate,
    pub diagnosis: String,
    pub medication_indices: Vec<usize>,
    pub medications: Vec<Medication>,
    pub recommendations: Vec<String>,
}

/// Pharmacy acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: String,
}
