//! Constants used throughout the consultation core crate.
//!
//! Endpoint paths, configuration defaults and the clinician quick-pick vocabularies live here
//! so the client, controller and console agree on them.

/// Default base URL of the consultation backend.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound (inclusive) for randomly chosen patient identifiers.
pub const DEFAULT_RANDOM_PATIENT_MAX: u32 = 1000;

/// Login endpoint, relative to the base URL.
pub const LOGIN_PATH: &str = "auth/login/";

/// Patient directory listing.
pub const PATIENT_LIST_PATH: &str = "patients/list";

/// Patient lookup by identifier; `{id}` is substituted.
pub const PATIENT_DETAIL_PATH: &str = "patients/{id}/";

/// Fixed-shape patient history; `{id}` is substituted.
pub const PATIENT_HISTORY_PATH: &str = "patients/{id}/history/";

/// Keyword candidate suggestions.
pub const KEYWORDS_PATH: &str = "getkeywords/";

/// Related medical record search.
pub const RELATED_RECORDS_PATH: &str = "getrelatedrecords/";

/// Prescription generation.
pub const GENERATE_PRESCRIPTION_PATH: &str = "generateprescription/";

/// Pharmacy dispatch.
pub const SEND_TO_PHARMACY_PATH: &str = "sendtopharmacy/";

/// Route assigned to a freshly added custom medication.
pub const DEFAULT_ROUTE: &str = "Oral";

pub const COMMON_MEDICATIONS: &[&str] = &[
    "Amoxicillin",
    "Paracetamol",
    "Dextromethorphan",
    "Ibuprofen",
    "Azithromycin",
    "Cetirizine",
    "Metformin",
    "Lisinopril",
];

pub const COMMON_DOSAGES: &[&str] = &["125mg", "250mg", "500mg", "1g", "5ml", "10ml", "15mg"];

pub const COMMON_FREQUENCIES: &[&str] = &[
    "Once daily",
    "Twice daily",
    "Every 6 hours",
    "Every 8 hours",
    "Every 12 hours",
    "PRN",
];

pub const COMMON_TIMINGS: &[&str] = &["Before food", "After food", "With food"];

pub const COMMON_ROUTES: &[&str] = &["Oral", "Topical", "Injection", "Inhaled", "Sublingual"];

pub const COMMON_DURATIONS: &[&str] = &["3 days", "5 days", "7 days", "10 days"];

/// Recommendations offered as one-click additions in the prescription step.
pub const COMMON_RECOMMENDATIONS: &[&str] = &[
    "Get adequate rest",
    "Stay hydrated",
    "Monitor temperature",
    "Avoid smoking",
    "Follow up if symptoms worsen",
    "Take medications as prescribed",
];
