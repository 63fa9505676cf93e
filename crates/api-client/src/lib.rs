//! # API Client
//!
//! HTTP implementation of [`consult_core::ConsultationApi`] for the consultation backend.
//!
//! Contains:
//! - [`HttpConsultationApi`]: reqwest-backed client for every consultation endpoint
//! - Login against the backend's token endpoint, producing an [`AuthContext`]
//!
//! All transport failures are mapped onto [`consult_core::ConsultError`] here; nothing above this
//! crate sees a `reqwest::Error`.
//!
//! [`AuthContext`]: consult_core::AuthContext

#![warn(rust_2018_idioms)]

mod errors;
pub mod http;
mod wire;

pub use http::HttpConsultationApi;
