//! Transcript accumulation for continuous speech capture.
//!
//! The speech engine itself is external. The accumulator owns its lifecycle through the
//! [`CaptureEngine`] handle and merges the fragments it reports:
//!
//! - **Final** fragments are appended irreversibly.
//! - **Interim** fragments are transient and replaced wholesale on each callback.
//!
//! Only final text is ever committed.

use crate::{ConsultError, ConsultResult};

/// Handle onto a running speech-to-text engine.
pub trait CaptureEngine: Send {
    /// Begin delivering recognition results.
    fn start(&mut self) -> ConsultResult<()>;
    /// Stop gracefully; pending results may still arrive.
    fn stop(&mut self);
    /// Stop immediately and release the underlying capture resource.
    fn abort(&mut self);
}

/// Capability probe result, decided once when the accumulator is built.
pub enum CaptureCapability {
    Available(Box<dyn CaptureEngine>),
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Listening,
}

pub struct TranscriptAccumulator {
    capability: CaptureCapability,
    state: CaptureState,
    final_text: String,
    interim_text: String,
    error: Option<String>,
}

impl TranscriptAccumulator {
    pub fn new(capability: CaptureCapability) -> Self {
        if let CaptureCapability::Unavailable(reason) = &capability {
            tracing::info!(reason = %reason, "voice capture unavailable");
        }
        Self {
            capability,
            state: CaptureState::Idle,
            final_text: String::new(),
            interim_text: String::new(),
            error: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self.capability, CaptureCapability::Available(_))
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == CaptureState::Listening
    }

    pub fn final_text(&self) -> &str {
        &self.final_text
    }

    pub fn interim_text(&self) -> &str {
        &self.interim_text
    }

    /// Last engine or start-up error, cleared by a successful `start`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn start(&mut self) -> ConsultResult<()> {
        let engine = match &mut self.capability {
            CaptureCapability::Available(engine) => engine,
            CaptureCapability::Unavailable(reason) => {
                return Err(ConsultError::UnsupportedCapability(reason.clone()));
            }
        };
        if self.state == CaptureState::Listening {
            return Err(ConsultError::validation("voice capture is already active"));
        }

        if let Err(e) = engine.start() {
            self.error = Some(format!("error starting speech recognition: {e}"));
            return Err(e);
        }
        self.state = CaptureState::Listening;
        self.error = None;
        tracing::debug!("voice capture started");
        Ok(())
    }

    /// Go idle, keeping the accumulated final text.
    pub fn stop(&mut self) {
        if self.state != CaptureState::Listening {
            return;
        }
        if let CaptureCapability::Available(engine) = &mut self.capability {
            engine.stop();
        }
        self.state = CaptureState::Idle;
        self.interim_text.clear();
        tracing::debug!(chars = self.final_text.len(), "voice capture stopped");
    }

    pub fn append_final(&mut self, text: &str) {
        self.final_text.push_str(text);
    }

    pub fn set_interim(&mut self, text: &str) {
        self.interim_text.clear();
        self.interim_text.push_str(text);
    }

    /// Engine reported a recognition error; capture is over.
    pub fn on_engine_error(&mut self, message: &str) {
        tracing::warn!(error = %message, "speech recognition error");
        self.error = Some(format!("speech recognition error: {message}"));
        self.state = CaptureState::Idle;
    }

    /// Engine ended the capture on its own.
    pub fn on_engine_end(&mut self) {
        self.state = CaptureState::Idle;
        self.interim_text.clear();
    }

    pub fn clear(&mut self) {
        self.final_text.clear();
        self.interim_text.clear();
    }

    /// Take the trimmed final text and reset. Returns `None` when nothing was captured.
    pub fn commit(&mut self) -> Option<String> {
        let committed = self.final_text.trim().to_string();
        self.clear();
        if committed.is_empty() {
            None
        } else {
            Some(committed)
        }
    }
}

impl Drop for TranscriptAccumulator {
    fn drop(&mut self) {
        if self.state == CaptureState::Listening {
            if let CaptureCapability::Available(engine) = &mut self.capability {
                engine.abort();
            }
        }
    }
}
