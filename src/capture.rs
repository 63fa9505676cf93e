//! Keyboard-driven dictation engine for the console.
//!
//! There is no microphone on a terminal; the clinician types what would have been recognised.
//! `say` lines arrive as final fragments and `hear` lines as interim ones.

use consult_core::{CaptureEngine, ConsultResult};

#[derive(Debug, Default)]
pub struct KeyboardCapture {
    active: bool,
}

impl KeyboardCapture {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaptureEngine for KeyboardCapture {
    fn start(&mut self) -> ConsultResult<()> {
        self.active = true;
        tracing::debug!("keyboard dictation started");
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn abort(&mut self) {
        if self.active {
            tracing::debug!("keyboard dictation aborted");
        }
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consult_core::{CaptureCapability, TranscriptAccumulator};

    #[test]
    fn test_keyboard_capture_drives_accumulator() {
        let mut acc =
            TranscriptAccumulator::new(CaptureCapability::Available(Box::new(KeyboardCapture::new())));
        assert!(acc.is_supported());

        acc.start().unwrap();
        acc.append_final("sore throat ");
        acc.stop();

        assert!(!acc.is_listening());
        assert_eq!(acc.commit().as_deref(), Some("sore throat"));
    }
}
