//! Capture session: the state spanning one accepted audio-capture request
//! from trigger to terminal event.

use crate::audio::AudioProvider;
use serde_json::json;
use std::fmt;

/// The kind of trigger that opened a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    /// Tap-to-talk: press and release, capture ends on end-of-speech.
    Tap,
    /// Hold-to-talk: capture ends when the button is released.
    Hold,
    /// Wake-word detection; carries the detected keyword and its stream
    /// indices.
    WakeWord,
    /// Directive-initiated follow-up (ExpectSpeech multiturn).
    Directive,
}

impl fmt::Display for Initiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Initiator::Tap => "TAP",
            Initiator::Hold => "PRESS_AND_HOLD",
            Initiator::WakeWord => "WAKEWORD",
            Initiator::Directive => "DIRECTIVE",
        };
        write!(f, "{}", name)
    }
}

/// One accepted capture request. At most one session is open at a time;
/// opening another while one is open is rejected, not queued.
#[derive(Clone)]
pub struct CaptureSession {
    pub initiator: Initiator,
    pub provider: AudioProvider,
    /// Absolute stream index where reading starts. `None` means the stream's
    /// current write position.
    pub begin_index: Option<u64>,
    /// Absolute stream index where reading stops. `None` means an
    /// end-of-speech boundary or an explicit stop.
    pub end_index: Option<u64>,
    /// Detected keyword for wake-word initiated sessions.
    pub keyword: Option<String>,
    /// Correlates the chain of events and directives of one multi-turn
    /// exchange.
    pub dialog_request_id: String,
}

impl CaptureSession {
    /// The `initiator` object of a Recognize event payload. Wake-word
    /// sessions report the keyword indices so the service can verify the
    /// detection.
    pub fn initiator_payload(&self) -> serde_json::Value {
        let mut payload = json!({"type": self.initiator.to_string()});
        if self.initiator == Initiator::WakeWord {
            if let (Some(begin), Some(end)) = (self.begin_index, self.end_index) {
                payload["payload"] = json!({
                    "wakeWordIndices": {
                        "startIndexInSamples": begin,
                        "endIndexInSamples": end,
                    }
                });
            }
        }
        payload
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field("initiator", &self.initiator)
            .field("begin_index", &self.begin_index)
            .field("end_index", &self.end_index)
            .field("keyword", &self.keyword)
            .field("dialog_request_id", &self.dialog_request_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SharedAudioStream;

    fn session(initiator: Initiator) -> CaptureSession {
        let stream = SharedAudioStream::new(64, 2).unwrap();
        CaptureSession {
            initiator,
            provider: AudioProvider::hands_free(stream),
            begin_index: None,
            end_index: None,
            keyword: None,
            dialog_request_id: "dialog-1".to_string(),
        }
    }

    #[test]
    fn test_initiator_display() {
        assert_eq!(Initiator::Tap.to_string(), "TAP");
        assert_eq!(Initiator::Hold.to_string(), "PRESS_AND_HOLD");
        assert_eq!(Initiator::WakeWord.to_string(), "WAKEWORD");
        assert_eq!(Initiator::Directive.to_string(), "DIRECTIVE");
    }

    #[test]
    fn test_tap_initiator_payload_has_no_indices() {
        let payload = session(Initiator::Tap).initiator_payload();
        assert_eq!(payload["type"], "TAP");
        assert!(payload.get("payload").is_none());
    }

    #[test]
    fn test_wakeword_initiator_payload_reports_indices() {
        let mut s = session(Initiator::WakeWord);
        s.begin_index = Some(100);
        s.end_index = Some(180);
        s.keyword = Some("computer".to_string());

        let payload = s.initiator_payload();
        assert_eq!(payload["type"], "WAKEWORD");
        assert_eq!(
            payload["payload"]["wakeWordIndices"]["startIndexInSamples"],
            100
        );
        assert_eq!(
            payload["payload"]["wakeWordIndices"]["endIndexInSamples"],
            180
        );
    }
}
