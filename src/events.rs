//! Outbound event model and the sender seam.
//!
//! Events describe something that happened locally (a completed recognition,
//! an expired dialog window). The sender accepts a fully-built message and
//! reports delivery asynchronously; it does not retry on the core's behalf.

use crate::audio::{AudioFormat, AudioProfile};
use crate::error::{Result, VoicegateError};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use uuid::Uuid;

/// A fully-assembled outbound message. Audio rides alongside the JSON body
/// as a binary attachment, never inside it.
#[derive(Debug, Clone)]
pub struct Event {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    pub dialog_request_id: Option<String>,
    pub payload: serde_json::Value,
    pub context: Option<serde_json::Value>,
    pub audio: Option<Vec<i16>>,
}

impl Event {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            message_id: Uuid::new_v4().to_string(),
            dialog_request_id: None,
            payload: json!({}),
            context: None,
            audio: None,
        }
    }

    /// A `SpeechRecognizer.Recognize` event for a finished capture session.
    pub fn recognize(
        dialog_request_id: String,
        profile: AudioProfile,
        format: AudioFormat,
        initiator: Option<serde_json::Value>,
        context: serde_json::Value,
        audio: Vec<i16>,
    ) -> Self {
        let mut payload = json!({
            "profile": profile.to_string(),
            "format": format.wire_name(),
        });
        if let Some(initiator) = initiator {
            payload["initiator"] = initiator;
        }

        let mut event = Self::new("SpeechRecognizer", "Recognize");
        event.dialog_request_id = Some(dialog_request_id);
        event.payload = payload;
        event.context = Some(context);
        event.audio = Some(audio);
        event
    }

    /// A `SpeechRecognizer.ExpectSpeechTimedOut` event for an expired dialog
    /// window.
    pub fn expect_speech_timed_out() -> Self {
        Self::new("SpeechRecognizer", "ExpectSpeechTimedOut")
    }

    /// Serializes the wire body:
    /// `{"context": ..., "event": {"header": {...}, "payload": {...}}}`.
    pub fn to_json(&self) -> Result<String> {
        let mut header = json!({
            "namespace": self.namespace,
            "name": self.name,
            "messageId": self.message_id,
        });
        if let Some(dialog_request_id) = &self.dialog_request_id {
            header["dialogRequestId"] = json!(dialog_request_id);
        }

        let body = json!({
            "context": self.context.clone().unwrap_or_else(|| json!([])),
            "event": {
                "header": header,
                "payload": self.payload,
            }
        });
        Ok(serde_json::to_string(&body)?)
    }
}

/// Accepts a fully-built outbound message; delivery resolves asynchronously.
#[async_trait]
pub trait EventSender: Send + Sync {
    async fn send(&self, event: Event) -> Result<()>;
}

/// Recording sender for tests: captures every event and can be primed to
/// fail deliveries.
#[derive(Default)]
pub struct MockEventSender {
    sent: Mutex<Vec<Event>>,
    fail: AtomicBool,
    notify: Notify,
}

impl MockEventSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail.
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<Event> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Waits until at least `count` events have been sent.
    pub async fn wait_for_count(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.sent().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl EventSender for MockEventSender {
    async fn send(&self, event: Event) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoicegateError::SendFailed {
                message: "mock sender primed to fail".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognize_event_shape() {
        let event = Event::recognize(
            "dialog-1".to_string(),
            AudioProfile::CloseTalk,
            AudioFormat::default(),
            Some(json!({"type": "TAP"})),
            json!([{"header": {"namespace": "Speaker", "name": "VolumeState"}}]),
            vec![1, 2, 3],
        );

        assert_eq!(event.namespace, "SpeechRecognizer");
        assert_eq!(event.name, "Recognize");
        assert_eq!(event.dialog_request_id.as_deref(), Some("dialog-1"));
        assert_eq!(event.payload["profile"], "CLOSE_TALK");
        assert_eq!(event.payload["format"], "AUDIO_L16_RATE_16000_CHANNELS_1");
        assert_eq!(event.payload["initiator"]["type"], "TAP");
        assert_eq!(event.audio.as_deref(), Some(&[1i16, 2, 3][..]));
    }

    #[test]
    fn test_to_json_includes_header_and_context() {
        let event = Event::recognize(
            "dialog-2".to_string(),
            AudioProfile::NearField,
            AudioFormat::default(),
            None,
            json!([]),
            vec![],
        );

        let body: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(body["event"]["header"]["namespace"], "SpeechRecognizer");
        assert_eq!(body["event"]["header"]["name"], "Recognize");
        assert_eq!(body["event"]["header"]["dialogRequestId"], "dialog-2");
        assert!(body["event"]["header"]["messageId"].is_string());
        assert!(body["context"].is_array());
        // Audio is an attachment, never part of the JSON body
        assert!(body["event"]["payload"].get("audio").is_none());
    }

    #[test]
    fn test_timed_out_event_has_no_dialog_id() {
        let event = Event::expect_speech_timed_out();
        assert_eq!(event.name, "ExpectSpeechTimedOut");
        assert_eq!(event.dialog_request_id, None);
        assert_eq!(event.audio, None);
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Event::expect_speech_timed_out();
        let b = Event::expect_speech_timed_out();
        assert_ne!(a.message_id, b.message_id);
    }

    #[tokio::test]
    async fn test_mock_sender_records_and_fails() {
        let sender = MockEventSender::new();
        sender.send(Event::expect_speech_timed_out()).await.unwrap();
        assert_eq!(sender.sent().len(), 1);

        sender.set_failing(true);
        let result = sender.send(Event::expect_speech_timed_out()).await;
        assert!(matches!(result, Err(VoicegateError::SendFailed { .. })));
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_sender_wait_for_count() {
        let sender = std::sync::Arc::new(MockEventSender::new());
        let waiter = sender.clone();
        let wait = tokio::spawn(async move { waiter.wait_for_count(1).await });

        sender.send(Event::expect_speech_timed_out()).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), wait)
            .await
            .expect("wait_for_count timed out")
            .unwrap();
    }
}
