//! Inbound directive model.

use crate::error::{Result, VoicegateError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope of a directive or event: namespace plus name, e.g.
/// `SpeechRecognizer.ExpectSpeech`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceAndName {
    pub namespace: String,
    pub name: String,
}

impl NamespaceAndName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespaceAndName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Whether a directive type must run exclusively relative to other
/// directives on the same handler. Bound at registration time, not
/// per-instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingPolicy {
    Blocking,
    NonBlocking,
}

/// An instruction from the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub namespace: String,
    pub name: String,
    pub message_id: String,
    #[serde(default)]
    pub dialog_request_id: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Wire shape of an inbound directive message:
/// `{"directive": {"header": {...}, "payload": {...}}}`.
#[derive(Deserialize)]
struct WireMessage {
    directive: WireDirective,
}

#[derive(Deserialize)]
struct WireDirective {
    header: WireHeader,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
struct WireHeader {
    namespace: String,
    name: String,
    #[serde(rename = "messageId")]
    message_id: String,
    #[serde(rename = "dialogRequestId", default)]
    dialog_request_id: Option<String>,
}

impl Directive {
    pub fn new(
        scope: NamespaceAndName,
        message_id: impl Into<String>,
        dialog_request_id: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            namespace: scope.namespace,
            name: scope.name,
            message_id: message_id.into(),
            dialog_request_id,
            payload,
        }
    }

    /// Parses a raw inbound message into a directive.
    pub fn from_json(raw: &str) -> Result<Self> {
        let message: WireMessage =
            serde_json::from_str(raw).map_err(|e| VoicegateError::MalformedDirective {
                message: e.to_string(),
            })?;
        Ok(Self {
            namespace: message.directive.header.namespace,
            name: message.directive.header.name,
            message_id: message.directive.header.message_id,
            dialog_request_id: message.directive.header.dialog_request_id,
            payload: message.directive.payload,
        })
    }

    /// This directive's namespace+name scope.
    pub fn scope(&self) -> NamespaceAndName {
        NamespaceAndName::new(self.namespace.clone(), self.name.clone())
    }
}
