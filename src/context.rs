//! Context provider seam.
//!
//! Before an outbound event is finalized, the core requests the device's
//! current state (volume, playback position, ...) keyed by a request token.
//! The provider must eventually report state for that token; the event
//! referencing it is not assembled until it does.

use crate::error::{Result, VoicegateError};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Correlates one context request with its eventual report.
pub type RequestToken = u64;

/// Allocates unique request tokens.
#[derive(Debug, Default)]
pub struct TokenSource {
    next: AtomicU64,
}

impl TokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> RequestToken {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Supplies the full device state snapshot for one request token.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn request_context(&self, token: RequestToken) -> Result<serde_json::Value>;
}

/// Test provider returning a canned context, optionally primed to fail.
pub struct MockContextProvider {
    context: Mutex<serde_json::Value>,
    fail: AtomicBool,
}

impl MockContextProvider {
    pub fn new() -> Self {
        Self {
            context: Mutex::new(json!([{
                "header": {"namespace": "Speaker", "name": "VolumeState"},
                "payload": {"volume": 50, "muted": false}
            }])),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_context(&self, context: serde_json::Value) {
        *self.context.lock().unwrap_or_else(|e| e.into_inner()) = context;
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

impl Default for MockContextProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextProvider for MockContextProvider {
    async fn request_context(&self, token: RequestToken) -> Result<serde_json::Value> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoicegateError::ContextUnavailable {
                message: format!("mock provider failed token {}", token),
            });
        }
        Ok(self.context.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }
}
