//! One-shot completion handle owned by whichever handler received a
//! directive. Exactly one completion call is recorded per directive; later
//! calls are ignored and logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Terminal status of a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveStatus {
    Succeeded,
    Failed(String),
}

type CompletionSink = Box<dyn Fn(&str, DirectiveStatus) + Send + Sync>;

struct ResultInner {
    message_id: String,
    completed: AtomicBool,
    sink: CompletionSink,
}

/// Cloneable completion handle for one directive.
#[derive(Clone)]
pub struct DirectiveResult {
    inner: Arc<ResultInner>,
}

impl DirectiveResult {
    /// Creates a handle whose completion is reported to `sink` with the
    /// directive's message id.
    pub fn new(
        message_id: impl Into<String>,
        sink: impl Fn(&str, DirectiveStatus) + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(ResultInner {
                message_id: message_id.into(),
                completed: AtomicBool::new(false),
                sink: Box::new(sink),
            }),
        }
    }

    /// A handle that reports to nowhere. For tests and detached directives.
    pub fn detached(message_id: impl Into<String>) -> Self {
        Self::new(message_id, |_, _| {})
    }

    /// Marks the directive as successfully handled.
    pub fn succeeded(&self) {
        self.complete(DirectiveStatus::Succeeded);
    }

    /// Marks the directive as failed with a reason.
    pub fn failed(&self, reason: impl Into<String>) {
        self.complete(DirectiveStatus::Failed(reason.into()));
    }

    pub fn message_id(&self) -> &str {
        &self.inner.message_id
    }

    fn complete(&self, status: DirectiveStatus) {
        if self.inner.completed.swap(true, Ordering::SeqCst) {
            warn!(
                message_id = %self.inner.message_id,
                "directive result signaled more than once; ignoring"
            );
            return;
        }
        (self.inner.sink)(&self.inner.message_id, status);
    }
}
