//! Directive router and lifecycle tracker.
//!
//! Each (namespace, name) pair is registered with exactly one handler and
//! one blocking policy before any directive of that type can be routed.
//! Per directive the router drives `pre_handle` → `handle` → completion via
//! the directive's result handle, with `cancel` replacing completion when a
//! dialog is superseded. While a BLOCKING directive is in flight on a
//! handler, later directives for that handler are pre-handled immediately
//! but only handled once the in-flight result is signaled.

use crate::directive::directive::{BlockingPolicy, Directive, NamespaceAndName};
use crate::directive::result::{DirectiveResult, DirectiveStatus};
use crate::error::{Result, VoicegateError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Handler target for one or more directive types.
///
/// The handler keeps the `DirectiveResult` given at pre-handle and must
/// eventually signal exactly one completion on it; a handler that never does
/// stalls its own blocking queue indefinitely.
pub trait DirectiveHandler: Send + Sync {
    /// Validation and setup. No execution side effects expected yet.
    fn pre_handle(&self, directive: &Directive, result: DirectiveResult) -> Result<()>;

    /// Begins execution of a pre-handled directive. Returns false if the
    /// message id is unknown to the handler.
    fn handle(&self, message_id: &str) -> bool;

    /// Releases all resources associated with the message id. Issued when the
    /// directive is superseded or its owner is torn down before completion.
    fn cancel(&self, message_id: &str);
}

/// Classification of a directive that could not be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    /// The message could not be parsed into a directive.
    Malformed,
    /// No handler is registered for the directive's namespace and name.
    Unroutable,
    /// A registered handler refused or failed the directive.
    HandlingError,
}

/// Side channel for directives that never reach a handler. Non-fatal; the
/// capture state machine is unaffected.
pub trait ExceptionReporter: Send + Sync {
    fn report(&self, raw_payload: &str, kind: ExceptionKind, message: &str);
}

/// Default reporter that logs exceptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogExceptionReporter;

impl ExceptionReporter for LogExceptionReporter {
    fn report(&self, raw_payload: &str, kind: ExceptionKind, message: &str) {
        warn!(?kind, payload = raw_payload, "directive exception: {}", message);
    }
}

/// Handler identity for blocking bookkeeping: one queue per handler
/// instance, not per directive type.
type HandlerKey = usize;

fn handler_key(handler: &Arc<dyn DirectiveHandler>) -> HandlerKey {
    Arc::as_ptr(handler) as *const () as usize
}

struct Registration {
    handler: Arc<dyn DirectiveHandler>,
    policy: BlockingPolicy,
}

struct TrackedDirective {
    handler: Arc<dyn DirectiveHandler>,
    policy: BlockingPolicy,
    dialog_request_id: Option<String>,
}

#[derive(Default)]
struct RouterInner {
    registrations: HashMap<NamespaceAndName, Registration>,
    /// Every directive between pre-handle and completion/cancellation.
    tracked: HashMap<String, TrackedDirective>,
    /// Message id of the blocking directive currently executing per handler.
    blocking_in_flight: HashMap<HandlerKey, String>,
    /// Directives pre-handled but waiting for the handler's blocking
    /// directive to complete.
    queued: HashMap<HandlerKey, VecDeque<String>>,
}

struct RouterCore {
    inner: Mutex<RouterInner>,
    exceptions: Arc<dyn ExceptionReporter>,
}

/// Accepts the core's declared directive table and routes matching inbound
/// directives through the handler lifecycle.
pub struct DirectiveRouter {
    core: Arc<RouterCore>,
}

impl DirectiveRouter {
    pub fn new() -> Self {
        Self::with_exception_reporter(Arc::new(LogExceptionReporter))
    }

    pub fn with_exception_reporter(exceptions: Arc<dyn ExceptionReporter>) -> Self {
        Self {
            core: Arc::new(RouterCore {
                inner: Mutex::new(RouterInner::default()),
                exceptions,
            }),
        }
    }

    /// Registers `handler` for a directive type with its blocking policy.
    /// Fails if the type is already routed.
    pub fn register(
        &self,
        scope: NamespaceAndName,
        handler: Arc<dyn DirectiveHandler>,
        policy: BlockingPolicy,
    ) -> Result<()> {
        let mut inner = lock(&self.core.inner);
        if inner.registrations.contains_key(&scope) {
            return Err(VoicegateError::DuplicateDirectiveHandler {
                name: scope.to_string(),
            });
        }
        debug!(directive = %scope, ?policy, "directive handler registered");
        inner.registrations.insert(scope, Registration { handler, policy });
        Ok(())
    }

    /// Parses and routes a raw inbound message. Parse failures go to the
    /// exception side channel with the raw payload attached.
    pub fn on_message(&self, raw: &str) {
        match Directive::from_json(raw) {
            Ok(directive) => self.route(directive, raw),
            Err(e) => {
                self.core
                    .exceptions
                    .report(raw, ExceptionKind::Malformed, &e.to_string());
            }
        }
    }

    /// Routes an already-parsed directive.
    pub fn on_directive(&self, directive: Directive) {
        let raw = directive.payload.to_string();
        self.route(directive, &raw);
    }

    fn route(&self, directive: Directive, raw: &str) {
        let scope = directive.scope();
        let message_id = directive.message_id.clone();

        let (handler, policy) = {
            let mut inner = lock(&self.core.inner);

            let Some(registration) = inner.registrations.get(&scope) else {
                drop(inner);
                self.core.exceptions.report(
                    raw,
                    ExceptionKind::Unroutable,
                    &format!("no handler registered for {}", scope),
                );
                return;
            };
            let handler = registration.handler.clone();
            let policy = registration.policy;

            if inner.tracked.contains_key(&message_id) {
                drop(inner);
                self.core.exceptions.report(
                    raw,
                    ExceptionKind::HandlingError,
                    &format!("duplicate message id {}", message_id),
                );
                return;
            }

            inner.tracked.insert(
                message_id.clone(),
                TrackedDirective {
                    handler: handler.clone(),
                    policy,
                    dialog_request_id: directive.dialog_request_id.clone(),
                },
            );
            (handler, policy)
        };

        // Pre-handle outside the lock; handlers may complete synchronously.
        let core = Arc::downgrade(&self.core);
        let result = DirectiveResult::new(message_id.clone(), move |id, status| {
            if let Some(core) = core.upgrade() {
                RouterCore::on_completed(&core, id, status);
            }
        });

        if let Err(e) = handler.pre_handle(&directive, result) {
            lock(&self.core.inner).tracked.remove(&message_id);
            self.core.exceptions.report(
                raw,
                ExceptionKind::HandlingError,
                &format!("pre-handle failed: {}", e),
            );
            return;
        }

        // Decide whether to start now or wait behind a blocking directive.
        let start = {
            let mut inner = lock(&self.core.inner);
            // Pre-handle may have completed the directive already.
            if !inner.tracked.contains_key(&message_id) {
                return;
            }
            let key = handler_key(&handler);
            if inner.blocking_in_flight.contains_key(&key) {
                inner.queued.entry(key).or_default().push_back(message_id.clone());
                debug!(message_id = %message_id, "directive queued behind blocking directive");
                false
            } else {
                if policy == BlockingPolicy::Blocking {
                    inner.blocking_in_flight.insert(key, message_id.clone());
                }
                true
            }
        };

        if start && !handler.handle(&message_id) {
            self.core.exceptions.report(
                raw,
                ExceptionKind::HandlingError,
                &format!("handler refused message id {}", message_id),
            );
            RouterCore::on_completed(
                &self.core,
                &message_id,
                DirectiveStatus::Failed("handler refused directive".to_string()),
            );
        }
    }

    /// Cancels every queued and in-flight directive carrying
    /// `dialog_request_id`. Canceled handlers must treat the message ids'
    /// resources as released.
    pub fn cancel_dialog(&self, dialog_request_id: &str) {
        let (canceled, next) = {
            let mut inner = lock(&self.core.inner);

            let ids: Vec<String> = inner
                .tracked
                .iter()
                .filter(|(_, t)| t.dialog_request_id.as_deref() == Some(dialog_request_id))
                .map(|(id, _)| id.clone())
                .collect();

            let mut canceled = Vec::new();
            let mut keys = Vec::new();
            for id in ids {
                if let Some(tracked) = inner.tracked.remove(&id) {
                    let key = handler_key(&tracked.handler);
                    if inner.blocking_in_flight.get(&key) == Some(&id) {
                        inner.blocking_in_flight.remove(&key);
                    }
                    if let Some(queue) = inner.queued.get_mut(&key) {
                        queue.retain(|queued_id| queued_id != &id);
                    }
                    keys.push(key);
                    canceled.push((tracked.handler, id));
                }
            }

            let mut next = Vec::new();
            for key in keys {
                next.extend(RouterCore::start_next_locked(&mut inner, key));
            }
            (canceled, next)
        };

        for (handler, id) in canceled {
            debug!(message_id = %id, "directive canceled");
            handler.cancel(&id);
        }
        RouterCore::run_started(&self.core, next);
    }
}

impl Default for DirectiveRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterCore {
    /// Completion callback from a directive's result handle.
    fn on_completed(core: &Arc<RouterCore>, message_id: &str, status: DirectiveStatus) {
        if let DirectiveStatus::Failed(reason) = &status {
            warn!(message_id, reason, "directive failed");
        }

        let next = {
            let mut inner = lock(&core.inner);
            let Some(tracked) = inner.tracked.remove(message_id) else {
                // Completed after cancellation; nothing left to do.
                return;
            };
            let key = handler_key(&tracked.handler);
            if inner.blocking_in_flight.get(&key).map(String::as_str) == Some(message_id) {
                inner.blocking_in_flight.remove(&key);
            }
            RouterCore::start_next_locked(&mut inner, key)
        };

        RouterCore::run_started(core, next);
    }

    /// Pops the next queued directive for a handler if nothing blocking is
    /// in flight, marking it started. Returns the handle() calls to make
    /// once the lock is released.
    fn start_next_locked(
        inner: &mut RouterInner,
        key: HandlerKey,
    ) -> Vec<(Arc<dyn DirectiveHandler>, String)> {
        let mut started = Vec::new();
        if inner.blocking_in_flight.contains_key(&key) {
            return started;
        }

        // Start queued directives until hitting a blocking one (inclusive):
        // non-blocking directives may run concurrently with each other.
        while let Some(id) = inner.queued.get_mut(&key).and_then(VecDeque::pop_front) {
            let Some(tracked) = inner.tracked.get(&id) else {
                continue;
            };
            started.push((tracked.handler.clone(), id.clone()));
            if tracked.policy == BlockingPolicy::Blocking {
                inner.blocking_in_flight.insert(key, id);
                break;
            }
        }
        started
    }

    fn run_started(core: &Arc<RouterCore>, started: Vec<(Arc<dyn DirectiveHandler>, String)>) {
        for (handler, id) in started {
            if !handler.handle(&id) {
                core.exceptions.report(
                    "",
                    ExceptionKind::HandlingError,
                    &format!("handler refused message id {}", id),
                );
                RouterCore::on_completed(
                    core,
                    &id,
                    DirectiveStatus::Failed("handler refused directive".to_string()),
                );
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
