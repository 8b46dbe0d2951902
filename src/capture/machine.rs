//! Capture state machine.
//!
//! Owns the IDLE → RECOGNIZING → BUSY / EXPECTING_SPEECH lifecycle of voice
//! capture: opens sessions on local triggers or ExpectSpeech directives,
//! acquires the dialog focus channel before recording, reads audio off the
//! shared stream, and finalizes each session into a Recognize event.
//!
//! The machine is an actor: a handle sends requests into a mailbox processed
//! by one task, so every transition is serialized. Focus notifications,
//! directive callbacks, and timer expirations all arrive through the same
//! mailbox. Callers observe transitions only through registered observers or
//! the futures returned by the handle.

use crate::audio::{AudioProvider, StreamReadError, StreamReader};
use crate::capture::session::{CaptureSession, Initiator};
use crate::config::CaptureConfig;
use crate::context::{ContextProvider, RequestToken, TokenSource};
use crate::defaults;
use crate::directive::{
    BlockingPolicy, Directive, DirectiveHandler, DirectiveResult, DirectiveRouter,
    NamespaceAndName,
};
use crate::error::{Result, VoicegateError};
use crate::events::{Event, EventSender};
use crate::focus::{FocusArbiter, FocusObserver, FocusState};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};
use uuid::Uuid;

const NAMESPACE: &str = "SpeechRecognizer";
const EXPECT_SPEECH: &str = "ExpectSpeech";
const STOP_CAPTURE: &str = "StopCapture";

/// Externally visible machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// No session open; ready for a trigger.
    Idle,
    /// A session holds foreground focus and is recording.
    Recognizing,
    /// Recording finished; the Recognize event is being assembled and sent.
    Busy,
    /// The service asked for follow-up speech; a dialog timer is running.
    ExpectingSpeech,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Idle => "IDLE",
            CaptureState::Recognizing => "RECOGNIZING",
            CaptureState::Busy => "BUSY",
            CaptureState::ExpectingSpeech => "EXPECTING_SPEECH",
        };
        write!(f, "{}", name)
    }
}

/// Receives every machine state transition, in order.
pub trait CaptureObserver: Send + Sync {
    fn on_state_changed(&self, state: CaptureState);
}

/// Lifecycle signal for the tasks belonging to one session. `Stop` ends the
/// recording but lets the session finalize; `Cancel` abandons it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionControl {
    Run,
    Stop,
    Cancel,
}

enum CaptureOutcome {
    Captured(Vec<i16>),
    Overrun { lost: u64 },
}

enum Request {
    Recognize {
        initiator: Initiator,
        provider: AudioProvider,
        begin_index: Option<u64>,
        end_index: Option<u64>,
        keyword: Option<String>,
        reply: oneshot::Sender<bool>,
    },
    StopCapture {
        reply: oneshot::Sender<bool>,
    },
    ResetState {
        reply: oneshot::Sender<()>,
    },
    QueryState {
        reply: oneshot::Sender<CaptureState>,
    },
    AddObserver(Arc<dyn CaptureObserver>),
    ExpectSpeech {
        timeout: Duration,
        dialog_request_id: Option<String>,
        result: DirectiveResult,
    },
    RemoteStopCapture {
        result: DirectiveResult,
    },
    FocusChanged {
        state: FocusState,
        generation: u64,
    },
    CaptureDone {
        generation: u64,
        outcome: CaptureOutcome,
    },
    FinalizeDone {
        generation: u64,
        success: bool,
    },
    DialogTimeout {
        generation: u64,
    },
}

/// Handle to a running capture state machine. Cheap to clone; the machine
/// shuts down when every handle (and registered directive handler) is gone.
#[derive(Clone)]
pub struct CaptureMachine {
    tx: mpsc::UnboundedSender<Request>,
    default_timeout: Duration,
}

impl CaptureMachine {
    /// Spawns the machine's actor task on the current runtime.
    ///
    /// `default_provider` is the stream used to auto-start a follow-up
    /// capture on ExpectSpeech when no capture has run yet.
    pub fn spawn(
        config: CaptureConfig,
        arbiter: Arc<FocusArbiter>,
        context_provider: Arc<dyn ContextProvider>,
        event_sender: Arc<dyn EventSender>,
        default_provider: Option<AudioProvider>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let default_timeout = Duration::from_millis(config.expect_speech_timeout_ms);

        let actor = MachineActor {
            config,
            arbiter,
            context_provider,
            event_sender,
            default_provider,
            tokens: TokenSource::new(),
            observers: Vec::new(),
            tx: tx.downgrade(),
            state: CaptureState::Idle,
            session: None,
            last_provider: None,
            holds_channel: false,
            generation: 0,
            timer_generation: 0,
            pending_expect: None,
            expecting_dialog_id: None,
        };
        tokio::spawn(actor.run(rx));

        Self { tx, default_timeout }
    }

    /// Opens a capture session.
    ///
    /// Resolves true once the resulting Recognize event has been handed to
    /// the event sender; false if the request was rejected (a session is
    /// already open, the provider's format is unsupported, a wake-word
    /// trigger carries no keyword) or the session was aborted before its
    /// event went out.
    pub async fn recognize(
        &self,
        initiator: Initiator,
        provider: AudioProvider,
        begin_index: Option<u64>,
        end_index: Option<u64>,
        keyword: Option<String>,
    ) -> bool {
        let (reply, rx) = oneshot::channel();
        let request = Request::Recognize {
            initiator,
            provider,
            begin_index,
            end_index,
            keyword,
            reply,
        };
        if self.tx.send(request).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Ends the open session's recording early. Resolves false if no session
    /// is actively recording.
    pub async fn stop_capture(&self) -> bool {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::StopCapture { reply }).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Universal cancellation: aborts any open session, suppresses its
    /// not-yet-sent event, cancels any dialog timer, releases focus, and
    /// returns the machine to IDLE. Idempotent; callable from any state.
    pub async fn reset_state(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::ResetState { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// The machine's current state.
    pub async fn state(&self) -> CaptureState {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::QueryState { reply }).is_err() {
            return CaptureState::Idle;
        }
        rx.await.unwrap_or(CaptureState::Idle)
    }

    /// Registers an observer for subsequent state transitions.
    pub fn add_observer(&self, observer: Arc<dyn CaptureObserver>) {
        let _ = self.tx.send(Request::AddObserver(observer));
    }

    /// Registers this machine's directive handlers (`ExpectSpeech` and
    /// `StopCapture` in the `SpeechRecognizer` namespace) with the router.
    pub fn register_directive_handlers(&self, router: &DirectiveRouter) -> Result<()> {
        let handler = Arc::new(CaptureDirectiveHandler {
            tx: self.tx.clone(),
            default_timeout: self.default_timeout,
            pending: Mutex::new(HashMap::new()),
        });
        router.register(
            NamespaceAndName::new(NAMESPACE, EXPECT_SPEECH),
            handler.clone(),
            BlockingPolicy::NonBlocking,
        )?;
        router.register(
            NamespaceAndName::new(NAMESPACE, STOP_CAPTURE),
            handler,
            BlockingPolicy::NonBlocking,
        )?;
        Ok(())
    }
}

/// Forwards focus notifications from the arbiter's delivery thread into the
/// actor mailbox. One forwarder per session: notifications carry the session
/// generation, so notifications still queued for an already-dead session
/// cannot touch its successor.
struct FocusForwarder {
    tx: mpsc::WeakUnboundedSender<Request>,
    generation: u64,
}

impl FocusObserver for FocusForwarder {
    fn on_focus_changed(&self, state: FocusState) {
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(Request::FocusChanged {
                state,
                generation: self.generation,
            });
        }
    }
}

/// Directive-side entry point. Pre-handle stores the directive and its
/// result handle; handle dispatches into the actor, which signals completion.
struct CaptureDirectiveHandler {
    tx: mpsc::UnboundedSender<Request>,
    default_timeout: Duration,
    pending: Mutex<HashMap<String, PendingDirective>>,
}

struct PendingDirective {
    directive: Directive,
    result: DirectiveResult,
}

impl DirectiveHandler for CaptureDirectiveHandler {
    fn pre_handle(&self, directive: &Directive, result: DirectiveResult) -> Result<()> {
        if directive.name == EXPECT_SPEECH {
            if let Some(timeout) = directive.payload.get("timeoutInMilliseconds") {
                if !timeout.is_u64() {
                    return Err(VoicegateError::MalformedDirective {
                        message: "timeoutInMilliseconds must be a non-negative integer"
                            .to_string(),
                    });
                }
            }
        }
        lock(&self.pending).insert(
            directive.message_id.clone(),
            PendingDirective {
                directive: directive.clone(),
                result,
            },
        );
        Ok(())
    }

    fn handle(&self, message_id: &str) -> bool {
        let Some(pending) = lock(&self.pending).remove(message_id) else {
            return false;
        };

        let request = match pending.directive.name.as_str() {
            EXPECT_SPEECH => {
                let timeout = pending
                    .directive
                    .payload
                    .get("timeoutInMilliseconds")
                    .and_then(serde_json::Value::as_u64)
                    .map(Duration::from_millis)
                    .unwrap_or(self.default_timeout);
                Request::ExpectSpeech {
                    timeout,
                    dialog_request_id: pending.directive.dialog_request_id.clone(),
                    result: pending.result,
                }
            }
            STOP_CAPTURE => Request::RemoteStopCapture {
                result: pending.result,
            },
            _ => return false,
        };

        if let Err(SendError(request)) = self.tx.send(request) {
            match request {
                Request::ExpectSpeech { result, .. } | Request::RemoteStopCapture { result, .. } => {
                    result.failed("capture machine is not running");
                }
                _ => {}
            }
        }
        true
    }

    fn cancel(&self, message_id: &str) {
        lock(&self.pending).remove(message_id);
    }
}

/// One open capture session inside the actor.
struct ActiveSession {
    descriptor: CaptureSession,
    reply: Option<oneshot::Sender<bool>>,
    control: watch::Sender<SessionControl>,
    /// Taken when recording starts on foreground grant.
    reader: Option<StreamReader>,
    started: bool,
}

struct MachineActor {
    config: CaptureConfig,
    arbiter: Arc<FocusArbiter>,
    context_provider: Arc<dyn ContextProvider>,
    event_sender: Arc<dyn EventSender>,
    default_provider: Option<AudioProvider>,
    tokens: TokenSource,
    observers: Vec<Arc<dyn CaptureObserver>>,
    tx: mpsc::WeakUnboundedSender<Request>,
    state: CaptureState,
    session: Option<ActiveSession>,
    /// Provider of the most recent session; preferred for ExpectSpeech
    /// auto-start.
    last_provider: Option<AudioProvider>,
    holds_channel: bool,
    /// Bumped whenever a session opens or dies; stale task messages and focus
    /// notifications carry an older value and are dropped.
    generation: u64,
    /// Same scheme for the dialog timer.
    timer_generation: u64,
    /// Timeout of an ExpectSpeech that arrived while BUSY, applied once the
    /// in-flight session finalizes.
    pending_expect: Option<Duration>,
    /// Dialog id to carry into the next session opened from EXPECTING_SPEECH.
    expecting_dialog_id: Option<String>,
}

impl MachineActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Request>) {
        while let Some(request) = rx.recv().await {
            self.dispatch(request);
        }
        debug!("capture machine stopped");
    }

    fn dispatch(&mut self, request: Request) {
        match request {
            Request::Recognize {
                initiator,
                provider,
                begin_index,
                end_index,
                keyword,
                reply,
            } => self.handle_recognize(initiator, provider, begin_index, end_index, keyword, Some(reply)),
            Request::StopCapture { reply } => {
                let stopped = self.stop_active_capture();
                let _ = reply.send(stopped);
            }
            Request::ResetState { reply } => {
                self.reset();
                let _ = reply.send(());
            }
            Request::QueryState { reply } => {
                let _ = reply.send(self.state);
            }
            Request::AddObserver(observer) => self.observers.push(observer),
            Request::ExpectSpeech {
                timeout,
                dialog_request_id,
                result,
            } => self.handle_expect_speech(timeout, dialog_request_id, result),
            Request::RemoteStopCapture { result } => {
                if self.stop_active_capture() {
                    result.succeeded();
                } else {
                    result.failed(format!("StopCapture not allowed in {} state", self.state));
                }
            }
            Request::FocusChanged { state, generation } => {
                self.handle_focus_changed(state, generation)
            }
            Request::CaptureDone {
                generation,
                outcome,
            } => self.handle_capture_done(generation, outcome),
            Request::FinalizeDone {
                generation,
                success,
            } => self.handle_finalize_done(generation, success),
            Request::DialogTimeout { generation } => self.handle_dialog_timeout(generation),
        }
    }

    /// Opens a session if the request is acceptable, acquires the dialog
    /// channel, and leaves the session waiting for the foreground grant.
    fn handle_recognize(
        &mut self,
        initiator: Initiator,
        provider: AudioProvider,
        begin_index: Option<u64>,
        end_index: Option<u64>,
        keyword: Option<String>,
        reply: Option<oneshot::Sender<bool>>,
    ) {
        if self.session.is_some() {
            debug!("recognize rejected: a capture session is already open");
            refuse(reply);
            return;
        }
        if !provider.format.is_supported() {
            warn!(format = ?provider.format, "recognize rejected: unsupported audio format");
            refuse(reply);
            return;
        }
        if initiator == Initiator::WakeWord && keyword.is_none() {
            warn!("recognize rejected: wake-word trigger without a keyword");
            refuse(reply);
            return;
        }

        let mut reader = match provider.stream.reader() {
            Ok(reader) => reader,
            Err(e) => {
                warn!(error = %e, "recognize rejected: cannot open stream reader");
                refuse(reply);
                return;
            }
        };
        if let Some(begin) = begin_index {
            reader.seek(begin);
        }

        // A session opened from EXPECTING_SPEECH consumes the dialog window:
        // the timer dies and the dialog id carries over.
        let dialog_request_id = if self.state == CaptureState::ExpectingSpeech {
            self.timer_generation += 1;
            self.expecting_dialog_id
                .take()
                .unwrap_or_else(|| Uuid::new_v4().to_string())
        } else {
            Uuid::new_v4().to_string()
        };

        self.generation += 1;
        let (control, _) = watch::channel(SessionControl::Run);
        self.last_provider = Some(provider.clone());
        self.session = Some(ActiveSession {
            descriptor: CaptureSession {
                initiator,
                provider,
                begin_index,
                end_index,
                keyword,
                dialog_request_id: dialog_request_id.clone(),
            },
            reply,
            control,
            reader: Some(reader),
            started: false,
        });

        let observer: Arc<dyn FocusObserver> = Arc::new(FocusForwarder {
            tx: self.tx.clone(),
            generation: self.generation,
        });
        if !self.arbiter.acquire_channel(
            defaults::DIALOG_CHANNEL_NAME,
            observer,
            defaults::CAPTURE_ACTIVITY_ID,
        ) {
            warn!("recognize rejected: dialog channel unavailable");
            if let Some(mut session) = self.session.take() {
                if let Some(reply) = session.reply.take() {
                    let _ = reply.send(false);
                }
            }
            self.set_state(CaptureState::Idle);
            return;
        }
        self.holds_channel = true;
        debug!(
            dialog = %dialog_request_id,
            initiator = %initiator,
            "capture session opened; waiting for foreground focus"
        );
    }

    fn handle_focus_changed(&mut self, focus: FocusState, generation: u64) {
        if generation != self.generation {
            debug!(%focus, "dropping focus notification addressed to a dead session");
            return;
        }
        match focus {
            FocusState::Foreground => self.start_capture(),
            FocusState::Background | FocusState::None => {
                // Displacement: another activity took the dialog channel
                if self.session.as_ref().is_some_and(|s| s.started) {
                    debug!(%focus, "focus lost during active session; resetting");
                    self.reset();
                }
            }
        }
    }

    /// Begins recording once the dialog channel reaches foreground.
    fn start_capture(&mut self) {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        let generation = self.generation;
        let (reader, control, end_index) = {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            if session.started {
                return;
            }
            session.started = true;
            let Some(reader) = session.reader.take() else {
                return;
            };
            (reader, session.control.subscribe(), session.descriptor.end_index)
        };

        self.set_state(CaptureState::Recognizing);
        let chunk_words = self.config.chunk_words.max(1);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        tokio::spawn(capture_task(
            reader,
            end_index,
            chunk_words,
            poll_interval,
            control,
            tx,
            generation,
        ));
    }

    /// Ends the active recording; the session proceeds to finalization.
    fn stop_active_capture(&mut self) -> bool {
        let Some(session) = self.session.as_ref() else {
            return false;
        };
        if !session.started || self.state != CaptureState::Recognizing {
            return false;
        }
        let _ = session.control.send(SessionControl::Stop);
        true
    }

    fn handle_capture_done(&mut self, generation: u64, outcome: CaptureOutcome) {
        if generation != self.generation || self.session.is_none() {
            return;
        }
        match outcome {
            CaptureOutcome::Overrun { lost } => {
                warn!(lost, "capture aborted: audio stream overrun");
                self.reset();
            }
            CaptureOutcome::Captured(samples) => {
                let Some(tx) = self.tx.upgrade() else {
                    return;
                };
                let (descriptor, control) = {
                    let Some(session) = self.session.as_ref() else {
                        return;
                    };
                    (session.descriptor.clone(), session.control.subscribe())
                };
                self.set_state(CaptureState::Busy);
                debug!(
                    words = samples.len(),
                    dialog = %descriptor.dialog_request_id,
                    "recording finished; assembling Recognize event"
                );
                tokio::spawn(finalize_task(
                    self.context_provider.clone(),
                    self.event_sender.clone(),
                    self.tokens.next(),
                    descriptor,
                    samples,
                    control,
                    tx,
                    generation,
                ));
            }
        }
    }

    fn handle_finalize_done(&mut self, generation: u64, success: bool) {
        if generation != self.generation {
            return;
        }
        let Some(mut session) = self.session.take() else {
            return;
        };
        if let Some(reply) = session.reply.take() {
            let _ = reply.send(success);
        }
        self.generation += 1;
        self.release_focus();
        self.set_state(CaptureState::Idle);
        if let Some(timeout) = self.pending_expect.take() {
            self.enter_expecting_speech(timeout);
        }
    }

    fn handle_expect_speech(
        &mut self,
        timeout: Duration,
        dialog_request_id: Option<String>,
        result: DirectiveResult,
    ) {
        match self.state {
            CaptureState::Idle => {
                self.expecting_dialog_id = dialog_request_id;
                result.succeeded();
                self.enter_expecting_speech(timeout);
            }
            CaptureState::Busy => {
                // The in-flight session finalizes first; the dialog window
                // opens as the machine passes back through IDLE.
                self.expecting_dialog_id = dialog_request_id.or_else(|| {
                    self.session
                        .as_ref()
                        .map(|s| s.descriptor.dialog_request_id.clone())
                });
                self.pending_expect = Some(timeout);
                result.succeeded();
            }
            state => {
                result.failed(format!("ExpectSpeech not allowed in {} state", state));
            }
        }
    }

    /// Opens the dialog window: arms the timer and, when a continuously
    /// readable provider is known, starts the follow-up capture immediately.
    fn enter_expecting_speech(&mut self, timeout: Duration) {
        self.set_state(CaptureState::ExpectingSpeech);
        self.timer_generation += 1;
        let generation = self.timer_generation;
        if let Some(tx) = self.tx.upgrade() {
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                let _ = tx.send(Request::DialogTimeout { generation });
            });
        }

        let provider = self
            .last_provider
            .clone()
            .or_else(|| self.default_provider.clone());
        if let Some(provider) = provider {
            if provider.always_readable {
                self.handle_recognize(Initiator::Directive, provider, None, None, None, None);
            }
        }
    }

    fn handle_dialog_timeout(&mut self, generation: u64) {
        if generation != self.timer_generation || self.state != CaptureState::ExpectingSpeech {
            return;
        }
        debug!("dialog window expired without speech");
        self.expecting_dialog_id = None;
        let sender = self.event_sender.clone();
        tokio::spawn(async move {
            if let Err(e) = sender.send(Event::expect_speech_timed_out()).await {
                warn!(error = %e, "failed to send ExpectSpeechTimedOut");
            }
        });
        self.set_state(CaptureState::Idle);
    }

    /// Tears down whatever is in flight and returns to IDLE.
    fn reset(&mut self) {
        self.generation += 1;
        self.timer_generation += 1;
        self.pending_expect = None;
        self.expecting_dialog_id = None;
        if let Some(mut session) = self.session.take() {
            let _ = session.control.send(SessionControl::Cancel);
            if let Some(reply) = session.reply.take() {
                let _ = reply.send(false);
            }
        }
        self.release_focus();
        self.set_state(CaptureState::Idle);
    }

    fn release_focus(&mut self) {
        if self.holds_channel {
            self.arbiter
                .release_channel(defaults::DIALOG_CHANNEL_NAME, defaults::CAPTURE_ACTIVITY_ID);
            self.holds_channel = false;
        }
    }

    fn set_state(&mut self, state: CaptureState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "capture state changed");
        self.state = state;
        for observer in &self.observers {
            observer.on_state_changed(state);
        }
    }
}

fn refuse(reply: Option<oneshot::Sender<bool>>) {
    if let Some(reply) = reply {
        let _ = reply.send(false);
    }
}

/// Reads the session's audio off the stream until the end index, a stop
/// signal, or an overrun.
async fn capture_task(
    mut reader: StreamReader,
    end_index: Option<u64>,
    chunk_words: usize,
    poll_interval: Duration,
    mut control: watch::Receiver<SessionControl>,
    tx: mpsc::UnboundedSender<Request>,
    generation: u64,
) {
    let mut buf = vec![0i16; chunk_words];
    let mut samples = Vec::new();

    loop {
        if *control.borrow() != SessionControl::Run {
            break;
        }
        let want = match end_index {
            Some(end) => {
                let remaining = end.saturating_sub(reader.position());
                if remaining == 0 {
                    break;
                }
                remaining.min(buf.len() as u64) as usize
            }
            None => buf.len(),
        };
        match reader.read(&mut buf[..want]) {
            Ok(0) => {
                tokio::select! {
                    changed = control.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            Ok(n) => samples.extend_from_slice(&buf[..n]),
            Err(StreamReadError::Overrun { lost }) => {
                let _ = tx.send(Request::CaptureDone {
                    generation,
                    outcome: CaptureOutcome::Overrun { lost },
                });
                return;
            }
        }
    }

    let _ = tx.send(Request::CaptureDone {
        generation,
        outcome: CaptureOutcome::Captured(samples),
    });
}

/// Collects context, assembles the Recognize event, and hands it to the
/// sender. A cancellation observed before the handoff suppresses the event.
#[allow(clippy::too_many_arguments)]
async fn finalize_task(
    context_provider: Arc<dyn ContextProvider>,
    event_sender: Arc<dyn EventSender>,
    token: RequestToken,
    descriptor: CaptureSession,
    samples: Vec<i16>,
    control: watch::Receiver<SessionControl>,
    tx: mpsc::UnboundedSender<Request>,
    generation: u64,
) {
    let success = match context_provider.request_context(token).await {
        Err(e) => {
            warn!(error = %e, "context request failed; capture dropped");
            false
        }
        Ok(context) => {
            if *control.borrow() == SessionControl::Cancel {
                false
            } else {
                let event = Event::recognize(
                    descriptor.dialog_request_id.clone(),
                    descriptor.provider.profile,
                    descriptor.provider.format,
                    Some(descriptor.initiator_payload()),
                    context,
                    samples,
                );
                match event_sender.send(event).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "failed to send Recognize event");
                        false
                    }
                }
            }
        }
    };
    let _ = tx.send(Request::FinalizeDone {
        generation,
        success,
    });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
