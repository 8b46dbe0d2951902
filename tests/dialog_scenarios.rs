//! End-to-end dialog round trips: capture, focus, events, and directive
//! batches wired together the way an embedding client would run them.

use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use voicegate::audio::AudioProvider;
use voicegate::capture::{CaptureMachine, Initiator};
use voicegate::config::{CaptureConfig, FocusConfig};
use voicegate::context::MockContextProvider;
use voicegate::defaults;
use voicegate::directive::{
    BlockingPolicy, Directive, DirectiveHandler, DirectiveResult, DirectiveRouter,
    NamespaceAndName,
};
use voicegate::events::MockEventSender;
use voicegate::{CaptureState, FocusArbiter, FocusObserver, FocusState, SharedAudioStream};

struct Client {
    machine: CaptureMachine,
    arbiter: Arc<FocusArbiter>,
    router: DirectiveRouter,
    sender: Arc<MockEventSender>,
    stream: SharedAudioStream,
}

fn client(default_provider: bool) -> Client {
    // RUST_LOG=voicegate=debug surfaces the machine's transition log
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let arbiter = FocusArbiter::new(&FocusConfig::default().channels);
    let sender = Arc::new(MockEventSender::new());
    let context = Arc::new(MockContextProvider::new());
    let stream = SharedAudioStream::new(8192, 3).unwrap();
    let config = CaptureConfig {
        expect_speech_timeout_ms: 5000,
        chunk_words: 32,
        poll_interval_ms: 2,
    };

    let machine = CaptureMachine::spawn(
        config,
        arbiter.clone(),
        context,
        sender.clone(),
        default_provider.then(|| AudioProvider::hands_free(stream.clone())),
    );
    let router = DirectiveRouter::new();
    machine.register_directive_handlers(&router).unwrap();

    Client {
        machine,
        arbiter,
        router,
        sender,
        stream,
    }
}

async fn wait_for_state(machine: &CaptureMachine, want: CaptureState) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if machine.state().await == want {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for state {}",
            want
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Focus observer forwarding notifications into a channel, standing in for a
/// media player on the content channel.
struct ContentPlayer {
    tx: crossbeam_channel::Sender<FocusState>,
}

impl ContentPlayer {
    fn new() -> (Arc<Self>, crossbeam_channel::Receiver<FocusState>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Arc::new(Self { tx }), rx)
    }
}

impl FocusObserver for ContentPlayer {
    fn on_focus_changed(&self, state: FocusState) {
        let _ = self.tx.send(state);
    }
}

fn expect_focus(rx: &crossbeam_channel::Receiver<FocusState>, want: FocusState) {
    let got = rx
        .recv_timeout(Duration::from_secs(2))
        .unwrap_or_else(|_| panic!("timed out waiting for focus {}", want));
    assert_eq!(got, want);
}

/// Handler standing in for a speech synthesizer: records handled order and
/// keeps result handles so tests decide when Speak finishes.
#[derive(Default)]
struct SynthesizerHandler {
    handled: Mutex<Vec<String>>,
    results: Mutex<HashMap<String, DirectiveResult>>,
}

impl SynthesizerHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn handled(&self) -> Vec<String> {
        self.handled.lock().unwrap().clone()
    }

    fn finish(&self, message_id: &str) {
        let result = self
            .results
            .lock()
            .unwrap()
            .remove(message_id)
            .expect("no result for message id");
        result.succeeded();
    }
}

impl DirectiveHandler for SynthesizerHandler {
    fn pre_handle(&self, directive: &Directive, result: DirectiveResult) -> voicegate::Result<()> {
        self.results
            .lock()
            .unwrap()
            .insert(directive.message_id.clone(), result);
        Ok(())
    }

    fn handle(&self, message_id: &str) -> bool {
        if !self.results.lock().unwrap().contains_key(message_id) {
            return false;
        }
        self.handled.lock().unwrap().push(message_id.to_string());
        true
    }

    fn cancel(&self, message_id: &str) {
        self.results.lock().unwrap().remove(message_id);
    }
}

fn directive(namespace: &str, name: &str, message_id: &str, dialog: &str) -> Directive {
    Directive::new(
        NamespaceAndName::new(namespace, name),
        message_id,
        Some(dialog.to_string()),
        json!({}),
    )
}

/// A complete tap-to-talk exchange: the content channel is backgrounded for
/// the dialog, the Recognize event goes out, and the response batch runs its
/// blocking directive before the non-blocking one that follows it.
#[tokio::test]
async fn test_tap_exchange_with_directive_batch() {
    let c = client(false);

    // A media player holds the content channel before the user speaks
    let (player, player_rx) = ContentPlayer::new();
    assert!(c.arbiter.acquire_channel(
        defaults::CONTENT_CHANNEL_NAME,
        player,
        "media-player",
    ));
    expect_focus(&player_rx, FocusState::Foreground);

    let synthesizer = SynthesizerHandler::new();
    let speaker = SynthesizerHandler::new();
    c.router
        .register(
            NamespaceAndName::new("SpeechSynthesizer", "Speak"),
            synthesizer.clone(),
            BlockingPolicy::Blocking,
        )
        .unwrap();
    c.router
        .register(
            NamespaceAndName::new("Speaker", "SetMute"),
            speaker.clone(),
            BlockingPolicy::NonBlocking,
        )
        .unwrap();

    // User taps and speaks
    let mut writer = c.stream.writer().unwrap();
    writer.write(&[5i16; 64]);
    let provider = AudioProvider::push_to_talk(c.stream.clone());
    assert!(
        c.machine
            .recognize(Initiator::Tap, provider, Some(0), Some(64), None)
            .await
    );

    // The dialog took foreground away from the player and gave it back
    expect_focus(&player_rx, FocusState::Background);
    expect_focus(&player_rx, FocusState::Foreground);

    let sent = c.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name, "Recognize");
    let dialog_id = sent[0].dialog_request_id.clone().unwrap();

    // Service responds with Speak (blocking) followed by SetMute
    c.router
        .on_directive(directive("SpeechSynthesizer", "Speak", "speak-1", &dialog_id));
    c.router
        .on_directive(directive("Speaker", "SetMute", "mute-1", &dialog_id));

    // Blocking scope is per handler: the in-flight Speak does not hold up
    // the speaker's non-blocking SetMute
    assert_eq!(synthesizer.handled(), vec!["speak-1"]);
    assert_eq!(speaker.handled(), vec!["mute-1"]);
    synthesizer.finish("speak-1");
    speaker.finish("mute-1");
}

/// Releasing the button without having said anything still produces a
/// Recognize event; end-of-speech is the service's call.
#[tokio::test]
async fn test_silence_still_sends_recognize() {
    let c = client(false);
    let provider = AudioProvider::push_to_talk(c.stream.clone());

    let capture = tokio::spawn({
        let machine = c.machine.clone();
        async move {
            machine
                .recognize(Initiator::Hold, provider, None, None, None)
                .await
        }
    });
    wait_for_state(&c.machine, CaptureState::Recognizing).await;

    assert!(c.machine.stop_capture().await);
    assert!(capture.await.unwrap());

    let sent = c.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].name, "Recognize");
    assert_eq!(sent[0].audio.as_deref(), Some(&[][..]));
}

/// Multi-turn: an ExpectSpeech directive reopens capture without any local
/// trigger, and both Recognize events share one dialog id.
#[tokio::test]
async fn test_multiturn_keeps_dialog_id() {
    let c = client(true);

    // First turn
    let mut writer = c.stream.writer().unwrap();
    writer.write(&[3i16; 32]);
    let provider = AudioProvider::hands_free(c.stream.clone());
    assert!(
        c.machine
            .recognize(
                Initiator::WakeWord,
                provider,
                Some(0),
                Some(32),
                Some("computer".to_string()),
            )
            .await
    );
    let first = c.sender.sent();
    assert_eq!(first.len(), 1);
    let dialog_id = first[0].dialog_request_id.clone().unwrap();
    assert_eq!(first[0].payload["initiator"]["type"], "WAKEWORD");

    // The service wants a follow-up in the same dialog
    c.router.on_directive(Directive::new(
        NamespaceAndName::new("SpeechRecognizer", "ExpectSpeech"),
        "expect-1",
        Some(dialog_id.clone()),
        json!({"timeoutInMilliseconds": 5000}),
    ));

    // Capture reopens by itself; the user answers
    wait_for_state(&c.machine, CaptureState::Recognizing).await;
    writer.write(&[4i16; 16]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(c.machine.stop_capture().await);

    timeout(Duration::from_secs(1), c.sender.wait_for_count(2))
        .await
        .expect("timed out waiting for second Recognize");
    let sent = c.sender.sent();
    assert_eq!(sent[1].name, "Recognize");
    assert_eq!(sent[1].dialog_request_id.as_deref(), Some(dialog_id.as_str()));
    assert_eq!(sent[1].payload["initiator"]["type"], "DIRECTIVE");
}

/// An unanswered dialog window expires into ExpectSpeechTimedOut, and the
/// dialog channel is never touched while waiting.
#[tokio::test]
async fn test_expect_speech_timeout_reports_and_leaves_focus_alone() {
    let c = client(false);

    let (player, player_rx) = ContentPlayer::new();
    assert!(c.arbiter.acquire_channel(
        defaults::CONTENT_CHANNEL_NAME,
        player,
        "media-player",
    ));
    expect_focus(&player_rx, FocusState::Foreground);

    c.router.on_directive(Directive::new(
        NamespaceAndName::new("SpeechRecognizer", "ExpectSpeech"),
        "expect-1",
        Some("dialog-1".to_string()),
        json!({"timeoutInMilliseconds": 40}),
    ));
    wait_for_state(&c.machine, CaptureState::ExpectingSpeech).await;

    timeout(Duration::from_secs(1), c.sender.wait_for_count(1))
        .await
        .expect("timed out waiting for ExpectSpeechTimedOut");
    let sent = c.sender.sent();
    assert_eq!(sent[0].name, "ExpectSpeechTimedOut");
    wait_for_state(&c.machine, CaptureState::Idle).await;

    // No provider could auto-start, so focus was never re-acquired and the
    // player saw nothing
    assert!(player_rx.try_recv().is_err());
    assert_eq!(
        c.arbiter.foreground_channel().as_deref(),
        Some(defaults::CONTENT_CHANNEL_NAME)
    );
}

/// A recognize request immediately followed by a reset: no event leaks out
/// and other channel holders end up exactly where they started.
#[tokio::test]
async fn test_recognize_then_immediate_reset() {
    let c = client(false);

    let (player, player_rx) = ContentPlayer::new();
    assert!(c.arbiter.acquire_channel(
        defaults::CONTENT_CHANNEL_NAME,
        player,
        "media-player",
    ));
    expect_focus(&player_rx, FocusState::Foreground);

    let provider = AudioProvider::push_to_talk(c.stream.clone());
    let capture = tokio::spawn({
        let machine = c.machine.clone();
        async move {
            machine
                .recognize(Initiator::Tap, provider, None, None, None)
                .await
        }
    });

    // Reset the moment the session exists, racing the foreground grant
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while c.arbiter.foreground_channel().as_deref() != Some(defaults::DIALOG_CHANNEL_NAME) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "session never acquired the dialog channel"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    c.machine.reset_state().await;

    assert!(!capture.await.unwrap());
    assert_eq!(c.machine.state().await, CaptureState::Idle);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(c.sender.sent().is_empty());

    // The player may see a transient background blip but must end foreground
    let mut last = FocusState::Foreground;
    while let Ok(state) = player_rx.recv_timeout(Duration::from_millis(100)) {
        last = state;
    }
    assert_eq!(last, FocusState::Foreground);
    assert_eq!(
        c.arbiter.foreground_channel().as_deref(),
        Some(defaults::CONTENT_CHANNEL_NAME)
    );
}
