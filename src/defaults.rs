//! Default configuration constants for voicegate.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Name of the dialog focus channel.
///
/// User-initiated and wake-word-initiated capture sessions contend on this
/// channel; it outranks everything else so a live dialog always wins the
/// microphone/speaker.
pub const DIALOG_CHANNEL_NAME: &str = "Dialog";

/// Priority of the dialog channel. Numerically highest priority is foreground.
pub const DIALOG_CHANNEL_PRIORITY: u32 = 300;

/// Name of the alerts focus channel (timers, reminders).
pub const ALERTS_CHANNEL_NAME: &str = "Alerts";

/// Priority of the alerts channel.
pub const ALERTS_CHANNEL_PRIORITY: u32 = 200;

/// Name of the content focus channel (long-running media playback).
pub const CONTENT_CHANNEL_NAME: &str = "Content";

/// Priority of the content channel.
pub const CONTENT_CHANNEL_PRIORITY: u32 = 100;

/// Activity id used by the capture state machine when acquiring the dialog
/// channel.
pub const CAPTURE_ACTIVITY_ID: &str = "SpeechRecognizer";

/// Default dialog timer duration in milliseconds.
///
/// Applied when an ExpectSpeech directive omits `timeoutInMilliseconds`.
/// The window is short by design: if the user does not speak again within a
/// few seconds the dialog is over.
pub const EXPECT_SPEECH_TIMEOUT_MS: u64 = 5000;

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for cloud speech recognition and matches the only
/// supported wire profile (16-bit LPCM mono).
pub const SAMPLE_RATE: u32 = 16000;

/// Default shared stream capacity in audio words (samples).
///
/// 10 seconds at 16kHz. Big enough for a wake-word detector to lag a full
/// utterance behind the capture pipeline without overrunning.
pub const STREAM_WORD_COUNT: usize = 160_000;

/// Default maximum number of concurrent stream readers.
///
/// Capture pipeline + wake-word detector + two spares.
pub const MAX_STREAM_READERS: usize = 4;

/// Capture read chunk size in words.
///
/// 10ms at 16kHz per read keeps the capture task responsive to stop and
/// cancel requests.
pub const CAPTURE_CHUNK_WORDS: usize = 160;

/// Polling interval for the capture task when the stream has no new words.
pub const CAPTURE_POLL_INTERVAL_MS: u64 = 10;
