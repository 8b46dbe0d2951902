//! voicegate - client-side voice capture orchestration
//!
//! Coordinates everything between a local capture trigger and a cloud speech
//! service: a capture state machine, a priority-based focus arbiter, a
//! directive lifecycle router, and a lock-free multi-reader audio stream.
//! Transport, wake-word detection, and media playback live behind trait
//! seams; this crate owns the protocol choreography.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod audio;
pub mod capture;
pub mod config;
pub mod context;
pub mod defaults;
pub mod directive;
pub mod error;
pub mod events;
pub mod focus;

pub use audio::{AudioFormat, AudioProfile, AudioProvider, SharedAudioStream};
pub use capture::{CaptureMachine, CaptureObserver, CaptureState, Initiator};
pub use config::Config;
pub use context::{ContextProvider, RequestToken};
pub use directive::{DirectiveRouter, DirectiveStatus};
pub use error::{Result, VoicegateError};
pub use events::{Event, EventSender};
pub use focus::{FocusArbiter, FocusObserver, FocusState};
