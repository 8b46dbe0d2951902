//! Shared audio transport: ring buffer stream and provider bindings.

pub mod provider;
pub mod ring_buffer;

pub use provider::{AudioEncoding, AudioFormat, AudioProfile, AudioProvider};
pub use ring_buffer::{SharedAudioStream, StreamReadError, StreamReader, StreamWriter};
