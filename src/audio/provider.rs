//! Audio provider: the binding of a shared stream, its format, and the
//! policy flags that decide whether a capture request may preempt another.

use crate::audio::ring_buffer::SharedAudioStream;
use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Audio sample encoding. Only 16-bit LPCM is supported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioEncoding {
    Lpcm,
}

/// Raw audio format bound to a provider's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub sample_size_bits: u16,
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            encoding: AudioEncoding::Lpcm,
            sample_rate: defaults::SAMPLE_RATE,
            sample_size_bits: 16,
            channels: 1,
        }
    }
}

impl AudioFormat {
    /// True if this format is accepted by the capture pipeline:
    /// 16kHz, 16-bit, mono LPCM.
    pub fn is_supported(&self) -> bool {
        self.encoding == AudioEncoding::Lpcm
            && self.sample_rate == defaults::SAMPLE_RATE
            && self.sample_size_bits == 16
            && self.channels == 1
    }

    /// Wire form, e.g. `AUDIO_L16_RATE_16000_CHANNELS_1`.
    pub fn wire_name(&self) -> String {
        format!(
            "AUDIO_L{}_RATE_{}_CHANNELS_{}",
            self.sample_size_bits, self.sample_rate, self.channels
        )
    }
}

/// Acoustic profile reported to the service with each capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioProfile {
    CloseTalk,
    NearField,
    FarField,
}

impl fmt::Display for AudioProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioProfile::CloseTalk => "CLOSE_TALK",
            AudioProfile::NearField => "NEAR_FIELD",
            AudioProfile::FarField => "FAR_FIELD",
        };
        write!(f, "{}", name)
    }
}

/// Binding of a stream, format, profile, and preemption flags.
///
/// `always_readable` marks a provider whose stream is continuously fed (a
/// hands-free microphone) and can therefore start a follow-up capture without
/// an external trigger. `can_override` / `can_be_overridden` decide whether a
/// new capture request may displace an active one.
#[derive(Clone)]
pub struct AudioProvider {
    pub stream: SharedAudioStream,
    pub format: AudioFormat,
    pub profile: AudioProfile,
    pub always_readable: bool,
    pub can_override: bool,
    pub can_be_overridden: bool,
}

impl AudioProvider {
    /// A hands-free provider: always readable, overrides and can be
    /// overridden. Typical for a wake-word microphone.
    pub fn hands_free(stream: SharedAudioStream) -> Self {
        Self {
            stream,
            format: AudioFormat::default(),
            profile: AudioProfile::NearField,
            always_readable: true,
            can_override: true,
            can_be_overridden: true,
        }
    }

    /// A push-to-talk provider: only readable while the button is held,
    /// overrides an active capture but cannot itself be displaced.
    pub fn push_to_talk(stream: SharedAudioStream) -> Self {
        Self {
            stream,
            format: AudioFormat::default(),
            profile: AudioProfile::CloseTalk,
            always_readable: false,
            can_override: true,
            can_be_overridden: false,
        }
    }
}

impl fmt::Debug for AudioProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioProvider")
            .field("format", &self.format)
            .field("profile", &self.profile)
            .field("always_readable", &self.always_readable)
            .field("can_override", &self.can_override)
            .field("can_be_overridden", &self.can_be_overridden)
            .finish()
    }
}
