//! Cross-channel focus arbitration.

pub mod arbiter;
pub mod channel;

pub use arbiter::FocusArbiter;
pub use channel::{FocusObserver, FocusState};
