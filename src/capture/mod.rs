//! Voice capture orchestration: session model and state machine.

pub mod machine;
pub mod session;

pub use machine::{CaptureMachine, CaptureObserver, CaptureState};
pub use session::{CaptureSession, Initiator};
