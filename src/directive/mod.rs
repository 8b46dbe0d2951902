//! Inbound directive types and the lifecycle router.

pub mod directive;
pub mod result;
pub mod router;

pub use directive::{BlockingPolicy, Directive, NamespaceAndName};
pub use result::{DirectiveResult, DirectiveStatus};
pub use router::{
    DirectiveHandler, DirectiveRouter, ExceptionKind, ExceptionReporter, LogExceptionReporter,
};
