//! Dispatch Router
//!
//! Routes update batches to the handlers a view registered, in registration
//! order, through the cooldown gate.

mod registry;
mod router;

pub use registry::{Handler, HandlerRegistry};
pub use router::DispatchRouter;
