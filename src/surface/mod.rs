//! The sandboxed side: badge reconciliation and the clipboard service it
//! offers the privileged context.

pub mod affordance;
pub mod context;

pub use affordance::{AffordanceBoard, AffordanceKey, AffordanceState, ApplyOutcome, PassTicket};
pub use context::{PassReport, SandboxedContext, SurfaceService};
