//! Sample workflow state machine.
//!
//! # Statuses
//!
//! ```text
//! sample_collected -> pcr_ready -> pcr_batched -> pcr_completed
//!   -> electro_ready -> electro_batched -> electro_completed
//!   -> analysis_ready -> analysis_completed -> report_ready -> report_sent
//!
//! any status from pcr_completed on -> rerun_required | rerun_batched
//! rerun_required -> rerun_batched -> pcr_completed
//! ```
//!
//! Every committed move appends an `AuditEntry` through the sample
//! repository. Bulk updates are all-or-nothing and serialized per sample
//! through `ResourceLocks`.

mod cancel;
mod engine;
mod error;
mod locks;
pub mod transitions;

pub use cancel::CancelToken;
pub use engine::{
    BulkTransitionRequest, BulkTransitionResponse, Transition, ValidationFailure, WorkflowEngine,
    apply_route, apply_transition, parse_target,
};
pub use error::{Result, WorkflowError};
pub use locks::{ResourceGuard, ResourceLocks, sample_key};
pub use transitions::{allowed_targets, can_transition, route, successors};
