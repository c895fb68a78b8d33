//! # pax-batch — Intake, Daily Processing, and Rule Propagation
//!
//! The three batch components of the PAX stack, all written against the
//! `pax-core::ports` traits:
//!
//! - [`intake`] turns relayed lifecycle events into durable scheduled
//!   actions, idempotently.
//! - [`scheduler`] runs the daily processor that converts due actions into
//!   role mutations, one Job audit trail per run.
//! - [`propagation`] applies rule role-sets (and reconciliation removal
//!   plans) across matching personnel in pages, one Event audit trail per
//!   run.
//!
//! The shared failure discipline: domain failures are recorded per item and
//! never abort a run; store-level failures abort the current page or action
//! and leave everything retryable, which idempotent mutations make safe.

pub mod intake;
pub mod propagation;
pub mod scheduler;

pub use intake::{Intake, IntakeError, IntakeOutcome};
pub use propagation::{PropagationSummary, Propagator, PAGE_SIZE};
pub use scheduler::{DailyProcessor, RunSummary, JOB_TYPE_SCHEDULED_ACTIONS};
