#![deny(missing_docs)]

//! # pax-core — Foundational Types for the PAX Stack
//!
//! PAX (Personnel Access eXchange) assigns and revokes access roles for
//! personnel based on declarative scoping rules (campus × title) and on
//! lifecycle events arriving from an external HR system. This crate defines
//! the types every other crate in the workspace depends on. It has no
//! internal crate dependencies — only `serde`, `serde_json`, `thiserror`,
//! `chrono`, `uuid`, and `async-trait` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Closed enums for every status column.** Statuses that the source
//!    schema stored as free-form strings (or numeric codes, depending on
//!    schema version) are tagged variants here, with an explicit legacy
//!    mapping in `FromStr`. An unexpected value is an error, not a silent
//!    passthrough.
//!
//! 2. **Index-based associations.** Rules and personnel reference roles by
//!    `Uuid`, never by live object pointers. The many-to-many graph lives in
//!    join tables; no ownership cycles.
//!
//! 3. **Pure reconciliation.** [`recon::removal_plan`] computes what to
//!    change; it never touches storage. Applying the plan is the propagation
//!    service's job, so a plan can be verified (or dry-run) on its own.
//!
//! 4. **Traits at the storage seam.** [`ports`] defines the async traits the
//!    relay, batch, and API layers consume. Postgres implementations live in
//!    `pax-store`; in-memory ones in `pax-testkit`.

pub mod action;
pub mod audit;
pub mod domain;
pub mod error;
pub mod ports;
pub mod recon;
pub mod routing;
pub mod scope;

pub use action::{ActionStatus, ActionType, LifecycleEvent, NewScheduledAction, ScheduledAction};
pub use audit::{
    EventLogEntry, EventRecord, EventTotals, GrantAction, JobLogEntry, JobRecord, JobStatus,
    LogStatus, OutboxMessage, RelayLogEntry, RelayStatus,
};
pub use domain::{Campus, Personnel, Role, Rule, Title};
pub use error::{EnumParseError, StoreError};
pub use recon::{removal_plan, ReconciliationGroup};
pub use routing::RouteTable;
pub use scope::Scope;
