//! # pax-relay — Inbound Event Relay
//!
//! Long-running consumer of the partitioned, offset-addressed source log.
//! Per message it deserializes, classifies against the injected route
//! table, and forwards into the local transactional outbox; the source
//! offset is committed only after the local write has been attempted.
//!
//! ## Guarantees
//!
//! - **No reordering.** One relay instance per partition assignment;
//!   records are processed strictly sequentially, and the offset commit for
//!   record N always precedes the fetch of record N+1.
//! - **Poison isolation.** Undeserializable and unmapped messages are
//!   recorded in the relay log and skipped; they never stall the partition.
//! - **Commit-after-write.** The read position advances only after the
//!   forward attempt completed (successfully or with a logged failure),
//!   never before — a crash between consume and forward redelivers.
//! - **Cooperative shutdown.** A watch signal stops the fetch loop; the
//!   in-flight record finishes its local transaction before exit.
//!
//! ## Deployment
//!
//! This crate carries no broker client. A host binary supplies a
//! [`SourceLog`] implementation for its broker, builds the
//! [`RouteTable`](pax_core::routing::RouteTable) from the `PAX_ROUTES`
//! JSON object, shares the API's store for the outbox and relay-log ports,
//! and spawns one [`Relay::run`] per partition assignment under its own
//! shutdown watch.

pub mod relay;
pub mod source;

pub use relay::{Disposition, Relay, RelayPolicy};
pub use source::{SourceError, SourceLog, SourceRecord};
