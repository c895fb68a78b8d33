//! # pax-testkit — In-Memory Stores and Fixtures
//!
//! A single [`MemStore`] implements every storage port over `parking_lot`
//! mutexes, so the relay, batch, and API layers can be exercised end to end
//! without PostgreSQL. Semantics mirror the real store: soft deletes,
//! idempotent role mutations, arrival-order sequence numbers, and the
//! per-scope uniqueness rule.

pub mod fixtures;
pub mod store;

pub use store::MemStore;
