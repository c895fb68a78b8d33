//! # pax-store — PostgreSQL Persistence
//!
//! SQLx-backed implementations of the `pax-core::ports` traits, organized
//! the same way on both sides of the seam:
//!
//! - [`db`] — per-table modules of free async functions taking a `&PgPool`,
//!   plus pool initialization and embedded migrations.
//! - [`pg`] — [`pg::PgStore`], a thin wrapper that implements every port
//!   trait by delegating to the `db` functions.
//!
//! Statuses and enum-typed columns are stored as their canonical strings and
//! parsed through the closed enums on read; an unrecognized stored value
//! surfaces as `StoreError::Backend` rather than passing through silently.

pub mod db;
pub mod pg;

pub use pg::PgStore;
