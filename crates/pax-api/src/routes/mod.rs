//! Route modules, one per API surface.

pub mod admin;
pub mod audit;
pub mod lifecycle;
pub mod rules;
