//! # Error Types — Structured Error Hierarchy
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Failure taxonomy
//!
//! The batch components distinguish two classes of storage error:
//!
//! - **Domain failures** ([`StoreError::RoleNotFound`],
//!   [`StoreError::PersonnelNotFound`]) are recorded per item in the audit
//!   trail and never abort a batch.
//! - **Store-level failures** ([`StoreError::Unavailable`],
//!   [`StoreError::Backend`]) abort the current page or run, leaving all
//!   affected rows in their prior, still-consistent state for retry.

use thiserror::Error;
use uuid::Uuid;

/// Storage-seam error type shared by every port trait.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The referenced role does not exist (e.g. deleted after a rule still
    /// granting it). Recorded per item; never aborts a batch.
    #[error("role not found: {0}")]
    RoleNotFound(Uuid),

    /// The referenced person does not exist or is soft-deleted.
    #[error("personnel not found: {0}")]
    PersonnelNotFound(String),

    /// A non-deleted rule already covers this `(campus, title)` scope.
    #[error("a rule already exists for scope ({campus}, {title})")]
    DuplicateScope {
        /// Campus dimension of the conflicting scope (`*` = wildcard).
        campus: String,
        /// Title dimension of the conflicting scope (`*` = wildcard).
        title: String,
    },

    /// The request conflicts with current state (e.g. a second pending
    /// terminate intent for the same employee).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store is unreachable or the transaction failed. Retried by
    /// re-invocation; safe because all mutations are idempotent.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure (constraint violation outside the modeled
    /// cases, serialization of a stored payload, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error is a per-item domain failure (recorded, swallowed)
    /// as opposed to a store-level failure (aborts the batch page).
    pub fn is_domain_failure(&self) -> bool {
        matches!(
            self,
            Self::RoleNotFound(_) | Self::PersonnelNotFound(_) | Self::Conflict(_)
        )
    }
}

/// Error parsing a closed enum from its stored representation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized {kind} value: {value:?}")]
pub struct EnumParseError {
    /// The enum being parsed (e.g. `"ActionStatus"`).
    pub kind: &'static str,
    /// The offending input.
    pub value: String,
}

impl EnumParseError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_failures_are_classified() {
        assert!(StoreError::RoleNotFound(Uuid::new_v4()).is_domain_failure());
        assert!(StoreError::PersonnelNotFound("E-1".into()).is_domain_failure());
        assert!(StoreError::Conflict("x".into()).is_domain_failure());
        assert!(!StoreError::Unavailable("down".into()).is_domain_failure());
        assert!(!StoreError::Backend("boom".into()).is_domain_failure());
    }

    #[test]
    fn duplicate_scope_display_names_both_dimensions() {
        let err = StoreError::DuplicateScope {
            campus: "istanbul".into(),
            title: "*".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("istanbul"));
        assert!(msg.contains('*'));
    }
}
