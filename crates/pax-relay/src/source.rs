//! # Source Log Abstraction
//!
//! The relay reads from a partitioned, offset-addressed topic with consumer
//! group semantics and manual offset commit. Which broker provides that is
//! a deployment concern; the relay only depends on this trait.

use async_trait::async_trait;
use thiserror::Error;

/// One message fetched from the source log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// Source topic.
    pub topic: String,
    /// Partition the record came from.
    pub partition: i32,
    /// Offset of the record within its partition.
    pub offset: i64,
    /// Message key, if present.
    pub key: Option<String>,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
    /// How many times this offset has been delivered before (0 on first
    /// delivery). Carried into the relay log.
    pub retry_count: i32,
}

/// Error talking to the source log.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Fetch failed; the consumer should back off and retry.
    #[error("source fetch failed: {0}")]
    Fetch(String),

    /// Offset commit failed. The record was processed; redelivery after a
    /// restart is safe because downstream writes are idempotent.
    #[error("offset commit failed: {0}")]
    Commit(String),
}

/// A subscribed, manually committed consumer over one partition assignment.
///
/// ## Contract
///
/// - `next` returns records of a partition in strictly ascending offset
///   order. `None` means the stream ended (only meaningful for bounded
///   test sources; real consumers block).
/// - `commit` advances the consumer's read position past the record. A
///   record that was fetched but not committed is redelivered by a
///   subsequent `next` (or after restart) — this is what makes the
///   `RetrySameOffset` relay policy work.
#[async_trait]
pub trait SourceLog: Send {
    /// Fetch the next record.
    async fn next(&mut self) -> Result<Option<SourceRecord>, SourceError>;

    /// Commit the record's offset, advancing the read position.
    async fn commit(&mut self, record: &SourceRecord) -> Result<(), SourceError>;
}
