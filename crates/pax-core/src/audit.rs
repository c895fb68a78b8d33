//! # Audit Records
//!
//! Every attempted mutation in the pipeline leaves exactly one audit row:
//!
//! - [`EventRecord`] + [`EventLogEntry`] — one header per propagation run
//!   (rule create/update/delete or manual batch), one log row per
//!   (person, role) mutation attempt.
//! - [`JobRecord`] + [`JobLogEntry`] — one header per daily-processor run,
//!   one log row per processed scheduled action.
//! - [`RelayLogEntry`] — write-once observability record for every inbound
//!   relay message, success or failure.
//! - [`OutboxMessage`] — the transactional bridge row for the destination
//!   bus, drained by an independent sweeper.
//!
//! Headers are mutable only by their owning run (append logs, then finalize
//! with counts recomputed from the written logs); append-only thereafter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EnumParseError;

/// Direction of a role mutation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantAction {
    /// Role granted to the person.
    Assigned,
    /// Role removed from the person.
    Revoked,
}

impl GrantAction {
    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for GrantAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantAction {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "assigned" | "0" => Ok(Self::Assigned),
            "revoked" | "1" => Ok(Self::Revoked),
            _ => Err(EnumParseError::new("GrantAction", s)),
        }
    }
}

/// Outcome of one audited attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    /// The mutation applied (or was already in the desired state).
    Success,
    /// The mutation failed; the error column carries the reason.
    Failed,
}

impl LogStatus {
    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" | "0" => Ok(Self::Success),
            "failed" | "1" => Ok(Self::Failed),
            _ => Err(EnumParseError::new("LogStatus", s)),
        }
    }
}

/// Disposition of one inbound relay message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    /// Forwarded into the outbox and committed.
    Success,
    /// Forwarding threw; the error column carries the reason.
    Failed,
    /// Undeserializable payload; permanently skipped.
    Poison,
    /// Recognized format but unmapped event type; skipped.
    Unknown,
}

impl RelayStatus {
    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Poison => "poison",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" | "0" => Ok(Self::Success),
            "failed" | "1" => Ok(Self::Failed),
            "poison" | "2" => Ok(Self::Poison),
            "unknown" | "3" => Ok(Self::Unknown),
            _ => Err(EnumParseError::new("RelayStatus", s)),
        }
    }
}

/// Lifecycle of a daily-processor job header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The run is in progress.
    Running,
    /// The run finalized its counts. Terminal.
    Completed,
}

impl JobStatus {
    /// Canonical storage string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "running" | "0" => Ok(Self::Running),
            "completed" | "1" => Ok(Self::Completed),
            _ => Err(EnumParseError::new("JobStatus", s)),
        }
    }
}

/// Audit header for one propagation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Stable event id.
    pub id: Uuid,
    /// What kind of run this was (e.g. `"rule.created"`, `"manual.assign"`).
    pub event_type: String,
    /// The rule id that triggered the run, if any.
    pub source_id: Option<Uuid>,
    /// Correlation id threaded from the trigger.
    pub correlation_id: Uuid,
    /// When the run opened.
    pub occurred_at: DateTime<Utc>,
    /// Number of personnel in scope for the run.
    pub total_count: u32,
    /// Successful mutation attempts.
    pub success_count: u32,
    /// Failed mutation attempts.
    pub fail_count: u32,
    /// Set once, by finalize. Append-only thereafter.
    pub is_completed: bool,
}

impl EventRecord {
    /// Open a fresh header for a run.
    pub fn open(
        event_type: impl Into<String>,
        source_id: Option<Uuid>,
        correlation_id: Uuid,
        total_count: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            source_id,
            correlation_id,
            occurred_at: Utc::now(),
            total_count,
            success_count: 0,
            fail_count: 0,
            is_completed: false,
        }
    }
}

/// Final counters written when an event header is completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventTotals {
    /// Number of personnel in scope.
    pub total: u32,
    /// Successful mutation attempts.
    pub success: u32,
    /// Failed mutation attempts.
    pub fail: u32,
}

/// One (person, role) mutation attempt within a propagation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Stable log id.
    pub id: Uuid,
    /// Owning event header.
    pub event_id: Uuid,
    /// Employee number of the affected person.
    pub employee_no: String,
    /// Display name at the time of the attempt.
    pub personnel_name: String,
    /// Role the attempt concerned.
    pub role_id: Uuid,
    /// Role name at the time of the attempt (empty if unresolvable).
    pub role_name: String,
    /// Assigned or revoked.
    pub action: GrantAction,
    /// Success or failed.
    pub status: LogStatus,
    /// Failure reason, for failed rows.
    pub error: Option<String>,
}

/// Audit header for one daily-processor run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Stable job id.
    pub id: Uuid,
    /// Job kind (currently always `"scheduled-actions"`).
    pub job_type: String,
    /// Running or completed.
    pub status: JobStatus,
    /// Number of actions selected for the run.
    pub total_count: u32,
    /// Successful actions, recomputed from job logs at finalize.
    pub success_count: u32,
    /// Failed actions, recomputed from job logs at finalize.
    pub failure_count: u32,
    /// When the run opened.
    pub started_at: DateTime<Utc>,
    /// When the run finalized, if it has.
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Open a fresh job header.
    pub fn open(job_type: impl Into<String>, total_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            status: JobStatus::Running,
            total_count,
            success_count: 0,
            failure_count: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// One processed scheduled action within a daily run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLogEntry {
    /// Stable log id.
    pub id: Uuid,
    /// Owning job header.
    pub job_id: Uuid,
    /// Human-readable outcome for the action.
    pub message: String,
    /// Success or failed.
    pub status: LogStatus,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// Write-once observability record for one inbound relay message.
///
/// Never blocks the relay's forward progress: a failure to write this row
/// is itself only logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayLogEntry {
    /// Stable record id.
    pub id: Uuid,
    /// Source topic.
    pub topic: String,
    /// Source partition.
    pub partition: i32,
    /// Source offset.
    pub offset: i64,
    /// Message key, if present.
    pub key: Option<String>,
    /// Raw payload as UTF-8, if representable.
    pub value: Option<String>,
    /// Disposition of the message.
    pub status: RelayStatus,
    /// Failure detail for `Failed`/`Poison` rows.
    pub error_message: Option<String>,
    /// Delivery attempt count observed for this offset.
    pub retry_count: i32,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// A message staged for the destination bus.
///
/// Written in the same transaction as any other local store writes, then
/// drained by an independent sweeper with its own retry policy. The relay
/// stamps `published_at` at forward time; the sweeper's own bookkeeping
/// (dispatch timestamp, attempts, last error) lives in extra columns it
/// owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Stable message id.
    pub id: Uuid,
    /// Destination topic, resolved through the route table.
    pub topic: String,
    /// Partitioning key for the destination bus.
    pub key: Option<String>,
    /// JSON payload.
    pub payload: serde_json::Value,
    /// Stamped by the relay when the message enters the outbox.
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_record_opens_incomplete_with_zero_counters() {
        let correlation = Uuid::new_v4();
        let record = EventRecord::open("rule.created", Some(Uuid::new_v4()), correlation, 42);
        assert_eq!(record.total_count, 42);
        assert_eq!(record.success_count, 0);
        assert_eq!(record.fail_count, 0);
        assert!(!record.is_completed);
        assert_eq!(record.correlation_id, correlation);
    }

    #[test]
    fn job_record_opens_running() {
        let job = JobRecord::open("scheduled-actions", 3);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.total_count, 3);
        assert!(job.finished_at.is_none());
    }

    #[test]
    fn relay_status_accepts_legacy_numeric_codes() {
        assert_eq!("2".parse::<RelayStatus>().unwrap(), RelayStatus::Poison);
        assert_eq!("3".parse::<RelayStatus>().unwrap(), RelayStatus::Unknown);
        assert_eq!(
            "Success".parse::<RelayStatus>().unwrap(),
            RelayStatus::Success
        );
        assert!("4".parse::<RelayStatus>().is_err());
    }

    #[test]
    fn grant_action_and_log_status_round_trip() {
        for action in [GrantAction::Assigned, GrantAction::Revoked] {
            assert_eq!(action.as_str().parse::<GrantAction>().unwrap(), action);
        }
        for status in [LogStatus::Success, LogStatus::Failed] {
            assert_eq!(status.as_str().parse::<LogStatus>().unwrap(), status);
        }
    }
}
