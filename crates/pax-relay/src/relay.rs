//! # Relay Consumer Loop
//!
//! Sequential per-record pipeline: deserialize, classify, forward, commit
//! offset. Every inbound message leaves exactly one relay-log row: a
//! forwarded record's row is staged with the outbox message in a single
//! store write, skipped and failed records get a best-effort row of their
//! own. Only the forward step can fail in a way that matters, and what
//! happens then is governed by [`RelayPolicy`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use pax_core::audit::{OutboxMessage, RelayLogEntry, RelayStatus};
use pax_core::ports::{OutboxStore, RelayAuditStore};
use pax_core::routing::RouteTable;
use pax_core::LifecycleEvent;

use crate::source::{SourceLog, SourceRecord};

/// Backoff after a fetch error or a retained (uncommitted) offset.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// What the relay does when the forward step fails.
///
/// The source system logged the failure and advanced anyway — an
/// availability-over-delivery tradeoff. Both contracts are supported here
/// and the choice is explicit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayPolicy {
    /// Record a `Failed` relay-log row, then commit the offset and move on.
    /// Replay of the lost message is a manual operation. Default, matching
    /// the source behavior.
    #[default]
    AdvanceAfterLog,
    /// Record the `Failed` row but withhold the commit, so the same offset
    /// is redelivered: true at-least-once at the cost of the partition
    /// stalling while the store is down.
    RetrySameOffset,
}

/// Disposition of one processed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Forwarded into the outbox.
    Forwarded {
        /// Destination topic the message was staged for.
        topic: String,
    },
    /// Payload did not deserialize; permanently skipped.
    Poison,
    /// Event type has no route; skipped.
    Unknown {
        /// The unmapped event type.
        event_type: String,
    },
    /// Forward step failed; offset handling depends on [`RelayPolicy`].
    Failed,
}

/// The inbound relay for one partition assignment.
pub struct Relay<S: SourceLog> {
    source: S,
    outbox: Arc<dyn OutboxStore>,
    audit: Arc<dyn RelayAuditStore>,
    routes: RouteTable,
    policy: RelayPolicy,
}

impl<S: SourceLog> Relay<S> {
    /// Build a relay over a source with the injected route table.
    pub fn new(
        source: S,
        outbox: Arc<dyn OutboxStore>,
        audit: Arc<dyn RelayAuditStore>,
        routes: RouteTable,
        policy: RelayPolicy,
    ) -> Self {
        Self {
            source,
            outbox,
            audit,
            routes,
            policy,
        }
    }

    /// Run until the shutdown signal fires or the source ends.
    ///
    /// The in-flight record always finishes its forward attempt and offset
    /// handling before the loop exits.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(routes = self.routes.len(), "relay consumer started");
        loop {
            let record = tokio::select! {
                _ = shutdown.changed() => {
                    info!("relay shutdown signal received");
                    break;
                }
                fetched = self.source.next() => match fetched {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        info!("source log ended; relay stopping");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "source fetch failed; backing off");
                        tokio::time::sleep(RETRY_BACKOFF).await;
                        continue;
                    }
                },
            };

            let disposition = self.step(&record).await;
            if matches!(disposition, Disposition::Failed)
                && self.policy == RelayPolicy::RetrySameOffset
            {
                // Offset retained; the source redelivers after backoff.
                tokio::time::sleep(RETRY_BACKOFF).await;
                continue;
            }
            if let Err(e) = self.source.commit(&record).await {
                // The record was handled; a lost commit only means
                // redelivery, which downstream idempotency absorbs.
                warn!(
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "offset commit failed"
                );
            }
        }
        info!("relay consumer stopped");
    }

    /// Process one record: classify, forward, record the disposition.
    ///
    /// Never commits the offset — that is the run loop's decision.
    pub async fn step(&self, record: &SourceRecord) -> Disposition {
        let event: LifecycleEvent = match serde_json::from_slice(&record.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "poison message; skipping permanently"
                );
                self.record_disposition(record, RelayStatus::Poison, Some(e.to_string()))
                    .await;
                return Disposition::Poison;
            }
        };

        let topic = match self.routes.resolve(&event.event_type) {
            Some(topic) => topic.to_string(),
            None => {
                warn!(
                    event_type = %event.event_type,
                    partition = record.partition,
                    offset = record.offset,
                    "no route for event type; skipping"
                );
                self.record_disposition(
                    record,
                    RelayStatus::Unknown,
                    Some(format!("unmapped event type: {}", event.event_type)),
                )
                .await;
                return Disposition::Unknown {
                    event_type: event.event_type,
                };
            }
        };

        let message = OutboxMessage {
            id: Uuid::new_v4(),
            topic: topic.clone(),
            key: record.key.clone().or_else(|| Some(event.employee_no.clone())),
            payload: match serde_json::to_value(&event) {
                Ok(value) => value,
                Err(e) => {
                    // A just-deserialized event always reserializes; treat
                    // anything else as a forward failure.
                    error!(error = %e, "lifecycle event reserialization failed");
                    self.record_disposition(record, RelayStatus::Failed, Some(e.to_string()))
                        .await;
                    return Disposition::Failed;
                }
            },
            published_at: Utc::now(),
        };

        // The success log row rides in the same store write as the outbox
        // message, so a forwarded message always has its audit row.
        let logged = self.log_entry(record, RelayStatus::Success, None);
        match self.outbox.forward(&message, &logged).await {
            Ok(()) => Disposition::Forwarded { topic },
            Err(e) => {
                error!(
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "outbox forward failed"
                );
                self.record_disposition(record, RelayStatus::Failed, Some(e.to_string()))
                    .await;
                Disposition::Failed
            }
        }
    }

    fn log_entry(
        &self,
        record: &SourceRecord,
        status: RelayStatus,
        error_message: Option<String>,
    ) -> RelayLogEntry {
        RelayLogEntry {
            id: Uuid::new_v4(),
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
            key: record.key.clone(),
            value: Some(String::from_utf8_lossy(&record.payload).into_owned()),
            status,
            error_message,
            retry_count: record.retry_count,
            created_at: Utc::now(),
        }
    }

    /// Write the relay-log row for a record that did not forward. Its
    /// failure is logged and swallowed: the observability trail must never
    /// block the relay.
    async fn record_disposition(
        &self,
        record: &SourceRecord,
        status: RelayStatus,
        error_message: Option<String>,
    ) {
        let entry = self.log_entry(record, status, error_message);
        if let Err(e) = self.audit.record(&entry).await {
            warn!(
                partition = record.partition,
                offset = record.offset,
                error = %e,
                "relay log write failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use pax_core::error::StoreError;
    use pax_core::ports::Page;
    use std::collections::VecDeque;

    use crate::source::SourceError;

    /// Bounded in-memory source: redelivers the front record until committed.
    struct ScriptedSource {
        pending: VecDeque<SourceRecord>,
        committed: Vec<i64>,
        deliveries: i32,
    }

    impl ScriptedSource {
        fn new(records: Vec<SourceRecord>) -> Self {
            Self {
                pending: records.into(),
                committed: Vec::new(),
                deliveries: 0,
            }
        }
    }

    #[async_trait]
    impl SourceLog for ScriptedSource {
        async fn next(&mut self) -> Result<Option<SourceRecord>, SourceError> {
            match self.pending.front() {
                Some(record) => {
                    let mut record = record.clone();
                    record.retry_count = self.deliveries;
                    self.deliveries += 1;
                    Ok(Some(record))
                }
                None => Ok(None),
            }
        }

        async fn commit(&mut self, record: &SourceRecord) -> Result<(), SourceError> {
            self.committed.push(record.offset);
            self.pending.pop_front();
            self.deliveries = 0;
            Ok(())
        }
    }

    /// Writes the staged message and its log row into the shared audit sink
    /// as one unit, or neither when failing.
    struct MemOutbox {
        staged: Mutex<Vec<OutboxMessage>>,
        audit: Arc<MemRelayAudit>,
        fail: Mutex<bool>,
    }

    impl MemOutbox {
        fn new(audit: Arc<MemRelayAudit>) -> Self {
            Self {
                staged: Mutex::new(Vec::new()),
                audit,
                fail: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl OutboxStore for MemOutbox {
        async fn forward(
            &self,
            message: &OutboxMessage,
            log: &RelayLogEntry,
        ) -> Result<(), StoreError> {
            if *self.fail.lock() {
                return Err(StoreError::Unavailable("outbox down".into()));
            }
            self.staged.lock().push(message.clone());
            self.audit.entries.lock().push(log.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemRelayAudit {
        entries: Mutex<Vec<RelayLogEntry>>,
    }

    #[async_trait]
    impl RelayAuditStore for MemRelayAudit {
        async fn record(&self, entry: &RelayLogEntry) -> Result<(), StoreError> {
            self.entries.lock().push(entry.clone());
            Ok(())
        }

        async fn list(&self, _page: Page) -> Result<Vec<RelayLogEntry>, StoreError> {
            Ok(self.entries.lock().clone())
        }
    }

    fn event_payload(event_type: &str, employee_no: &str) -> Vec<u8> {
        serde_json::to_vec(&LifecycleEvent {
            event_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            employee_no: employee_no.to_string(),
            effective_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            occurred_at_utc: Utc::now(),
            correlation_id: Uuid::new_v4(),
        })
        .unwrap()
    }

    fn record(offset: i64, payload: Vec<u8>) -> SourceRecord {
        SourceRecord {
            topic: "hr.lifecycle".into(),
            partition: 0,
            offset,
            key: None,
            payload,
            retry_count: 0,
        }
    }

    fn relay(
        source: ScriptedSource,
        outbox: Arc<MemOutbox>,
        audit: Arc<MemRelayAudit>,
        policy: RelayPolicy,
    ) -> Relay<ScriptedSource> {
        Relay::new(source, outbox, audit, RouteTable::standard(), policy)
    }

    #[tokio::test]
    async fn forwards_mapped_event_into_outbox() {
        let audit = Arc::new(MemRelayAudit::default());
        let outbox = Arc::new(MemOutbox::new(audit.clone()));
        let source = ScriptedSource::new(vec![record(
            7,
            event_payload("personnel.hired", "E-1"),
        )]);
        let relay = relay(source, outbox.clone(), audit.clone(), RelayPolicy::default());

        let disposition = relay
            .step(&record(7, event_payload("personnel.hired", "E-1")))
            .await;

        assert_eq!(
            disposition,
            Disposition::Forwarded {
                topic: "pax.scheduled-actions".into()
            }
        );
        let staged = outbox.staged.lock();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].topic, "pax.scheduled-actions");
        // Keyless records fall back to the employee number.
        assert_eq!(staged[0].key.as_deref(), Some("E-1"));
        let entries = audit.entries.lock();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, RelayStatus::Success);
    }

    #[tokio::test]
    async fn poison_message_is_logged_and_skipped() {
        let audit = Arc::new(MemRelayAudit::default());
        let outbox = Arc::new(MemOutbox::new(audit.clone()));
        let source = ScriptedSource::new(vec![]);
        let relay = relay(source, outbox.clone(), audit.clone(), RelayPolicy::default());

        let disposition = relay.step(&record(3, b"{not json".to_vec())).await;

        assert_eq!(disposition, Disposition::Poison);
        assert!(outbox.staged.lock().is_empty());
        let entries = audit.entries.lock();
        assert_eq!(entries[0].status, RelayStatus::Poison);
        assert!(entries[0].error_message.is_some());
        assert_eq!(entries[0].offset, 3);
    }

    #[tokio::test]
    async fn unmapped_event_type_is_logged_and_skipped() {
        let audit = Arc::new(MemRelayAudit::default());
        let outbox = Arc::new(MemOutbox::new(audit.clone()));
        let source = ScriptedSource::new(vec![]);
        let relay = relay(source, outbox.clone(), audit.clone(), RelayPolicy::default());

        let disposition = relay
            .step(&record(4, event_payload("personnel.promoted", "E-2")))
            .await;

        assert_eq!(
            disposition,
            Disposition::Unknown {
                event_type: "personnel.promoted".into()
            }
        );
        assert!(outbox.staged.lock().is_empty());
        assert_eq!(audit.entries.lock()[0].status, RelayStatus::Unknown);
    }

    #[tokio::test]
    async fn forward_failure_is_logged() {
        let audit = Arc::new(MemRelayAudit::default());
        let outbox = Arc::new(MemOutbox::new(audit.clone()));
        *outbox.fail.lock() = true;
        let source = ScriptedSource::new(vec![]);
        let relay = relay(source, outbox.clone(), audit.clone(), RelayPolicy::default());

        let disposition = relay
            .step(&record(5, event_payload("personnel.hired", "E-3")))
            .await;

        assert_eq!(disposition, Disposition::Failed);
        let entries = audit.entries.lock();
        assert_eq!(entries[0].status, RelayStatus::Failed);
        assert!(entries[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("outbox down"));
    }

    #[tokio::test]
    async fn forward_stages_message_and_log_row_as_one_unit() {
        let audit = Arc::new(MemRelayAudit::default());
        let outbox = Arc::new(MemOutbox::new(audit.clone()));
        let relay = relay(
            ScriptedSource::new(vec![]),
            outbox.clone(),
            audit.clone(),
            RelayPolicy::default(),
        );

        // A failed forward leaves no outbox row and no Success log row.
        *outbox.fail.lock() = true;
        let first = relay
            .step(&record(8, event_payload("personnel.hired", "E-8")))
            .await;
        assert_eq!(first, Disposition::Failed);
        assert!(outbox.staged.lock().is_empty());
        assert!(audit
            .entries
            .lock()
            .iter()
            .all(|e| e.status != RelayStatus::Success));

        // Once the forward lands, the message and its Success row arrive
        // together.
        *outbox.fail.lock() = false;
        let second = relay
            .step(&record(8, event_payload("personnel.hired", "E-8")))
            .await;
        assert!(matches!(second, Disposition::Forwarded { .. }));
        assert_eq!(outbox.staged.lock().len(), 1);
        let entries = audit.entries.lock();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].status, RelayStatus::Success);
        assert_eq!(entries[1].offset, 8);
    }

    #[tokio::test]
    async fn run_processes_records_in_offset_order_and_commits_each() {
        let audit = Arc::new(MemRelayAudit::default());
        let outbox = Arc::new(MemOutbox::new(audit.clone()));
        let source = ScriptedSource::new(vec![
            record(10, event_payload("personnel.hired", "E-1")),
            record(11, b"garbage".to_vec()),
            record(12, event_payload("personnel.terminated", "E-2")),
        ]);
        let relay = Relay::new(
            source,
            outbox.clone(),
            audit.clone(),
            RouteTable::standard(),
            RelayPolicy::default(),
        );

        let (_tx, rx) = watch::channel(false);
        relay.run(rx).await;

        // Every offset committed, in order; the poison record did not stall
        // its successors.
        let entries = audit.entries.lock();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries.iter().map(|e| e.offset).collect::<Vec<_>>(),
            vec![10, 11, 12]
        );
        assert_eq!(entries[0].status, RelayStatus::Success);
        assert_eq!(entries[1].status, RelayStatus::Poison);
        assert_eq!(entries[2].status, RelayStatus::Success);
        assert_eq!(outbox.staged.lock().len(), 2);
    }

    #[tokio::test]
    async fn advance_after_log_commits_failed_forwards() {
        let audit = Arc::new(MemRelayAudit::default());
        let outbox = Arc::new(MemOutbox::new(audit.clone()));
        *outbox.fail.lock() = true;
        let source = ScriptedSource::new(vec![record(
            20,
            event_payload("personnel.hired", "E-9"),
        )]);
        let relay = Relay::new(
            source,
            outbox.clone(),
            audit.clone(),
            RouteTable::standard(),
            RelayPolicy::AdvanceAfterLog,
        );

        let (_tx, rx) = watch::channel(false);
        relay.run(rx).await;

        // The run drained the source: the failed offset was committed.
        assert_eq!(audit.entries.lock()[0].status, RelayStatus::Failed);
        assert!(outbox.staged.lock().is_empty());
    }

    #[tokio::test]
    async fn retry_same_offset_redelivers_until_forward_succeeds() {
        let audit = Arc::new(MemRelayAudit::default());
        let outbox = Arc::new(MemOutbox::new(audit.clone()));
        let mut source = ScriptedSource::new(vec![record(
            30,
            event_payload("personnel.hired", "E-4"),
        )]);
        let relay = Relay::new(
            ScriptedSource::new(vec![]),
            outbox.clone(),
            audit.clone(),
            RouteTable::standard(),
            RelayPolicy::RetrySameOffset,
        );

        // First attempt fails; the offset must not be committed.
        *outbox.fail.lock() = true;
        let first = source.next().await.unwrap().unwrap();
        assert_eq!(relay.step(&first).await, Disposition::Failed);
        assert!(source.committed.is_empty());

        // Store heals; the redelivered record carries a bumped retry count
        // and forwards.
        *outbox.fail.lock() = false;
        let second = source.next().await.unwrap().unwrap();
        assert_eq!(second.offset, 30);
        assert_eq!(second.retry_count, 1);
        assert!(matches!(
            relay.step(&second).await,
            Disposition::Forwarded { .. }
        ));
        source.commit(&second).await.unwrap();
        assert_eq!(source.committed, vec![30]);
        assert_eq!(outbox.staged.lock().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let audit = Arc::new(MemRelayAudit::default());
        let outbox = Arc::new(MemOutbox::new(audit.clone()));
        // Unbounded-looking source: one record that is never exhausted
        // because the outbox keeps failing under RetrySameOffset.
        let source = ScriptedSource::new(vec![record(
            40,
            event_payload("personnel.hired", "E-5"),
        )]);
        *outbox.fail.lock() = true;
        let relay = Relay::new(
            source,
            outbox,
            audit,
            RouteTable::standard(),
            RelayPolicy::RetrySameOffset,
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(relay.run(rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("relay must stop after shutdown signal")
            .unwrap();
    }
}
