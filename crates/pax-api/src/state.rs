//! # Application State
//!
//! One trait-object handle per storage port, all usually backed by the same
//! store (PostgreSQL via `PgStore`, or in-memory via `MemStore` when no
//! database is configured). Handlers build the batch services on demand from
//! these handles; the services are cheap to construct and hold no state of
//! their own.

use std::sync::Arc;

use pax_batch::{DailyProcessor, Intake, Propagator};
use pax_core::ports::{
    ActionStore, AuditStore, DirectoryStore, JobStore, RelayAuditStore, RoleStore, RuleStore,
};

/// Static configuration read at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port the HTTP server binds.
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Static configuration.
    pub config: AppConfig,
    /// Personnel directory.
    pub directory: Arc<dyn DirectoryStore>,
    /// Access rules.
    pub rules: Arc<dyn RuleStore>,
    /// Role catalog.
    pub roles: Arc<dyn RoleStore>,
    /// Scheduled-action queue.
    pub actions: Arc<dyn ActionStore>,
    /// Propagation audit trail.
    pub audit: Arc<dyn AuditStore>,
    /// Daily-processor audit trail.
    pub jobs: Arc<dyn JobStore>,
    /// Relay observability log.
    pub relay_audit: Arc<dyn RelayAuditStore>,
}

impl AppState {
    /// Build the state from one store implementing every port.
    pub fn from_store<S>(store: Arc<S>, config: AppConfig) -> Self
    where
        S: DirectoryStore
            + RuleStore
            + RoleStore
            + ActionStore
            + AuditStore
            + JobStore
            + RelayAuditStore
            + 'static,
    {
        Self {
            config,
            directory: store.clone(),
            rules: store.clone(),
            roles: store.clone(),
            actions: store.clone(),
            audit: store.clone(),
            jobs: store.clone(),
            relay_audit: store,
        }
    }

    /// Propagation service over this state's stores.
    pub fn propagator(&self) -> Propagator {
        Propagator::new(self.directory.clone(), self.roles.clone(), self.audit.clone())
    }

    /// Lifecycle-event intake over this state's action store.
    pub fn intake(&self) -> Intake {
        Intake::new(self.actions.clone())
    }

    /// Daily scheduled-action processor over this state's stores.
    pub fn processor(&self) -> DailyProcessor {
        DailyProcessor::new(
            self.actions.clone(),
            self.directory.clone(),
            self.rules.clone(),
            self.jobs.clone(),
        )
    }
}
