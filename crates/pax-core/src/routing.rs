//! # Route Table — Event Type to Destination Topic
//!
//! The relay classifies each inbound message by its declared event type and
//! republishes it to a destination topic on the second bus. The mapping is
//! an explicit, injected value — constructed once at startup and passed to
//! the relay — rather than module-level state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Injected mapping from inbound event type to destination topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: BTreeMap<String, String>,
}

impl RouteTable {
    /// Build a route table from `(event_type, destination_topic)` pairs.
    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            routes: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse a route table from its JSON object form, e.g.
    /// `{"personnel.hired": "pax.scheduled-actions"}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The default deployment routing: both lifecycle event types feed the
    /// scheduled-action intake topic.
    pub fn standard() -> Self {
        Self::from_pairs([
            ("personnel.hired", "pax.scheduled-actions"),
            ("personnel.terminated", "pax.scheduled-actions"),
        ])
    }

    /// Resolve an event type to its destination topic.
    pub fn resolve(&self, event_type: &str) -> Option<&str> {
        self.routes.get(event_type).map(String::as_str)
    }

    /// Number of configured routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are configured.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_configured_event_types() {
        let table = RouteTable::standard();
        assert_eq!(
            table.resolve("personnel.hired"),
            Some("pax.scheduled-actions")
        );
        assert_eq!(
            table.resolve("personnel.terminated"),
            Some("pax.scheduled-actions")
        );
    }

    #[test]
    fn unmapped_event_type_resolves_to_none() {
        let table = RouteTable::standard();
        assert_eq!(table.resolve("personnel.promoted"), None);
    }

    #[test]
    fn parses_from_json_object() {
        let table = RouteTable::from_json(r#"{"a.b": "topic-1", "c.d": "topic-2"}"#).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.resolve("a.b"), Some("topic-1"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(RouteTable::from_json("not json").is_err());
        assert!(RouteTable::from_json(r#"["a", "b"]"#).is_err());
    }

    #[test]
    fn empty_table_is_empty() {
        let table = RouteTable::default();
        assert!(table.is_empty());
        assert_eq!(table.resolve("anything"), None);
    }
}
