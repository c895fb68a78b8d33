//! # Scope — the (campus, title) Matching Algebra
//!
//! A [`Scope`] is a `(campus, title)` pair where `None` on a dimension
//! means "matches any value". Scopes drive rule matching, overlap checks
//! during reconciliation, and the uniqueness key that guarantees at most
//! one non-deleted rule per distinct pair.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Campus, Title};

/// Wildcard marker used in the scope storage key.
pub const WILDCARD: &str = "*";

/// A `(campus, title)` pair with `None` meaning "any".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Campus dimension; `None` matches every campus.
    pub campus: Option<Campus>,
    /// Title dimension; `None` matches every title.
    pub title: Option<Title>,
}

impl Scope {
    /// Build a scope.
    pub fn new(campus: Option<Campus>, title: Option<Title>) -> Self {
        Self { campus, title }
    }

    /// The fully wildcarded scope: matches everyone.
    pub fn any() -> Self {
        Self {
            campus: None,
            title: None,
        }
    }

    /// Whether this scope covers a concrete `(campus, title)` group.
    pub fn matches(&self, campus: Campus, title: Title) -> bool {
        self.campus.map_or(true, |c| c == campus) && self.title.map_or(true, |t| t == title)
    }

    /// Whether two scopes can cover at least one common group: each
    /// dimension must be null-or-equal on either side.
    pub fn overlaps(&self, other: &Scope) -> bool {
        let campus_ok = match (self.campus, other.campus) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        let title_ok = match (self.title, other.title) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };
        campus_ok && title_ok
    }

    /// Expand this scope into every concrete `(campus, title)` group it
    /// covers. Wildcard dimensions range over the full enum.
    pub fn expand(&self) -> Vec<(Campus, Title)> {
        let campuses: Vec<Campus> = match self.campus {
            Some(c) => vec![c],
            None => Campus::ALL.to_vec(),
        };
        let titles: Vec<Title> = match self.title {
            Some(t) => vec![t],
            None => Title::ALL.to_vec(),
        };
        let mut groups = Vec::with_capacity(campuses.len() * titles.len());
        for campus in &campuses {
            for title in &titles {
                groups.push((*campus, *title));
            }
        }
        groups
    }

    /// The uniqueness key stored for this scope: each dimension's canonical
    /// string, with [`WILDCARD`] standing in for `None`. The rules table
    /// carries a partial unique index over this pair, filtered to
    /// non-deleted rows.
    pub fn storage_key(&self) -> (String, String) {
        (
            self.campus
                .map_or_else(|| WILDCARD.to_string(), |c| c.as_str().to_string()),
            self.title
                .map_or_else(|| WILDCARD.to_string(), |t| t.as_str().to_string()),
        )
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (campus, title) = self.storage_key();
        write!(f, "({campus}, {title})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concrete_scope_matches_only_its_group() {
        let scope = Scope::new(Some(Campus::Istanbul), Some(Title::Engineer));
        assert!(scope.matches(Campus::Istanbul, Title::Engineer));
        assert!(!scope.matches(Campus::Istanbul, Title::Teacher));
        assert!(!scope.matches(Campus::Ankara, Title::Engineer));
    }

    #[test]
    fn wildcard_dimension_matches_everything_on_that_axis() {
        let scope = Scope::new(Some(Campus::Istanbul), None);
        for title in Title::ALL {
            assert!(scope.matches(Campus::Istanbul, *title));
        }
        assert!(!scope.matches(Campus::Ankara, Title::Engineer));
    }

    #[test]
    fn any_scope_matches_all_groups() {
        for campus in Campus::ALL {
            for title in Title::ALL {
                assert!(Scope::any().matches(*campus, *title));
            }
        }
    }

    #[test]
    fn overlap_is_null_or_equal_per_dimension() {
        let istanbul_engineer = Scope::new(Some(Campus::Istanbul), Some(Title::Engineer));
        let istanbul_any = Scope::new(Some(Campus::Istanbul), None);
        let ankara_any = Scope::new(Some(Campus::Ankara), None);

        assert!(istanbul_engineer.overlaps(&istanbul_any));
        assert!(istanbul_any.overlaps(&istanbul_engineer));
        assert!(!istanbul_engineer.overlaps(&ankara_any));
        assert!(Scope::any().overlaps(&istanbul_engineer));
    }

    #[test]
    fn expand_wildcard_covers_full_cross_product() {
        assert_eq!(
            Scope::any().expand().len(),
            Campus::ALL.len() * Title::ALL.len()
        );
        assert_eq!(
            Scope::new(Some(Campus::Izmir), None).expand().len(),
            Title::ALL.len()
        );
        assert_eq!(
            Scope::new(Some(Campus::Izmir), Some(Title::Teacher)).expand(),
            vec![(Campus::Izmir, Title::Teacher)]
        );
    }

    #[test]
    fn storage_key_uses_wildcard_marker() {
        assert_eq!(
            Scope::any().storage_key(),
            (WILDCARD.to_string(), WILDCARD.to_string())
        );
        assert_eq!(
            Scope::new(Some(Campus::Bursa), Some(Title::Counselor)).storage_key(),
            ("bursa".to_string(), "counselor".to_string())
        );
    }

    #[test]
    fn display_is_the_storage_key() {
        let scope = Scope::new(None, Some(Title::Technician));
        assert_eq!(scope.to_string(), "(*, technician)");
    }
}
