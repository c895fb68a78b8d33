//! # Role Reconciliation Engine
//!
//! When a rule changes or is deleted, some of the roles it granted may no
//! longer be granted by *any* remaining active rule for a given
//! `(campus, title)` group — those must be revoked. This module computes
//! that removal set as a pure function over already-loaded data.
//!
//! The engine never mutates anything. It returns a plan the caller applies
//! through the propagation service's revoke path, which keeps "what to
//! change" verifiable independently of "how to change it".

use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

use crate::domain::{Campus, Rule, Title};
use crate::scope::Scope;

/// One merged unit of the removal plan: revoke `roles_to_remove` from every
/// person in each of `groups`.
///
/// Groups sharing an identical removal set are merged so downstream work
/// (one revoke batch per group set) is not repeated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationGroup {
    /// Roles no remaining active rule still grants, sorted.
    pub roles_to_remove: Vec<Uuid>,
    /// The `(campus, title)` groups this removal applies to, sorted.
    pub groups: Vec<(Campus, Title)>,
}

/// Compute the removal plan after a rule change.
///
/// - `affected` — the changed/deleted rule's scope.
/// - `candidate_roles` — the roles that rule granted (removal candidates).
/// - `overlapping` — every other rule that could still grant a role inside
///   the affected scope. Rules that do not currently grant (inactive or
///   deleted) and the changed rule itself are filtered out defensively.
/// - `occupied` — the distinct `(campus, title)` pairs that currently have
///   at least one non-deleted person. Reconciliation only touches groups
///   that exist.
///
/// For each existing group inside the affected scope (wildcards expand over
/// the full enum), the effective role set is the union of every overlapping
/// rule matching that group; the removal set is `candidates − effective`.
/// Empty removal sets are dropped; identical ones are merged.
pub fn removal_plan(
    affected: &Scope,
    candidate_roles: &[Uuid],
    overlapping: &[Rule],
    occupied: &[(Campus, Title)],
) -> Vec<ReconciliationGroup> {
    if candidate_roles.is_empty() {
        return Vec::new();
    }

    let candidates: BTreeSet<Uuid> = candidate_roles.iter().copied().collect();
    let occupied: HashSet<(Campus, Title)> = occupied.iter().copied().collect();
    let granting: Vec<&Rule> = overlapping
        .iter()
        .filter(|r| r.grants() && r.scope.overlaps(affected))
        .collect();

    // Keyed by removal set so identical sets merge into one plan entry.
    let mut merged: BTreeMap<Vec<Uuid>, Vec<(Campus, Title)>> = BTreeMap::new();

    for (campus, title) in affected.expand() {
        if !occupied.contains(&(campus, title)) {
            continue;
        }

        let effective: BTreeSet<Uuid> = granting
            .iter()
            .filter(|r| r.scope.matches(campus, title))
            .flat_map(|r| r.role_ids.iter().copied())
            .collect();

        let to_remove: Vec<Uuid> = candidates.difference(&effective).copied().collect();
        if to_remove.is_empty() {
            continue;
        }

        merged.entry(to_remove).or_default().push((campus, title));
    }

    merged
        .into_iter()
        .map(|(roles_to_remove, mut groups)| {
            groups.sort();
            ReconciliationGroup {
                roles_to_remove,
                groups,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(scope: Scope, role_ids: Vec<Uuid>) -> Rule {
        Rule {
            id: Uuid::new_v4(),
            name: "overlapping".into(),
            scope,
            is_active: true,
            role_ids,
            is_deleted: false,
        }
    }

    fn role_ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn roles_still_granted_elsewhere_survive() {
        // Changed rule: (Istanbul, Engineer) granting {1, 2, 3}.
        // Overlapping rule: (Istanbul, *) still granting {2}.
        // Removal set for (Istanbul, Engineer) must be {1, 3}.
        let roles = role_ids(3);
        let affected = Scope::new(Some(Campus::Istanbul), Some(Title::Engineer));
        let overlapping = vec![rule(
            Scope::new(Some(Campus::Istanbul), None),
            vec![roles[1]],
        )];
        let occupied = vec![(Campus::Istanbul, Title::Engineer)];

        let plan = removal_plan(&affected, &roles, &overlapping, &occupied);

        assert_eq!(plan.len(), 1);
        let mut expected = vec![roles[0], roles[2]];
        expected.sort();
        assert_eq!(plan[0].roles_to_remove, expected);
        assert_eq!(plan[0].groups, vec![(Campus::Istanbul, Title::Engineer)]);
    }

    #[test]
    fn fully_covered_group_is_dropped_from_the_plan() {
        let roles = role_ids(2);
        let affected = Scope::new(Some(Campus::Ankara), Some(Title::Teacher));
        let overlapping = vec![rule(Scope::any(), roles.clone())];
        let occupied = vec![(Campus::Ankara, Title::Teacher)];

        let plan = removal_plan(&affected, &roles, &overlapping, &occupied);
        assert!(plan.is_empty());
    }

    #[test]
    fn only_existing_personnel_groups_are_touched() {
        let roles = role_ids(1);
        // Wildcard scope expands over every campus, but only one group has
        // personnel.
        let affected = Scope::new(None, Some(Title::Technician));
        let occupied = vec![(Campus::Izmir, Title::Technician)];

        let plan = removal_plan(&affected, &roles, &[], &occupied);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].groups, vec![(Campus::Izmir, Title::Technician)]);
    }

    #[test]
    fn groups_with_identical_removal_sets_merge() {
        let roles = role_ids(2);
        let affected = Scope::new(Some(Campus::Istanbul), None);
        // No overlapping rules at all: every occupied group loses both roles.
        let occupied = vec![
            (Campus::Istanbul, Title::Teacher),
            (Campus::Istanbul, Title::Engineer),
        ];

        let plan = removal_plan(&affected, &roles, &[], &occupied);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].groups.len(), 2);
        assert_eq!(plan[0].roles_to_remove.len(), 2);
    }

    #[test]
    fn differing_removal_sets_stay_separate() {
        let roles = role_ids(2);
        let affected = Scope::new(Some(Campus::Istanbul), None);
        // Teachers keep roles[0] via an overlapping title-wide rule.
        let overlapping = vec![rule(
            Scope::new(None, Some(Title::Teacher)),
            vec![roles[0]],
        )];
        let occupied = vec![
            (Campus::Istanbul, Title::Teacher),
            (Campus::Istanbul, Title::Engineer),
        ];

        let plan = removal_plan(&affected, &roles, &overlapping, &occupied);
        assert_eq!(plan.len(), 2);
        // Engineers lose both; teachers lose only roles[1].
        let teacher_entry = plan
            .iter()
            .find(|g| g.groups == vec![(Campus::Istanbul, Title::Teacher)])
            .unwrap();
        assert_eq!(teacher_entry.roles_to_remove, vec![roles[1]].as_slice());
        let engineer_entry = plan
            .iter()
            .find(|g| g.groups == vec![(Campus::Istanbul, Title::Engineer)])
            .unwrap();
        assert_eq!(engineer_entry.roles_to_remove.len(), 2);
    }

    #[test]
    fn inactive_and_deleted_overlapping_rules_grant_nothing() {
        let roles = role_ids(1);
        let affected = Scope::new(Some(Campus::Bursa), Some(Title::Counselor));
        let mut inactive = rule(Scope::any(), roles.clone());
        inactive.is_active = false;
        let mut deleted = rule(Scope::any(), roles.clone());
        deleted.is_deleted = true;
        let occupied = vec![(Campus::Bursa, Title::Counselor)];

        let plan = removal_plan(&affected, &roles, &[inactive, deleted], &occupied);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].roles_to_remove, roles);
    }

    #[test]
    fn non_overlapping_rules_are_ignored() {
        let roles = role_ids(1);
        let affected = Scope::new(Some(Campus::Istanbul), Some(Title::Engineer));
        // A rule scoped to a different campus cannot keep the role alive.
        let elsewhere = rule(Scope::new(Some(Campus::Ankara), None), roles.clone());
        let occupied = vec![(Campus::Istanbul, Title::Engineer)];

        let plan = removal_plan(&affected, &roles, &[elsewhere], &occupied);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].roles_to_remove, roles);
    }

    #[test]
    fn empty_candidates_yield_empty_plan() {
        let affected = Scope::any();
        let occupied = vec![(Campus::Istanbul, Title::Engineer)];
        assert!(removal_plan(&affected, &[], &[], &occupied).is_empty());
    }

    #[test]
    fn no_occupied_groups_yield_empty_plan() {
        let roles = role_ids(3);
        assert!(removal_plan(&Scope::any(), &roles, &[], &[]).is_empty());
    }
}
