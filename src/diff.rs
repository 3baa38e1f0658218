//! Three-way diff
//!
//! Classifies each path by comparing its base, local and remote blob ids.
//! Rule order matters: the "already synced" and "changed on both sides" checks
//! run before the single-sided update and delete rules, otherwise a divergent
//! pair would be taken for a plain pull or push.

use crate::state::{FileState, FileStates};
use crate::types::RepoPath;
use serde::Serialize;

/// Action needed to reconcile one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffAction {
    PullNew,
    PullUpdate,
    PullDelete,
    PushNew,
    PushUpdate,
    PushDelete,
    Conflict,
}

/// Disjoint path sets produced by [`classify`].
///
/// A path in none of the sets is already synchronized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    pub pull_new: Vec<RepoPath>,
    pub pull_update: Vec<RepoPath>,
    pub pull_delete: Vec<RepoPath>,
    pub push_new: Vec<RepoPath>,
    pub push_update: Vec<RepoPath>,
    pub push_delete: Vec<RepoPath>,
    pub conflicts: Vec<RepoPath>,
}

impl DiffResult {
    pub fn set_mut(&mut self, action: DiffAction) -> &mut Vec<RepoPath> {
        match action {
            DiffAction::PullNew => &mut self.pull_new,
            DiffAction::PullUpdate => &mut self.pull_update,
            DiffAction::PullDelete => &mut self.pull_delete,
            DiffAction::PushNew => &mut self.push_new,
            DiffAction::PushUpdate => &mut self.push_update,
            DiffAction::PushDelete => &mut self.push_delete,
            DiffAction::Conflict => &mut self.conflicts,
        }
    }

    pub fn set(&self, action: DiffAction) -> &[RepoPath] {
        match action {
            DiffAction::PullNew => &self.pull_new,
            DiffAction::PullUpdate => &self.pull_update,
            DiffAction::PullDelete => &self.pull_delete,
            DiffAction::PushNew => &self.push_new,
            DiffAction::PushUpdate => &self.push_update,
            DiffAction::PushDelete => &self.push_delete,
            DiffAction::Conflict => &self.conflicts,
        }
    }

    /// Action assigned to `path`, if any.
    pub fn action_for(&self, path: &str) -> Option<DiffAction> {
        DiffAction::ALL
            .into_iter()
            .find(|action| self.set(*action).iter().any(|p| p == path))
    }

    /// Add `path` to a push-delete set unless it is already listed.
    pub fn force_push_delete(&mut self, path: &str) {
        if !self.push_delete.iter().any(|p| p == path) {
            self.push_delete.push(path.to_string());
        }
    }

    pub fn pull_count(&self) -> usize {
        self.pull_new.len() + self.pull_update.len() + self.pull_delete.len()
    }

    pub fn push_count(&self) -> usize {
        self.push_new.len() + self.push_update.len() + self.push_delete.len()
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    pub fn total(&self) -> usize {
        self.pull_count() + self.push_count() + self.conflict_count()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl DiffAction {
    pub const ALL: [DiffAction; 7] = [
        DiffAction::PullNew,
        DiffAction::PullUpdate,
        DiffAction::PullDelete,
        DiffAction::PushNew,
        DiffAction::PushUpdate,
        DiffAction::PushDelete,
        DiffAction::Conflict,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DiffAction::PullNew => "pull new",
            DiffAction::PullUpdate => "pull update",
            DiffAction::PullDelete => "pull delete",
            DiffAction::PushNew => "push new",
            DiffAction::PushUpdate => "push update",
            DiffAction::PushDelete => "push delete",
            DiffAction::Conflict => "conflict",
        }
    }
}

/// Classify a single path. `None` means no action.
pub fn classify_state(state: &FileState) -> Option<DiffAction> {
    let b = state.base_id.as_deref();
    let l = state.local_id.as_deref();
    let r = state.remote_id.as_deref();

    if b.is_none() {
        match (l, r) {
            (Some(l), Some(r)) if l == r => return None,
            (Some(_), Some(_)) => return Some(DiffAction::Conflict),
            (None, Some(_)) => return Some(DiffAction::PullNew),
            (Some(_), None) => return Some(DiffAction::PushNew),
            (None, None) => {}
        }
    }

    if l == b && r == b {
        return None;
    }
    if r != l && l != b && r != b {
        return Some(DiffAction::Conflict);
    }
    if l == b && r != l && r.is_some() {
        return Some(DiffAction::PullUpdate);
    }
    if r == b && r != l && l.is_some() {
        return Some(DiffAction::PushUpdate);
    }
    if l == b && r.is_none() {
        return Some(DiffAction::PullDelete);
    }
    if r == b && l.is_none() {
        return Some(DiffAction::PushDelete);
    }

    // Deleted on both sides
    None
}

/// Classify every path. Paths keep the map's iteration order within each set.
pub fn classify(states: &FileStates) -> DiffResult {
    let mut result = DiffResult::default();
    for (path, state) in states.iter() {
        if let Some(action) = classify_state(state) {
            result.set_mut(action).push(path.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn action(b: Option<&str>, l: Option<&str>, r: Option<&str>) -> Option<DiffAction> {
        classify_state(&FileState::new(b, l, r))
    }

    #[test]
    fn test_new_paths() {
        assert_eq!(action(None, None, Some("X")), Some(DiffAction::PullNew));
        assert_eq!(action(None, Some("X"), None), Some(DiffAction::PushNew));
        assert_eq!(action(None, Some("X"), Some("X")), None);
        assert_eq!(action(None, Some("X"), Some("Y")), Some(DiffAction::Conflict));
        assert_eq!(action(None, None, None), None);
    }

    #[test]
    fn test_single_sided_changes() {
        assert_eq!(action(Some("A"), Some("A"), Some("B")), Some(DiffAction::PullUpdate));
        assert_eq!(action(Some("A"), Some("B"), Some("A")), Some(DiffAction::PushUpdate));
        assert_eq!(action(Some("A"), Some("A"), None), Some(DiffAction::PullDelete));
        assert_eq!(action(Some("A"), None, Some("A")), Some(DiffAction::PushDelete));
    }

    #[test]
    fn test_synced_and_conflicts() {
        assert_eq!(action(Some("A"), Some("A"), Some("A")), None);
        assert_eq!(action(Some("A"), Some("B"), Some("C")), Some(DiffAction::Conflict));
        // same change on both sides
        assert_eq!(action(Some("A"), Some("B"), Some("B")), None);
        // edited locally, deleted remotely
        assert_eq!(action(Some("A"), Some("B"), None), Some(DiffAction::Conflict));
        // deleted locally, edited remotely
        assert_eq!(action(Some("A"), None, Some("C")), Some(DiffAction::Conflict));
        // deleted on both sides
        assert_eq!(action(Some("A"), None, None), None);
    }

    #[test]
    fn test_classify_groups_in_path_order() {
        let states: FileStates = vec![
            ("b.md".to_string(), FileState::new(None, None, Some("X"))),
            ("a.md".to_string(), FileState::new(None, None, Some("Y"))),
            ("c.md".to_string(), FileState::new(Some("A"), Some("B"), Some("C"))),
            ("d.md".to_string(), FileState::new(Some("A"), Some("A"), Some("A"))),
        ]
        .into_iter()
        .collect();

        let result = classify(&states);
        assert_eq!(result.pull_new, vec!["a.md".to_string(), "b.md".to_string()]);
        assert_eq!(result.conflicts, vec!["c.md".to_string()]);
        assert_eq!(result.action_for("d.md"), None);
        assert_eq!(result.total(), 3);
    }

    #[test]
    fn test_force_push_delete_is_idempotent() {
        let mut result = DiffResult::default();
        result.force_push_delete("README.md");
        result.force_push_delete("README.md");
        assert_eq!(result.push_delete, vec!["README.md".to_string()]);
    }

    fn id_strategy() -> impl Strategy<Value = Option<String>> {
        prop_oneof![Just(None), "[ABC]".prop_map(Some)]
    }

    proptest! {
        #[test]
        fn prop_each_path_in_at_most_one_set(
            entries in proptest::collection::btree_map(
                "[a-z]{1,6}",
                (id_strategy(), id_strategy(), id_strategy()),
                0..24,
            )
        ) {
            let states: FileStates = entries
                .iter()
                .map(|(path, (b, l, r))| {
                    (path.clone(), FileState::new(b.as_deref(), l.as_deref(), r.as_deref()))
                })
                .collect();

            let first = classify(&states);
            let second = classify(&states);
            prop_assert_eq!(&first, &second);

            for (path, state) in states.iter() {
                let hits = DiffAction::ALL
                    .iter()
                    .filter(|a| first.set(**a).contains(path))
                    .count();
                let expected = usize::from(classify_state(state).is_some());
                prop_assert_eq!(hits, expected);
            }
            prop_assert!(first.total() <= states.len());
        }

        #[test]
        fn prop_unchanged_local_never_pushes(
            b in id_strategy(),
            r in id_strategy(),
        ) {
            let state = FileState::new(b.as_deref(), b.as_deref(), r.as_deref());
            let action = classify_state(&state);
            prop_assert!(!matches!(
                action,
                Some(DiffAction::PushNew | DiffAction::PushUpdate | DiffAction::PushDelete)
            ));
        }
    }
}
