// Copyright 2026 The depotsync Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The import pipeline (§4): turns one fetched changelist into a
//! [`CommitSpec`] ready for [`crate::fast_import`], tracking the mark
//! counter and per-branch bookkeeping across a whole import run.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::HashSet;

use crate::branch::path_under_prefix;
use crate::changelist::Changelist;
use crate::changelist::FileEntry;
use crate::config::ImportOptions;
use crate::fast_import::CommitSpec;
use crate::fast_import::FileChange;
use crate::fast_import::Identity;
use crate::provenance::Settings;
use crate::user_map::UserMap;

/// Mutable state threaded through a whole import run: the fast-import
/// mark counter and which branches have already received a first commit.
#[derive(Debug, Default)]
pub struct ImportState {
    mark_counter: u64,
    created_branches: HashSet<String>,
    /// `changelist number -> commit mark`, kept so a later changelist's
    /// merge can reference an earlier one's commit by mark instead of by
    /// a resolved SHA that may not exist yet in the same fast-import run.
    changelist_marks: HashMap<u64, u64>,
    /// `branch ref -> most recent commit-ish` (a `:mark` within this run,
    /// or a resolved sha seeded from the pre-run ref tip). A branch
    /// absent from this map gets an empty parent for its first commit
    /// (§4.4 step 3.e).
    branch_tips: HashMap<String, String>,
    /// `branch ref -> (changelist number, commit-ish)` for every commit
    /// made on that branch so far this run, in changelist order. Lets a
    /// new branch's first commit bisect a sibling branch's history
    /// without needing that history flushed to a real git ref first
    /// (§4.4 step 3d).
    branch_history: HashMap<String, Vec<(u64, String)>>,
}

impl ImportState {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_mark(&mut self) -> u64 {
        self.mark_counter += 1;
        self.mark_counter
    }

    /// True if `branch_ref` has not yet received a commit in this run,
    /// i.e. its first commit needs a `from` pointing at the pre-import
    /// parent rather than a previous mark.
    pub fn is_new_branch(&self, branch_ref: &str) -> bool {
        !self.created_branches.contains(branch_ref)
    }

    pub fn mark_for_changelist(&self, number: u64) -> Option<u64> {
        self.changelist_marks.get(&number).copied()
    }

    /// Seed a branch's tip from its pre-run ref value, so the first
    /// changelist to touch an already-existing branch still gets a
    /// proper `from` instead of being treated as brand new.
    pub fn seed_branch_tip(&mut self, branch_ref: &str, tip: impl Into<String>) {
        self.branch_tips.insert(branch_ref.to_string(), tip.into());
        self.created_branches.insert(branch_ref.to_string());
    }

    pub fn branch_tip(&self, branch_ref: &str) -> Option<&str> {
        self.branch_tips.get(branch_ref).map(String::as_str)
    }

    fn set_branch_tip(&mut self, branch_ref: &str, tip: impl Into<String>) {
        self.branch_tips.insert(branch_ref.to_string(), tip.into());
    }

    /// Record a commit produced this run, so later branches can bisect
    /// against it (§4.4 step 3d).
    fn record_branch_commit(&mut self, branch_ref: &str, change: u64, commit_ish: impl Into<String>) {
        let commit_ish = commit_ish.into();
        self.branch_tips.insert(branch_ref.to_string(), commit_ish.clone());
        self.branch_history
            .entry(branch_ref.to_string())
            .or_default()
            .push((change, commit_ish));
    }

    /// Bisect `branch_ref`'s commits made so far this run for the
    /// nearest one at or before `target_change` (§4.4 step 3d). Commits
    /// are appended in changelist order, so the search walks backward.
    pub fn commit_at_or_before(&self, branch_ref: &str, target_change: u64) -> Option<&str> {
        self.branch_history
            .get(branch_ref)?
            .iter()
            .rev()
            .find(|(change, _)| *change <= target_change)
            .map(|(_, commit)| commit.as_str())
    }
}

/// One destination branch's depot root, resolved from `git-p4.branchList`
/// entries (or the single configured depot path when branch detection is
/// off), as `(branch_ref, depot_root_prefix)` pairs.
pub type BranchRoots = Vec<(String, String)>;

/// Partition a changelist's files across the known branch roots, each
/// matched with the `prefix + "/"` guard (§4.4 step 3, testable property
/// 4). Files matching no known root fall back to `default_branch`.
pub fn partition_by_branch<'a>(
    files: &'a [FileEntry],
    branch_roots: &BranchRoots,
    default_branch: &str,
) -> BTreeMap<String, Vec<&'a FileEntry>> {
    let mut result: BTreeMap<String, Vec<&FileEntry>> = BTreeMap::new();
    for file in files {
        let path = file.effective_path();
        let branch = branch_roots
            .iter()
            .find(|(_, prefix)| path_under_prefix(path, prefix))
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| default_branch.to_string());
        result.entry(branch).or_default().push(file);
    }
    result
}

/// Resolve the branch `own_branch_ref` was copied from, so its first
/// commit can bisect that branch's history for a content-bearing parent
/// instead of starting as an orphan root (§4.4 step 3d). `own_branch_ref`
/// must itself be a known root (the default branch has no entry and
/// always stays an orphan); the source is whichever *other* root's
/// depot prefix contains `own_branch_ref`'s, falling back to
/// `default_branch` when none do.
pub fn source_branch_ref<'a>(
    own_branch_ref: &str,
    branch_roots: &'a BranchRoots,
    default_branch: &'a str,
) -> Option<&'a str> {
    let (_, source_prefix) = branch_roots.iter().find(|(name, _)| name == own_branch_ref)?;
    Some(
        branch_roots
            .iter()
            .find(|(name, prefix)| name != own_branch_ref && path_under_prefix(source_prefix, prefix))
            .map(|(name, _)| name.as_str())
            .unwrap_or(default_branch),
    )
}

/// Resolve the merge parent for a changelist already known to be a merge
/// commit (`Changelist::is_merge_commit`). `integration_sources` maps each
/// integration file's destination depot path to the depot path the
/// caller resolved it was integrated *from* (typically via a `filelog`
/// lookup, since that history isn't otherwise available here): each
/// resolved source is matched against the known branch roots, and if
/// exactly one other branch is implicated, its current tip is returned.
/// Conflicting source branches drop the merge parent rather than
/// aborting the commit (§4.4's `getMergeParentCommit`).
pub fn resolve_merge_parent(
    changelist: &Changelist,
    own_branch_ref: &str,
    branch_roots: &BranchRoots,
    integration_sources: &HashMap<String, String>,
    state: &ImportState,
) -> Option<String> {
    if !changelist.is_merge_commit() {
        return None;
    }
    let mut sources: HashSet<&str> = HashSet::new();
    for file in &changelist.files {
        if !file.action.is_integration() {
            continue;
        }
        let Some(source_path) = integration_sources.get(file.effective_path()) else {
            continue;
        };
        if let Some((branch_ref, _)) = branch_roots
            .iter()
            .find(|(_, prefix)| path_under_prefix(source_path, prefix))
        {
            if branch_ref != own_branch_ref {
                sources.insert(branch_ref.as_str());
            }
        }
    }
    if sources.len() > 1 {
        tracing::warn!(
            change = changelist.number,
            sources = ?sources,
            "conflicting source branches for integration, dropping merge parent"
        );
        return None;
    }
    let source_branch = *sources.iter().next()?;
    state.branch_tip(source_branch).map(str::to_string)
}

/// Strip the common depot-path prefix from `depot_path`, unless
/// `keep_repo_path` asks for the full depot path to be kept as the
/// repository-relative path (§4.3).
pub fn relative_path(depot_path: &str, depot_paths: &[String], keep_repo_path: bool) -> String {
    if keep_repo_path {
        return depot_path.trim_start_matches("//").to_string();
    }
    for prefix in depot_paths {
        if let Some(stripped) = depot_path.strip_prefix(prefix.as_str()) {
            return stripped.to_string();
        }
    }
    depot_path.trim_start_matches("//").to_string()
}

/// Translates one changelist plus its already-fetched file contents into
/// a fast-import [`CommitSpec`], advancing `state`'s mark counter and
/// branch bookkeeping.
pub struct ImportPipeline {
    options: ImportOptions,
}

impl ImportPipeline {
    pub fn new(options: ImportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Build the commit (and its paired notes commit) for `changelist` on
    /// `branch_ref`. `from`/`merge` are resolved by the caller (typically
    /// the previous commit on this branch, and — for a detected merge —
    /// the source branch's tip via `state.mark_for_changelist`).
    pub fn translate(
        &self,
        state: &mut ImportState,
        changelist: &Changelist,
        depot_paths: &[String],
        branch_ref: &str,
        user_map: &UserMap,
        changes: Vec<FileChange>,
        from: Option<String>,
        merge: Option<String>,
    ) -> CommitSpec {
        let commit_mark = state.next_mark();
        let notes_mark = state.next_mark();
        state.created_branches.insert(branch_ref.to_string());
        state.changelist_marks.insert(changelist.number, commit_mark);
        state.record_branch_commit(branch_ref, changelist.number, format!(":{commit_mark}"));

        let committer = Identity::new(
            user_map.resolve_or_synthesize(&changelist.author),
            changelist.time,
        );

        let note_body = Settings {
            depot_paths: depot_paths.to_vec(),
            change: Some(changelist.number),
            options: if self.options.keep_repo_path {
                vec!["keepRepoPath".to_string()]
            } else {
                vec![]
            },
        }
        .render();

        CommitSpec {
            branch_ref: branch_ref.to_string(),
            mark: commit_mark,
            committer,
            message: format!("{}\n", changelist.description.trim_end()),
            from,
            merge,
            changes,
            notes_mark,
            notes_from: None,
            note_body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelist::FileAction;
    use crate::changelist::FileEntry;

    fn changelist() -> Changelist {
        Changelist {
            number: 33255,
            author: "someuser".to_string(),
            time: 1_000_000,
            description: "a change\n".to_string(),
            files: vec![FileEntry::new("//depot/main/a.txt", 1, FileAction::Add, "text")],
        }
    }

    #[test]
    fn relative_path_strips_matching_depot_prefix() {
        let paths = vec!["//depot/main/".to_string()];
        assert_eq!(relative_path("//depot/main/src/lib.rs", &paths, false), "src/lib.rs");
    }

    #[test]
    fn relative_path_keeps_full_depot_path_when_requested() {
        let paths = vec!["//depot/main/".to_string()];
        assert_eq!(
            relative_path("//depot/main/src/lib.rs", &paths, true),
            "depot/main/src/lib.rs"
        );
    }

    #[test]
    fn translate_assigns_two_marks_and_renders_note() {
        let mut state = ImportState::new();
        let pipeline = ImportPipeline::new(ImportOptions::default());
        let user_map = UserMap::new();
        let cl = changelist();
        let spec = pipeline.translate(
            &mut state,
            &cl,
            &["//depot/main/".to_string()],
            "refs/remotes/p4/master",
            &user_map,
            vec![],
            None,
            None,
        );
        assert_eq!(spec.mark, 1);
        assert_eq!(spec.notes_mark, 2);
        assert_eq!(spec.committer.name_email, "someuser <a@b>");
        assert!(spec.note_body.contains("change = 33255"));
        assert_eq!(state.mark_for_changelist(33255), Some(1));
        assert!(!state.is_new_branch("refs/remotes/p4/master"));
    }

    #[test]
    fn translate_increments_marks_across_calls() {
        let mut state = ImportState::new();
        let pipeline = ImportPipeline::new(ImportOptions::default());
        let user_map = UserMap::new();
        let cl = changelist();
        pipeline.translate(&mut state, &cl, &[], "refs/remotes/p4/master", &user_map, vec![], None, None);
        let second = Changelist {
            number: 33256,
            ..cl
        };
        let spec = pipeline.translate(&mut state, &second, &[], "refs/remotes/p4/master", &user_map, vec![], None, None);
        assert_eq!(spec.mark, 3);
        assert_eq!(spec.notes_mark, 4);
    }

    fn entry(path: &str, action: FileAction) -> FileEntry {
        FileEntry::new(path, 1, action, "text")
    }

    #[test]
    fn partitions_files_by_branch_root_with_fallback_to_default() {
        let roots: BranchRoots = vec![("refs/remotes/p4/dev".to_string(), "//depot/dev".to_string())];
        let files = vec![
            entry("//depot/dev/a.txt", FileAction::Add),
            entry("//depot/main/b.txt", FileAction::Add),
        ];
        let partitions = partition_by_branch(&files, &roots, "refs/remotes/p4/master");
        assert_eq!(partitions["refs/remotes/p4/dev"].len(), 1);
        assert_eq!(partitions["refs/remotes/p4/master"].len(), 1);
    }

    #[test]
    fn resolves_merge_parent_from_sole_integration_source() {
        let roots: BranchRoots = vec![
            ("refs/remotes/p4/main".to_string(), "//depot/main".to_string()),
            ("refs/remotes/p4/dev".to_string(), "//depot/dev".to_string()),
        ];
        let mut state = ImportState::new();
        state.seed_branch_tip("refs/remotes/p4/main", "deadbeef");

        let cl = Changelist {
            number: 42,
            author: "a".into(),
            time: 0,
            description: String::new(),
            files: vec![
                entry("//depot/dev/a.txt", FileAction::Integrate),
                entry("//depot/dev/b.txt", FileAction::Integrate),
            ],
        };
        let sources: HashMap<String, String> = [
            ("//depot/dev/a.txt".to_string(), "//depot/main/a.txt".to_string()),
            ("//depot/dev/b.txt".to_string(), "//depot/main/b.txt".to_string()),
        ]
        .into();
        let parent = resolve_merge_parent(&cl, "refs/remotes/p4/dev", &roots, &sources, &state);
        assert_eq!(parent, Some("deadbeef".to_string()));
    }

    #[test]
    fn drops_merge_parent_on_conflicting_sources() {
        let roots: BranchRoots = vec![
            ("refs/remotes/p4/main".to_string(), "//depot/main".to_string()),
            ("refs/remotes/p4/other".to_string(), "//depot/other".to_string()),
            ("refs/remotes/p4/dev".to_string(), "//depot/dev".to_string()),
        ];
        let mut state = ImportState::new();
        state.seed_branch_tip("refs/remotes/p4/main", "m1");
        state.seed_branch_tip("refs/remotes/p4/other", "o1");

        let cl = Changelist {
            number: 42,
            author: "a".into(),
            time: 0,
            description: String::new(),
            files: vec![
                entry("//depot/dev/a.txt", FileAction::Integrate),
                entry("//depot/dev/b.txt", FileAction::Integrate),
            ],
        };
        let sources: HashMap<String, String> = [
            ("//depot/dev/a.txt".to_string(), "//depot/main/a.txt".to_string()),
            ("//depot/dev/b.txt".to_string(), "//depot/other/b.txt".to_string()),
        ]
        .into();
        assert_eq!(resolve_merge_parent(&cl, "refs/remotes/p4/dev", &roots, &sources, &state), None);
    }

    #[test]
    fn source_branch_ref_falls_back_to_default_branch() {
        let roots: BranchRoots = vec![("refs/remotes/p4/dev".to_string(), "//depot/dev".to_string())];
        assert_eq!(
            source_branch_ref("refs/remotes/p4/dev", &roots, "refs/remotes/p4/master"),
            Some("refs/remotes/p4/master")
        );
    }

    #[test]
    fn source_branch_ref_is_none_for_the_default_branch() {
        let roots: BranchRoots = vec![("refs/remotes/p4/dev".to_string(), "//depot/dev".to_string())];
        assert_eq!(source_branch_ref("refs/remotes/p4/master", &roots, "refs/remotes/p4/master"), None);
    }

    #[test]
    fn commit_at_or_before_bisects_in_run_history() {
        let mut state = ImportState::new();
        state.record_branch_commit("refs/remotes/p4/main", 10, ":1");
        state.record_branch_commit("refs/remotes/p4/main", 20, ":2");
        state.record_branch_commit("refs/remotes/p4/main", 30, ":3");
        assert_eq!(state.commit_at_or_before("refs/remotes/p4/main", 25), Some(":2"));
        assert_eq!(state.commit_at_or_before("refs/remotes/p4/main", 5), None);
    }

    #[test]
    fn non_merge_changelist_has_no_merge_parent() {
        let roots: BranchRoots = vec![];
        let state = ImportState::new();
        let cl = changelist();
        assert_eq!(
            resolve_merge_parent(&cl, "refs/remotes/p4/master", &roots, &HashMap::new(), &state),
            None
        );
    }
}
