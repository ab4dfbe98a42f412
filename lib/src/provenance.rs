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

//! The provenance store (§4.2): the `[key = value: ...]` note attached to
//! every imported commit, and the two folds over it that incremental
//! import depends on.

use std::collections::HashMap;

use thiserror::Error;

use crate::git_driver::GitDriver;
use crate::git_driver::GitDriverError;

/// The canonical notes ref every imported commit's provenance lives
/// under.
pub const NOTES_REF: &str = "refs/notes/git-p4";

/// The ancestor-walk cap in [`ProvenanceStore::find_upstream_branch_point`],
/// ported from the original's `while parent < 65535`.
const MAX_ANCESTOR_WALK: usize = 65_535;

#[derive(Error, Debug)]
pub enum ProvenanceError {
    #[error(transparent)]
    Driver(#[from] GitDriverError),
}

/// A parsed provenance note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub depot_paths: Vec<String>,
    pub change: Option<u64>,
    pub options: Vec<String>,
}

impl Settings {
    /// Render the note body exactly as the importer emits it (§4.4's
    /// fast-import note commit), so writer and reader agree on format.
    pub fn render(&self) -> String {
        let mut out = format!(
            "[depot-paths = \"{}\": change = {}",
            self.depot_paths.join(","),
            self.change.unwrap_or_default()
        );
        if !self.options.is_empty() {
            out.push_str(&format!(": options = {}", self.options.join(" ")));
        }
        out.push(']');
        out
    }
}

/// Parse the `[key = "value": key = value: ...]` note grammar
/// (`extractSettingsFromNotes` in the original), stripping surrounding
/// quotes and splitting `depot-paths`/`depot-path` on comma.
pub fn parse_note(note: &str) -> Settings {
    let mut values: HashMap<String, String> = HashMap::new();

    let trimmed = note.trim();
    let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    else {
        return Settings::default();
    };

    for assignment in inner.split(':') {
        let Some((key, value)) = assignment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_string();
        let mut value = value.trim().to_string();
        if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
            value = value[1..value.len() - 1].to_string();
        }
        values.insert(key, value);
    }

    let paths = values
        .get("depot-paths")
        .or_else(|| values.get("depot-path"))
        .map(|paths| paths.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    Settings {
        depot_paths: paths,
        change: values.get("change").and_then(|c| c.parse().ok()),
        options: values
            .get("options")
            .map(|opts| opts.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    }
}

/// Result of [`ProvenanceStore::find_upstream_branch_point`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamBranchPoint {
    /// The matching branch ref, or empty if none was found.
    pub branch_ref: String,
    pub settings: Settings,
}

pub struct ProvenanceStore<'a> {
    driver: &'a dyn GitDriver,
}

impl<'a> ProvenanceStore<'a> {
    pub fn new(driver: &'a dyn GitDriver) -> Self {
        Self { driver }
    }

    fn read_note(&self, commit: &str) -> Result<Settings, ProvenanceError> {
        match self.driver.notes_show(NOTES_REF, commit)? {
            Some(note) => Ok(parse_note(&note)),
            None => Ok(Settings::default()),
        }
    }

    /// Walk `head`'s first-parent chain (capped at 65,535 ancestors) for
    /// the nearest commit carrying a provenance note, per §4.2 step 3.
    fn last_settings_from_notes(&self, head: &str) -> Result<Settings, ProvenanceError> {
        for commit in self.driver.rev_list_first_parent(head, MAX_ANCESTOR_WALK)? {
            let settings = self.read_note(&commit)?;
            if !settings.depot_paths.is_empty() {
                return Ok(settings);
            }
        }
        Ok(Settings::default())
    }

    /// Walk `head`'s first-parent chain for the nearest commit whose
    /// provenance note records a changelist at or before `target_change`,
    /// for `rollback` (§4.5's undo path).
    pub fn find_commit_at_or_before(
        &self,
        head: &str,
        target_change: u64,
    ) -> Result<Option<String>, ProvenanceError> {
        for commit in self.driver.rev_list_first_parent(head, MAX_ANCESTOR_WALK)? {
            let settings = self.read_note(&commit)?;
            if settings.change.is_some_and(|change| change <= target_change) {
                return Ok(Some(commit));
            }
        }
        Ok(None)
    }

    /// The provenance settings nearest `head` on its first-parent chain,
    /// exposed directly for callers (e.g. `branches`) that just want to
    /// report a branch's last-imported changelist without resolving an
    /// upstream branch point.
    pub fn nearest_settings(&self, head: &str) -> Result<Settings, ProvenanceError> {
        self.last_settings_from_notes(head)
    }

    /// Locate the nearest ancestor of `head` whose depot-paths match an
    /// already-imported branch, and return that branch plus its settings.
    /// Two branches sharing the same depot-paths set only warn (§9 open
    /// question 4): whichever populates the reverse index last wins, and
    /// that behavior is preserved rather than fixed.
    pub fn find_upstream_branch_point(
        &self,
        branches_prefix: &str,
        head: &str,
    ) -> Result<UpstreamBranchPoint, ProvenanceError> {
        let mut by_depot_paths: HashMap<String, String> = HashMap::new();
        for branch_ref in self.driver.symbolic_ref_branches(branches_prefix)? {
            let tip = match self.driver.rev_parse(&branch_ref)? {
                Some(tip) => tip,
                None => continue,
            };
            let settings = self.last_settings_from_notes(&tip)?;
            if settings.depot_paths.is_empty() {
                continue;
            }
            let key = settings.depot_paths.join(",");
            if let Some(existing) = by_depot_paths.get(&key) {
                tracing::warn!(
                    depot_paths = %key,
                    existing,
                    new = %branch_ref,
                    "two branches share the same depot-paths set"
                );
            }
            by_depot_paths.insert(key, branch_ref);
        }

        let settings = self.last_settings_from_notes(head)?;
        if !settings.depot_paths.is_empty() {
            let key = settings.depot_paths.join(",");
            if let Some(branch_ref) = by_depot_paths.get(&key) {
                return Ok(UpstreamBranchPoint {
                    branch_ref: branch_ref.clone(),
                    settings,
                });
            }
        }
        Ok(UpstreamBranchPoint {
            branch_ref: String::new(),
            settings,
        })
    }

    /// Fold over every import branch's tip settings: the max `change`
    /// becomes the next import's lower bound, and the elementwise
    /// intersection of all `depot-paths` lists becomes its common prefix
    /// (§4.2 step "calculateLastImportedChangelist").
    pub fn calculate_last_imported_changelist(
        &self,
        branches_prefix: &str,
    ) -> Result<Option<(u64, Vec<String>)>, ProvenanceError> {
        let mut max_change: Option<u64> = None;
        let mut common_paths: Option<Vec<String>> = None;

        for branch_ref in self.driver.symbolic_ref_branches(branches_prefix)? {
            let tip = match self.driver.rev_parse(&branch_ref)? {
                Some(tip) => tip,
                None => continue,
            };
            let settings = self.last_settings_from_notes(&tip)?;
            if let Some(change) = settings.change {
                max_change = Some(max_change.map_or(change, |m| m.max(change)));
            }
            common_paths = Some(match common_paths {
                None => settings.depot_paths,
                Some(existing) => intersect_prefix(&existing, &settings.depot_paths),
            });
        }

        Ok(max_change.map(|change| (change, common_paths.unwrap_or_default())))
    }
}

/// Elementwise prefix intersection of two path lists: keep the leading
/// run where both lists agree, drop the rest.
fn intersect_prefix(a: &[String], b: &[String]) -> Vec<String> {
    a.iter()
        .zip(b.iter())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::git_driver::GitDriverError;

    /// An in-memory [`GitDriver`] double: `notes` maps commit sha to its
    /// raw note body, `chain` is a ready-made first-parent ancestor list.
    #[derive(Default)]
    struct FakeDriver {
        chain: Vec<String>,
        notes: HashMap<String, String>,
    }

    impl GitDriver for FakeDriver {
        fn rev_parse(&self, rev: &str) -> Result<Option<String>, GitDriverError> {
            Ok(Some(rev.to_string()))
        }

        fn rev_list_first_parent(&self, from: &str, _cap: usize) -> Result<Vec<String>, GitDriverError> {
            let start = self.chain.iter().position(|c| c == from).unwrap_or(0);
            Ok(self.chain[start..].to_vec())
        }

        fn symbolic_ref_branches(&self, _prefix: &str) -> Result<Vec<String>, GitDriverError> {
            Ok(vec![])
        }

        fn notes_show(&self, _notes_ref: &str, commit: &str) -> Result<Option<String>, GitDriverError> {
            Ok(self.notes.get(commit).cloned())
        }

        fn cat_file_commit(&self, _commit: &str) -> Result<String, GitDriverError> {
            Ok(String::new())
        }

        fn config_get(&self, _key: &str) -> Result<Option<String>, GitDriverError> {
            Ok(None)
        }

        fn config_get_all(&self, _key: &str) -> Result<Vec<String>, GitDriverError> {
            Ok(vec![])
        }

        fn update_ref(&self, _refname: &str, _new_value: &str) -> Result<(), GitDriverError> {
            Ok(())
        }

        fn current_branch(&self) -> Result<Option<String>, GitDriverError> {
            Ok(None)
        }

        fn fetch_origin(&self) -> Result<(), GitDriverError> {
            Ok(())
        }
    }

    #[test]
    fn finds_nearest_commit_at_or_before_target_change() {
        let driver = FakeDriver {
            chain: vec!["c3".to_string(), "c2".to_string(), "c1".to_string()],
            notes: HashMap::from([
                ("c3".to_string(), r#"[depot-paths = "//depot/": change = 30]"#.to_string()),
                ("c2".to_string(), r#"[depot-paths = "//depot/": change = 20]"#.to_string()),
                ("c1".to_string(), r#"[depot-paths = "//depot/": change = 10]"#.to_string()),
            ]),
        };
        let store = ProvenanceStore::new(&driver);
        assert_eq!(store.find_commit_at_or_before("c3", 25).unwrap(), Some("c2".to_string()));
        assert_eq!(store.find_commit_at_or_before("c3", 5).unwrap(), None);
    }

    #[test]
    fn parses_basic_note() {
        let settings = parse_note(r#"[depot-paths = "//depot/": change = 33255]"#);
        assert_eq!(settings.depot_paths, vec!["//depot/".to_string()]);
        assert_eq!(settings.change, Some(33255));
        assert!(settings.options.is_empty());
    }

    #[test]
    fn parses_multiple_depot_paths_and_options() {
        let settings =
            parse_note(r#"[depot-paths = "//depot/a/,//depot/b/": change = 7: options = keepRepoPath]"#);
        assert_eq!(
            settings.depot_paths,
            vec!["//depot/a/".to_string(), "//depot/b/".to_string()]
        );
        assert_eq!(settings.options, vec!["keepRepoPath".to_string()]);
    }

    #[test]
    fn falls_back_to_legacy_singular_key() {
        let settings = parse_note(r#"[depot-path = "//depot/": change = 1]"#);
        assert_eq!(settings.depot_paths, vec!["//depot/".to_string()]);
    }

    #[test]
    fn malformed_note_yields_empty_settings() {
        assert_eq!(parse_note("not a note"), Settings::default());
    }

    #[test]
    fn render_round_trips_through_parse() {
        let settings = Settings {
            depot_paths: vec!["//depot/".to_string()],
            change: Some(33255),
            options: vec![],
        };
        assert_eq!(parse_note(&settings.render()), settings);
    }

    #[test]
    fn intersect_prefix_stops_at_first_divergence() {
        let a = vec!["//depot/a/".to_string(), "//depot/b/".to_string()];
        let b = vec!["//depot/a/".to_string(), "//depot/c/".to_string()];
        assert_eq!(intersect_prefix(&a, &b), vec!["//depot/a/".to_string()]);
    }
}
