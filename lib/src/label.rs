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

//! The label/tag engine (§4.7): decides which imported commit, if any, a
//! depot label corresponds to, by comparing the label's file/revision set
//! against what each branch had committed at the time.

use std::collections::BTreeMap;

/// A depot label as reported by `labels`/`files -e`: the file set it was
/// taken against, plus the metadata needed to emit a `tag` record.
#[derive(Debug, Clone)]
pub struct DepotLabel {
    pub name: String,
    pub description: String,
    pub time: i64,
    /// The label's `Owner` field. Used as the tagger identity even though
    /// the commit this label applies to may have a different author —
    /// the original tool looks the owner up in the same user map used
    /// for commits, and that mismatch is preserved here rather than
    /// resolved against the file revisions' actual authors.
    pub owner: String,
    pub files: BTreeMap<String, u32>,
}

/// Decide whether `label` applies to a branch whose tracked files sit at
/// `branch_revisions`. An exact match requires every label file present
/// at the exact labeled revision and no extra files on either side; with
/// `fuzzy_tags` set, a majority overlap is accepted instead (§4.7).
pub fn label_matches_branch(
    label: &DepotLabel,
    branch_revisions: &BTreeMap<String, u32>,
    fuzzy_tags: bool,
) -> bool {
    if label.files.is_empty() {
        return false;
    }
    let matching = label
        .files
        .iter()
        .filter(|(path, revision)| branch_revisions.get(*path) == Some(*revision))
        .count();

    if fuzzy_tags {
        matching * 2 >= label.files.len()
    } else {
        matching == label.files.len() && matching == branch_revisions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(files: &[(&str, u32)]) -> DepotLabel {
        DepotLabel {
            name: "v1.0".to_string(),
            description: "release".to_string(),
            time: 1_000,
            owner: "releaseeng".to_string(),
            files: files.iter().map(|(p, r)| (p.to_string(), *r)).collect(),
        }
    }

    #[test]
    fn exact_match_requires_identical_file_sets() {
        let lbl = label(&[("//depot/a", 2), ("//depot/b", 1)]);
        let branch: BTreeMap<_, _> = [("//depot/a".to_string(), 2), ("//depot/b".to_string(), 1)].into();
        assert!(label_matches_branch(&lbl, &branch, false));
    }

    #[test]
    fn exact_match_rejects_extra_branch_files() {
        let lbl = label(&[("//depot/a", 2)]);
        let branch: BTreeMap<_, _> = [("//depot/a".to_string(), 2), ("//depot/b".to_string(), 1)].into();
        assert!(!label_matches_branch(&lbl, &branch, false));
    }

    #[test]
    fn fuzzy_match_accepts_majority_overlap() {
        let lbl = label(&[("//depot/a", 2), ("//depot/b", 1), ("//depot/c", 1)]);
        let branch: BTreeMap<_, _> = [
            ("//depot/a".to_string(), 2),
            ("//depot/b".to_string(), 1),
            ("//depot/c".to_string(), 9),
        ]
        .into();
        assert!(label_matches_branch(&lbl, &branch, true));
    }

    #[test]
    fn empty_label_never_matches() {
        let lbl = label(&[]);
        assert!(!label_matches_branch(&lbl, &BTreeMap::new(), true));
    }
}
