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

//! Branch mappings for `git-p4.branchList` (§3): a depot source prefix
//! paired with a destination branch name, used to detect cross-branch
//! integrations while importing.

use std::collections::HashMap;
use std::collections::HashSet;

/// One `source:destination` entry from `git-p4.branchList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchMapping {
    pub source_prefix: String,
    pub destination: String,
}

impl BranchMapping {
    /// Parse a single `source:destination` config value.
    pub fn parse(entry: &str) -> Option<Self> {
        let (source, destination) = entry.split_once(':')?;
        if source.is_empty() || destination.is_empty() {
            return None;
        }
        Some(Self {
            source_prefix: source.to_string(),
            destination: destination.to_string(),
        })
    }
}

/// The resolved set of branch mappings for an import, with destination
/// names kept unique and nested destination branches (`foo/bar` when
/// `foo` also names a destination) dropped rather than allowed to
/// coexist as two separate branches (§3).
#[derive(Debug, Clone, Default)]
pub struct BranchMap {
    mappings: Vec<BranchMapping>,
}

impl BranchMap {
    /// Build a branch map from raw `source:destination` config entries,
    /// logging and dropping any entry that collides with one already
    /// accepted.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a str>) -> Self {
        let mut mappings: Vec<BranchMapping> = Vec::new();
        let mut destinations: HashSet<String> = HashSet::new();

        for entry in entries {
            let Some(mapping) = BranchMapping::parse(entry) else {
                tracing::warn!(entry, "ignoring malformed branch-list entry");
                continue;
            };
            if destinations.contains(&mapping.destination) {
                tracing::warn!(
                    destination = mapping.destination,
                    "ignoring branch-list entry with a duplicate destination"
                );
                continue;
            }
            destinations.insert(mapping.destination.clone());
            mappings.push(mapping);
        }

        mappings.retain(|mapping| {
            let top = mapping.destination.split('/').next().unwrap_or(&mapping.destination);
            if top != mapping.destination && destinations.contains(top) {
                tracing::warn!(
                    destination = mapping.destination,
                    "ignoring branch-list entry nested under an existing destination"
                );
                false
            } else {
                true
            }
        });

        Self { mappings }
    }

    pub fn mappings(&self) -> &[BranchMapping] {
        &self.mappings
    }

    /// The destination branch whose source prefix contains `depot_path`,
    /// if any.
    pub fn destination_for(&self, depot_path: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|m| path_under_prefix(depot_path, &m.source_prefix))
            .map(|m| m.destination.as_str())
    }

    /// `{destination: source_prefix}`, as consumed by the import
    /// pipeline's `knownBranches` bookkeeping.
    pub fn as_destination_map(&self) -> HashMap<String, String> {
        self.mappings
            .iter()
            .map(|m| (m.destination.clone(), m.source_prefix.clone()))
            .collect()
    }
}

/// True if `path` sits at or under `prefix`, matched with a `/` guard so
/// a prefix like `//depot/foo/4.2` does not also swallow a sibling
/// branch `//depot/foo/4.2-beta` (§4.4 step 3).
pub fn path_under_prefix(path: &str, prefix: &str) -> bool {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return true;
    }
    path == trimmed || path.starts_with(&format!("{trimmed}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_destination_pair() {
        let mapping = BranchMapping::parse("//depot/main:dev").unwrap();
        assert_eq!(mapping.source_prefix, "//depot/main");
        assert_eq!(mapping.destination, "dev");
    }

    #[test]
    fn rejects_malformed_entry() {
        assert!(BranchMapping::parse("no-colon-here").is_none());
        assert!(BranchMapping::parse(":dev").is_none());
    }

    #[test]
    fn drops_entries_with_duplicate_destination() {
        let map = BranchMap::from_entries(["//depot/a:dev", "//depot/b:dev"]);
        assert_eq!(map.mappings().len(), 1);
        assert_eq!(map.mappings()[0].source_prefix, "//depot/a");
    }

    #[test]
    fn drops_nested_destination_branches() {
        let map = BranchMap::from_entries(["//depot/a:foo", "//depot/b:foo/bar"]);
        assert_eq!(map.mappings().len(), 1);
        assert_eq!(map.mappings()[0].destination, "foo");
    }

    #[test]
    fn keeps_sibling_destinations_with_unrelated_names() {
        let map = BranchMap::from_entries(["//depot/main:dev", "//depot/main/sub:sub-dev"]);
        assert_eq!(map.mappings().len(), 2);
    }

    #[test]
    fn resolves_destination_by_longest_matching_prefix() {
        let map = BranchMap::from_entries(["//depot/main:dev"]);
        assert_eq!(map.destination_for("//depot/main/file.rs"), Some("dev"));
        assert_eq!(map.destination_for("//depot/other/file.rs"), None);
    }

    #[test]
    fn guard_prevents_sibling_prefix_collision() {
        let map = BranchMap::from_entries(["//depot/foo/4.2:four-two"]);
        assert_eq!(map.destination_for("//depot/foo/4.2/file.rs"), Some("four-two"));
        assert_eq!(map.destination_for("//depot/foo/4.2-beta/file.rs"), None);
    }
}
