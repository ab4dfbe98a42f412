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

//! The client-spec include/exclude view (§3, §4.3): an ordered list of
//! `(depot-prefix, signed-length)` pairs sorted by descending absolute
//! length, first match wins.

/// One entry of a client spec view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSpecEntry {
    pub prefix: String,
    pub include: bool,
}

/// An ordered client-spec view. Entries are kept sorted by descending
/// prefix length so the most specific rule matches first.
#[derive(Debug, Clone, Default)]
pub struct ClientSpec {
    entries: Vec<ClientSpecEntry>,
}

impl ClientSpec {
    pub fn new(mut entries: Vec<ClientSpecEntry>) -> Self {
        entries.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { entries }
    }

    /// Parse one `View` field value from `p4 client -o`, e.g.
    /// `//depot/main/... //ws/main/...` or, for an exclusion,
    /// `-//depot/main/vendor/... //ws/main/vendor/...`. Only the depot
    /// side is kept; the client-side half of the mapping is irrelevant
    /// to deciding whether a depot path is in scope.
    pub fn parse_view_entry(raw: &str) -> Option<ClientSpecEntry> {
        let raw = raw.trim().trim_start_matches('"');
        let depot_half = raw.split_whitespace().next()?;
        let end = depot_half.find("...")?;
        let trimmed = &depot_half[..end];
        if let Some(prefix) = trimmed.strip_prefix('-') {
            Some(ClientSpecEntry { prefix: prefix.to_string(), include: false })
        } else {
            Some(ClientSpecEntry { prefix: trimmed.to_string(), include: true })
        }
    }

    /// Build a spec from every `View<N>` field of a `p4 client -o`
    /// result, in whatever order they're given — `new` sorts them.
    pub fn from_view_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(lines.into_iter().filter_map(Self::parse_view_entry).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First-match-wins decision for `path`. An empty spec includes
    /// everything; a non-empty spec with no matching entry excludes,
    /// per §4.3.
    pub fn includes(&self, path: &str) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        self.entries
            .iter()
            .find(|entry| path.starts_with(&entry.prefix))
            .map(|entry| entry.include)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(pairs: &[(&str, bool)]) -> ClientSpec {
        ClientSpec::new(
            pairs
                .iter()
                .map(|(prefix, include)| ClientSpecEntry {
                    prefix: prefix.to_string(),
                    include: *include,
                })
                .collect(),
        )
    }

    #[test]
    fn empty_spec_includes_everything() {
        let spec = ClientSpec::default();
        assert!(spec.includes("//depot/anything"));
    }

    #[test]
    fn non_empty_spec_excludes_unmatched_paths() {
        let spec = spec(&[("//depot/main/", true)]);
        assert!(!spec.includes("//depot/other/file.txt"));
    }

    #[test]
    fn most_specific_prefix_wins_regardless_of_insertion_order() {
        let spec = spec(&[("//depot/main/", true), ("//depot/main/vendor/", false)]);
        assert!(!spec.includes("//depot/main/vendor/lib.rs"));
        assert!(spec.includes("//depot/main/src/lib.rs"));
    }

    #[test]
    fn parses_plain_view_line() {
        let entry = ClientSpec::parse_view_entry("//depot/main/... //ws/main/...").unwrap();
        assert_eq!(entry, ClientSpecEntry { prefix: "//depot/main/".into(), include: true });
    }

    #[test]
    fn parses_excluded_view_line() {
        let entry = ClientSpec::parse_view_entry("-//depot/main/vendor/... //ws/main/vendor/...").unwrap();
        assert_eq!(entry, ClientSpecEntry { prefix: "//depot/main/vendor/".into(), include: false });
    }

    #[test]
    fn parses_quoted_view_line() {
        let entry = ClientSpec::parse_view_entry("\"//depot/has space/...\" \"//ws/has space/...\"").unwrap();
        assert_eq!(entry, ClientSpecEntry { prefix: "//depot/has space/".into(), include: true });
    }

    #[test]
    fn builds_spec_from_view_lines_most_specific_wins() {
        let spec = ClientSpec::from_view_lines([
            "//depot/main/... //ws/main/...",
            "-//depot/main/vendor/... //ws/main/vendor/...",
        ]);
        assert!(!spec.includes("//depot/main/vendor/lib.rs"));
        assert!(spec.includes("//depot/main/src/lib.rs"));
    }
}
