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

//! The depot user → `Name <email>` cache (§2, §6): read once at startup,
//! refreshed from the depot at most once per run on a miss, and
//! persisted to `$HOME/.gitp4-usercache.txt`.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserMapError {
    #[error("failed to read user cache at '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to write user cache at '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

/// An in-memory, file-backed cache mapping depot user ids to
/// `"Name <email>"`.
#[derive(Debug, Default)]
pub struct UserMap {
    entries: BTreeMap<String, String>,
    refreshed_this_run: bool,
}

impl UserMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache file if it exists; a missing file is not an error,
    /// it just means an empty cache.
    pub fn load(path: &Path) -> Result<Self, UserMapError> {
        let mut map = Self::new();
        match std::fs::read_to_string(path) {
            Ok(contents) => map.parse_into(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(UserMapError::Read {
                    path: path.to_path_buf(),
                    error,
                });
            }
        }
        Ok(map)
    }

    fn parse_into(&mut self, contents: &str) {
        for line in contents.lines() {
            if let Some((user, name_email)) = line.split_once('\t') {
                self.entries.insert(user.to_string(), name_email.to_string());
            }
        }
    }

    pub fn get(&self, user: &str) -> Option<&str> {
        self.entries.get(user).map(String::as_str)
    }

    /// Resolve a depot user to `"Name <email>"`, falling back to the
    /// literal `"<user> <a@b>"` synthesis the importer uses for users
    /// the depot never reported (§4.4's `committer` line).
    pub fn resolve_or_synthesize(&self, user: &str) -> String {
        self.get(user)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{user} <a@b>"))
    }

    /// Populate entries from a depot `users` query result, per §3's
    /// "written at most once per run on first cache miss" rule.
    pub fn refresh(&mut self, users: impl IntoIterator<Item = (String, String)>) {
        for (user, name_email) in users {
            self.entries.insert(user, name_email);
        }
        self.refreshed_this_run = true;
    }

    pub fn was_refreshed(&self) -> bool {
        self.refreshed_this_run
    }

    /// Persist to `$HOME/.gitp4-usercache.txt` (tab-separated
    /// `user\tName <email>\n`), per §6.
    pub fn save(&self, path: &Path) -> Result<(), UserMapError> {
        let mut buf = String::new();
        for (user, name_email) in &self.entries {
            buf.push_str(user);
            buf.push('\t');
            buf.push_str(name_email);
            buf.push('\n');
        }
        let mut file = std::fs::File::create(path).map_err(|error| UserMapError::Write {
            path: path.to_path_buf(),
            error,
        })?;
        file.write_all(buf.as_bytes())
            .map_err(|error| UserMapError::Write {
                path: path.to_path_buf(),
                error,
            })
    }

    pub fn default_cache_path(home: &Path) -> PathBuf {
        home.join(".gitp4-usercache.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_tab_separated_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.txt");
        std::fs::write(&path, "alice\tAlice Smith <alice@example.com>\n").unwrap();
        let map = UserMap::load(&path).unwrap();
        assert_eq!(map.get("alice"), Some("Alice Smith <alice@example.com>"));
    }

    #[test]
    fn missing_cache_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let map = UserMap::load(&dir.path().join("nope.txt")).unwrap();
        assert_eq!(map.get("alice"), None);
    }

    #[test]
    fn unknown_user_is_synthesized() {
        let map = UserMap::new();
        assert_eq!(map.resolve_or_synthesize("someuser"), "someuser <a@b>");
    }

    #[test]
    fn refresh_then_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.txt");
        let mut map = UserMap::new();
        map.refresh([("alice".to_string(), "Alice <alice@example.com>".to_string())]);
        assert!(map.was_refreshed());
        map.save(&path).unwrap();

        let reloaded = UserMap::load(&path).unwrap();
        assert_eq!(reloaded.get("alice"), Some("Alice <alice@example.com>"));
    }
}
