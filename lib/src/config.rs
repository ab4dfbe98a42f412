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

//! The DVCS-side configuration store.
//!
//! Every `git-p4.*` key named in the external interface is read through
//! this trait rather than shelled out to ad hoc per call, so the real
//! implementation (backed by `git config`) and a fake one (an in-memory
//! map, used in tests) share the same seam.

use std::collections::HashMap;

use crate::git_driver::GitDriver;

/// A source of `git-p4.*` configuration values.
pub trait ConfigSource {
    /// Single-valued config lookup (`git config --get <key>`).
    fn get(&self, key: &str) -> Option<String>;

    /// Multi-valued config lookup (`git config --get-all <key>`), used for
    /// repeatable keys like `git-p4.branchList`.
    fn get_all(&self, key: &str) -> Vec<String>;

    /// Boolean config lookup; any value is considered absent unless it
    /// parses as `true`/`false`/`1`/`0`/`yes`/`no`.
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        })
    }
}

/// An in-memory config source, for tests and for the `debug` command's
/// dry-run mode.
#[derive(Debug, Default, Clone)]
pub struct MapConfigSource {
    single: HashMap<String, String>,
    multi: HashMap<String, Vec<String>>,
}

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.single.insert(key.into(), value.into());
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.multi.entry(key.into()).or_default().push(value.into());
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.single.get(key).cloned()
    }

    fn get_all(&self, key: &str) -> Vec<String> {
        self.multi.get(key).cloned().unwrap_or_default()
    }
}

/// Resolved depot connection parameters, read once from a [`ConfigSource`]
/// at adapter construction rather than re-queried per call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepotConfig {
    pub user: Option<String>,
    pub password: Option<String>,
    pub port: Option<String>,
    pub host: Option<String>,
    pub client: Option<String>,
}

impl DepotConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        Self {
            user: non_empty(source.get("git-p4.user")),
            password: non_empty(source.get("git-p4.password")),
            port: non_empty(source.get("git-p4.port")),
            host: non_empty(source.get("git-p4.host")),
            client: non_empty(source.get("git-p4.client")),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Import/sync options sourced from config and command-line flags,
/// threaded explicitly through the pipeline rather than held as mutable
/// globals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub detect_branches: bool,
    pub detect_labels: bool,
    pub fuzzy_tags: bool,
    pub keep_repo_path: bool,
    pub import_into_remotes: bool,
    pub branch_list: Vec<String>,
    pub branch_user: Option<String>,
    pub use_client_spec: bool,
    /// `git-p4.syncFromOrigin`: whether `sync` fetches `origin` before
    /// looking for new changelists. Defaults on, matching the common case
    /// of a clone that also tracks a git remote.
    pub sync_from_origin: bool,
}

impl ImportOptions {
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        Self {
            detect_branches: source.get_bool("git-p4.detectBranches").unwrap_or(false),
            detect_labels: source.get_bool("git-p4.detectLabels").unwrap_or(false),
            fuzzy_tags: source.get_bool("git-p4.fuzzyTags").unwrap_or(false),
            keep_repo_path: source.get_bool("git-p4.keepRepoPath").unwrap_or(false),
            import_into_remotes: source.get_bool("git-p4.importIntoRemotes").unwrap_or(true),
            branch_list: source.get_all("git-p4.branchList"),
            branch_user: non_empty(source.get("git-p4.branchUser")),
            use_client_spec: source.get_bool("git-p4.useclientspec").unwrap_or(false),
            sync_from_origin: source.get_bool("git-p4.syncFromOrigin").unwrap_or(true),
        }
    }

    /// `refs/remotes/p4/` or `refs/heads/p4/`, per §6.
    pub fn refs_prefix(&self) -> &'static str {
        if self.import_into_remotes {
            "refs/remotes/p4/"
        } else {
            "refs/heads/p4/"
        }
    }
}

/// Options controlling how `submit`/`shelve` turn a DVCS diff into depot
/// actions (§4.5), sourced from the same `git-p4.*` config store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// `git-p4.detectRename`: pass `-M` to the DVCS diff so renames come
    /// back as a single `R` entry instead of a delete/add pair.
    pub detect_rename: bool,
    /// `git-p4.detectCopy`: pass `-C` so copies come back as `C` entries.
    pub detect_copy: bool,
    /// `git-p4.allowSubmit`: comma-separated branch names submit is
    /// restricted to. `None` means no restriction.
    pub allow_submit: Option<String>,
}

impl SubmitOptions {
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        Self {
            detect_rename: source.get_bool("git-p4.detectRename").unwrap_or(false),
            detect_copy: source.get_bool("git-p4.detectCopy").unwrap_or(false),
            allow_submit: non_empty(source.get("git-p4.allowSubmit")),
        }
    }

    /// Whether `branch` is allowed to submit, per `git-p4.allowSubmit`'s
    /// comma-separated list. An unset list allows every branch.
    pub fn allows_branch(&self, branch: &str) -> bool {
        match &self.allow_submit {
            None => true,
            Some(list) => list.split(',').map(str::trim).any(|allowed| allowed == branch),
        }
    }
}

/// Adapts a [`GitDriver`] (`git config --get`/`--get-all`) into a
/// [`ConfigSource`], the way the real CLI reads `git-p4.*` keys.
pub struct GitConfigSource<'a> {
    driver: &'a dyn GitDriver,
}

impl<'a> GitConfigSource<'a> {
    pub fn new(driver: &'a dyn GitDriver) -> Self {
        Self { driver }
    }
}

impl ConfigSource for GitConfigSource<'_> {
    fn get(&self, key: &str) -> Option<String> {
        self.driver.config_get(key).ok().flatten()
    }

    fn get_all(&self, key: &str) -> Vec<String> {
        self.driver.config_get_all(key).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depot_config_drops_empty_values() {
        let mut source = MapConfigSource::new();
        source.set("git-p4.user", "alice").set("git-p4.password", "");
        let config = DepotConfig::from_source(&source);
        assert_eq!(config.user.as_deref(), Some("alice"));
        assert_eq!(config.password, None);
        assert_eq!(config.port, None);
    }

    #[test]
    fn import_options_reads_repeatable_branch_list() {
        let mut source = MapConfigSource::new();
        source
            .push("git-p4.branchList", "main:dev")
            .push("git-p4.branchList", "main:release");
        let opts = ImportOptions::from_source(&source);
        assert_eq!(opts.branch_list, vec!["main:dev", "main:release"]);
    }

    #[test]
    fn refs_prefix_switches_on_import_into_remotes() {
        let mut opts = ImportOptions::default();
        opts.import_into_remotes = true;
        assert_eq!(opts.refs_prefix(), "refs/remotes/p4/");
        opts.import_into_remotes = false;
        assert_eq!(opts.refs_prefix(), "refs/heads/p4/");
    }

    #[test]
    fn sync_from_origin_defaults_on() {
        let opts = ImportOptions::from_source(&MapConfigSource::new());
        assert!(opts.sync_from_origin);
    }

    #[test]
    fn allow_submit_unset_allows_everything() {
        let opts = SubmitOptions::from_source(&MapConfigSource::new());
        assert!(opts.allows_branch("master"));
        assert!(opts.allows_branch("anything"));
    }

    #[test]
    fn allow_submit_restricts_to_listed_branches() {
        let mut source = MapConfigSource::new();
        source.set("git-p4.allowSubmit", "master, release");
        let opts = SubmitOptions::from_source(&source);
        assert!(opts.allows_branch("master"));
        assert!(opts.allows_branch("release"));
        assert!(!opts.allows_branch("feature"));
    }
}
