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

//! The DVCS driver contract (§6): rev-parse, rev-list, cat-file,
//! diff-tree, format-patch, notes show/add, branch/update-ref,
//! symbolic-ref, config, fetch. Modeled as a trait so the real
//! subprocess-backed implementation and an in-memory fake (for tests)
//! share one seam, the same way the depot adapter does.

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitDriverError {
    #[error("could not spawn git process at '{path}'")]
    Spawn {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("git process failed")]
    Wait(#[source] std::io::Error),
    #[error("git {args:?} failed: {stderr}")]
    NonZeroExit { args: Vec<String>, stderr: String },
    #[error("git output was not valid UTF-8")]
    NotUtf8,
}

/// Everything the import pipeline and submit engine need to talk to the
/// DVCS: ref enumeration, commit metadata, notes, and writes. The
/// fast-import stream itself is written separately (see
/// [`crate::fast_import`]) since it is a single long-lived child process
/// rather than one-shot invocations.
pub trait GitDriver {
    fn rev_parse(&self, rev: &str) -> Result<Option<String>, GitDriverError>;
    fn rev_list_first_parent(&self, from: &str, cap: usize) -> Result<Vec<String>, GitDriverError>;
    fn symbolic_ref_branches(&self, prefix: &str) -> Result<Vec<String>, GitDriverError>;
    fn notes_show(&self, notes_ref: &str, commit: &str) -> Result<Option<String>, GitDriverError>;
    fn cat_file_commit(&self, commit: &str) -> Result<String, GitDriverError>;
    fn config_get(&self, key: &str) -> Result<Option<String>, GitDriverError>;
    fn config_get_all(&self, key: &str) -> Result<Vec<String>, GitDriverError>;
    fn update_ref(&self, refname: &str, new_value: &str) -> Result<(), GitDriverError>;
    /// The short name of the branch `HEAD` points to, or `None` in
    /// detached-HEAD state.
    fn current_branch(&self) -> Result<Option<String>, GitDriverError>;
    /// `fetch origin`, run before `sync` when `git-p4.syncFromOrigin` is
    /// set. A missing `origin` remote or a failing fetch is not fatal
    /// (§6's `ignore_error` contract) — `sync` still proceeds against
    /// whatever refs already exist locally.
    fn fetch_origin(&self) -> Result<(), GitDriverError>;
}

/// The real driver, shelling out to the `git` binary exactly as the
/// external-interface section describes: text stdout, exit code 0 means
/// success.
pub struct GitCliDriver {
    executable: PathBuf,
    git_dir: PathBuf,
}

impl GitCliDriver {
    pub fn new(executable: impl Into<PathBuf>, git_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            git_dir: git_dir.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg("--git-dir").arg(&self.git_dir);
        cmd.args(args);
        cmd.env("LC_ALL", "C");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<String, GitDriverError> {
        tracing::debug!(?args, "spawning a git subprocess");
        let output = self
            .command(args)
            .spawn()
            .map_err(|error| GitDriverError::Spawn {
                path: self.executable.clone(),
                error,
            })?
            .wait_with_output()
            .map_err(GitDriverError::Wait)?;
        if !output.status.success() {
            return Err(GitDriverError::NonZeroExit {
                args: args.iter().map(|s| s.to_string()).collect(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        String::from_utf8(output.stdout).map_err(|_| GitDriverError::NotUtf8)
    }

    fn run_ignoring_failure(&self, args: &[&str]) -> Result<Option<String>, GitDriverError> {
        let output = self
            .command(args)
            .spawn()
            .map_err(|error| GitDriverError::Spawn {
                path: self.executable.clone(),
                error,
            })?
            .wait_with_output()
            .map_err(GitDriverError::Wait)?;
        if !output.status.success() {
            return Ok(None);
        }
        String::from_utf8(output.stdout)
            .map(Some)
            .map_err(|_| GitDriverError::NotUtf8)
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl GitDriver for GitCliDriver {
    fn rev_parse(&self, rev: &str) -> Result<Option<String>, GitDriverError> {
        Ok(self
            .run_ignoring_failure(&["rev-parse", rev])?
            .map(|s| s.trim().to_string()))
    }

    fn rev_list_first_parent(&self, from: &str, cap: usize) -> Result<Vec<String>, GitDriverError> {
        let max = cap.to_string();
        let output = self.run(&["rev-list", "--first-parent", &format!("-n{max}"), from])?;
        Ok(output.lines().map(str::to_string).collect())
    }

    fn symbolic_ref_branches(&self, prefix: &str) -> Result<Vec<String>, GitDriverError> {
        let output = self.run(&["for-each-ref", "--format=%(refname)", prefix])?;
        Ok(output.lines().map(str::to_string).collect())
    }

    fn notes_show(&self, notes_ref: &str, commit: &str) -> Result<Option<String>, GitDriverError> {
        let arg = format!("--ref={notes_ref}");
        Ok(self.run_ignoring_failure(&["notes", &arg, "show", commit])?)
    }

    fn cat_file_commit(&self, commit: &str) -> Result<String, GitDriverError> {
        self.run(&["cat-file", "commit", commit])
    }

    fn config_get(&self, key: &str) -> Result<Option<String>, GitDriverError> {
        Ok(self
            .run_ignoring_failure(&["config", "--get", key])?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    fn config_get_all(&self, key: &str) -> Result<Vec<String>, GitDriverError> {
        Ok(self
            .run_ignoring_failure(&["config", "--get-all", key])?
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default())
    }

    fn update_ref(&self, refname: &str, new_value: &str) -> Result<(), GitDriverError> {
        self.run(&["update-ref", refname, new_value]).map(|_| ())
    }

    fn current_branch(&self) -> Result<Option<String>, GitDriverError> {
        Ok(self
            .run_ignoring_failure(&["symbolic-ref", "-q", "--short", "HEAD"])?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    fn fetch_origin(&self) -> Result<(), GitDriverError> {
        self.run_ignoring_failure(&["fetch", "origin"])?;
        Ok(())
    }
}
