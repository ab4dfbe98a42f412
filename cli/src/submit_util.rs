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

//! Porcelain `git` calls (`diff --name-status`, `rev-list`, `log`,
//! `show`, `ls-tree`) the submit/shelve commands need that sit outside
//! [`depotsync_lib`]'s plumbing-only
//! [`depotsync_lib::git_driver::GitDriver`] seam.

use std::process::Command;
use std::process::Stdio;

use depotsync_lib::config::SubmitOptions;
use depotsync_lib::submit::DiffEntry;
use depotsync_lib::submit::DiffStatus;
use depotsync_lib::submit::SubmitError;

use crate::cli_util::CommandHelper;
use crate::command_error::user_error;
use crate::command_error::CommandError;

/// A record separator unlikely to appear in a commit message, used to
/// split `git log`'s output back into per-commit records.
const RECORD_SEP: char = '\x1e';
const FIELD_SEP: char = '\x1f';

/// One not-yet-submitted commit on the current branch.
pub struct PendingCommit {
    pub sha: String,
    pub parent: String,
    pub summary: String,
    pub message: String,
}

fn run_git(command: &CommandHelper, args: &[&str]) -> Result<String, CommandError> {
    let output = run_git_raw(command, args)?;
    String::from_utf8(output).map_err(|_| user_error("git produced non-UTF-8 output"))
}

fn run_git_raw(command: &CommandHelper, args: &[&str]) -> Result<Vec<u8>, CommandError> {
    let output = Command::new(command.git_executable())
        .arg("--git-dir")
        .arg(command.git_dir())
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .output()?;
    if !output.status.success() {
        return Err(user_error(format!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(output.stdout)
}

/// Every commit reachable from `HEAD` but not from `since`, oldest first,
/// with each commit's full message (for the changelist description) and
/// one-line summary.
pub fn commits_to_submit(command: &CommandHelper, since: &str) -> Result<Vec<PendingCommit>, CommandError> {
    let range = format!("{since}..HEAD");
    let format = format!("--format=%H{FIELD_SEP}%P{FIELD_SEP}%B{RECORD_SEP}");
    let output = run_git(command, &["log", "--reverse", "--first-parent", &format, &range])?;

    let mut commits = Vec::new();
    for record in output.split(RECORD_SEP) {
        let record = record.trim_start_matches('\n');
        if record.is_empty() {
            continue;
        }
        let mut fields = record.splitn(3, FIELD_SEP);
        let sha = fields.next().unwrap_or_default().to_string();
        if sha.is_empty() {
            continue;
        }
        let parents = fields.next().unwrap_or_default();
        let message = fields.next().unwrap_or_default().trim_end_matches('\n').to_string();
        let parent = parents.split_whitespace().next().unwrap_or(since).to_string();
        let summary = message.lines().next().unwrap_or_default().to_string();
        commits.push(PendingCommit { sha, parent, summary, message });
    }
    Ok(commits)
}

/// The `name-status` diff between two commits, translated into the
/// depot-neutral [`DiffEntry`] shape `depotsync_lib::submit` consumes.
/// `options` controls whether renames/copies are detected at all
/// (`git-p4.detectRename`/`git-p4.detectCopy`); with both off, a rename
/// surfaces as a plain delete+add pair instead of a single `R` entry.
pub fn diff_entries(command: &CommandHelper, from: &str, to: &str, options: &SubmitOptions) -> Result<Vec<DiffEntry>, CommandError> {
    let mut args = vec!["diff", "--name-status"];
    if options.detect_rename {
        args.push("-M");
    }
    if options.detect_copy {
        args.push("-C");
    }
    args.push(from);
    args.push(to);
    let output = run_git(command, &args)?;

    let mut entries = Vec::new();
    for line in output.lines().filter(|l| !l.is_empty()) {
        let mut columns = line.split('\t');
        let status_field = columns.next().unwrap_or_default();
        let status_letter = status_field.chars().next().ok_or_else(|| user_error("empty diff status"))?;
        let status = DiffStatus::parse(status_letter).map_err(|err| match err {
            SubmitError::UnsupportedStatus(letter) => {
                user_error(format!("diff status '{letter}' has no depot equivalent"))
            }
            other => CommandError::from(other),
        })?;

        match status {
            DiffStatus::Renamed | DiffStatus::Copied => {
                let source = columns.next().unwrap_or_default().to_string();
                let dest = columns.next().unwrap_or_default().to_string();
                entries.push(DiffEntry {
                    status,
                    path: dest,
                    source_path: Some(source),
                });
            }
            _ => {
                let path = columns.next().unwrap_or_default().to_string();
                entries.push(DiffEntry {
                    status,
                    path,
                    source_path: None,
                });
            }
        }
    }
    Ok(entries)
}

/// The raw bytes of `path` as it exists in `sha`'s tree, for writing into
/// the depot client workspace during submit (§4.5's APPLY step).
pub fn blob_content(command: &CommandHelper, sha: &str, path: &str) -> Result<Vec<u8>, CommandError> {
    run_git_raw(command, &["show", &format!("{sha}:{path}")])
}

/// Whether `path` carries the executable bit in `sha`'s tree, read from
/// `ls-tree`'s mode column (`100755` vs `100644`/`120000`).
pub fn blob_is_executable(command: &CommandHelper, sha: &str, path: &str) -> Result<bool, CommandError> {
    let output = run_git(command, &["ls-tree", sha, "--", path])?;
    Ok(output.split_whitespace().next() == Some("100755"))
}

/// Write `content` to `path` under the depot client's workspace root
/// (the command's current directory), creating parent directories as
/// needed, so a subsequent `p4 submit` picks up the new bytes.
pub fn write_workspace_file(command: &CommandHelper, path: &str, content: &[u8]) -> Result<(), CommandError> {
    let full = command.cwd().join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&full, content)?;
    Ok(())
}
