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

use std::process::Command;

use depotsync_lib::depot_client::DepotClient;
use depotsync_lib::depot_type::guess_depot_type;
use depotsync_lib::provenance::ProvenanceStore;
use depotsync_lib::provenance::Settings;
use depotsync_lib::submit::DepotAction;
use depotsync_lib::submit::SubmitMachine;
use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::cli_util::GlobalArgs;
use crate::command_error::user_error;
use crate::command_error::CommandError;
use crate::submit_util;
use crate::submit_util::PendingCommit;
use crate::ui::Ui;

/// Submit the current branch's commits not yet reflected in the depot as
/// new changelists, one commit at a time (§4.5). Also reachable as
/// `commit`.
#[derive(clap::Args, Clone, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub global: GlobalArgs,
}

#[instrument(skip_all)]
pub fn cmd_submit(ui: &mut Ui, command: &CommandHelper, args: &SubmitArgs) -> Result<(), CommandError> {
    let _ = &args.global;
    let options = command.import_options();
    let submit_options = command.submit_options();
    let depot = command.depot_client();
    let driver = command.git_driver();
    let provenance = ProvenanceStore::new(driver);

    if let Some(branch) = driver.current_branch()? {
        if !submit_options.allows_branch(&branch) {
            return Err(user_error(format!(
                "submit from branch '{branch}' is not allowed by git-p4.allowSubmit"
            )));
        }
    }

    let branch_ref = format!("{}master", options.refs_prefix());
    let tip = driver
        .rev_parse(&branch_ref)?
        .ok_or_else(|| user_error(format!("{branch_ref} does not exist; run `clone` first")))?;

    let pending = submit_util::commits_to_submit(command, &tip)?;
    if pending.is_empty() {
        ui.status("Nothing to submit");
        return Ok(());
    }
    let depot_paths = provenance.nearest_settings(&tip)?.depot_paths;

    for commit in &pending {
        ui.status(&format!("Submitting {} {}", &commit.sha[..12.min(commit.sha.len())], commit.summary));
        let entries = submit_util::diff_entries(command, &commit.parent, &commit.sha, &submit_options)?;
        let actions = depotsync_lib::submit::plan_depot_actions(&entries)?;

        let mut machine = SubmitMachine::new();
        let mut opened = Vec::new();
        let outcome = run_steps(command, &depot, commit, &actions, &mut machine, &mut opened);

        match outcome {
            Ok(change) => {
                let note = Settings {
                    depot_paths: depot_paths.clone(),
                    change: Some(change),
                    options: vec![],
                }
                .render();
                attach_note(command, &commit.sha, &note)?;
                ui.status(&format!("Submitted as change {change}"));
            }
            Err(err) => {
                for path in &opened {
                    let _ = depot.run(&["revert", path]);
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Drive one commit through every [`SubmitState`](depotsync_lib::submit::SubmitState)
/// transition exactly once, regardless of how many files the commit
/// touches — `Apply`/`EditOrAdd`/`ExecBits` are folded into a single
/// [`apply_actions`] call since `p4 add -t`/`p4 edit -t` already
/// reconcile content and mode in one invocation per file.
fn run_steps(
    command: &CommandHelper,
    depot: &DepotClient,
    commit: &PendingCommit,
    actions: &[DepotAction],
    machine: &mut SubmitMachine,
    opened: &mut Vec<String>,
) -> Result<u64, CommandError> {
    // Diff already happened by the time we get here.
    machine.step(Ok(())).map_err(CommandError::from)?;

    let apply_result = apply_actions(command, depot, commit, actions, opened);
    machine
        .step(apply_result.as_ref().map(|_| ()).map_err(|e| e.to_string()))
        .map_err(CommandError::from)?;
    apply_result?;

    // EditOrAdd, ExecBits: folded into apply_actions above.
    machine.step(Ok(())).map_err(CommandError::from)?;
    machine.step(Ok(())).map_err(CommandError::from)?;
    // Editor: nothing to prompt for in a non-interactive submit.
    machine.step(Ok(())).map_err(CommandError::from)?;

    let change = submit_changelist(depot, &commit.message).map_err(|e| e.to_string());
    machine
        .step(change.as_ref().map(|_| ()).map_err(|e| e.clone()))
        .map_err(CommandError::from)?;
    let change = change.map_err(user_error)?;

    machine.step(Ok(())).map_err(CommandError::from)?;
    Ok(change)
}

/// Open every depot action and materialize the commit's content/mode for
/// it, in the order the depot needs: a fresh `add` needs the file
/// written before it can be opened; an `edit` needs to be opened before
/// its (now writable) content can be overwritten.
fn apply_actions(
    command: &CommandHelper,
    depot: &DepotClient,
    commit: &PendingCommit,
    actions: &[DepotAction],
    opened: &mut Vec<String>,
) -> Result<(), CommandError> {
    for action in actions {
        match action {
            DepotAction::Add(path) => {
                let content = submit_util::blob_content(command, &commit.sha, path)?;
                let executable = submit_util::blob_is_executable(command, &commit.sha, path)?;
                submit_util::write_workspace_file(command, path, &content)?;
                let ptype = guess_depot_type(&content, executable);
                depot.run(&["add", "-t", &ptype, path])?;
                opened.push(path.clone());
            }
            DepotAction::Edit(path) => {
                let content = submit_util::blob_content(command, &commit.sha, path)?;
                let executable = submit_util::blob_is_executable(command, &commit.sha, path)?;
                let ptype = guess_depot_type(&content, executable);
                depot.run(&["edit", "-t", &ptype, path])?;
                submit_util::write_workspace_file(command, path, &content)?;
                opened.push(path.clone());
            }
            DepotAction::Delete(path) => {
                depot.run(&["delete", path])?;
                opened.push(path.clone());
            }
            DepotAction::Integrate { from, to, delete_source } => {
                depot.run(&["integrate", from, to])?;
                let content = submit_util::blob_content(command, &commit.sha, to)?;
                let executable = submit_util::blob_is_executable(command, &commit.sha, to)?;
                let ptype = guess_depot_type(&content, executable);
                depot.run(&["edit", "-t", &ptype, to])?;
                submit_util::write_workspace_file(command, to, &content)?;
                opened.push(to.clone());
                if *delete_source {
                    depot.run(&["delete", from])?;
                    opened.push(from.clone());
                }
            }
        }
    }
    Ok(())
}

fn submit_changelist(depot: &DepotClient, message: &str) -> Result<u64, CommandError> {
    let output = depot.read(&["submit", "-d", message])?;
    output
        .lines()
        .rev()
        .find_map(|line| line.split_whitespace().find_map(|word| word.parse::<u64>().ok()))
        .ok_or_else(|| user_error("could not determine the submitted changelist number"))
}

fn attach_note(command: &CommandHelper, commit: &str, note: &str) -> Result<(), CommandError> {
    let status = Command::new(command.git_executable())
        .arg("--git-dir")
        .arg(command.git_dir())
        .arg("notes")
        .arg("--ref=refs/notes/git-p4")
        .arg("add")
        .arg("-f")
        .arg("-m")
        .arg(note)
        .arg(commit)
        .status()?;
    if !status.success() {
        return Err(user_error(format!("failed to attach provenance note to {commit}")));
    }
    Ok(())
}
