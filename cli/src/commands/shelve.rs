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

use depotsync_lib::depot_client::DepotClient;
use depotsync_lib::depot_type::guess_depot_type;
use depotsync_lib::submit::DepotAction;
use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::cli_util::GlobalArgs;
use crate::command_error::user_error;
use crate::command_error::CommandError;
use crate::submit_util;
use crate::submit_util::PendingCommit;
use crate::ui::Ui;

/// Shelve the tip commit's changes as a pending depot changelist, rather
/// than submitting them (§4.5). Unlike `submit`, the opened files are
/// reverted locally afterwards — the depot side is left pending, not
/// committed.
#[derive(clap::Args, Clone, Debug)]
pub struct ShelveArgs {
    #[command(flatten)]
    pub global: GlobalArgs,
}

#[instrument(skip_all)]
pub fn cmd_shelve(ui: &mut Ui, command: &CommandHelper, args: &ShelveArgs) -> Result<(), CommandError> {
    let _ = &args.global;
    let options = command.import_options();
    let submit_options = command.submit_options();
    let driver = command.git_driver();

    if let Some(branch) = driver.current_branch()? {
        if !submit_options.allows_branch(&branch) {
            return Err(user_error(format!(
                "shelve from branch '{branch}' is not allowed by git-p4.allowSubmit"
            )));
        }
    }

    let branch_ref = format!("{}master", options.refs_prefix());
    let tip = driver
        .rev_parse(&branch_ref)?
        .ok_or_else(|| user_error(format!("{branch_ref} does not exist; run `clone` first")))?;

    let pending = submit_util::commits_to_submit(command, &tip)?;
    let Some(commit) = pending.first() else {
        ui.status("Nothing to shelve");
        return Ok(());
    };

    let depot = command.depot_client();
    let entries = submit_util::diff_entries(command, &commit.parent, &commit.sha, &submit_options)?;
    let actions = depotsync_lib::submit::plan_depot_actions(&entries)?;

    let mut opened = Vec::new();
    let apply_result = apply_actions(command, &depot, commit, &actions, &mut opened);

    let shelve_result = apply_result.and_then(|()| {
        depot
            .read(&["shelve", "-d", &commit.summary])
            .map_err(CommandError::from)
    });
    for path in &opened {
        let _ = depot.run(&["revert", path]);
    }
    let output = shelve_result?;
    ui.status(output.lines().next().unwrap_or("Shelved"));
    Ok(())
}

/// Open every depot action and materialize the commit's content/mode for
/// it, matching `submit`'s [`apply_actions`](super::submit) — duplicated
/// rather than shared since `shelve` always reverts afterwards and
/// `submit` only reverts on failure.
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
