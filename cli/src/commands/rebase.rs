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

use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::cli_util::GlobalArgs;
use crate::command_error::user_error;
use crate::command_error::CommandError;
use crate::ui::Ui;

/// Rebase the current branch's unsubmitted commits onto the latest
/// imported depot state (`refs/remotes/p4/master`), the way `git rebase`
/// would against any other upstream.
#[derive(clap::Args, Clone, Debug)]
pub struct RebaseArgs {
    #[command(flatten)]
    pub global: GlobalArgs,
}

#[instrument(skip_all)]
pub fn cmd_rebase(ui: &mut Ui, command: &CommandHelper, args: &RebaseArgs) -> Result<(), CommandError> {
    let _ = &args.global;
    let options = command.import_options();
    let branch_ref = format!("{}master", options.refs_prefix());

    ui.status(&format!("Rebasing onto {branch_ref}"));
    let status = Command::new(command.git_executable())
        .arg("--git-dir")
        .arg(command.git_dir())
        .arg("--work-tree")
        .arg(command.cwd())
        .arg("rebase")
        .arg(&branch_ref)
        .status()?;

    if !status.success() {
        return Err(user_error(format!("git rebase onto {branch_ref} failed")));
    }
    Ok(())
}
