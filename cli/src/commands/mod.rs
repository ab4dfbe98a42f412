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

mod branches;
mod clone;
mod debug;
mod rebase;
mod rollback;
mod shelve;
mod submit;
mod sync;

use clap::Subcommand;
use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::cli_util::GlobalArgs;
use crate::command_error::CommandError;
use crate::ui::Ui;

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Create a new local repository by importing a depot path's full
    /// history.
    Clone(clone::CloneArgs),
    /// Fetch and import changelists submitted since the last import.
    Sync(sync::SyncArgs),
    /// Rebase the current branch's unsubmitted commits onto the latest
    /// imported depot state.
    Rebase(rebase::RebaseArgs),
    /// Submit unsubmitted commits as new depot changelists.
    #[command(alias = "commit")]
    Submit(submit::SubmitArgs),
    /// Shelve unsubmitted commits as pending depot changelists.
    Shelve(shelve::ShelveArgs),
    /// Move the import ref back to an earlier imported changelist.
    Rollback(rollback::RollbackArgs),
    /// List the branches this repository knows about.
    Branches(branches::BranchesArgs),
    /// Print resolved configuration for troubleshooting.
    Debug(debug::DebugArgs),
}

impl Command {
    /// The flags common to every subcommand, for building [`CommandHelper`]
    /// before dispatch.
    pub fn global_args(&self) -> &GlobalArgs {
        match self {
            Self::Clone(args) => &args.global,
            Self::Sync(args) => &args.global,
            Self::Rebase(args) => &args.global,
            Self::Submit(args) => &args.global,
            Self::Shelve(args) => &args.global,
            Self::Rollback(args) => &args.global,
            Self::Branches(args) => &args.global,
            Self::Debug(args) => &args.global,
        }
    }
}

#[instrument(skip_all)]
pub fn run_command(ui: &mut Ui, command_helper: &CommandHelper, command: &Command) -> Result<(), CommandError> {
    match command {
        Command::Clone(args) => clone::cmd_clone(ui, command_helper, args),
        Command::Sync(args) => sync::cmd_sync(ui, command_helper, args),
        Command::Rebase(args) => rebase::cmd_rebase(ui, command_helper, args),
        Command::Submit(args) => submit::cmd_submit(ui, command_helper, args),
        Command::Shelve(args) => shelve::cmd_shelve(ui, command_helper, args),
        Command::Rollback(args) => rollback::cmd_rollback(ui, command_helper, args),
        Command::Branches(args) => branches::cmd_branches(ui, command_helper, args),
        Command::Debug(args) => debug::cmd_debug(ui, command_helper, args),
    }
}
