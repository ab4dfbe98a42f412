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

use depotsync_lib::provenance::ProvenanceStore;
use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::cli_util::GlobalArgs;
use crate::command_error::user_error;
use crate::command_error::CommandError;
use crate::ui::Ui;

/// Move the import ref back to the commit that imported `changelist`,
/// discarding anything imported after it.
#[derive(clap::Args, Clone, Debug)]
pub struct RollbackArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The depot changelist number to roll back to.
    pub changelist: u64,
}

#[instrument(skip_all)]
pub fn cmd_rollback(ui: &mut Ui, command: &CommandHelper, args: &RollbackArgs) -> Result<(), CommandError> {
    let options = command.import_options();
    let driver = command.git_driver();
    let provenance = ProvenanceStore::new(driver);

    let branch_ref = format!("{}master", options.refs_prefix());
    let tip = driver
        .rev_parse(&branch_ref)?
        .ok_or_else(|| user_error(format!("{branch_ref} does not exist; run `clone` first")))?;

    let target = provenance
        .find_commit_at_or_before(&tip, args.changelist)?
        .ok_or_else(|| user_error(format!("no imported commit at or before changelist {}", args.changelist)))?;

    driver.update_ref(&branch_ref, &target)?;
    ui.status(&format!("{branch_ref} now points at {target}"));
    Ok(())
}
