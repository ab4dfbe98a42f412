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

use std::io::Write as _;

use depotsync_lib::provenance::ProvenanceStore;
use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::cli_util::GlobalArgs;
use crate::command_error::CommandError;
use crate::ui::Ui;

/// List the imported branches and their last-known depot changelist.
#[derive(clap::Args, Clone, Debug)]
pub struct BranchesArgs {
    #[command(flatten)]
    pub global: GlobalArgs,
}

#[instrument(skip_all)]
pub fn cmd_branches(ui: &mut Ui, command: &CommandHelper, args: &BranchesArgs) -> Result<(), CommandError> {
    let _ = &args.global;
    let options = command.import_options();
    let driver = command.git_driver();
    let refs = driver.symbolic_ref_branches(options.refs_prefix())?;

    let provenance = ProvenanceStore::new(driver);
    for branch_ref in refs {
        let tip = driver.rev_parse(&branch_ref)?;
        let change = match &tip {
            Some(tip) => provenance.nearest_settings(tip)?.change,
            None => None,
        };
        writeln!(
            ui.stdout(),
            "{branch_ref}\t{}",
            change.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string())
        )?;
    }
    Ok(())
}
