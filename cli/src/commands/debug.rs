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

use serde::Serialize;
use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::cli_util::GlobalArgs;
use crate::command_error::CommandError;
use crate::command_error::user_error;
use crate::ui::Ui;

/// Print the resolved depot connection parameters and import options as
/// JSON, for troubleshooting `git-p4.*` configuration.
#[derive(clap::Args, Clone, Debug)]
pub struct DebugArgs {
    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Serialize)]
struct ResolvedConfig {
    user: Option<String>,
    port: Option<String>,
    host: Option<String>,
    client: Option<String>,
    detect_branches: bool,
    detect_labels: bool,
    fuzzy_tags: bool,
    keep_repo_path: bool,
    import_into_remotes: bool,
    branch_list: Vec<String>,
    use_client_spec: bool,
    sync_from_origin: bool,
    detect_rename: bool,
    detect_copy: bool,
    allow_submit: Option<String>,
}

#[instrument(skip_all)]
pub fn cmd_debug(ui: &mut Ui, command: &CommandHelper, args: &DebugArgs) -> Result<(), CommandError> {
    let _ = &args.global;
    let depot_config = command.depot_config();
    let options = command.import_options();
    let submit_options = command.submit_options();
    let resolved = ResolvedConfig {
        user: depot_config.user,
        port: depot_config.port,
        host: depot_config.host,
        client: depot_config.client,
        detect_branches: options.detect_branches,
        detect_labels: options.detect_labels,
        fuzzy_tags: options.fuzzy_tags,
        keep_repo_path: options.keep_repo_path,
        import_into_remotes: options.import_into_remotes,
        branch_list: options.branch_list,
        use_client_spec: options.use_client_spec,
        sync_from_origin: options.sync_from_origin,
        detect_rename: submit_options.detect_rename,
        detect_copy: submit_options.detect_copy,
        allow_submit: submit_options.allow_submit,
    };
    let json = serde_json::to_string_pretty(&resolved).map_err(|err| user_error(err.to_string()))?;
    writeln!(ui.stdout(), "{json}")?;
    Ok(())
}
