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

use std::collections::BTreeMap;
use std::collections::HashMap;

use depotsync_lib::fast_import::TagSpec;
use depotsync_lib::import::ImportPipeline;
use depotsync_lib::import::ImportState;
use depotsync_lib::provenance::ProvenanceStore;
use tracing::instrument;

use crate::cli_util::CommandHelper;
use crate::cli_util::GlobalArgs;
use crate::command_error::user_error;
use crate::command_error::CommandError;
use crate::engine;
use crate::engine::FilterConfig;
use crate::ui::Ui;

/// Fetch and import changelists submitted since the last `clone`/`sync`,
/// across every branch already known to this repository.
#[derive(clap::Args, Clone, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Shell command run once per changelist, one depot path per line in,
    /// one renamed path (or a blank line to drop it) per line out.
    #[arg(long)]
    pub tree_filter: Option<String>,

    /// Shell command that rewrites each changelist's commit message,
    /// given the original message on stdin.
    #[arg(long)]
    pub msg_filter: Option<String>,

    /// Shell command run once per file, transforming its content on
    /// stdin/stdout before it is committed.
    #[arg(long)]
    pub content_filter: Option<String>,
}

#[instrument(skip_all)]
pub fn cmd_sync(ui: &mut Ui, command: &CommandHelper, args: &SyncArgs) -> Result<(), CommandError> {
    let options = command.import_options();
    let depot = command.depot_client();
    let filters = FilterConfig {
        tree_filter: args.tree_filter.clone(),
        msg_filter: args.msg_filter.clone(),
        content_filter: args.content_filter.clone(),
    };
    let scratch = tempfile::tempdir()?;
    let driver = command.git_driver();
    let provenance = ProvenanceStore::new(driver);

    if options.sync_from_origin {
        ui.status("Fetching origin");
        driver.fetch_origin()?;
    }

    let refs_prefix = options.refs_prefix();
    let default_branch = format!("{refs_prefix}master");
    let branch_roots = engine::branch_roots(&options, refs_prefix);

    let (last_change, depot_paths) = provenance
        .calculate_last_imported_changelist(refs_prefix)?
        .ok_or_else(|| user_error("no previously imported branch found; run `clone` first"))?;

    let mut state = ImportState::new();
    let mut branch_revisions: HashMap<String, BTreeMap<String, u32>> = HashMap::new();
    let mut known_branch_refs: Vec<String> = branch_roots.iter().map(|(r, _)| r.clone()).collect();
    known_branch_refs.push(default_branch.clone());
    for branch_ref in &known_branch_refs {
        if let Some(tip) = driver.rev_parse(branch_ref)? {
            state.seed_branch_tip(branch_ref, tip);
        }
    }
    if state.branch_tip(&default_branch).is_none() {
        return Err(user_error(format!("{default_branch} does not exist; run `clone` first")));
    }

    ui.status(&format!("Fetching changelists after {last_change}"));
    let changelists = engine::fetch_changelists(&depot, &depot_paths, last_change + 1)?;
    ui.status(&format!("Found {} new changelists", changelists.len()));

    let labels_by_change = if options.detect_labels {
        engine::fetch_labels(&depot, &depot_paths)?
    } else {
        HashMap::new()
    };

    let client_spec = if options.use_client_spec {
        engine::fetch_client_spec(&depot, command.depot_config().client.as_deref())?
    } else {
        depotsync_lib::client_spec::ClientSpec::default()
    };

    let pipeline = ImportPipeline::new(options.clone());
    ui.status("Loading user map cache");
    let user_map = engine::load_user_map(&depot)?;

    let mut commits = Vec::new();
    let mut tags: Vec<TagSpec> = Vec::new();
    for changelist in &changelists {
        ui.progress(&format!("Importing changelist {}", changelist.number));
        let touched = engine::build_commits_for_changelist(
            &depot,
            &pipeline,
            &mut state,
            changelist,
            &depot_paths,
            &branch_roots,
            &default_branch,
            &options,
            &user_map,
            &client_spec,
            &filters,
            scratch.path(),
            &provenance,
        )?;
        for branch_commit in touched {
            let branch_ref = branch_commit.spec.branch_ref.clone();
            let mark = branch_commit.spec.mark;
            let local_branch = branch_ref.trim_start_matches(refs_prefix).to_string();

            let revisions = branch_revisions.entry(branch_ref.clone()).or_default();
            for (path, rev) in &branch_commit.written {
                revisions.insert(path.clone(), *rev);
            }

            tags.extend(engine::tags_for_changelist(
                &labels_by_change,
                changelist.number,
                &local_branch,
                revisions,
                mark,
                &options,
                &user_map,
            ));
            commits.push(branch_commit.spec);
        }
    }

    if commits.is_empty() {
        ui.status("Already up to date");
        return Ok(());
    }

    engine::run_fast_import(command, &commits, &tags)?;
    ui.status(&format!("Imported {} changelists across {} branches", changelists.len(), branch_revisions.len()));
    Ok(())
}
