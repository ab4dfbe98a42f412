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

//! Wires top-level CLI flags into the concrete adapters every command
//! needs: the git driver, the depot client, and the options read through
//! them. Modeled on the teacher's `CommandHelper`, trimmed to this
//! crate's much smaller surface.

use std::path::PathBuf;

use depotsync_lib::config::DepotConfig;
use depotsync_lib::config::GitConfigSource;
use depotsync_lib::config::ImportOptions;
use depotsync_lib::config::SubmitOptions;
use depotsync_lib::depot_client::DepotClient;
use depotsync_lib::git_driver::GitCliDriver;
use depotsync_lib::git_driver::GitDriver;

use crate::command_error::user_error;
use crate::command_error::CommandError;

/// Flags shared by every subcommand.
#[derive(clap::Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Path to the `.git` directory; defaults to discovering it from the
    /// current directory the way `git` itself would.
    #[arg(long, global = true)]
    pub git_dir: Option<PathBuf>,

    /// Path to the `p4` executable.
    #[arg(long, global = true, default_value = "p4")]
    pub p4_executable: PathBuf,
}

/// Bundles the adapters a command needs, built once from [`GlobalArgs`].
pub struct CommandHelper {
    git_driver: GitCliDriver,
    p4_executable: PathBuf,
    cwd: PathBuf,
}

impl CommandHelper {
    pub fn new(args: &GlobalArgs) -> Result<Self, CommandError> {
        let cwd = std::env::current_dir()?;
        let git_dir = match &args.git_dir {
            Some(dir) => dir.clone(),
            None => discover_git_dir(&cwd)?,
        };
        Ok(Self {
            git_driver: GitCliDriver::new("git", git_dir),
            p4_executable: args.p4_executable.clone(),
            cwd,
        })
    }

    pub fn git_driver(&self) -> &dyn GitDriver {
        &self.git_driver
    }

    pub fn config_source(&self) -> GitConfigSource<'_> {
        GitConfigSource::new(&self.git_driver)
    }

    pub fn depot_config(&self) -> DepotConfig {
        DepotConfig::from_source(&self.config_source())
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions::from_source(&self.config_source())
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions::from_source(&self.config_source())
    }

    pub fn depot_client(&self) -> DepotClient {
        DepotClient::new(self.p4_executable.clone(), self.depot_config(), self.cwd.clone())
    }

    pub fn cwd(&self) -> &PathBuf {
        &self.cwd
    }

    pub fn git_dir(&self) -> &std::path::Path {
        self.git_driver.git_dir()
    }

    pub fn git_executable(&self) -> &std::path::Path {
        self.git_driver.executable()
    }
}

fn discover_git_dir(cwd: &std::path::Path) -> Result<PathBuf, CommandError> {
    let candidate = cwd.join(".git");
    if candidate.is_dir() {
        return Ok(candidate);
    }
    Err(user_error(
        "not a git repository (or any parent up to the current directory); pass --git-dir explicitly",
    ))
}
