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

//! Entry point: parses arguments, wires up logging, and dispatches to the
//! subcommand the way the teacher's top-level binary does, trimmed to
//! this crate's much smaller command set.

mod cli_util;
mod command_error;
mod commands;
mod engine;
mod submit_util;
mod ui;

use std::process::ExitCode;

use clap::Parser;

use cli_util::CommandHelper;
use command_error::CommandError;
use commands::Command;
use ui::Ui;

#[derive(Parser, Debug)]
#[command(name = "depotsync", about = "Bridge between a Perforce depot and a Git repository", version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("DEPOTSYNC_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();
    let mut ui = Ui::new();

    let result = (|| -> Result<(), CommandError> {
        let command_helper = CommandHelper::new(args.command.global_args())?;
        commands::run_command(&mut ui, &command_helper, &args.command)
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui.status(&format!("error: {err}"));
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
