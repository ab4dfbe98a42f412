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

//! Output plumbing for commands: plain stdout/stderr writers plus the
//! progress-line rate limiting that file fetching needs (§4.3).

use std::io;
use std::io::IsTerminal as _;
use std::io::Stderr;
use std::io::Stdout;
use std::io::Write as _;

/// The command layer's sole channel to the terminal. Kept intentionally
/// small: unlike the teacher's `Ui`, this crate has no pager or
/// templated-formatter concerns, just status and progress lines.
pub struct Ui {
    stdout: Stdout,
    stderr: Stderr,
    color: bool,
}

impl Ui {
    pub fn new() -> Self {
        let color = io::stdout().is_terminal();
        Self {
            stdout: io::stdout(),
            stderr: io::stderr(),
            color,
        }
    }

    pub fn stdout(&mut self) -> &mut Stdout {
        &mut self.stdout
    }

    pub fn stderr(&mut self) -> &mut Stderr {
        &mut self.stderr
    }

    pub fn use_color(&self) -> bool {
        self.color
    }

    /// A one-line status message, e.g. `"Importing changelist 33255"`.
    pub fn status(&mut self, message: &str) {
        let _ = writeln!(self.stderr, "{message}");
    }

    /// A progress line meant to be rate-limited by the caller (callers
    /// hold a [`depotsync_lib::file_reader::ProgressThrottle`] and only
    /// call this when it fires).
    pub fn progress(&mut self, message: &str) {
        let _ = writeln!(self.stderr, "{message}");
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}
