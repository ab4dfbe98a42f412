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

//! The depot client adapter: builds depot CLI invocations, decodes the
//! tagged record stream, and escapes path metacharacters on the way out.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use percent_encoding::AsciiSet;
use percent_encoding::utf8_percent_encode;
use thiserror::Error;

use crate::config::DepotConfig;
use crate::record::Record;

/// Host platform, threaded explicitly rather than read via `cfg!(windows)`
/// so the `$`-escaping carve-out (§4.1) is exercisable in tests on any
/// host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    Unix,
    Windows,
}

#[derive(Error, Debug)]
pub enum DepotError {
    #[error("could not spawn depot client '{path}'")]
    Spawn {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to write to depot client stdin")]
    Write(#[source] std::io::Error),
    #[error("failed to wait for depot client process")]
    Wait(#[source] std::io::Error),
    #[error("depot returned an error: {0}")]
    Server(String),
    #[error("depot client exited with status {0}")]
    ExitCode(i32),
}

/// Builds depot CLI command lines and spawns the depot client.
///
/// Every invocation is prefixed with the configured user, password, port,
/// host and client, each appended only if present, then the current
/// working directory, per §4.1.
pub struct DepotClient {
    executable: PathBuf,
    config: DepotConfig,
    cwd: PathBuf,
    platform: Platform,
}

impl DepotClient {
    pub fn new(executable: impl Into<PathBuf>, config: DepotConfig, cwd: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            config,
            cwd: cwd.into(),
            platform: Platform::default(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    fn build_command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.executable);
        if let Some(user) = &self.config.user {
            cmd.arg("-u").arg(user);
        }
        if let Some(password) = &self.config.password {
            cmd.arg("-P").arg(password);
        }
        if let Some(port) = &self.config.port {
            cmd.arg("-p").arg(port);
        }
        if let Some(host) = &self.config.host {
            cmd.arg("-H").arg(host);
        }
        if let Some(client) = &self.config.client {
            cmd.arg("-c").arg(client);
        }
        cmd.arg("-d").arg(&self.cwd);
        cmd.args(args);
        cmd
    }

    fn spawn(&self, mut cmd: Command) -> Result<std::process::Child, DepotError> {
        tracing::debug!(cmd = ?cmd, "spawning depot client");
        cmd.spawn().map_err(|error| DepotError::Spawn {
            path: self.executable.clone(),
            error,
        })
    }

    /// `list(cmd)`: spawn the depot CLI in tagged mode, decode every
    /// record, and fail fast on the first `code=error` record.
    pub fn list(&self, args: &[&str]) -> Result<Vec<Record>, DepotError> {
        let mut records = Vec::new();
        for record in self.stream(args, None)? {
            let record = record?;
            if let Record::Error(message) = &record {
                return Err(DepotError::Server(message.clone()));
            }
            records.push(record);
        }
        Ok(records)
    }

    /// `stream(cmd, stdin) -> record iterator`: tolerant of very large
    /// outputs since records are yielded one at a time. The caller
    /// decides whether to treat a `code=error` record as fatal.
    pub fn stream(
        &self,
        args: &[&str],
        stdin: Option<&[u8]>,
    ) -> Result<RecordIter, DepotError> {
        let mut full_args = vec!["-G"];
        full_args.extend_from_slice(args);
        let mut cmd = self.build_command(&full_args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = self.spawn(cmd)?;
        if let Some(data) = stdin {
            child
                .stdin
                .take()
                .expect("stdin piped")
                .write_all(data)
                .map_err(DepotError::Write)?;
        }

        let stdout = child.stdout.take().expect("stdout piped");
        Ok(RecordIter {
            reader: crate::marshal::RecordReader::new(stdout),
            child: Some(child),
        })
    }

    /// `run(cmd)`: untagged mode, discards output, returns success/failure.
    pub fn run(&self, args: &[&str]) -> Result<(), DepotError> {
        let mut cmd = self.build_command(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());
        let status = self.spawn(cmd)?.wait().map_err(DepotError::Wait)?;
        status
            .code()
            .filter(|c| *c == 0)
            .map(|_| ())
            .ok_or_else(|| DepotError::ExitCode(status.code().unwrap_or(-1)))
    }

    /// `read(cmd)`: untagged mode, captures stdout as text. Used for
    /// submit templates.
    pub fn read(&self, args: &[&str]) -> Result<String, DepotError> {
        let mut cmd = self.build_command(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        let child = self.spawn(cmd)?;
        let output = child.wait_with_output().map_err(DepotError::Wait)?;
        if !output.status.success() {
            return Err(DepotError::ExitCode(output.status.code().unwrap_or(-1)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// `write(cmd, data)`: untagged mode, pipes `data` to stdin. Used for
    /// piping edited submit templates back to the depot.
    pub fn write(&self, args: &[&str], data: &[u8]) -> Result<String, DepotError> {
        let mut cmd = self.build_command(args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        let mut child = self.spawn(cmd)?;
        child
            .stdin
            .take()
            .expect("stdin piped")
            .write_all(data)
            .map_err(DepotError::Write)?;
        let output = child.wait_with_output().map_err(DepotError::Wait)?;
        if !output.status.success() {
            return Err(DepotError::ExitCode(output.status.code().unwrap_or(-1)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}

/// Iterator over the records yielded by [`DepotClient::stream`]. Dropping
/// it before exhaustion still waits for the child so zombie processes
/// aren't left behind.
pub struct RecordIter {
    reader: crate::marshal::RecordReader<std::process::ChildStdout>,
    child: Option<std::process::Child>,
}

impl Iterator for RecordIter {
    type Item = Result<Record, DepotError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_record() {
            Some(record) => Some(Ok(record)),
            None => {
                if let Some(mut child) = self.child.take() {
                    match child.wait() {
                        Ok(status) if !status.success() => {
                            return Some(Ok(Record::ExitCode(status.code().unwrap_or(-1))));
                        }
                        Ok(_) => {}
                        Err(err) => return Some(Err(DepotError::Wait(err))),
                    }
                }
                None
            }
        }
    }
}

/// Escape `@`, `#`, `*`, `%` for outbound depot paths (percent-encoding).
/// `add` treats wildcards literally so only `$` is escaped there; see
/// [`escape_for_add`].
pub fn escape_path(path: &str, platform: Platform) -> String {
    escape_dollar(&escape_metacharacters_only(path), platform)
}

/// Escape used specifically for `add` invocations: only `$`, since the
/// depot treats `@#*%` literally for `add`.
pub fn escape_for_add(path: &str, platform: Platform) -> String {
    escape_dollar(path, platform)
}

/// `%`, `*`, `#`, `@` and nothing else — the depot's own four wildcard
/// metacharacters, not the general URL-reserved set.
const DEPOT_METACHARACTERS: &AsciiSet = &AsciiSet::EMPTY.add(b'%').add(b'*').add(b'#').add(b'@');

fn escape_metacharacters_only(path: &str) -> String {
    utf8_percent_encode(path, DEPOT_METACHARACTERS).to_string()
}

fn escape_dollar(path: &str, platform: Platform) -> String {
    if platform == Platform::Windows {
        // The depot client already escapes `$` on Windows.
        return path.to_string();
    }
    path.replace('$', "\\$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_metacharacters_and_dollar_on_unix() {
        assert_eq!(
            escape_path("//depot/file@1#2*3%4$5", Platform::Unix),
            "//depot/file%401%232%2A3%254\\$5"
        );
    }

    #[test]
    fn suppresses_dollar_escape_on_windows() {
        assert_eq!(
            escape_path("//depot/file$name", Platform::Windows),
            "//depot/file$name"
        );
    }

    #[test]
    fn add_escape_only_touches_dollar() {
        assert_eq!(
            escape_for_add("//depot/file@*#%$", Platform::Unix),
            "//depot/file@*#%\\$"
        );
    }
}
