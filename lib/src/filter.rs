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

//! The filter harness (§4.6): user-supplied shell commands that rename or
//! drop paths, rewrite commit messages, or transform file content on the
//! way into the import.

use std::io::Write as _;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("could not spawn filter command '{command}'")]
    Spawn {
        command: String,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to write to filter command's stdin")]
    Write(#[source] std::io::Error),
    #[error("failed to wait for filter command")]
    Wait(#[source] std::io::Error),
    #[error("tree filter returned {got} lines for {expected} input paths")]
    LineCountMismatch { expected: usize, got: usize },
}

fn spawn_shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd
}

fn run_piped(command: &str, input: &[u8]) -> Result<Vec<u8>, FilterError> {
    let mut child = spawn_shell(command).spawn().map_err(|error| FilterError::Spawn {
        command: command.to_string(),
        error,
    })?;
    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(input)
        .map_err(FilterError::Write)?;
    let output = child.wait_with_output().map_err(FilterError::Wait)?;
    Ok(output.stdout)
}

/// Run the tree filter: one path per line in, one path (or an empty line
/// to drop that path) per line out, in the same order (§4.6). A line
/// count mismatch is fatal since there is no way to reassociate paths.
pub fn run_tree_filter(command: &str, paths: &[String]) -> Result<Vec<Option<String>>, FilterError> {
    let input = paths.join("\n");
    let output = run_piped(command, input.as_bytes())?;
    let text = String::from_utf8_lossy(&output);
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() != paths.len() {
        return Err(FilterError::LineCountMismatch {
            expected: paths.len(),
            got: lines.len(),
        });
    }
    Ok(lines
        .into_iter()
        .map(|line| if line.is_empty() { None } else { Some(line.to_string()) })
        .collect())
}

/// Run the message filter: the commit message in on stdin, the rewritten
/// message out on stdout (§4.6).
pub fn run_message_filter(command: &str, message: &str) -> Result<String, FilterError> {
    let output = run_piped(command, message.as_bytes())?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Run the content filter for a single file's bytes, using `scratch_dir`
/// as the filter command's working directory. A failing content filter
/// is logged and the file's original content is kept unchanged — it does
/// not abort the rest of the batch (§4.6).
pub fn run_content_filter(command: &str, scratch_dir: &Path, path: &str, content: &[u8]) -> Vec<u8> {
    let mut cmd = spawn_shell(command);
    cmd.current_dir(scratch_dir);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(error) => {
            tracing::error!(path, command, %error, "content filter failed to start, keeping original content");
            return content.to_vec();
        }
    };

    let mut child = child;
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(error) = stdin.write_all(content) {
            tracing::error!(path, command, %error, "content filter stdin write failed, keeping original content");
            return content.to_vec();
        }
    }

    match child.wait_with_output() {
        Ok(output) if output.status.success() => output.stdout,
        Ok(output) => {
            tracing::error!(
                path,
                command,
                status = ?output.status,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "content filter exited with failure, keeping original content"
            );
            content.to_vec()
        }
        Err(error) => {
            tracing::error!(path, command, %error, "content filter wait failed, keeping original content");
            content.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_filter_passes_through_and_drops_empty_lines() {
        let paths = vec!["a.txt".to_string(), "b.txt".to_string()];
        let result = run_tree_filter("sed '2s/.*//'", &paths).unwrap();
        assert_eq!(result, vec![Some("a.txt".to_string()), None]);
    }

    #[test]
    fn tree_filter_rejects_mismatched_line_count() {
        let paths = vec!["a.txt".to_string(), "b.txt".to_string()];
        let err = run_tree_filter("head -n1", &paths).unwrap_err();
        assert!(matches!(err, FilterError::LineCountMismatch { expected: 2, got: 1 }));
    }

    #[test]
    fn message_filter_rewrites_stdin_to_stdout() {
        let rewritten = run_message_filter("tr a-z A-Z", "hello").unwrap();
        assert_eq!(rewritten, "HELLO");
    }

    #[test]
    fn content_filter_falls_back_to_original_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let content = run_content_filter("exit 1", dir.path(), "a.txt", b"original");
        assert_eq!(content, b"original");
    }

    #[test]
    fn content_filter_returns_transformed_output_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let content = run_content_filter("tr a-z A-Z", dir.path(), "a.txt", b"hello");
        assert_eq!(content, b"HELLO");
    }
}
