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

//! Emits a `git fast-import` stream (§4.4): one commit plus one notes
//! commit per changelist, with writes chunked at a 10 MiB boundary to
//! work around an old pipe-buffer limit on some platforms.

use std::io::Write;

use chrono::FixedOffset;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FastImportError {
    #[error("failed to write to the fast-import stream")]
    Write(#[from] std::io::Error),
}

/// The 10 MiB chunk boundary preserved from the original implementation's
/// writer, which split large `data` blocks to avoid a pipe-buffer bug on
/// older platforms.
const CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// A single committer/author identity line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name_email: String,
    pub time: i64,
    pub tz_offset: FixedOffset,
}

impl Identity {
    /// Builds an identity stamped in UTC, matching the original's
    /// behavior of reporting every depot timestamp without a local
    /// timezone conversion.
    pub fn new(name_email: impl Into<String>, time: i64) -> Self {
        Self {
            name_email: name_email.into(),
            time,
            tz_offset: FixedOffset::east_opt(0).expect("zero offset is always valid"),
        }
    }

    fn render(&self) -> String {
        let minutes = self.tz_offset.local_minus_utc() / 60;
        let sign = if minutes < 0 { '-' } else { '+' };
        let minutes = minutes.abs();
        format!(
            "{} {} {sign}{:02}{:02}",
            self.name_email,
            self.time,
            minutes / 60,
            minutes % 60
        )
    }
}

/// One file modification or deletion within a commit.
#[derive(Debug, Clone)]
pub enum FileChange {
    Modify {
        path: String,
        mode: &'static str,
        content: Vec<u8>,
    },
    Delete {
        path: String,
    },
}

/// A lightweight tag, emitted for a depot label that matched a branch's
/// committed file set (§4.7). Tags are appended after every commit in a
/// run since `tag`'s `from` only needs the referenced mark to have been
/// defined earlier in the same stream, not to be the very last thing
/// written.
pub struct TagSpec {
    pub name: String,
    pub from_commit: String,
    pub tagger: Identity,
    pub message: String,
}

/// Everything needed to emit one imported changelist as a `commit` plus
/// a trailing provenance `commit` on the notes ref.
pub struct CommitSpec {
    pub branch_ref: String,
    pub mark: u64,
    pub committer: Identity,
    pub message: String,
    pub from: Option<String>,
    pub merge: Option<String>,
    pub changes: Vec<FileChange>,
    pub notes_mark: u64,
    pub notes_from: Option<String>,
    pub note_body: String,
}

/// Streaming writer over any `Write` sink (normally a pipe to
/// `git fast-import`).
pub struct FastImportWriter<W: Write> {
    out: W,
}

impl<W: Write> FastImportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn checkpoint(&mut self) -> Result<(), FastImportError> {
        writeln!(self.out, "checkpoint")?;
        Ok(())
    }

    pub fn reset(&mut self, refname: &str, from_mark: u64) -> Result<(), FastImportError> {
        writeln!(self.out, "reset {refname}")?;
        writeln!(self.out, "from :{from_mark}")?;
        Ok(())
    }

    /// Emit a `commit` block followed immediately by the companion notes
    /// commit that attaches `note_body` to it (§4.2, §4.4).
    pub fn write_commit(&mut self, spec: &CommitSpec) -> Result<(), FastImportError> {
        writeln!(self.out, "commit {}", spec.branch_ref)?;
        writeln!(self.out, "mark :{}", spec.mark)?;
        writeln!(self.out, "committer {}", spec.committer.render())?;
        self.write_data_block(spec.message.as_bytes())?;
        if let Some(from) = &spec.from {
            writeln!(self.out, "from {from}")?;
        }
        if let Some(merge) = &spec.merge {
            writeln!(self.out, "merge {merge}")?;
        }
        for change in &spec.changes {
            self.write_file_change(change)?;
        }
        writeln!(self.out)?;

        writeln!(self.out, "commit refs/notes/git-p4")?;
        writeln!(self.out, "mark :{}", spec.notes_mark)?;
        writeln!(self.out, "committer {}", spec.committer.render())?;
        self.write_data_block(b"Note added by git-p4 import\n")?;
        if let Some(from) = &spec.notes_from {
            writeln!(self.out, "from {from}")?;
        }
        writeln!(self.out, "N inline :{}", spec.mark)?;
        self.write_note_content(&spec.note_body)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn write_file_change(&mut self, change: &FileChange) -> Result<(), FastImportError> {
        match change {
            FileChange::Modify { path, mode, content } => {
                writeln!(self.out, "M {mode} inline {path}")?;
                self.write_data_block(content)?;
            }
            FileChange::Delete { path } => {
                writeln!(self.out, "D {path}")?;
            }
        }
        Ok(())
    }

    /// Emit a `tag` record for a lightweight import of a depot label
    /// (§4.7), given the resolved commit it points at.
    pub fn write_tag(
        &mut self,
        name: &str,
        from_commit: &str,
        tagger: &Identity,
        message: &str,
    ) -> Result<(), FastImportError> {
        writeln!(self.out, "tag {name}")?;
        writeln!(self.out, "from {from_commit}")?;
        writeln!(self.out, "tagger {}", tagger.render())?;
        self.write_data_block(message.as_bytes())?;
        Ok(())
    }

    fn write_data_block(&mut self, content: &[u8]) -> Result<(), FastImportError> {
        writeln!(self.out, "data {}", content.len())?;
        self.write_chunked(content)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn write_note_content(&mut self, note: &str) -> Result<(), FastImportError> {
        let content = note.as_bytes();
        writeln!(self.out, "data {}", content.len())?;
        self.write_chunked(content)?;
        Ok(())
    }

    fn write_chunked(&mut self, content: &[u8]) -> Result<(), FastImportError> {
        for chunk in content.chunks(CHUNK_SIZE) {
            self.out.write_all(chunk)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render_commit(spec: &CommitSpec) -> String {
        let mut buf = Vec::new();
        let mut writer = FastImportWriter::new(&mut buf);
        writer.write_commit(spec).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn emits_commit_and_notes_commit_with_expected_shape() {
        let spec = CommitSpec {
            branch_ref: "refs/remotes/p4/master".to_string(),
            mark: 1,
            committer: Identity::new("Alice <alice@a.b>", 1_000),
            message: "Initial import\n".to_string(),
            from: None,
            merge: None,
            changes: vec![FileChange::Modify {
                path: "README".to_string(),
                mode: "644",
                content: b"hello\n".to_vec(),
            }],
            notes_mark: 2,
            notes_from: None,
            note_body: "[depot-paths = \"//depot/\": change = 1]".to_string(),
        };
        let rendered = render_commit(&spec);
        assert!(rendered.contains("commit refs/remotes/p4/master\n"));
        assert!(rendered.contains("mark :1\n"));
        assert!(rendered.contains("data 14\n"));
        assert!(rendered.contains("M 644 inline README\n"));
        assert!(rendered.contains("data 6\nhello\n"));
        assert!(rendered.contains("commit refs/notes/git-p4\n"));
        assert!(rendered.contains("mark :2\n"));
        assert!(rendered.contains("data 28\nNote added by git-p4 import\n"));
        assert!(rendered.contains("N inline :1\n"));
        assert!(rendered.contains("[depot-paths = \"//depot/\": change = 1]"));
    }

    #[test]
    fn emits_from_and_merge_lines_when_present() {
        let spec = CommitSpec {
            branch_ref: "refs/remotes/p4/dev".to_string(),
            mark: 3,
            committer: Identity::new("Bob <bob@a.b>", 2_000),
            message: "Merge\n".to_string(),
            from: Some(":1".to_string()),
            merge: Some(":2".to_string()),
            changes: vec![FileChange::Delete {
                path: "old.txt".to_string(),
            }],
            notes_mark: 4,
            notes_from: Some(":2".to_string()),
            note_body: "[depot-paths = \"//depot/\": change = 2]".to_string(),
        };
        let rendered = render_commit(&spec);
        assert!(rendered.contains("from :1\n"));
        assert!(rendered.contains("merge :2\n"));
        assert!(rendered.contains("D old.txt\n"));
    }

    #[test]
    fn write_tag_emits_lightweight_tag_record() {
        let mut buf = Vec::new();
        let mut writer = FastImportWriter::new(&mut buf);
        let tagger = Identity::new("Alice <alice@a.b>", 1_000);
        writer.write_tag("v1.0", ":5", &tagger, "tag message\n").unwrap();
        let rendered = String::from_utf8(buf).unwrap();
        assert!(rendered.starts_with("tag v1.0\n"));
        assert!(rendered.contains("from :5\n"));
        assert!(rendered.contains("tagger Alice <alice@a.b> 1000 +0000\n"));
    }

    #[test]
    fn checkpoint_and_reset_emit_expected_lines() {
        let mut buf = Vec::new();
        let mut writer = FastImportWriter::new(&mut buf);
        writer.checkpoint().unwrap();
        writer.reset("refs/remotes/p4/master", 7).unwrap();
        let rendered = String::from_utf8(buf).unwrap();
        assert_eq!(rendered, "checkpoint\nreset refs/remotes/p4/master\nfrom :7\n");
    }

    #[test]
    fn large_content_is_split_at_chunk_boundary() {
        let content = vec![b'x'; CHUNK_SIZE + 10];
        let mut buf = Vec::new();
        {
            let mut writer = FastImportWriter::new(&mut buf);
            writer.write_data_block(&content).unwrap();
        }
        let expected_header = format!("data {}\n", content.len());
        assert!(buf.starts_with(expected_header.as_bytes()));
        assert_eq!(buf.len(), expected_header.len() + content.len() + 1);
    }
}
