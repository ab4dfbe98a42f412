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

//! Streams file contents for a batch of `(path, revision)` pairs (§4.3):
//! aggregates the depot's header+chunk records, applies keyword-expansion
//! masking and client-spec filtering, and rate-limits progress reporting.

use std::sync::LazyLock;

use regex::bytes::Regex;
use thiserror::Error;

use crate::changelist::FileEntry;
use crate::client_spec::ClientSpec;
use crate::depot_type::KeywordMode;
use crate::depot_type::TypeBase;
use crate::depot_type::is_image_extension;

#[derive(Error, Debug)]
pub enum FileReaderError {
    #[error("unexpected end of record stream while reading content for '{0}'")]
    TruncatedStream(String),
}

/// Mask `$Id:...$`/`$Header:...$`, case-insensitive, leaving the marker
/// itself (`$Id$`) behind.
static ID_HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$(Id|Header):[^$\n]*\$").expect("valid regex")
});

/// The additional keywords masked for `+k`/`ktext`/`kxtext`.
static FULL_KEYWORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$(Author|Date|DateTime|Change|File|Revision):[^$\n]*\$").expect("valid regex")
});

/// Apply §4.1's keyword-expansion masking rules for the given mode.
pub fn mask_keywords(content: &[u8], mode: KeywordMode) -> Vec<u8> {
    match mode {
        KeywordMode::None => content.to_vec(),
        KeywordMode::IdOnly => mask_id_header(content),
        KeywordMode::Full => {
            let masked = mask_id_header(content);
            FULL_KEYWORD_PATTERN
                .replace_all(&masked, |caps: &regex::bytes::Captures| {
                    let mut out = Vec::new();
                    out.extend_from_slice(b"$");
                    out.extend_from_slice(&caps[1]);
                    out.extend_from_slice(b"$");
                    out
                })
                .into_owned()
        }
    }
}

fn mask_id_header(content: &[u8]) -> Vec<u8> {
    ID_HEADER_PATTERN
        .replace_all(content, |caps: &regex::bytes::Captures| {
            let mut out = Vec::new();
            out.extend_from_slice(b"$");
            out.extend_from_slice(&caps[1]);
            out.extend_from_slice(b"$");
            out
        })
        .into_owned()
}

/// Collapse `\r\n` to `\n`, for hosts whose native line ending is CRLF.
pub fn normalize_line_endings(content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len());
    let mut iter = content.iter().peekable();
    while let Some(&byte) = iter.next() {
        if byte == b'\r' && iter.peek() == Some(&&b'\n') {
            continue;
        }
        out.push(byte);
    }
    out
}

/// Perforce writes symlink content with a trailing newline that must be
/// stripped before it becomes the blob content.
pub fn strip_symlink_trailing_newline(content: &[u8]) -> &[u8] {
    content.strip_suffix(b"\n").unwrap_or(content)
}

/// Compute the content that should be written for a fetched file, given
/// its depot type and the raw bytes the depot returned. Returns `None`
/// for `apple` types (§4.1, §4.4): the file is logged and skipped
/// entirely, rather than emitted with masked or suppressed content.
///
/// Binary files outside the recognized image extensions are emitted with
/// empty content (§4.1; preserved per §9 open question 1).
pub fn prepare_content(entry: &FileEntry, raw: &[u8], collapse_crlf: bool) -> Option<Vec<u8>> {
    let depot_type = entry.depot_type();
    match depot_type.base {
        TypeBase::Apple => {
            tracing::warn!(path = entry.effective_path(), "skipping apple-type file");
            None
        }
        TypeBase::Symlink => Some(strip_symlink_trailing_newline(raw).to_vec()),
        TypeBase::Binary => {
            if is_image_extension(entry.effective_path()) {
                Some(raw.to_vec())
            } else {
                tracing::debug!(path = entry.effective_path(), "suppressing non-image binary content");
                Some(Vec::new())
            }
        }
        _ => {
            let masked = mask_keywords(raw, depot_type.keyword_mode);
            Some(if collapse_crlf {
                normalize_line_endings(&masked)
            } else {
                masked
            })
        }
    }
}

/// Partition a changelist's files by the client spec: files excluded by
/// spec still count as "present but no content" for delete/merge
/// accounting (§4.3), while files with a deleting action are dropped
/// from the fetch set entirely.
pub struct Partition<'a> {
    pub to_fetch: Vec<&'a FileEntry>,
    pub present_no_content: Vec<&'a FileEntry>,
}

pub fn partition_by_client_spec<'a>(files: &'a [FileEntry], spec: &ClientSpec) -> Partition<'a> {
    let mut to_fetch = Vec::new();
    let mut present_no_content = Vec::new();
    for file in files {
        if file.action.is_delete() {
            continue;
        }
        if spec.includes(file.effective_path()) {
            to_fetch.push(file);
        } else {
            present_no_content.push(file);
        }
    }
    Partition {
        to_fetch,
        present_no_content,
    }
}

/// Rate-limits progress lines to at most one per 100 KiB per file
/// (§4.3), so streaming a large file doesn't flood the terminal.
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    bytes_since_last_report: u64,
}

const REPORT_INTERVAL_BYTES: u64 = 100 * 1024;

impl ProgressThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `bytes` more content and return `true` if a progress line
    /// should be emitted now.
    pub fn record(&mut self, bytes: u64) -> bool {
        self.bytes_since_last_report += bytes;
        if self.bytes_since_last_report >= REPORT_INTERVAL_BYTES {
            self.bytes_since_last_report = 0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelist::FileAction;

    #[test]
    fn masks_id_and_header_for_ko() {
        let content = b"prefix $Id: //depot/file.py#10 $ suffix $Header: stuff $ end";
        let masked = mask_keywords(content, KeywordMode::IdOnly);
        assert_eq!(masked, b"prefix $Id$ suffix $Header$ end");
    }

    #[test]
    fn masks_full_keyword_set() {
        let content = b"$Author: jdoe $ $Date: 2024/01/01 $ keep $NotAKeyword$";
        let masked = mask_keywords(content, KeywordMode::Full);
        assert_eq!(masked, b"$Author$ $Date$ keep $NotAKeyword$");
    }

    #[test]
    fn none_mode_is_identity() {
        let content = b"$Id: keep me $";
        assert_eq!(mask_keywords(content, KeywordMode::None), content.to_vec());
    }

    #[test]
    fn collapses_crlf() {
        assert_eq!(normalize_line_endings(b"a\r\nb\r\nc"), b"a\nb\nc");
    }

    #[test]
    fn strips_symlink_trailing_newline() {
        assert_eq!(strip_symlink_trailing_newline(b"../target\n"), b"../target");
    }

    #[test]
    fn non_image_binary_content_is_suppressed() {
        let entry = FileEntry::new("//depot/blob.bin", 1, FileAction::Add, "binary");
        let prepared = prepare_content(&entry, b"\x00\x01\x02", false).unwrap();
        assert!(prepared.is_empty());
    }

    #[test]
    fn image_binary_content_is_preserved() {
        let entry = FileEntry::new("//depot/photo.png", 1, FileAction::Add, "binary");
        let prepared = prepare_content(&entry, b"\x89PNG", false).unwrap();
        assert_eq!(prepared, b"\x89PNG");
    }

    #[test]
    fn apple_type_files_are_skipped() {
        let entry = FileEntry::new("//depot/resource.rsrc", 1, FileAction::Add, "apple");
        assert!(prepare_content(&entry, b"whatever", false).is_none());
    }

    #[test]
    fn partitions_deletes_out_and_spec_exclusions_separately() {
        let files = vec![
            FileEntry::new("//depot/a.txt", 1, FileAction::Add, "text"),
            FileEntry::new("//depot/vendor/b.txt", 1, FileAction::Add, "text"),
            FileEntry::new("//depot/c.txt", 1, FileAction::Delete, "text"),
        ];
        let spec = ClientSpec::new(vec![
            crate::client_spec::ClientSpecEntry {
                prefix: "//depot/vendor/".to_string(),
                include: false,
            },
            crate::client_spec::ClientSpecEntry {
                prefix: "//depot/".to_string(),
                include: true,
            },
        ]);
        let partition = partition_by_client_spec(&files, &spec);
        assert_eq!(partition.to_fetch.len(), 1);
        assert_eq!(partition.present_no_content.len(), 1);
    }

    #[test]
    fn progress_throttle_fires_every_100kib() {
        let mut throttle = ProgressThrottle::new();
        assert!(!throttle.record(50 * 1024));
        assert!(throttle.record(50 * 1024));
        assert!(!throttle.record(10));
    }
}
