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

//! Typed records decoded from the depot client's tagged-output protocol.
//!
//! The depot CLI's tagged mode emits a stream of self-delimiting records,
//! each an unordered mapping from short keys to byte-string values. Rather
//! than carry that mapping around untyped, every record is decoded into a
//! [`Record`] with an explicit discriminant, so callers match on a closed
//! set of shapes instead of probing string keys ad hoc.

use std::collections::BTreeMap;

/// One decoded record from a depot CLI invocation in tagged mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A `stat`-style record: an arbitrary key/value mapping describing a
    /// changelist, file revision, label, or similar structured result.
    Stat(BTreeMap<String, Vec<u8>>),
    /// A fatal error reported by the depot server (`code=error`).
    Error(String),
    /// A chunk of file content, tagged with the encoding the depot used to
    /// send it.
    Chunk { kind: ChunkKind, data: Vec<u8> },
    /// A synthetic trailing record appended when the depot CLI process
    /// exited with a non-zero status.
    ExitCode(i32),
}

/// The `code` value carried by a content chunk record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Text,
    Unicode,
    Binary,
    Utf16,
}

impl ChunkKind {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "text" => Some(Self::Text),
            "unicode" => Some(Self::Unicode),
            "binary" => Some(Self::Binary),
            "utf16" => Some(Self::Utf16),
            _ => None,
        }
    }
}

impl Record {
    /// Decode a single record given its `code` value and the rest of the
    /// field mapping (the `code` key itself is not present in `fields`).
    pub fn decode(code: &str, mut fields: BTreeMap<String, Vec<u8>>) -> Self {
        if code == "error" {
            let data = fields
                .remove("data")
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            return Self::Error(data);
        }
        if let Some(kind) = ChunkKind::from_code(code) {
            let data = fields.remove("data").unwrap_or_default();
            return Self::Chunk { kind, data };
        }
        fields.insert("code".to_string(), code.as_bytes().to_vec());
        Self::Stat(fields)
    }

    /// True if this record signals a fatal depot invocation error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The `stat` field mapping, if this is a stat record.
    pub fn as_stat(&self) -> Option<&BTreeMap<String, Vec<u8>>> {
        match self {
            Self::Stat(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up a UTF-8 field of a stat record.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.as_stat()
            .and_then(|fields| fields.get(key))
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn decodes_error_record() {
        let rec = Record::decode("error", fields(&[("data", "no such file(s).")]));
        assert_eq!(rec, Record::Error("no such file(s).".to_string()));
        assert!(rec.is_error());
    }

    #[test]
    fn decodes_chunk_record() {
        let rec = Record::decode("text", fields(&[("data", "hello\n")]));
        assert_eq!(
            rec,
            Record::Chunk {
                kind: ChunkKind::Text,
                data: b"hello\n".to_vec(),
            }
        );
    }

    #[test]
    fn decodes_stat_record_and_keeps_code() {
        let rec = Record::decode("stat", fields(&[("change", "33255"), ("user", "someuser")]));
        assert_eq!(rec.field_str("change"), Some("33255"));
        assert_eq!(rec.field_str("code"), Some("stat"));
        assert!(!rec.is_error());
    }
}
