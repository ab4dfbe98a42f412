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

//! The wire framing for the depot client's tagged-output mode.
//!
//! Each record is a `code` string followed by a field count and that many
//! `(key, value)` byte-string pairs, all length-prefixed so content can
//! carry arbitrary binary data. The adapter only needs to recognize EOF
//! and the `code=error` discriminant (§6); everything else is opaque
//! bytes until [`crate::record::Record::decode`] interprets it.

use std::collections::BTreeMap;
use std::io::Read;
use std::io::Write;

use crate::record::Record;

pub struct RecordReader<R> {
    inner: R,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    fn read_u32(&mut self) -> Option<u32> {
        let mut buf = [0u8; 4];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => Some(u32::from_le_bytes(buf)),
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => None,
            Err(_) => None,
        }
    }

    fn read_bytes(&mut self, len: u32) -> Option<Vec<u8>> {
        let mut buf = vec![0u8; len as usize];
        self.inner.read_exact(&mut buf).ok()?;
        Some(buf)
    }

    /// Read the next record, or `None` at end of stream.
    pub fn next_record(&mut self) -> Option<Record> {
        let code_len = self.read_u32()?;
        let code_bytes = self.read_bytes(code_len)?;
        let code = String::from_utf8_lossy(&code_bytes).into_owned();
        let field_count = self.read_u32()?;
        let mut fields = BTreeMap::new();
        for _ in 0..field_count {
            let key_len = self.read_u32()?;
            let key_bytes = self.read_bytes(key_len)?;
            let key = String::from_utf8_lossy(&key_bytes).into_owned();
            let value_len = self.read_u32()?;
            let value = self.read_bytes(value_len)?;
            fields.insert(key, value);
        }
        Some(Record::decode(&code, fields))
    }
}

/// Encode a single record in the wire framing read by [`RecordReader`].
/// Used by tests to build fixture depot-client output.
pub fn write_record<W: Write>(
    out: &mut W,
    code: &str,
    fields: &[(&str, &[u8])],
) -> std::io::Result<()> {
    out.write_all(&(code.len() as u32).to_le_bytes())?;
    out.write_all(code.as_bytes())?;
    out.write_all(&(fields.len() as u32).to_le_bytes())?;
    for (key, value) in fields {
        out.write_all(&(key.len() as u32).to_le_bytes())?;
        out.write_all(key.as_bytes())?;
        out.write_all(&(value.len() as u32).to_le_bytes())?;
        out.write_all(value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ChunkKind;

    #[test]
    fn round_trips_stat_and_chunk_records() {
        let mut buf = Vec::new();
        write_record(&mut buf, "stat", &[("change", b"33255"), ("user", b"someuser")]).unwrap();
        write_record(&mut buf, "text", &[("data", b"some text\n")]).unwrap();

        let mut reader = RecordReader::new(&buf[..]);
        let first = reader.next_record().unwrap();
        assert_eq!(first.field_str("change"), Some("33255"));
        let second = reader.next_record().unwrap();
        assert_eq!(
            second,
            Record::Chunk {
                kind: ChunkKind::Text,
                data: b"some text\n".to_vec(),
            }
        );
        assert!(reader.next_record().is_none());
    }

    #[test]
    fn empty_stream_yields_no_records() {
        let mut reader = RecordReader::new(&b""[..]);
        assert!(reader.next_record().is_none());
    }
}
