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

//! Parsing and classification of depot file type tags (`text`, `binary+x`,
//! `utf16`, `ktext`, ...).

use std::sync::LazyLock;

use regex::Regex;

static EXEC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[cku]?x|\+.*x").expect("valid regex"));

/// The base storage kind a depot type tag names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeBase {
    Text,
    Unicode,
    Utf16,
    Binary,
    Symlink,
    Apple,
    /// Anything the core doesn't special-case; treated like `Binary` for
    /// fetch purposes but reported separately so callers can warn.
    Unknown,
}

/// How `$Keyword$` expansions in this type's content should be masked
/// before the content is committed, per §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordMode {
    /// No keyword expansion.
    None,
    /// `+ko`: mask only `$Id$`/`$Header$`.
    IdOnly,
    /// `+k`, `ktext`, `kxtext`: mask the full keyword set.
    Full,
}

/// A parsed depot type tag, e.g. `ktext` or `binary+x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepotType {
    pub base: TypeBase,
    pub executable: bool,
    pub keyword_mode: KeywordMode,
    raw: String,
}

impl DepotType {
    pub fn parse(tag: &str) -> Self {
        let executable = EXEC_PATTERN.is_match(tag);

        let keyword_mode = if tag == "ktext" || tag == "kxtext" {
            KeywordMode::Full
        } else if let Some(modifiers) = tag.split_once('+').map(|(_, m)| m) {
            if modifiers.contains("ko") {
                KeywordMode::IdOnly
            } else if modifiers.contains('k') {
                KeywordMode::Full
            } else {
                KeywordMode::None
            }
        } else {
            KeywordMode::None
        };

        let base = if tag == "symlink" {
            TypeBase::Symlink
        } else if tag == "apple" || tag.starts_with("apple+") {
            TypeBase::Apple
        } else if tag.starts_with("utf16") {
            TypeBase::Utf16
        } else if tag.starts_with("unicode") {
            TypeBase::Unicode
        } else if tag.starts_with("binary") {
            TypeBase::Binary
        } else if tag.starts_with("text")
            || tag == "ktext"
            || tag == "kxtext"
            || tag == "xtext"
            || tag == "ctext"
        {
            TypeBase::Text
        } else {
            TypeBase::Unknown
        };

        Self {
            base,
            executable,
            keyword_mode,
            raw: tag.to_string(),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn git_mode(&self) -> &'static str {
        if self.base == TypeBase::Symlink {
            "120000"
        } else if self.executable {
            "755"
        } else {
            "644"
        }
    }
}

/// Extensions treated as real images; binary files outside this set are
/// emitted with empty content (§4.1, preserved per §9 open question 1).
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "gif", "png", "bmp", "ico", "tif", "tiff"];

/// Guess a depot type tag for content being submitted from the DVCS side
/// (§4.5's "reconciling file modes"): a NUL byte anywhere marks the file
/// binary, everything else is text, and the executable bit from the
/// DVCS tree becomes a `+x` suffix either way.
pub fn guess_depot_type(content: &[u8], executable: bool) -> String {
    let base = if content.contains(&0) { "binary" } else { "text" };
    if executable {
        format!("{base}+x")
    } else {
        base.to_string()
    }
}

pub fn is_image_extension(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("text", false, KeywordMode::None; "plain text")]
    #[test_case("text+x", true, KeywordMode::None; "executable text")]
    #[test_case("cxtext", true, KeywordMode::None; "c-prefixed exec")]
    #[test_case("ktext", false, KeywordMode::Full; "legacy ktext")]
    #[test_case("kxtext", true, KeywordMode::Full; "legacy kxtext")]
    #[test_case("text+ko", false, KeywordMode::IdOnly; "id-only keywords")]
    #[test_case("text+k", false, KeywordMode::Full; "full keywords")]
    fn classifies_exec_and_keywords(tag: &str, executable: bool, mode: KeywordMode) {
        let parsed = DepotType::parse(tag);
        assert_eq!(parsed.executable, executable);
        assert_eq!(parsed.keyword_mode, mode);
    }

    #[test]
    fn classifies_symlink_and_mode() {
        let parsed = DepotType::parse("symlink");
        assert_eq!(parsed.base, TypeBase::Symlink);
        assert_eq!(parsed.git_mode(), "120000");
    }

    #[test]
    fn classifies_apple_and_binary() {
        assert_eq!(DepotType::parse("apple").base, TypeBase::Apple);
        assert_eq!(DepotType::parse("binary").base, TypeBase::Binary);
        assert_eq!(DepotType::parse("binary+x").git_mode(), "755");
    }

    #[test]
    fn non_executable_non_symlink_is_644() {
        assert_eq!(DepotType::parse("text").git_mode(), "644");
    }

    #[test_case(b"hello\n", false, "text"; "plain text")]
    #[test_case(b"hello\n", true, "text+x"; "executable text")]
    #[test_case(b"bi\0nary", false, "binary"; "contains a nul byte")]
    #[test_case(b"bi\0nary", true, "binary+x"; "executable binary")]
    fn guesses_depot_type_from_content(content: &[u8], executable: bool, expected: &str) {
        assert_eq!(guess_depot_type(content, executable), expected);
    }

    #[test_case("photo.PNG", true; "uppercase extension")]
    #[test_case("archive.bin", false; "unknown binary extension")]
    #[test_case("noext", false; "no extension")]
    fn image_extension_matching(path: &str, expected: bool) {
        assert_eq!(is_image_extension(path), expected);
    }
}
