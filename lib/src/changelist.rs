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

//! The depot-side data model: changelists and the file entries within
//! them (§3). Immutable once submitted; the core only ever reads them.

use crate::depot_type::DepotType;

/// The action recorded against a file within a changelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Add,
    Edit,
    Delete,
    Purge,
    MoveDelete,
    MoveAdd,
    Branch,
    Integrate,
}

impl FileAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "add" => Some(Self::Add),
            "edit" => Some(Self::Edit),
            "delete" => Some(Self::Delete),
            "purge" => Some(Self::Purge),
            "move/delete" => Some(Self::MoveDelete),
            "move/add" => Some(Self::MoveAdd),
            "branch" => Some(Self::Branch),
            "integrate" => Some(Self::Integrate),
            _ => None,
        }
    }

    /// True for actions that remove the file from the tree rather than
    /// writing content (§4.3: "files with a deleting action are excluded
    /// from the fetch").
    pub fn is_delete(self) -> bool {
        matches!(self, Self::Delete | Self::Purge | Self::MoveDelete)
    }

    /// True for actions the merge detector counts towards "this changelist
    /// is an integration" (§4.4).
    pub fn is_integration(self) -> bool {
        matches!(self, Self::Branch | Self::Integrate)
    }
}

/// One file revision touched by a changelist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub depot_path: String,
    pub revision: u32,
    pub action: FileAction,
    pub type_tag: String,
    /// The path after the filename filter has run; `None` until the
    /// filter harness has processed the changelist.
    pub target_path: Option<String>,
}

impl FileEntry {
    pub fn new(depot_path: impl Into<String>, revision: u32, action: FileAction, type_tag: impl Into<String>) -> Self {
        Self {
            depot_path: depot_path.into(),
            revision,
            action,
            type_tag: type_tag.into(),
            target_path: None,
        }
    }

    pub fn depot_type(&self) -> DepotType {
        DepotType::parse(&self.type_tag)
    }

    /// The path to use for matching and relative-path computation: the
    /// filtered target path if one was set, otherwise the depot path.
    pub fn effective_path(&self) -> &str {
        self.target_path.as_deref().unwrap_or(&self.depot_path)
    }
}

/// An atomic depot transaction (§3). Changelist numbers are strictly
/// increasing in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changelist {
    pub number: u64,
    pub author: String,
    pub time: i64,
    pub description: String,
    pub files: Vec<FileEntry>,
}

impl Changelist {
    /// True if more than half of this changelist's files are integrations,
    /// per §4.4's merge-commit heuristic.
    pub fn is_merge_commit(&self) -> bool {
        if self.files.is_empty() {
            return false;
        }
        let integrations = self.files.iter().filter(|f| f.action.is_integration()).count();
        integrations * 2 > self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: FileAction) -> FileEntry {
        FileEntry::new("//depot/a", 1, action, "text")
    }

    #[test]
    fn merge_commit_requires_strict_majority_of_integrations() {
        let cl = Changelist {
            number: 1,
            author: "a".into(),
            time: 0,
            description: String::new(),
            files: vec![entry(FileAction::Integrate), entry(FileAction::Edit)],
        };
        // exactly half is not a majority
        assert!(!cl.is_merge_commit());

        let cl = Changelist {
            files: vec![
                entry(FileAction::Integrate),
                entry(FileAction::Branch),
                entry(FileAction::Edit),
            ],
            ..cl
        };
        assert!(cl.is_merge_commit());
    }

    #[test]
    fn delete_actions_are_excluded_from_fetch() {
        assert!(FileAction::Delete.is_delete());
        assert!(FileAction::Purge.is_delete());
        assert!(FileAction::MoveDelete.is_delete());
        assert!(!FileAction::Edit.is_delete());
    }
}
