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

//! The submit/shelve engine (§4.5): turns a DVCS diff into depot actions
//! and drives them through a fixed state machine, reverting open state on
//! any failed step.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("diff status '{0}' is not supported for submit")]
    UnsupportedStatus(char),
    #[error("step {step:?} failed: {reason}")]
    StepFailed { step: SubmitState, reason: String },
}

/// A single line of DVCS diff output between the last-imported commit and
/// the commit being submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
}

impl DiffStatus {
    /// Parse a `git diff --name-status` letter. `T` (type change), `U`
    /// (unmerged), `X` (unknown) and `B` (broken pairing) have no depot
    /// equivalent and are fatal (§4.5).
    pub fn parse(letter: char) -> Result<Self, SubmitError> {
        match letter {
            'A' => Ok(Self::Added),
            'M' => Ok(Self::Modified),
            'D' => Ok(Self::Deleted),
            'R' => Ok(Self::Renamed),
            'C' => Ok(Self::Copied),
            other => Err(SubmitError::UnsupportedStatus(other)),
        }
    }
}

/// One diffed file, ready to be turned into depot actions.
#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub status: DiffStatus,
    pub path: String,
    /// Set for `Renamed`/`Copied`: the path the content came from.
    pub source_path: Option<String>,
}

/// The depot-side operation(s) a single diff entry becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepotAction {
    Add(String),
    Edit(String),
    Delete(String),
    /// `Renamed`/`Copied` submit as `p4 integrate` from source to
    /// destination plus an edit of the destination (§4.5 step 3). A
    /// rename additionally schedules the source for delete; a copy
    /// leaves it in place.
    Integrate { from: String, to: String, delete_source: bool },
}

/// Turn the full diff into the depot actions that implement it, failing
/// fast on the first unsupported status.
pub fn plan_depot_actions(entries: &[DiffEntry]) -> Result<Vec<DepotAction>, SubmitError> {
    let mut actions = Vec::with_capacity(entries.len());
    for entry in entries {
        let action = match entry.status {
            DiffStatus::Added => DepotAction::Add(entry.path.clone()),
            DiffStatus::Modified => DepotAction::Edit(entry.path.clone()),
            DiffStatus::Deleted => DepotAction::Delete(entry.path.clone()),
            DiffStatus::Renamed | DiffStatus::Copied => DepotAction::Integrate {
                from: entry
                    .source_path
                    .clone()
                    .expect("rename/copy diff entries carry a source path"),
                to: entry.path.clone(),
                delete_source: entry.status == DiffStatus::Renamed,
            },
        };
        actions.push(action);
    }
    Ok(actions)
}

/// The submit state machine's steps (§4.5). `Abort` is reachable from
/// every other state and always routes to a revert of anything already
/// opened in the depot changelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Diff,
    Apply,
    EditOrAdd,
    ExecBits,
    Editor,
    Submit,
    Note,
    Done,
    Abort,
}

impl SubmitState {
    /// The next state once the current step succeeds.
    pub fn on_success(self) -> Self {
        match self {
            Self::Diff => Self::Apply,
            Self::Apply => Self::EditOrAdd,
            Self::EditOrAdd => Self::ExecBits,
            Self::ExecBits => Self::Editor,
            Self::Editor => Self::Submit,
            Self::Submit => Self::Note,
            Self::Note => Self::Done,
            Self::Done | Self::Abort => self,
        }
    }

    /// Any step failing routes to `Abort` regardless of where it failed,
    /// so the caller always reverts through the same path.
    pub fn on_failure(self) -> Self {
        match self {
            Self::Done | Self::Abort => self,
            _ => Self::Abort,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Abort)
    }
}

/// Drives [`SubmitState`] forward one step at a time, recording the
/// outcome of each attempted step.
#[derive(Debug)]
pub struct SubmitMachine {
    state: SubmitState,
}

impl SubmitMachine {
    pub fn new() -> Self {
        Self { state: SubmitState::Diff }
    }

    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Advance the machine given whether the current step succeeded.
    /// Returns the new state.
    pub fn step(&mut self, result: Result<(), String>) -> Result<SubmitState, SubmitError> {
        match result {
            Ok(()) => {
                self.state = self.state.on_success();
                Ok(self.state)
            }
            Err(reason) => {
                let step = self.state;
                self.state = self.state.on_failure();
                if self.state == SubmitState::Abort {
                    Err(SubmitError::StepFailed { step, reason })
                } else {
                    Ok(self.state)
                }
            }
        }
    }
}

impl Default for SubmitMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case('A', DiffStatus::Added; "added")]
    #[test_case('M', DiffStatus::Modified; "modified")]
    #[test_case('D', DiffStatus::Deleted; "deleted")]
    #[test_case('R', DiffStatus::Renamed; "renamed")]
    #[test_case('C', DiffStatus::Copied; "copied")]
    fn parses_supported_statuses(letter: char, expected: DiffStatus) {
        assert_eq!(DiffStatus::parse(letter).unwrap(), expected);
    }

    #[test_case('T'; "type change")]
    #[test_case('U'; "unmerged")]
    #[test_case('X'; "unknown")]
    #[test_case('B'; "broken pairing")]
    fn rejects_unsupported_statuses(letter: char) {
        assert!(matches!(DiffStatus::parse(letter), Err(SubmitError::UnsupportedStatus(_))));
    }

    #[test]
    fn plans_simple_actions() {
        let entries = vec![
            DiffEntry { status: DiffStatus::Added, path: "a.txt".into(), source_path: None },
            DiffEntry { status: DiffStatus::Deleted, path: "b.txt".into(), source_path: None },
        ];
        let actions = plan_depot_actions(&entries).unwrap();
        assert_eq!(actions, vec![DepotAction::Add("a.txt".into()), DepotAction::Delete("b.txt".into())]);
    }

    #[test]
    fn plans_rename_as_integrate_with_source_deleted() {
        let entries = vec![DiffEntry {
            status: DiffStatus::Renamed,
            path: "new.txt".into(),
            source_path: Some("old.txt".into()),
        }];
        let actions = plan_depot_actions(&entries).unwrap();
        assert_eq!(
            actions,
            vec![DepotAction::Integrate {
                from: "old.txt".into(),
                to: "new.txt".into(),
                delete_source: true,
            }]
        );
    }

    #[test]
    fn plans_copy_as_integrate_with_source_preserved() {
        let entries = vec![DiffEntry {
            status: DiffStatus::Copied,
            path: "new.txt".into(),
            source_path: Some("old.txt".into()),
        }];
        let actions = plan_depot_actions(&entries).unwrap();
        assert_eq!(
            actions,
            vec![DepotAction::Integrate {
                from: "old.txt".into(),
                to: "new.txt".into(),
                delete_source: false,
            }]
        );
    }

    #[test]
    fn happy_path_runs_through_every_state_to_done() {
        let mut machine = SubmitMachine::new();
        for _ in 0..7 {
            machine.step(Ok(())).unwrap();
        }
        assert_eq!(machine.state(), SubmitState::Done);
    }

    #[test]
    fn failure_at_any_step_aborts() {
        let mut machine = SubmitMachine::new();
        machine.step(Ok(())).unwrap();
        machine.step(Ok(())).unwrap();
        let err = machine.step(Err("exec bit change rejected".to_string())).unwrap_err();
        assert!(matches!(err, SubmitError::StepFailed { step: SubmitState::EditOrAdd, .. }));
        assert_eq!(machine.state(), SubmitState::Abort);
    }
}
