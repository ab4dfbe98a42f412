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

//! The single sink every library error type converts into at the command
//! boundary, and the exit code each variant maps to.

use depotsync_lib::depot_client::DepotError;
use depotsync_lib::fast_import::FastImportError;
use depotsync_lib::file_reader::FileReaderError;
use depotsync_lib::filter::FilterError;
use depotsync_lib::git_driver::GitDriverError;
use depotsync_lib::provenance::ProvenanceError;
use depotsync_lib::submit::SubmitError;
use depotsync_lib::user_map::UserMapError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    UserError(String),
    #[error(transparent)]
    Depot(#[from] DepotError),
    #[error(transparent)]
    Git(#[from] GitDriverError),
    #[error(transparent)]
    Provenance(#[from] ProvenanceError),
    #[error(transparent)]
    FileReader(#[from] FileReaderError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    UserMap(#[from] UserMapError),
    #[error(transparent)]
    FastImport(#[from] FastImportError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CommandError {
    /// The process exit code a failure of this kind should produce: `1`
    /// for ordinary user-facing failures (bad arguments, depot/DVCS
    /// errors the user can act on), `2` for anything that indicates an
    /// internal invariant broke.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UserError(_)
            | Self::Depot(_)
            | Self::Git(_)
            | Self::Provenance(_)
            | Self::FileReader(_)
            | Self::Submit(_)
            | Self::Filter(_)
            | Self::UserMap(_)
            | Self::FastImport(_)
            | Self::Io(_) => 1,
        }
    }
}

pub fn user_error(message: impl Into<String>) -> CommandError {
    CommandError::UserError(message.into())
}
