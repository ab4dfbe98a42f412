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

//! Core engine for bridging a Perforce-style depot to a Git-style DVCS:
//! importing changelists as commits, submitting commits back as
//! changelists, and keeping the provenance that ties the two together.
//!
//! This crate has no CLI concerns; [`depotsync_cli`] drives it.

pub mod branch;
pub mod changelist;
pub mod client_spec;
pub mod config;
pub mod depot_client;
pub mod depot_type;
pub mod fast_import;
pub mod file_reader;
pub mod filter;
pub mod git_driver;
pub mod import;
pub mod label;
pub mod marshal;
pub mod provenance;
pub mod record;
pub mod submit;
pub mod user_map;
