/*
    bsky-list-rs | Rust CLI tool to sync and back up Bluesky lists.
    Copyright (C) 2025  Israel Alberto Roldan Vega

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a run. None of these are recovered locally.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No usable credentials: {0}")]
    Credential(String),
    #[error("List '{name}' could not be found among the lists of {owner}")]
    ListNotFound { owner: String, name: String },
    #[error("Handle '{handle}' could not be resolved to a DID")]
    Resolution { handle: String },
    #[error("Input file {} could not be found", .0.display())]
    MissingInput(PathBuf),
    #[error("Malformed post URL: {0}")]
    MalformedUrl(String),
    #[error("Bluesky API error: {0}")]
    Transport(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Session token encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
