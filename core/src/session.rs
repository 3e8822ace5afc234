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

use crate::error::{Result, SyncError};
use crate::service::GraphService;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// An authenticated session. Its JSON encoding is the token kept between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub handle: String,
    pub did: String,
    pub access_jwt: String,
    pub refresh_jwt: String,
}

impl Session {
    pub fn export_token(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_token(token: &str) -> Result<Self> {
        serde_json::from_str(token.trim()).map_err(|e| {
            SyncError::Credential(format!("cached session token is unreadable ({})", e))
        })
    }
}

/// Keeps the session token in a plain file across invocations.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached token, or `None` when the file is missing or blank.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            debug!("No token file at {}", self.path.display());
            return Ok(None);
        }
        let token = fs::read_to_string(&self.path)?;
        if token.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(token))
    }

    /// Overwrites the token file with the session's current token.
    pub fn persist(&self, session: &Session) -> Result<()> {
        fs::write(&self.path, session.export_token()?)?;
        debug!("Session token written to {}", self.path.display());
        Ok(())
    }
}

/// Logs in with the cached token when there is one, otherwise with handle and password.
///
/// With a cached token the password is never consulted, even when supplied.
pub async fn authenticate<S: GraphService>(
    service: &mut S,
    handle: Option<&str>,
    password: Option<&str>,
    cached_token: Option<&str>,
) -> Result<Session> {
    if let Some(token) = cached_token {
        let cached = Session::from_token(token)?;
        info!("Resuming cached session for {}", cached.handle);
        return service.resume_session(&cached).await;
    }

    let handle = handle.ok_or_else(|| {
        SyncError::Credential("a Bluesky handle is needed, but none was provided".to_string())
    })?;
    let password = password.ok_or_else(|| {
        SyncError::Credential("an app password is needed, but none was provided".to_string())
    })?;

    info!("Logging in as {}", handle);
    service.create_session(handle, password).await
}
