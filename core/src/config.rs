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

use crate::error::Result;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";
pub const DEFAULT_TOKEN_FILE: &str = "./.bsky.token";
pub const DEFAULT_CREDENTIALS_FILE: &str = "./config";
/// Upper bound of items requested per page.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Where to talk to and where to keep local state.
///
/// Built once per run and handed to every component that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub service_url: String,
    pub token_file: PathBuf,
    pub credentials_file: PathBuf,
    pub page_limit: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `BSKY_SERVICE_URL`, `BSKY_TOKEN_FILE` and
    /// `BSKY_CREDENTIALS_FILE` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("BSKY_SERVICE_URL") {
            config.service_url = url;
        }
        if let Ok(path) = env::var("BSKY_TOKEN_FILE") {
            config.token_file = PathBuf::from(path);
        }
        if let Ok(path) = env::var("BSKY_CREDENTIALS_FILE") {
            config.credentials_file = PathBuf::from(path);
        }
        config
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.service_url.trim_end_matches('/')
    }
}

/// Handle and app password, each possibly missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub handle: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(handle: Option<String>, password: Option<String>) -> Self {
        Self { handle, password }
    }

    /// Reads `BSKY_HANDLE` and `BSKY_APP_PASS`.
    pub fn from_env() -> Self {
        Self {
            handle: env::var("BSKY_HANDLE").ok(),
            password: env::var("BSKY_APP_PASS").ok(),
        }
    }

    /// Reads the credential file. A file that does not exist yields empty credentials.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    /// Parses `my_handle` and `app_password` out of `key = value` / `key: value` lines.
    pub fn parse(contents: &str) -> Self {
        let mut creds = Self::default();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                continue;
            }

            let Some(split_at) = line.find(['=', ':']) else {
                continue;
            };
            let key = line[..split_at].trim();
            let value = line[split_at + 1..].trim();
            if value.is_empty() {
                continue;
            }

            match key.to_ascii_lowercase().as_str() {
                "my_handle" => creds.handle = Some(value.to_string()),
                "app_password" => creds.password = Some(value.to_string()),
                _ => {}
            }
        }

        creds
    }

    /// Fills missing fields from `fallback`.
    pub fn or(self, fallback: Credentials) -> Credentials {
        Credentials {
            handle: self.handle.or(fallback.handle),
            password: self.password.or(fallback.password),
        }
    }
}
