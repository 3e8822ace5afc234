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

use crate::collector::paginate;
use crate::error::{Result, SyncError};
use crate::models::DID_PREFIX;
use crate::service::GraphService;
use futures::TryStreamExt;
use log::{debug, info};
use std::pin::pin;

/// A raw input line, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier<'a> {
    /// Already a DID; used as-is.
    Did(&'a str),
    /// A handle, with any leading `@` removed.
    Handle(&'a str),
    Blank,
}

impl<'a> Identifier<'a> {
    pub fn parse(line: &'a str) -> Self {
        if line.trim().is_empty() {
            return Identifier::Blank;
        }
        let line = line.trim_end();
        let line = line.strip_prefix('@').unwrap_or(line);
        if line.starts_with(DID_PREFIX) {
            Identifier::Did(line)
        } else {
            Identifier::Handle(line)
        }
    }
}

/// Turns handles into DIDs; DIDs pass through untouched.
pub struct IdentifierResolver<'a, S> {
    service: &'a S,
}

impl<'a, S: GraphService> IdentifierResolver<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    /// DID for `line`, or `None` for a blank line.
    pub async fn normalize(&self, line: &str) -> Result<Option<String>> {
        match Identifier::parse(line) {
            Identifier::Blank => Ok(None),
            Identifier::Did(did) => Ok(Some(did.to_string())),
            Identifier::Handle(handle) => self.resolve(handle).await.map(Some),
        }
    }

    pub async fn resolve(&self, handle: &str) -> Result<String> {
        match self.service.resolve_handle(handle).await? {
            Some(did) => {
                debug!("Resolved {} to {}", handle, did);
                Ok(did)
            }
            None => Err(SyncError::Resolution {
                handle: handle.to_string(),
            }),
        }
    }
}

/// Finds a list's `at://` URI from its owner and name.
pub struct ListResolver<'a, S> {
    service: &'a S,
    page_limit: u32,
}

impl<'a, S: GraphService> ListResolver<'a, S> {
    pub fn new(service: &'a S, page_limit: u32) -> Self {
        Self {
            service,
            page_limit,
        }
    }

    /// URI of the first of `owner`'s lists, in server order, named exactly `name`.
    ///
    /// Walks every page of the owner's lists, stopping at the first match.
    pub async fn resolve(&self, owner: &str, name: &str) -> Result<String> {
        let service = self.service;
        let limit = self.page_limit;
        let lists = paginate(
            |cursor| service.get_lists_page(owner, cursor, limit),
            |list| list,
        );
        let mut lists = pin!(lists);

        while let Some(list) = lists.try_next().await? {
            if list.name == name {
                info!("Found list '{}' of {}: {}", name, owner, list.uri);
                return Ok(list.uri);
            }
        }

        Err(SyncError::ListNotFound {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}
