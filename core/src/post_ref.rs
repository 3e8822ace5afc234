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
use crate::models::{DID_PREFIX, POST_COLLECTION};
use crate::resolver::IdentifierResolver;
use crate::service::GraphService;

const HANDLE_SEGMENT: usize = 4;
const RKEY_SEGMENT: usize = 6;

/// Handle (or DID) and record key of a public post link such as
/// `https://bsky.app/profile/alice.example/post/3kabc`.
pub fn split_post_url(url: &str) -> Result<(&str, &str)> {
    let segments: Vec<&str> = url.split('/').collect();
    let malformed = || SyncError::MalformedUrl(url.to_string());

    let author = *segments.get(HANDLE_SEGMENT).ok_or_else(malformed)?;
    let rkey = *segments.get(RKEY_SEGMENT).ok_or_else(malformed)?;
    let rkey = rkey.split(['?', '#']).next().unwrap_or_default();

    if author.is_empty() || rkey.is_empty() {
        return Err(malformed());
    }
    Ok((author, rkey))
}

/// Converts public post links into `at://` references.
pub struct PostReferenceParser<'a, S> {
    identifiers: IdentifierResolver<'a, S>,
}

impl<'a, S: GraphService> PostReferenceParser<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self {
            identifiers: IdentifierResolver::new(service),
        }
    }

    pub async fn parse(&self, url: &str) -> Result<String> {
        let (author, rkey) = split_post_url(url)?;
        let did = if author.starts_with(DID_PREFIX) {
            author.to_string()
        } else {
            self.identifiers.resolve(author).await?
        };
        Ok(format!("at://{}/{}/{}", did, POST_COLLECTION, rkey))
    }
}
