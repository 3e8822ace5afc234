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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix that marks an account identifier as already resolved.
pub const DID_PREFIX: &str = "did:";

/// Record collection of posts, used to build `at://` references.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Record collection of list memberships.
pub const LIST_ITEM_COLLECTION: &str = "app.bsky.graph.listitem";

/// One page of a cursor-driven collection.
///
/// A present `cursor` means the server has more items to hand out.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionPage<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

impl<T> CollectionPage<T> {
    pub fn new(items: Vec<T>, cursor: Option<String>) -> Self {
        Self { items, cursor }
    }
}

/// An account as it appears inside list, follower and like responses.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub did: String,
}

/// A curated list owned by some account.
#[derive(Debug, Clone, PartialEq)]
pub struct ListDescriptor {
    pub name: String,
    pub uri: String,
    pub owner: String,
}

/// One entry of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListMember {
    pub subject: Account,
}

/// A like on a post.
#[derive(Debug, Clone, PartialEq)]
pub struct Like {
    pub actor: Account,
}

/// The `app.bsky.graph.listitem` record written for every accepted input line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRecord {
    pub list: String,
    pub subject: String,
    pub created_at: String,
}

/// Outcome of pushing an input file into a list.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AddReport {
    pub list_uri: String,
    pub added: u32,
    pub skipped_blank: u32,
    pub skipped_existing: u32,
}

/// Outcome of streaming a collection to a file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FetchReport {
    pub source: String,
    pub output: String,
    pub written: u32,
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} identifiers from {} written to {}",
            self.written, self.source, self.output
        )
    }
}
