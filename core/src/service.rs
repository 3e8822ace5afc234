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
use crate::models::{Account, CollectionPage, Like, ListDescriptor, ListMember, MembershipRecord};
use crate::session::Session;
use async_trait::async_trait;

/// The calls this tool needs from the social-graph service.
///
/// Implementations decode wire responses into the typed pages below, so the
/// components built on top never look at raw JSON. After a successful
/// `create_session` or `resume_session` the implementation keeps the session
/// and uses it to authorize every later call.
#[async_trait]
pub trait GraphService: Send + Sync {
    /// Password login.
    async fn create_session(&mut self, handle: &str, password: &str) -> Result<Session>;

    /// Token login. The returned session may carry rotated tokens.
    async fn resume_session(&mut self, cached: &Session) -> Result<Session>;

    /// The session currently in use, if any.
    fn session(&self) -> Option<Session>;

    async fn get_lists_page(
        &self,
        actor: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<ListDescriptor>>;

    async fn get_list_page(
        &self,
        list: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<ListMember>>;

    async fn get_followers_page(
        &self,
        actor: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<Account>>;

    async fn get_likes_page(
        &self,
        post: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<Like>>;

    /// Writes a membership record into `repo`.
    async fn create_list_item(&self, repo: &str, record: &MembershipRecord) -> Result<()>;

    /// `Ok(None)` when the service does not know the handle.
    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>>;
}
