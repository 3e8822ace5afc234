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

//! In-memory `GraphService` used by the unit tests.

use crate::error::{Result, SyncError};
use crate::models::{Account, CollectionPage, Like, ListDescriptor, ListMember, MembershipRecord};
use crate::service::GraphService;
use crate::session::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub fn account(did: &str) -> Account {
    Account {
        did: did.to_string(),
    }
}

pub fn dids(prefix: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("did:plc:{}{}", prefix, i))
        .collect()
}

/// Serves `items` in pages of `limit`, using the offset as cursor.
fn page<T: Clone>(items: &[T], cursor: Option<String>, limit: u32) -> CollectionPage<T> {
    let start = cursor.map(|c| c.parse::<usize>().unwrap()).unwrap_or(0);
    let end = (start + limit as usize).min(items.len());
    let next = if end < items.len() {
        Some(end.to_string())
    } else {
        None
    };
    CollectionPage::new(items[start..end].to_vec(), next)
}

#[derive(Default)]
pub struct MockService {
    lists: Vec<ListDescriptor>,
    members: HashMap<String, Vec<String>>,
    followers: HashMap<String, Vec<String>>,
    likes: HashMap<String, Vec<String>>,
    handles: HashMap<String, String>,
    failing_subject: Option<String>,
    failing_cursor: Option<String>,
    session: Option<Session>,
    calls: Mutex<Vec<String>>,
    created: Mutex<Vec<(String, MembershipRecord)>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(mut self, name: &str, uri: &str, owner: &str) -> Self {
        self.lists.push(ListDescriptor {
            name: name.to_string(),
            uri: uri.to_string(),
            owner: owner.to_string(),
        });
        self
    }

    pub fn with_members(mut self, list: &str, members: Vec<String>) -> Self {
        self.members.insert(list.to_string(), members);
        self
    }

    pub fn with_followers(mut self, actor: &str, followers: Vec<String>) -> Self {
        self.followers.insert(actor.to_string(), followers);
        self
    }

    pub fn with_likes(mut self, post: &str, likers: Vec<String>) -> Self {
        self.likes.insert(post.to_string(), likers);
        self
    }

    pub fn with_handle(mut self, handle: &str, did: &str) -> Self {
        self.handles.insert(handle.to_string(), did.to_string());
        self
    }

    /// Makes `create_list_item` fail for this subject.
    pub fn failing_on(mut self, subject: &str) -> Self {
        self.failing_subject = Some(subject.to_string());
        self
    }

    /// Makes every page request carrying this cursor fail.
    pub fn failing_page(mut self, cursor: &str) -> Self {
        self.failing_cursor = Some(cursor.to_string());
        self
    }

    fn check_page(&self, cursor: &Option<String>) -> Result<()> {
        if cursor.is_some() && *cursor == self.failing_cursor {
            return Err(SyncError::Transport(format!(
                "page at cursor {} failed",
                cursor_label(cursor)
            )));
        }
        Ok(())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn created(&self) -> Vec<(String, MembershipRecord)> {
        self.created.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn cursor_label(cursor: &Option<String>) -> &str {
    cursor.as_deref().unwrap_or("-")
}

#[async_trait]
impl GraphService for MockService {
    async fn create_session(&mut self, handle: &str, _password: &str) -> Result<Session> {
        self.record(format!("create_session {}", handle));
        let session = Session {
            handle: handle.to_string(),
            did: format!("did:plc:{}", handle.split('.').next().unwrap_or(handle)),
            access_jwt: "access".to_string(),
            refresh_jwt: "refresh".to_string(),
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    async fn resume_session(&mut self, cached: &Session) -> Result<Session> {
        self.record(format!("resume_session {}", cached.handle));
        let session = Session {
            access_jwt: format!("{}-rotated", cached.access_jwt),
            refresh_jwt: format!("{}-rotated", cached.refresh_jwt),
            ..cached.clone()
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    fn session(&self) -> Option<Session> {
        self.session.clone()
    }

    async fn get_lists_page(
        &self,
        actor: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<ListDescriptor>> {
        self.record(format!("get_lists_page {} {}", actor, cursor_label(&cursor)));
        self.check_page(&cursor)?;
        let owned: Vec<ListDescriptor> = self
            .lists
            .iter()
            .filter(|list| list.owner == actor)
            .cloned()
            .collect();
        Ok(page(&owned, cursor, limit))
    }

    async fn get_list_page(
        &self,
        list: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<ListMember>> {
        self.record(format!("get_list_page {} {}", list, cursor_label(&cursor)));
        self.check_page(&cursor)?;
        let members: Vec<ListMember> = self
            .members
            .get(list)
            .map(|dids| {
                dids.iter()
                    .map(|did| ListMember {
                        subject: account(did),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(page(&members, cursor, limit))
    }

    async fn get_followers_page(
        &self,
        actor: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<Account>> {
        self.record(format!("get_followers_page {} {}", actor, cursor_label(&cursor)));
        self.check_page(&cursor)?;
        let followers: Vec<Account> = self
            .followers
            .get(actor)
            .map(|dids| dids.iter().map(|did| account(did)).collect())
            .unwrap_or_default();
        Ok(page(&followers, cursor, limit))
    }

    async fn get_likes_page(
        &self,
        post: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<Like>> {
        self.record(format!("get_likes_page {} {}", post, cursor_label(&cursor)));
        self.check_page(&cursor)?;
        let likes: Vec<Like> = self
            .likes
            .get(post)
            .map(|dids| {
                dids.iter()
                    .map(|did| Like {
                        actor: account(did),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(page(&likes, cursor, limit))
    }

    async fn create_list_item(&self, repo: &str, record: &MembershipRecord) -> Result<()> {
        self.record(format!("create_list_item {}", record.subject));
        if self.failing_subject.as_deref() == Some(record.subject.as_str()) {
            return Err(SyncError::Transport(format!(
                "createRecord rejected {}",
                record.subject
            )));
        }
        self.created
            .lock()
            .unwrap()
            .push((repo.to_string(), record.clone()));
        Ok(())
    }

    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>> {
        self.record(format!("resolve_handle {}", handle));
        Ok(self.handles.get(handle).cloned())
    }
}
