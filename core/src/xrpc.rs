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

//! HTTP transport speaking XRPC to a Bluesky PDS.
//!
//! Wire payloads are decoded here and handed out as the typed pages from
//! [`crate::models`]; nothing outside this module knows their shape.

use crate::config::ServiceConfig;
use crate::error::{Result, SyncError};
use crate::models::{
    Account, CollectionPage, Like, ListDescriptor, ListMember, MembershipRecord,
    LIST_ITEM_COLLECTION,
};
use crate::service::GraphService;
use crate::session::Session;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

const EXPIRED_TOKEN: &str = "ExpiredToken";

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    handle: String,
    did: String,
    access_jwt: String,
    refresh_jwt: String,
}

impl From<SessionResponse> for Session {
    fn from(wire: SessionResponse) -> Self {
        Session {
            handle: wire.handle,
            did: wire.did,
            access_jwt: wire.access_jwt,
            refresh_jwt: wire.refresh_jwt,
        }
    }
}

#[derive(Deserialize)]
struct ProfileView {
    did: String,
}

impl From<ProfileView> for Account {
    fn from(wire: ProfileView) -> Self {
        Account { did: wire.did }
    }
}

#[derive(Deserialize)]
struct ListCreator {
    handle: String,
}

#[derive(Deserialize)]
struct ListView {
    uri: String,
    name: String,
    creator: ListCreator,
}

#[derive(Deserialize)]
struct GetListsResponse {
    lists: Vec<ListView>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct ListItemView {
    subject: ProfileView,
}

#[derive(Deserialize)]
struct GetListResponse {
    items: Vec<ListItemView>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct GetFollowersResponse {
    followers: Vec<ProfileView>,
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct LikeView {
    actor: ProfileView,
}

#[derive(Deserialize)]
struct GetLikesResponse {
    likes: Vec<LikeView>,
    cursor: Option<String>,
}

#[derive(Serialize)]
struct ListItemRecord<'a> {
    #[serde(rename = "$type")]
    kind: &'static str,
    #[serde(flatten)]
    record: &'a MembershipRecord,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'static str,
    record: ListItemRecord<'a>,
}

#[derive(Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

#[derive(Deserialize)]
struct ResolveHandleResponse {
    did: String,
}

#[derive(Deserialize)]
struct XrpcErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl GetListsResponse {
    fn into_page(self) -> CollectionPage<ListDescriptor> {
        let items = self
            .lists
            .into_iter()
            .map(|list| ListDescriptor {
                name: list.name,
                uri: list.uri,
                owner: list.creator.handle,
            })
            .collect();
        CollectionPage::new(items, self.cursor)
    }
}

impl GetListResponse {
    fn into_page(self) -> CollectionPage<ListMember> {
        let items = self
            .items
            .into_iter()
            .map(|item| ListMember {
                subject: item.subject.into(),
            })
            .collect();
        CollectionPage::new(items, self.cursor)
    }
}

impl GetFollowersResponse {
    fn into_page(self) -> CollectionPage<Account> {
        let items = self.followers.into_iter().map(Account::from).collect();
        CollectionPage::new(items, self.cursor)
    }
}

impl GetLikesResponse {
    fn into_page(self) -> CollectionPage<Like> {
        let items = self
            .likes
            .into_iter()
            .map(|like| Like {
                actor: like.actor.into(),
            })
            .collect();
        CollectionPage::new(items, self.cursor)
    }
}

fn page_params(key: &'static str, value: &str, cursor: Option<String>, limit: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![(key, value.to_string()), ("limit", limit.to_string())];
    if let Some(cursor) = cursor {
        params.push(("cursor", cursor));
    }
    params
}

/// `GraphService` backed by the public XRPC endpoints.
///
/// The session sits behind a lock so an expired access token can be
/// refreshed from any call, not only from login.
pub struct XrpcClient {
    http: Client,
    base_url: String,
    session: Mutex<Option<Session>>,
}

impl XrpcClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("bsky-list/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            session: Mutex::new(None),
        })
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.base_url, nsid)
    }

    fn current(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_session(&self, session: Session) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Exchanges `refresh_jwt` for a new session and keeps it.
    async fn refresh_with(&self, refresh_jwt: &str) -> Result<Session> {
        let nsid = "com.atproto.server.refreshSession";
        let response = self
            .http
            .post(self.endpoint(nsid))
            .bearer_auth(refresh_jwt)
            .send()
            .await?;
        let session: Session = read::<SessionResponse>(nsid, response).await?.into();
        self.store_session(session.clone());
        Ok(session)
    }

    /// Sends the request `build` makes for the current access token.
    ///
    /// When the server rejects that token as expired, the session is
    /// refreshed once and the request is sent again.
    async fn call<F>(&self, nsid: &str, build: F) -> Result<(StatusCode, String)>
    where
        F: Fn(Option<&str>) -> RequestBuilder + Send + Sync,
    {
        let mut refreshed = false;
        loop {
            let session = self.current();
            let access = session.as_ref().map(|s| s.access_jwt.as_str());
            debug!("XRPC {}", nsid);
            let response = build(access).send().await?;
            let status = response.status();
            let body = response.text().await?;

            if let Some(session) = &session {
                if !refreshed
                    && status == StatusCode::BAD_REQUEST
                    && error_code(&body).as_deref() == Some(EXPIRED_TOKEN)
                {
                    info!("Access token expired during {}, refreshing session", nsid);
                    self.refresh_with(&session.refresh_jwt).await?;
                    refreshed = true;
                    continue;
                }
            }
            return Ok((status, body));
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, nsid: &str, params: &[(&str, String)]) -> Result<T> {
        let url = self.endpoint(nsid);
        let (status, body) = self
            .call(nsid, |access| {
                let request = self.http.get(&url).query(params);
                match access {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;
        parse(nsid, status, &body)
    }
}

fn error_code(body: &str) -> Option<String> {
    serde_json::from_str::<XrpcErrorBody>(body)
        .ok()
        .and_then(|err| err.error)
}

async fn read<T: DeserializeOwned>(nsid: &str, response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    parse(nsid, status, &body)
}

fn parse<T: DeserializeOwned>(nsid: &str, status: StatusCode, body: &str) -> Result<T> {
    if !status.is_success() {
        return Err(SyncError::Transport(describe_failure(nsid, status, body)));
    }
    serde_json::from_str(body).map_err(|e| {
        SyncError::Transport(format!("{} returned an unexpected body: {}", nsid, e))
    })
}

fn describe_failure(nsid: &str, status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<XrpcErrorBody>(body) {
        Ok(XrpcErrorBody { error, message }) => {
            let detail: Vec<String> = error.into_iter().chain(message).collect();
            if detail.is_empty() {
                format!("{} failed with {}", nsid, status)
            } else {
                format!("{} failed with {}: {}", nsid, status, detail.join(": "))
            }
        }
        Err(_) if body.trim().is_empty() => format!("{} failed with {}", nsid, status),
        Err(_) => format!("{} failed with {}: {}", nsid, status, body.trim()),
    }
}

#[async_trait]
impl GraphService for XrpcClient {
    async fn create_session(&mut self, handle: &str, password: &str) -> Result<Session> {
        let nsid = "com.atproto.server.createSession";
        let body = CreateSessionRequest {
            identifier: handle,
            password,
        };
        let response = self
            .http
            .post(self.endpoint(nsid))
            .json(&body)
            .send()
            .await?;
        let session: Session = read::<SessionResponse>(nsid, response).await?.into();
        self.store_session(session.clone());
        Ok(session)
    }

    async fn resume_session(&mut self, cached: &Session) -> Result<Session> {
        self.refresh_with(&cached.refresh_jwt).await
    }

    fn session(&self) -> Option<Session> {
        self.current()
    }

    async fn get_lists_page(
        &self,
        actor: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<ListDescriptor>> {
        let params = page_params("actor", actor, cursor, limit);
        let page: GetListsResponse = self.fetch("app.bsky.graph.getLists", &params).await?;
        Ok(page.into_page())
    }

    async fn get_list_page(
        &self,
        list: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<ListMember>> {
        let params = page_params("list", list, cursor, limit);
        let page: GetListResponse = self.fetch("app.bsky.graph.getList", &params).await?;
        Ok(page.into_page())
    }

    async fn get_followers_page(
        &self,
        actor: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<Account>> {
        let params = page_params("actor", actor, cursor, limit);
        let page: GetFollowersResponse =
            self.fetch("app.bsky.graph.getFollowers", &params).await?;
        Ok(page.into_page())
    }

    async fn get_likes_page(
        &self,
        post: &str,
        cursor: Option<String>,
        limit: u32,
    ) -> Result<CollectionPage<Like>> {
        let params = page_params("uri", post, cursor, limit);
        let page: GetLikesResponse = self.fetch("app.bsky.feed.getLikes", &params).await?;
        Ok(page.into_page())
    }

    async fn create_list_item(&self, repo: &str, record: &MembershipRecord) -> Result<()> {
        let nsid = "com.atproto.repo.createRecord";
        if self.current().is_none() {
            return Err(SyncError::Credential("not logged in".to_string()));
        }
        let body = CreateRecordRequest {
            repo,
            collection: LIST_ITEM_COLLECTION,
            record: ListItemRecord {
                kind: LIST_ITEM_COLLECTION,
                record,
            },
        };
        let url = self.endpoint(nsid);
        let (status, reply) = self
            .call(nsid, |access| {
                let request = self.http.post(&url).json(&body);
                match access {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;
        let created: CreateRecordResponse = parse(nsid, status, &reply)?;
        debug!("Created {}", created.uri);
        Ok(())
    }

    async fn resolve_handle(&self, handle: &str) -> Result<Option<String>> {
        let nsid = "com.atproto.identity.resolveHandle";
        let params = [("handle", handle.to_string())];
        let url = self.endpoint(nsid);
        let (status, body) = self
            .call(nsid, |access| {
                let request = self.http.get(&url).query(&params);
                match access {
                    Some(token) => request.bearer_auth(token),
                    None => request,
                }
            })
            .await?;
        // An unknown handle is answered with 400 InvalidRequest.
        if status == StatusCode::BAD_REQUEST {
            debug!("{} could not resolve {}", nsid, handle);
            return Ok(None);
        }
        let resolved: ResolveHandleResponse = parse(nsid, status, &body)?;
        Ok(Some(resolved.did))
    }
}
