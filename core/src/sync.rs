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
use crate::config::{Credentials, ServiceConfig};
use crate::error::{Result, SyncError};
use crate::membership::{DuplicatePolicy, MembershipWriter};
use crate::models::{AddReport, FetchReport};
use crate::post_ref::PostReferenceParser;
use crate::resolver::{IdentifierResolver, ListResolver};
use crate::service::GraphService;
use crate::session::{authenticate, Session, SessionStore};
use futures::{Stream, TryStreamExt};
use log::{info, warn};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, LineWriter, Write};
use std::path::Path;
use std::pin::pin;

/// Runs the list operations against an authenticated service.
pub struct ListSync<S> {
    service: S,
    config: ServiceConfig,
}

impl<S: GraphService> ListSync<S> {
    pub fn new(service: S, config: ServiceConfig) -> Self {
        Self { service, config }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Authenticates `service` and saves the token right away.
    ///
    /// Token logins rotate the refresh token on the server, so the file must
    /// not keep the old one while the command runs.
    pub async fn login(
        mut service: S,
        config: ServiceConfig,
        store: &SessionStore,
        credentials: &Credentials,
    ) -> Result<Self> {
        let cached_token = store.load()?;
        let session = authenticate(
            &mut service,
            credentials.handle.as_deref(),
            credentials.password.as_deref(),
            cached_token.as_deref(),
        )
        .await?;
        store.persist(&session)?;
        Ok(Self::new(service, config))
    }

    /// Saves the current session token, then returns `outcome`.
    ///
    /// Runs whether the command succeeded or not. A command error wins over a
    /// failed save.
    pub fn finish<T, E: From<SyncError>>(
        &self,
        store: &SessionStore,
        outcome: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let persisted = match self.session() {
            Some(session) => store.persist(&session),
            None => Ok(()),
        };
        if let Err(e) = &persisted {
            warn!("Could not save session token to {}: {}", store.path().display(), e);
        }

        let value = outcome?;
        persisted?;
        Ok(value)
    }

    pub fn session(&self) -> Option<Session> {
        self.service.session()
    }

    fn acting_session(&self) -> Result<Session> {
        self.service.session().ok_or_else(|| {
            SyncError::Credential("no authenticated session is available".to_string())
        })
    }

    /// Adds every identifier in `path` to the acting account's list `list_name`.
    ///
    /// The first failing line aborts the run; records written before it stay.
    pub async fn add_file_to_list(
        &self,
        list_name: &str,
        path: &Path,
        policy: DuplicatePolicy,
    ) -> Result<AddReport> {
        if !path.exists() {
            return Err(SyncError::MissingInput(path.to_path_buf()));
        }
        let session = self.acting_session()?;

        let list_uri = ListResolver::new(&self.service, self.config.page_limit)
            .resolve(&session.handle, list_name)
            .await?;
        let identifiers = IdentifierResolver::new(&self.service);
        let mut writer = MembershipWriter::new(&self.service, session.did.as_str(), list_uri.as_str());

        let mut existing = match policy {
            DuplicatePolicy::AllowDuplicates => HashSet::new(),
            DuplicatePolicy::SkipExisting => writer.existing_members(self.config.page_limit).await?,
        };

        let mut report = AddReport {
            list_uri: list_uri.clone(),
            ..Default::default()
        };

        let reader = BufReader::new(File::open(path)?);
        for line in reader.lines() {
            let line = line?;
            let Some(did) = identifiers.normalize(&line).await? else {
                report.skipped_blank += 1;
                continue;
            };

            if policy == DuplicatePolicy::SkipExisting && !existing.insert(did.clone()) {
                report.skipped_existing += 1;
                continue;
            }

            writer.add(&did).await?;
            report.added += 1;
        }

        info!(
            "Added {} entries to {} ({} blank, {} already present)",
            report.added, list_uri, report.skipped_blank, report.skipped_existing
        );
        Ok(report)
    }

    /// Writes the DIDs of every member of `owner`'s list `list_name` to `path`.
    pub async fn backup_list(&self, owner: &str, list_name: &str, path: &Path) -> Result<FetchReport> {
        let list_uri = ListResolver::new(&self.service, self.config.page_limit)
            .resolve(owner, list_name)
            .await?;

        let service = &self.service;
        let limit = self.config.page_limit;
        let members = paginate(
            |cursor| service.get_list_page(&list_uri, cursor, limit),
            |member| member.subject.did,
        );

        let written = write_lines(members, path).await?;
        Ok(FetchReport {
            source: format!("list '{}' of {}", list_name, owner),
            output: path.display().to_string(),
            written,
        })
    }

    /// Writes the DIDs of every follower of `actor` to `path`.
    pub async fn fetch_followers(&self, actor: &str, path: &Path) -> Result<FetchReport> {
        let service = &self.service;
        let limit = self.config.page_limit;
        let followers = paginate(
            |cursor| service.get_followers_page(actor, cursor, limit),
            |follower| follower.did,
        );

        let written = write_lines(followers, path).await?;
        Ok(FetchReport {
            source: format!("followers of {}", actor),
            output: path.display().to_string(),
            written,
        })
    }

    /// Writes the DIDs of every account that liked the post at `post_url` to `path`.
    pub async fn fetch_likes(&self, post_url: &str, path: &Path) -> Result<FetchReport> {
        let post = PostReferenceParser::new(&self.service).parse(post_url).await?;
        info!("Fetching likes of {}", post);

        let service = &self.service;
        let limit = self.config.page_limit;
        let likers = paginate(
            |cursor| service.get_likes_page(&post, cursor, limit),
            |like| like.actor.did,
        );

        let written = write_lines(likers, path).await?;
        Ok(FetchReport {
            source: format!("likes of {}", post),
            output: path.display().to_string(),
            written,
        })
    }
}

/// Truncates `path` and writes each item on its own line as soon as it arrives.
async fn write_lines<St>(items: St, path: &Path) -> Result<u32>
where
    St: Stream<Item = Result<String>>,
{
    let mut out = LineWriter::new(File::create(path)?);
    let mut items = pin!(items);
    let mut written = 0;

    while let Some(item) = items.try_next().await? {
        writeln!(out, "{}", item)?;
        written += 1;
    }
    out.flush()?;

    info!("Wrote {} lines to {}", written, path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dids, MockService};
    use std::fs;

    fn token_store(dir: &tempfile::TempDir) -> SessionStore {
        let store = SessionStore::new(dir.path().join(".bsky.token"));
        let cached = Session {
            handle: "owner.example".to_string(),
            did: "did:plc:owner".to_string(),
            access_jwt: "access".to_string(),
            refresh_jwt: "refresh".to_string(),
        };
        store.persist(&cached).unwrap();
        store
    }

    fn saved_session(store: &SessionStore) -> Session {
        Session::from_token(&store.load().unwrap().unwrap()).unwrap()
    }

    async fn logged_in(service: MockService) -> ListSync<MockService> {
        let mut service = service;
        service
            .create_session("owner.example", "pw")
            .await
            .unwrap();
        ListSync::new(service, ServiceConfig::default())
    }

    #[tokio::test]
    async fn test_login_saves_rotated_token_before_any_command() {
        let dir = tempfile::tempdir().unwrap();
        let store = token_store(&dir);

        let sync = ListSync::login(
            MockService::new(),
            ServiceConfig::default(),
            &store,
            &Credentials::default(),
        )
        .await
        .unwrap();

        assert_eq!(saved_session(&store).refresh_jwt, "refresh-rotated");
        assert_eq!(sync.service().calls(), vec!["resume_session owner.example"]);
    }

    #[tokio::test]
    async fn test_login_without_credentials_writes_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join(".bsky.token"));

        let result = ListSync::login(
            MockService::new(),
            ServiceConfig::default(),
            &store,
            &Credentials::new(Some("owner.example".to_string()), None),
        )
        .await;

        assert!(matches!(result, Err(SyncError::Credential(_))));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_finish_saves_token_after_successful_command() {
        let dir = tempfile::tempdir().unwrap();
        let store = token_store(&dir);
        let output = dir.path().join("followers.txt");
        let service = MockService::new().with_followers("alice.example", dids("f", 3));
        let sync = ListSync::login(service, ServiceConfig::default(), &store, &Credentials::default())
            .await
            .unwrap();
        fs::write(store.path(), "stale").unwrap();

        let outcome = sync.fetch_followers("alice.example", &output).await;
        let report = sync.finish(&store, outcome).unwrap();

        assert_eq!(report.written, 3);
        assert_eq!(saved_session(&store).refresh_jwt, "refresh-rotated");
    }

    #[tokio::test]
    async fn test_finish_saves_token_after_failed_command() {
        let dir = tempfile::tempdir().unwrap();
        let store = token_store(&dir);
        let output = dir.path().join("backup.txt");
        let sync = ListSync::login(
            MockService::new(),
            ServiceConfig::default(),
            &store,
            &Credentials::default(),
        )
        .await
        .unwrap();
        fs::write(store.path(), "stale").unwrap();

        let outcome = sync.backup_list("owner.example", "Missing", &output).await;
        let err = sync.finish(&store, outcome).unwrap_err();

        assert!(matches!(err, SyncError::ListNotFound { .. }));
        assert_eq!(saved_session(&store).refresh_jwt, "refresh-rotated");
    }

    #[tokio::test]
    async fn test_failed_page_leaves_written_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("followers.txt");
        let mut service = MockService::new()
            .with_followers("alice.example", dids("f", 5))
            .failing_page("2");
        service.create_session("owner.example", "pw").await.unwrap();
        let config = ServiceConfig {
            page_limit: 2,
            ..Default::default()
        };
        let sync = ListSync::new(service, config);

        let err = sync
            .fetch_followers("alice.example", &output)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Transport(_)));
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "did:plc:f0\ndid:plc:f1\n"
        );
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_add_file_normalizes_each_line() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("handles.txt");
        fs::write(&input, "@alice.example\n\ndid:plc:abc\n   \nbob.example\n").unwrap();

        let service = MockService::new()
            .with_list("Hatespam", "at://list/1", "owner.example")
            .with_handle("alice.example", "did:plc:alice")
            .with_handle("bob.example", "did:plc:bob");
        let sync = logged_in(service).await;

        let report = sync
            .add_file_to_list("Hatespam", &input, DuplicatePolicy::AllowDuplicates)
            .await
            .unwrap();

        assert_eq!(report.added, 3);
        assert_eq!(report.skipped_blank, 2);
        let subjects: Vec<String> = sync
            .service()
            .created()
            .into_iter()
            .map(|(repo, record)| {
                assert_eq!(repo, "did:plc:owner");
                assert_eq!(record.list, "at://list/1");
                record.subject
            })
            .collect();
        assert_eq!(subjects, vec!["did:plc:alice", "did:plc:abc", "did:plc:bob"]);
    }

    #[tokio::test]
    async fn test_add_missing_file_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let sync = logged_in(MockService::new()).await;

        let err = sync
            .add_file_to_list("Hatespam", &dir.path().join("nope.txt"), DuplicatePolicy::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::MissingInput(_)));
        assert_eq!(sync.service().calls(), vec!["create_session owner.example"]);
    }

    #[tokio::test]
    async fn test_add_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dids.txt");
        fs::write(&input, "did:plc:a\ndid:plc:bad\ndid:plc:c\n").unwrap();

        let service = MockService::new()
            .with_list("Hatespam", "at://list/1", "owner.example")
            .failing_on("did:plc:bad");
        let sync = logged_in(service).await;

        let err = sync
            .add_file_to_list("Hatespam", &input, DuplicatePolicy::AllowDuplicates)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Transport(_)));
        let created = sync.service().created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].1.subject, "did:plc:a");
        assert_eq!(sync.service().calls_starting_with("create_list_item"), 2);
    }

    #[tokio::test]
    async fn test_add_unknown_list_is_list_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dids.txt");
        fs::write(&input, "did:plc:a\n").unwrap();
        let sync = logged_in(MockService::new()).await;

        let err = sync
            .add_file_to_list("Hatespam", &input, DuplicatePolicy::AllowDuplicates)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ListNotFound { .. }));
    }

    #[tokio::test]
    async fn test_add_without_session_is_credential_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dids.txt");
        fs::write(&input, "did:plc:a\n").unwrap();
        let sync = ListSync::new(MockService::new(), ServiceConfig::default());

        let err = sync
            .add_file_to_list("Hatespam", &input, DuplicatePolicy::AllowDuplicates)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Credential(_)));
    }

    #[tokio::test]
    async fn test_skip_existing_policy() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dids.txt");
        fs::write(&input, "did:plc:m0\ndid:plc:new\ndid:plc:new\n").unwrap();

        let service = MockService::new()
            .with_list("Hatespam", "at://list/1", "owner.example")
            .with_members("at://list/1", dids("m", 3));
        let sync = logged_in(service).await;

        let report = sync
            .add_file_to_list("Hatespam", &input, DuplicatePolicy::SkipExisting)
            .await
            .unwrap();

        assert_eq!(report.added, 1);
        assert_eq!(report.skipped_existing, 2);
        assert_eq!(sync.service().created()[0].1.subject, "did:plc:new");
    }

    #[tokio::test]
    async fn test_backup_list_streams_members() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("backup.txt");
        fs::write(&output, "stale content that must disappear\n".repeat(500)).unwrap();

        let members = dids("m", 230);
        let service = MockService::new()
            .with_list("Friends", "at://list/2", "alice.example")
            .with_members("at://list/2", members.clone());
        let sync = logged_in(service).await;

        let report = sync
            .backup_list("alice.example", "Friends", &output)
            .await
            .unwrap();

        assert_eq!(report.written, 230);
        assert_eq!(read_lines(&output), members);
        assert!(fs::read_to_string(&output).unwrap().ends_with('\n'));
        assert_eq!(sync.service().calls_starting_with("get_list_page"), 3);
    }

    #[tokio::test]
    async fn test_fetch_followers_writes_one_did_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("followers.txt");
        let followers = dids("f", 101);
        let service = MockService::new().with_followers("alice.example", followers.clone());
        let sync = logged_in(service).await;

        let report = sync.fetch_followers("alice.example", &output).await.unwrap();

        assert_eq!(report.written, 101);
        assert_eq!(read_lines(&output), followers);
    }

    #[tokio::test]
    async fn test_fetch_followers_of_nobody_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("followers.txt");
        let sync = logged_in(MockService::new()).await;

        let report = sync.fetch_followers("alice.example", &output).await.unwrap();

        assert_eq!(report.written, 0);
        assert_eq!(fs::read_to_string(&output).unwrap(), "");
    }

    #[tokio::test]
    async fn test_fetch_likes_resolves_post_url() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("likes.txt");
        let likers = dids("l", 5);
        let service = MockService::new()
            .with_handle("alice.example", "did:plc:x")
            .with_likes("at://did:plc:x/app.bsky.feed.post/rkey123", likers.clone());
        let sync = logged_in(service).await;

        let report = sync
            .fetch_likes("https://bsky.app/profile/alice.example/post/rkey123", &output)
            .await
            .unwrap();

        assert_eq!(report.written, 5);
        assert_eq!(read_lines(&output), likers);
    }

    #[tokio::test]
    async fn test_fetch_likes_with_malformed_url_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("likes.txt");
        let sync = logged_in(MockService::new()).await;

        let err = sync
            .fetch_likes("https://bsky.app/profile", &output)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::MalformedUrl(_)));
        assert!(!output.exists());
    }
}
