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
use crate::error::Result;
use crate::models::MembershipRecord;
use crate::service::GraphService;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use futures::TryStreamExt;
use log::{debug, info};
use std::collections::HashSet;

/// Whether subjects already on the list are written again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Write every subject. Repeated runs create repeated records.
    #[default]
    AllowDuplicates,
    /// Fetch the current members first and skip anyone already present.
    SkipExisting,
}

/// Appends membership records to one list.
///
/// Each `add` is one write request; nothing checks whether the subject is
/// already a member. See [`DuplicatePolicy::SkipExisting`] and
/// [`MembershipWriter::existing_members`] for the opt-in alternative.
pub struct MembershipWriter<'a, S> {
    service: &'a S,
    repo: String,
    list: String,
    last_stamp: Option<DateTime<Utc>>,
}

impl<'a, S: GraphService> MembershipWriter<'a, S> {
    /// `repo` is the DID of the acting account, which owns the records.
    pub fn new(service: &'a S, repo: impl Into<String>, list: impl Into<String>) -> Self {
        Self {
            service,
            repo: repo.into(),
            list: list.into(),
            last_stamp: None,
        }
    }

    pub async fn add(&mut self, subject: &str) -> Result<MembershipRecord> {
        let record = MembershipRecord {
            list: self.list.clone(),
            subject: subject.to_string(),
            created_at: self.next_timestamp(),
        };
        self.service.create_list_item(&self.repo, &record).await?;
        debug!("Added {} to {}", subject, self.list);
        Ok(record)
    }

    /// DIDs currently on the list.
    pub async fn existing_members(&self, page_limit: u32) -> Result<HashSet<String>> {
        let service = self.service;
        let list = self.list.as_str();
        let members: HashSet<String> = paginate(
            |cursor| service.get_list_page(list, cursor, page_limit),
            |member| member.subject.did,
        )
        .try_collect()
        .await?;
        info!("{} already has {} members", self.list, members.len());
        Ok(members)
    }

    /// Current time, bumped so consecutive records never share a timestamp.
    fn next_timestamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_stamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}
