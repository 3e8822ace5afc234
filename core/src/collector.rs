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
use crate::models::CollectionPage;
use futures::stream::{self, Stream, TryStreamExt};
use log::debug;
use std::future::Future;

enum Position {
    Start,
    After(String),
    Exhausted,
}

/// Follows the cursors of a paginated endpoint and yields every item, projected.
///
/// `fetch_page` is first called without a cursor, then with whatever cursor the
/// previous page returned. The stream ends right after the first page that
/// carries no cursor, whether that page is full, partial or empty. Items come
/// out in server order. Nothing is fetched until the stream is polled, and
/// dropping it stops any further requests.
pub fn paginate<I, T, F, Fut, P>(
    fetch_page: F,
    mut project: P,
) -> impl Stream<Item = Result<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<CollectionPage<I>>>,
    P: FnMut(I) -> T,
{
    let pages = stream::try_unfold(
        (fetch_page, Position::Start, 0usize),
        |(mut fetch_page, position, fetched)| async move {
            let cursor = match position {
                Position::Start => None,
                Position::After(cursor) => Some(cursor),
                Position::Exhausted => return Ok::<_, SyncError>(None),
            };

            let page = fetch_page(cursor).await?;
            debug!(
                "Page {} returned {} items (more: {})",
                fetched + 1,
                page.items.len(),
                page.cursor.is_some()
            );

            let next = match page.cursor {
                Some(cursor) => Position::After(cursor),
                None => Position::Exhausted,
            };
            Ok::<_, SyncError>(Some((page.items, (fetch_page, next, fetched + 1))))
        },
    );

    pages
        .map_ok(move |items| {
            let projected: Vec<T> = items.into_iter().map(&mut project).collect();
            stream::iter(projected.into_iter().map(Ok::<T, SyncError>))
        })
        .try_flatten()
}
