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

pub mod collector;
pub mod config;
pub mod error;
pub mod membership;
pub mod models;
pub mod post_ref;
pub mod resolver;
pub mod service;
pub mod session;
pub mod sync;
pub mod xrpc;

#[cfg(test)]
mod testing;

// Re-export key items for convenience
pub use config::{Credentials, ServiceConfig};
pub use error::{Result, SyncError};
pub use membership::DuplicatePolicy;
pub use models::{AddReport, FetchReport};
pub use service::GraphService;
pub use session::{authenticate, Session, SessionStore};
pub use sync::ListSync;
pub use xrpc::XrpcClient;
