// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service modules for fetching, caching and shaping statements.

pub mod cache;
pub mod query;
pub mod upstream;

pub use cache::ResponseCache;
pub use query::DatasetError;
pub use upstream::{UpstreamClient, UpstreamError};
