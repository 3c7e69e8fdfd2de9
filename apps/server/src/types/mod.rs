// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type definitions for records and request parameters.

mod query;
mod record;

pub use query::{DatasetQuery, QueryError, Range, RawQuery, SortOrder};
pub use record::{Dataset, Record, CALENDAR_YEAR, DATE_COLUMN};
