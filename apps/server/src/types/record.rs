// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Income statement records as returned by the upstream API.

use serde_json::{Map, Value};

/// One annual income-statement entry, field name to value.
///
/// Fields are passed through untouched; only `calendarYear` and the
/// column being filtered or sorted on are ever inspected.
pub type Record = Map<String, Value>;

/// Records in upstream order.
pub type Dataset = Vec<Record>;

/// Field holding the string-encoded fiscal year.
pub const CALENDAR_YEAR: &str = "calendarYear";

/// Column name that filters on [`CALENDAR_YEAR`] instead of itself.
pub const DATE_COLUMN: &str = "date";
