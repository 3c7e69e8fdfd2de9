// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Query parameters for the statements endpoint.

use std::fmt;
use thiserror::Error;

/// Query string as received, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    pub column: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub asc: Option<String>,
}

/// Builds from decoded `key=value` pairs. The first occurrence of a
/// repeated key wins; unrecognized keys are ignored.
impl FromIterator<(String, String)> for RawQuery {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut raw = RawQuery::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "column" => &mut raw.column,
                "min" => &mut raw.min,
                "max" => &mut raw.max,
                "asc" => &mut raw.asc,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        raw
    }
}

/// Rejected query parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("'{name}' must be an integer, got '{value}'")]
    NotAnInteger { name: &'static str, value: String },

    #[error("malformed query string: {0}")]
    Malformed(String),
}

/// Inclusive integer bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: i64,
    pub max: i64,
}

impl Range {
    /// Exact comparison for integer values.
    pub fn contains_int(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min as f64 <= value && value <= self.max as f64
    }
}

/// Sort direction derived from the `asc` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    /// `"true"` sorts ascending, `"false"` descending. Anything else is
    /// also descending.
    pub fn from_param(value: &str) -> Self {
        match value {
            "true" => SortOrder::Ascending,
            "false" => SortOrder::Descending,
            other => {
                tracing::debug!(asc = %other, "Unrecognized 'asc' value, sorting descending");
                SortOrder::Descending
            }
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Validated query: what to filter and sort on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetQuery {
    pub column: Option<String>,
    /// Present only when `column`, `min` and `max` all are.
    pub range: Option<Range>,
    /// Present only when `column` and `asc` both are.
    pub order: Option<SortOrder>,
}

impl DatasetQuery {
    /// True when the upstream dataset is returned untouched.
    pub fn is_passthrough(&self) -> bool {
        self.range.is_none() && self.order.is_none()
    }
}

impl TryFrom<RawQuery> for DatasetQuery {
    type Error = QueryError;

    fn try_from(raw: RawQuery) -> Result<Self, Self::Error> {
        let column = non_empty(raw.column);
        // Bounds are validated even when they would go unused.
        let min = non_empty(raw.min).map(|v| parse_bound("min", v)).transpose()?;
        let max = non_empty(raw.max).map(|v| parse_bound("max", v)).transpose()?;
        let asc = non_empty(raw.asc);

        let Some(column) = column else {
            return Ok(Self::default());
        };

        let range = match (min, max) {
            (Some(min), Some(max)) => Some(Range { min, max }),
            _ => None,
        };
        let order = asc.as_deref().map(SortOrder::from_param);

        Ok(Self {
            column: Some(column),
            range,
            order,
        })
    }
}

/// Canonical form: fixed parameter order, only the parts that affect the
/// result. Equivalent requests render identically.
impl fmt::Display for DatasetQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_passthrough() {
            return Ok(());
        }
        // Quoted and escaped, so a column cannot spell out other parameters.
        if let Some(column) = &self.column {
            write!(f, "column={:?}", column)?;
        }
        if let Some(range) = &self.range {
            write!(f, "&min={}&max={}", range.min, range.max)?;
        }
        if let Some(order) = self.order {
            write!(f, "&order={}", order.as_str())?;
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_bound(name: &'static str, value: String) -> Result<i64, QueryError> {
    value
        .trim()
        .parse()
        .map_err(|_| QueryError::NotAnInteger { name, value })
}
