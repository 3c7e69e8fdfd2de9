// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Range filtering and sorting over a dataset.

use crate::types::{Dataset, DatasetQuery, Range, Record, SortOrder, CALENDAR_YEAR, DATE_COLUMN};
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

/// Failures while filtering or sorting.
#[derive(Debug, Error, PartialEq)]
pub enum DatasetError {
    /// No record carries the requested column.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// Some records carry the column, this one does not.
    #[error("Record {index} has no field '{field}'")]
    MissingField { index: usize, field: String },

    /// The field exists but cannot be compared the way the query needs.
    #[error("Record {index} field '{field}' is not comparable: {value}")]
    Incomparable {
        index: usize,
        field: String,
        value: String,
    },
}

/// Apply the query's filter and then its sort.
pub fn apply(dataset: Dataset, query: &DatasetQuery) -> Result<Dataset, DatasetError> {
    let Some(column) = query.column.as_deref() else {
        return Ok(dataset);
    };

    let mut dataset = match query.range {
        Some(range) => filter(dataset, column, range)?,
        None => dataset,
    };

    if let Some(order) = query.order {
        sort(&mut dataset, column, order)?;
    }

    Ok(dataset)
}

/// Keep the records whose value lies within `range`, in their original order.
///
/// The `date` column is read from `calendarYear`.
pub fn filter(dataset: Dataset, column: &str, range: Range) -> Result<Dataset, DatasetError> {
    let field = if column == DATE_COLUMN { CALENDAR_YEAR } else { column };
    ensure_known(&dataset, field)?;

    let mut kept = Vec::with_capacity(dataset.len());
    for (index, record) in dataset.into_iter().enumerate() {
        let in_range = match numeric_field(&record, field, index)? {
            Numeric::Int(value) => range.contains_int(value),
            Numeric::Float(value) => range.contains(value),
        };
        if in_range {
            kept.push(record);
        }
    }
    Ok(kept)
}

/// Stable sort on `column`. Equal values keep their relative order in
/// both directions.
pub fn sort(dataset: &mut Dataset, column: &str, order: SortOrder) -> Result<(), DatasetError> {
    ensure_known(dataset, column)?;

    let mut keys = Vec::with_capacity(dataset.len());
    for (index, record) in dataset.iter().enumerate() {
        keys.push(SortKey::from_field(record, column, index)?);
    }

    // Mixed numbers and strings have no meaningful order.
    if let Some(index) = keys.iter().position(|k| !k.same_kind(&keys[0])) {
        return Err(DatasetError::Incomparable {
            index,
            field: column.to_string(),
            value: dataset[index][column].to_string(),
        });
    }

    let mut keyed: Vec<(SortKey, Record)> = keys.into_iter().zip(dataset.drain(..)).collect();
    match order {
        SortOrder::Ascending => keyed.sort_by(|a, b| a.0.compare(&b.0)),
        SortOrder::Descending => keyed.sort_by(|a, b| b.0.compare(&a.0)),
    }
    dataset.extend(keyed.into_iter().map(|(_, record)| record));
    Ok(())
}

/// An empty dataset has no columns to check against.
fn ensure_known(dataset: &Dataset, field: &str) -> Result<(), DatasetError> {
    if !dataset.is_empty() && !dataset.iter().any(|r| r.contains_key(field)) {
        return Err(DatasetError::UnknownColumn(field.to_string()));
    }
    Ok(())
}

/// A field value ready for range comparison. Integers stay exact.
enum Numeric {
    Int(i64),
    Float(f64),
}

fn numeric_field(record: &Record, field: &str, index: usize) -> Result<Numeric, DatasetError> {
    let value = record.get(field).ok_or_else(|| DatasetError::MissingField {
        index,
        field: field.to_string(),
    })?;

    let number = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Numeric::Int(i)),
            None => n.as_f64().map(Numeric::Float),
        },
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Some(Numeric::Int(i)),
                Err(_) => s.parse::<f64>().ok().map(Numeric::Float),
            }
        }
        _ => None,
    };

    match number {
        Some(Numeric::Float(f)) if !f.is_finite() => None,
        other => other,
    }
    .ok_or_else(|| DatasetError::Incomparable {
        index,
        field: field.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug)]
enum SortKey {
    Number(f64),
    Text(String),
}

impl SortKey {
    fn from_field(record: &Record, field: &str, index: usize) -> Result<Self, DatasetError> {
        match record.get(field) {
            Some(Value::Number(n)) => n.as_f64().map(SortKey::Number).ok_or_else(|| {
                DatasetError::Incomparable {
                    index,
                    field: field.to_string(),
                    value: n.to_string(),
                }
            }),
            Some(Value::String(s)) => Ok(SortKey::Text(s.clone())),
            Some(other) => Err(DatasetError::Incomparable {
                index,
                field: field.to_string(),
                value: other.to_string(),
            }),
            None => Err(DatasetError::MissingField {
                index,
                field: field.to_string(),
            }),
        }
    }

    fn same_kind(&self, other: &SortKey) -> bool {
        matches!(
            (self, other),
            (SortKey::Number(_), SortKey::Number(_)) | (SortKey::Text(_), SortKey::Text(_))
        )
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            // Kinds are checked before sorting.
            (SortKey::Number(_), SortKey::Text(_)) => Ordering::Less,
            (SortKey::Text(_), SortKey::Number(_)) => Ordering::Greater,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dataset(value: Value) -> Dataset {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> Dataset {
        dataset(json!([
            {"calendarYear": "2020", "revenue": 100},
            {"calendarYear": "2021", "revenue": 50}
        ]))
    }

    fn statements() -> Dataset {
        dataset(json!([
            {"date": "2023-09-30", "calendarYear": "2023", "revenue": 383285000000_i64, "netIncome": 96995000000_i64, "eps": 6.16},
            {"date": "2022-09-24", "calendarYear": "2022", "revenue": 394328000000_i64, "netIncome": 99803000000_i64, "eps": 6.15},
            {"date": "2021-09-25", "calendarYear": "2021", "revenue": 365817000000_i64, "netIncome": 94680000000_i64, "eps": 5.67},
            {"date": "2020-09-26", "calendarYear": "2020", "revenue": 274515000000_i64, "netIncome": 57411000000_i64, "eps": 3.31},
            {"date": "2019-09-28", "calendarYear": "2019", "revenue": 260174000000_i64, "netIncome": 55256000000_i64, "eps": 2.99}
        ]))
    }

    fn years(dataset: &Dataset) -> Vec<&str> {
        dataset
            .iter()
            .map(|r| r[CALENDAR_YEAR].as_str().unwrap())
            .collect()
    }

    fn query(column: &str, range: Option<(i64, i64)>, order: Option<SortOrder>) -> DatasetQuery {
        DatasetQuery {
            column: Some(column.to_string()),
            range: range.map(|(min, max)| Range { min, max }),
            order,
        }
    }

    #[test]
    fn test_filter_by_date_uses_calendar_year() {
        let result = apply(sample(), &query("date", Some((2021, 2021)), None)).unwrap();
        assert_eq!(result, dataset(json!([{"calendarYear": "2021", "revenue": 50}])));
    }

    #[test]
    fn test_sort_revenue_ascending() {
        let result = apply(sample(), &query("revenue", None, Some(SortOrder::Ascending))).unwrap();
        let revenues: Vec<i64> = result.iter().map(|r| r["revenue"].as_i64().unwrap()).collect();
        assert_eq!(revenues, vec![50, 100]);
    }

    #[test]
    fn test_passthrough_without_column() {
        let query = DatasetQuery {
            column: None,
            range: None,
            order: None,
        };
        assert_eq!(apply(statements(), &query).unwrap(), statements());
    }

    #[test]
    fn test_filter_inclusive_and_order_preserving() {
        let result = filter(statements(), "date", Range { min: 2020, max: 2022 }).unwrap();
        assert_eq!(years(&result), vec!["2022", "2021", "2020"]);
    }

    #[test]
    fn test_filter_numeric_column() {
        let range = Range {
            min: 90_000_000_000,
            max: 97_000_000_000,
        };
        let result = filter(statements(), "netIncome", range).unwrap();
        assert_eq!(years(&result), vec!["2023", "2021"]);
    }

    #[test]
    fn test_filter_float_column() {
        let result = filter(statements(), "eps", Range { min: 3, max: 6 }).unwrap();
        assert_eq!(years(&result), vec!["2021", "2020"]);
    }

    #[test]
    fn test_filter_large_integers_exact() {
        let big = (1_i64 << 53) + 1;
        let input = dataset(json!([
            {"id": 1, "revenue": big - 1},
            {"id": 2, "revenue": big},
            {"id": 3, "revenue": big.to_string()}
        ]));
        let result = filter(input, "revenue", Range { min: big, max: big }).unwrap();
        let ids: Vec<i64> = result.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_filter_idempotent() {
        let range = Range { min: 2020, max: 2022 };
        let once = filter(statements(), "date", range).unwrap();
        let twice = filter(once.clone(), "date", range).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_inverted_range_is_empty() {
        let result = filter(statements(), "date", Range { min: 2022, max: 2020 }).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_sort_descending() {
        let mut data = statements();
        sort(&mut data, "revenue", SortOrder::Descending).unwrap();
        assert_eq!(years(&data), vec!["2022", "2023", "2021", "2020", "2019"]);
    }

    #[test]
    fn test_sort_by_date_string() {
        let mut data = statements();
        sort(&mut data, "date", SortOrder::Ascending).unwrap();
        assert_eq!(years(&data), vec!["2019", "2020", "2021", "2022", "2023"]);
    }

    #[test]
    fn test_sort_stable_both_directions() {
        let input = dataset(json!([
            {"id": 1, "revenue": 10},
            {"id": 2, "revenue": 20},
            {"id": 3, "revenue": 10},
            {"id": 4, "revenue": 20}
        ]));
        let ids = |d: &Dataset| d.iter().map(|r| r["id"].as_i64().unwrap()).collect::<Vec<_>>();

        let mut asc = input.clone();
        sort(&mut asc, "revenue", SortOrder::Ascending).unwrap();
        assert_eq!(ids(&asc), vec![1, 3, 2, 4]);

        let mut desc = input;
        sort(&mut desc, "revenue", SortOrder::Descending).unwrap();
        assert_eq!(ids(&desc), vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_sort_idempotent() {
        let mut once = statements();
        sort(&mut once, "netIncome", SortOrder::Ascending).unwrap();
        let mut twice = once.clone();
        sort(&mut twice, "netIncome", SortOrder::Ascending).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_then_sort_matches_sorting_prefiltered() {
        let q = query("date", Some((2020, 2022)), Some(SortOrder::Ascending));
        let combined = apply(statements(), &q).unwrap();

        let mut prefiltered = filter(statements(), "date", Range { min: 2020, max: 2022 }).unwrap();
        sort(&mut prefiltered, "date", SortOrder::Ascending).unwrap();
        assert_eq!(combined, prefiltered);
        assert_eq!(years(&combined), vec!["2020", "2021", "2022"]);
    }

    #[test]
    fn test_unknown_column() {
        let err = filter(statements(), "ebitdaMargin", Range { min: 0, max: 1 }).unwrap_err();
        assert_eq!(err, DatasetError::UnknownColumn("ebitdaMargin".into()));

        let mut data = statements();
        let err = sort(&mut data, "ebitdaMargin", SortOrder::Ascending).unwrap_err();
        assert_eq!(err, DatasetError::UnknownColumn("ebitdaMargin".into()));
    }

    #[test]
    fn test_missing_field_in_some_records() {
        let input = dataset(json!([
            {"calendarYear": "2021", "revenue": 50},
            {"calendarYear": "2020"}
        ]));
        let err = filter(input, "revenue", Range { min: 0, max: 100 }).unwrap_err();
        assert_eq!(
            err,
            DatasetError::MissingField {
                index: 1,
                field: "revenue".into()
            }
        );
    }

    #[test]
    fn test_non_numeric_filter_value() {
        let input = dataset(json!([{"calendarYear": "n/a", "revenue": 50}]));
        let err = filter(input, "date", Range { min: 2000, max: 2030 }).unwrap_err();
        assert!(matches!(err, DatasetError::Incomparable { index: 0, .. }));
    }

    #[test]
    fn test_mixed_sort_keys_rejected() {
        let mut input = dataset(json!([
            {"revenue": 50},
            {"revenue": "100"}
        ]));
        let err = sort(&mut input, "revenue", SortOrder::Ascending).unwrap_err();
        assert!(matches!(err, DatasetError::Incomparable { index: 1, .. }));
    }

    #[test]
    fn test_empty_dataset() {
        let q = query("revenue", Some((0, 1)), Some(SortOrder::Descending));
        assert!(apply(Vec::new(), &q).unwrap().is_empty());
    }
}
