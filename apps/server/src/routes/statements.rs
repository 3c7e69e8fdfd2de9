// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Income statement endpoint.

use crate::error::ApiError;
use crate::services::{query, ResponseCache};
use crate::types::{Dataset, DatasetQuery, RawQuery};
use crate::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::Uri,
    Json,
};

/// GET / - Annual income statements, optionally filtered and sorted.
///
/// The query is validated before anything else, so malformed bounds never
/// cost an upstream call. Cache failures are logged and skipped.
pub async fn list(
    State(state): State<AppState>,
    uri: Uri,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<Dataset>, ApiError> {
    let Query(pairs) = pairs?;
    let params = DatasetQuery::try_from(pairs.into_iter().collect::<RawQuery>())?;
    let cache_key = ResponseCache::generate_key(uri.path(), &params);

    if let Some(cache) = &state.cache {
        match cache.get(&cache_key).await {
            Ok(Some(cached)) => {
                tracing::info!(cache_key = %cache_key, records = cached.len(), "Cache HIT");
                return Ok(Json(cached));
            }
            Ok(None) => tracing::debug!(cache_key = %cache_key, "Cache MISS"),
            Err(e) => tracing::warn!(error = %e, "Cache lookup failed, fetching upstream"),
        }
    }

    let dataset = state.upstream.fetch_annual().await?;
    let dataset = query::apply(dataset, &params)?;

    if let Some(cache) = &state.cache {
        if let Err(e) = cache.set(&cache_key, &dataset).await {
            tracing::warn!(error = %e, "Failed to cache result");
        }
    }

    Ok(Json(dataset))
}
