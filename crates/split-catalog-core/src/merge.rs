//! Result merging for real-time gets fanned out across collections.
//!
//! When a real-time get cannot go through the alias, the router queries
//! every collection separately and folds the sub-responses into one:
//!
//! 1. Concatenate every collection's results.
//! 2. Stable-sort with [`compare_relevance`]: unscored results last,
//!    scored results ascending by score.
//! 3. Skip the caller's `start` offset, then truncate to the page size.
//! 4. Report `hits` as the plain sum of each collection's hits. Nothing is
//!    deduplicated, since ids are unique catalog-wide.

use std::cmp::Ordering;

use crate::models::ScoredMetacard;
use crate::operations::{merge_properties, SourceResponse};

/// Unscored results sort after scored ones; scored results ascend.
pub fn compare_relevance(a: &ScoredMetacard, b: &ScoredMetacard) -> Ordering {
    match (a.relevance, b.relevance) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Fold per-collection responses into one page of at most `page_size`
/// results, starting `start` results into the merged order.
///
/// Each response must hold its collection's first `start + page_size`
/// results for the page to be exact.
pub fn merge_by_relevance(
    responses: Vec<SourceResponse>,
    start: usize,
    page_size: usize,
) -> SourceResponse {
    let mut merged = SourceResponse::default();

    for resp in responses {
        merged.hits += resp.hits;
        merge_properties(&mut merged.properties, &resp.properties);
        merged.processing_errors.extend(resp.processing_errors);
        merged.results.extend(resp.results);
    }

    merged.results.sort_by(compare_relevance);
    merged.results = merged
        .results
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();
    merged
}
