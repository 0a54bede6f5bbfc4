//! Paged list queries
//!
//! The controller caps list responses, so large listings are fetched as a
//! sequence of small pages and exposed as one stream of items.

use futures::stream::{self, Stream, TryStreamExt};
use serde::Deserialize;
use std::future::Future;

/// Largest page requested from the controller
pub const MAX_QUERY_LIMIT: usize = 100;

/// Paging metadata of a list response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct QueryMeta {
    /// Items available on the controller
    pub total_count: u64,
    /// Page size used by the controller
    pub limit: u64,
    /// Offset of the first item in this page
    pub offset: u64,
}

/// One page of a list response
#[derive(Debug, Clone, Deserialize)]
pub struct QueryPage<T> {
    pub objects: Vec<T>,
    pub meta: QueryMeta,
}

/// Window requested for a single page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

/// Size of the first page requested when `limit` items are wanted
pub(crate) fn first_page_limit(limit: usize) -> usize {
    if limit == 0 {
        MAX_QUERY_LIMIT
    } else {
        limit.min(MAX_QUERY_LIMIT)
    }
}

struct PagerState<F> {
    fetch: F,
    offset: usize,
    /// Items still wanted; `None` means everything
    remaining: Option<usize>,
    done: bool,
}

/// Stream every item of a listing, `MAX_QUERY_LIMIT` items per request.
///
/// `limit == 0` means no limit. Fetching stops at the first short page or
/// once `limit` items were produced. Errors end the stream.
pub fn paginate<T, E, F, Fut>(fetch: F, offset: usize, limit: usize) -> impl Stream<Item = Result<T, E>>
where
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let state = PagerState {
        fetch,
        offset,
        remaining: (limit > 0).then_some(limit),
        done: false,
    };

    stream::try_unfold(state, |mut state| async move {
        if state.done {
            return Ok(None);
        }
        let page_limit = state
            .remaining
            .map_or(MAX_QUERY_LIMIT, |r| r.min(MAX_QUERY_LIMIT));
        if page_limit == 0 {
            return Ok(None);
        }

        let request = PageRequest {
            offset: state.offset,
            limit: page_limit,
        };
        let mut items = match (state.fetch)(request).await {
            Ok(items) => items,
            Err(e) => return Err(e),
        };
        tracing::debug!(offset = request.offset, limit = request.limit, received = items.len(), "Fetched page");

        state.offset += items.len();
        if items.len() < page_limit {
            state.done = true;
        }
        if let Some(remaining) = state.remaining.as_mut() {
            items.truncate(*remaining);
            *remaining -= items.len();
            if *remaining == 0 {
                state.done = true;
            }
        }

        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some((items, state)))
        }
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, E>)))
    .try_flatten()
}
