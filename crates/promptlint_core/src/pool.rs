//! Bounded concurrent execution.
//!
//! Backend calls are I/O bound, so the pool is a buffered stream of futures
//! on the caller's runtime rather than a set of worker threads.

use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream;

/// Runs `f` over `items` with at most `concurrency` futures in flight and
/// returns the outputs in input order.
///
/// Slots are released as soon as a future completes, so one slow item never
/// holds back the others. A `concurrency` of zero is treated as one. Callers
/// that want to reject zero must do so before calling.
pub async fn bounded_map<I, T, F, Fut>(items: I, concurrency: usize, mut f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    let mut indexed: Vec<(usize, T)> = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let fut = f(item);
            async move { (index, fut.await) }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    indexed.sort_unstable_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, output)| output).collect()
}
