// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Driver for paged ledger queries.
//!
//! Transport, retries and query shapes belong to the [PageFetcher] implementation. This module
//! only decides when to request another page and how pages of one entity are merged.

use std::collections::BTreeMap;

use anyhow::Context;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::{future::try_join_all, pin_mut, Stream, TryStreamExt};

/// A decoded page holding one or more paginated lists.
pub trait Paginated: Sized {
    /// Length of each paginated list in this page.
    fn page_lengths(&self) -> Vec<usize>;

    /// Append the lists of `next` after the lists of `self`.
    fn merge(self, next: Self) -> Self;
}

/// True when any paginated list filled the page, meaning more items may follow.
pub fn should_fetch_more<P: Paginated>(page: &P, limit: usize) -> bool {
    page.page_lengths().iter().any(|len| *len == limit)
}

/// Source of decoded pages for one logical entity.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    type Page: Paginated + Send;

    async fn fetch_page(&self, skip: usize, limit: usize) -> anyhow::Result<Self::Page>;
}

/// Stream pages in fetch order until [should_fetch_more] is false.
pub fn paginate<'a, F>(
    fetcher: &'a F,
    limit: usize,
) -> impl Stream<Item = anyhow::Result<F::Page>> + 'a
where
    F: PageFetcher,
    F::Page: 'a,
{
    try_stream! {
        if limit == 0 {
            Err::<(), _>(anyhow::anyhow!("Page limit must be positive"))?;
        }
        let mut skip = 0;
        loop {
            let page = fetcher
                .fetch_page(skip, limit)
                .await
                .with_context(|| format!("Failed to fetch page at offset {skip}"))?;
            let more = should_fetch_more(&page, limit);
            yield page;
            if !more {
                break;
            }
            skip += limit;
        }
    }
}

/// Drive [paginate] to exhaustion and merge every page into one.
pub async fn fetch_all<F: PageFetcher>(fetcher: &F, limit: usize) -> anyhow::Result<F::Page> {
    let pages = paginate(fetcher, limit);
    pin_mut!(pages);

    let mut merged: Option<F::Page> = None;
    let mut count = 0usize;
    while let Some(page) = pages.try_next().await? {
        count += 1;
        merged = Some(match merged {
            Some(acc) => acc.merge(page),
            None => page,
        });
    }
    tracing::debug!("Fetched {} pages", count);

    merged.context("Fetcher returned no pages")
}

/// Fetch several independent entities concurrently, keyed by entity.
///
/// Any failure aborts the whole fetch; a partial result is never returned.
pub async fn fetch_all_keyed<K, F>(
    fetchers: &[(K, F)],
    limit: usize,
) -> anyhow::Result<BTreeMap<K, F::Page>>
where
    K: Ord + Clone + Send + Sync + std::fmt::Debug,
    F: PageFetcher,
{
    let results = try_join_all(fetchers.iter().map(|(key, fetcher)| async move {
        let page =
            fetch_all(fetcher, limit).await.with_context(|| format!("Failed to fetch {key:?}"))?;
        Ok::<_, anyhow::Error>((key.clone(), page))
    }))
    .await?;

    Ok(results.into_iter().collect())
}

/// Union pages by key. Pages sharing a key are appended in arrival order.
pub fn merge_pages<K: Ord, P: Paginated>(
    pages: impl IntoIterator<Item = (K, P)>,
) -> BTreeMap<K, P> {
    let mut merged: BTreeMap<K, P> = BTreeMap::new();
    for (key, page) in pages {
        let page = match merged.remove(&key) {
            Some(existing) => existing.merge(page),
            None => page,
        };
        merged.insert(key, page);
    }
    merged
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct NumbersPage {
        evens: Vec<u64>,
        odds: Vec<u64>,
    }

    impl Paginated for NumbersPage {
        fn page_lengths(&self) -> Vec<usize> {
            vec![self.evens.len(), self.odds.len()]
        }

        fn merge(mut self, next: Self) -> Self {
            self.evens.extend(next.evens);
            self.odds.extend(next.odds);
            self
        }
    }

    struct NumbersFetcher {
        evens: Vec<u64>,
        odds: Vec<u64>,
        calls: AtomicUsize,
        fail_at: Option<usize>,
    }

    impl NumbersFetcher {
        fn new(evens: usize, odds: usize) -> Self {
            Self {
                evens: (0..evens as u64).map(|i| i * 2).collect(),
                odds: (0..odds as u64).map(|i| i * 2 + 1).collect(),
                calls: AtomicUsize::new(0),
                fail_at: None,
            }
        }
    }

    fn window(items: &[u64], skip: usize, limit: usize) -> Vec<u64> {
        items.iter().skip(skip).take(limit).copied().collect()
    }

    #[async_trait]
    impl PageFetcher for NumbersFetcher {
        type Page = NumbersPage;

        async fn fetch_page(&self, skip: usize, limit: usize) -> anyhow::Result<NumbersPage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(call) {
                anyhow::bail!("upstream unavailable");
            }
            Ok(NumbersPage {
                evens: window(&self.evens, skip, limit),
                odds: window(&self.odds, skip, limit),
            })
        }
    }

    #[test]
    fn test_should_fetch_more() {
        let page = NumbersPage { evens: vec![0, 2], odds: vec![1] };
        assert!(should_fetch_more(&page, 2));
        assert!(!should_fetch_more(&page, 3));
        assert!(!should_fetch_more(&NumbersPage::default(), 2));
    }

    #[tokio::test]
    async fn test_fetch_all_merges_pages_in_order() {
        let fetcher = NumbersFetcher::new(5, 2);
        let page = fetch_all(&fetcher, 2).await.unwrap();
        assert_eq!(page.evens, vec![0, 2, 4, 6, 8]);
        assert_eq!(page.odds, vec![1, 3]);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exact_multiple_fetches_one_empty_page() {
        let fetcher = NumbersFetcher::new(4, 0);
        let page = fetch_all(&fetcher, 2).await.unwrap();
        assert_eq!(page.evens.len(), 4);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let mut fetcher = NumbersFetcher::new(10, 0);
        fetcher.fail_at = Some(1);
        let err = fetch_all(&fetcher, 2).await.unwrap_err();
        assert!(format!("{err:#}").contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn test_zero_limit_is_rejected() {
        let fetcher = NumbersFetcher::new(1, 1);
        assert!(fetch_all(&fetcher, 0).await.is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_all_keyed() {
        let fetchers = vec![("b", NumbersFetcher::new(3, 1)), ("a", NumbersFetcher::new(0, 1))];
        let pages = fetch_all_keyed(&fetchers, 2).await.unwrap();
        assert_eq!(pages.keys().copied().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(pages["b"].evens, vec![0, 2, 4]);
        assert_eq!(pages["a"].odds, vec![1]);
    }

    #[test]
    fn test_merge_pages_appends_same_key() {
        let pages = vec![
            ("x", NumbersPage { evens: vec![0], odds: vec![] }),
            ("y", NumbersPage { evens: vec![10], odds: vec![] }),
            ("x", NumbersPage { evens: vec![2], odds: vec![1] }),
        ];
        let merged = merge_pages(pages);
        assert_eq!(merged["x"], NumbersPage { evens: vec![0, 2], odds: vec![1] });
        assert_eq!(merged["y"].evens, vec![10]);
    }
}
