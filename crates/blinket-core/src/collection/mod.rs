//! Fetch, cache and refresh of a filtered remote list.
//!
//! Every fetch is tagged with a sequence number. Only the response to the
//! newest issued fetch is applied; older responses that arrive later are
//! dropped. There is no cancellation: a superseded fetch runs to completion
//! and has no observable effect.

use std::fmt;
use std::future::Future;

use tokio::sync::watch;

use crate::error::{SyncError, SyncResult};

pub mod comments;
pub mod photos;

pub use comments::{CommentCollection, CommentThread};
pub use photos::{PhotoCollection, PhotoFeed, PhotoFilter};

/// Where optimistic inserts land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertAt {
    Head,
    Tail,
}

/// A list endpoint a [`RemoteCollection`] can pull from.
///
/// `fetch` is also the mapping step: items come back already shaped for
/// display, so consumers never re-derive fields.
pub trait CollectionSource: Send + Sync {
    type Item: Clone + Send + Sync + 'static;
    type Filter: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    fn fetch(
        &self,
        filter: &Self::Filter,
    ) -> impl Future<Output = SyncResult<Vec<Self::Item>>> + Send;

    fn insert_at(&self) -> InsertAt {
        InsertAt::Tail
    }
}

/// Observable state of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<T, F> {
    pub items: Vec<T>,
    pub filter: F,
    pub loading: bool,
    pub error: Option<SyncError>,
    /// Sequence number of the newest issued fetch.
    pub issued: u64,
    /// Sequence number `items` came from; 0 until a fetch succeeds.
    pub applied: u64,
}

/// What happened to a fetch once it resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// `items` now holds this response.
    Applied,
    /// The fetch failed; `error` is set and `items` kept.
    Failed(SyncError),
    /// A newer fetch was issued meanwhile; the response was dropped.
    Superseded,
    /// The filter was already current; nothing was fetched.
    Unchanged,
}

pub struct RemoteCollection<S: CollectionSource> {
    source: S,
    state: watch::Sender<CollectionState<S::Item, S::Filter>>,
}

impl<S: CollectionSource> fmt::Debug for RemoteCollection<S>
where
    S::Item: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCollection")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl<S: CollectionSource> RemoteCollection<S> {
    /// Creates an empty collection. Nothing is fetched until [`refresh`](Self::refresh)
    /// or [`set_filter`](Self::set_filter).
    pub fn new(source: S, filter: S::Filter) -> Self {
        let (state, _) = watch::channel(CollectionState {
            items: Vec::new(),
            filter,
            loading: false,
            error: None,
            issued: 0,
            applied: 0,
        });
        Self { source, state }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn snapshot(&self) -> CollectionState<S::Item, S::Filter> {
        self.state.borrow().clone()
    }

    pub fn items(&self) -> Vec<S::Item> {
        self.state.borrow().items.clone()
    }

    pub fn filter(&self) -> S::Filter {
        self.state.borrow().filter.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<SyncError> {
        self.state.borrow().error.clone()
    }

    /// Receiver notified on every applied change.
    pub fn subscribe(&self) -> watch::Receiver<CollectionState<S::Item, S::Filter>> {
        self.state.subscribe()
    }

    /// Switches to `filter` and fetches it. Same filter is a no-op.
    ///
    /// `items` is cleared immediately so data for the old filter is never
    /// shown under the new one.
    pub async fn set_filter(&self, filter: S::Filter) -> FetchOutcome {
        let mut issued = None;
        self.state.send_if_modified(|state| {
            if state.filter == filter {
                return false;
            }
            state.filter = filter.clone();
            state.items.clear();
            state.error = None;
            issued = Some(begin_fetch(state));
            true
        });

        let Some(seq) = issued else {
            tracing::debug!(?filter, "filter unchanged; skipping fetch");
            return FetchOutcome::Unchanged;
        };
        self.run_fetch(seq, filter).await
    }

    /// Re-fetches the current filter. `items` stays in place until the new
    /// data arrives, then is replaced wholesale.
    pub async fn refresh(&self) -> FetchOutcome {
        let mut issued = 0;
        self.state.send_modify(|state| issued = begin_fetch(state));

        let filter = {
            let state = self.state.borrow();
            if state.issued != issued {
                // A newer fetch was issued in between; it owns the result.
                return FetchOutcome::Superseded;
            }
            state.filter.clone()
        };
        self.run_fetch(issued, filter).await
    }

    /// Optimistically inserts `item` before the server confirms it.
    ///
    /// Nothing is reverted automatically; on a failed confirmation the caller
    /// must [`rollback`](Self::rollback).
    pub fn append(&self, item: S::Item) {
        let at = self.source.insert_at();
        self.state.send_modify(|state| match at {
            InsertAt::Head => state.items.insert(0, item),
            InsertAt::Tail => state.items.push(item),
        });
    }

    async fn run_fetch(&self, seq: u64, filter: S::Filter) -> FetchOutcome {
        let result = self.source.fetch(&filter).await;

        let mut outcome = FetchOutcome::Superseded;
        self.state.send_if_modified(|state| {
            if seq != state.issued {
                tracing::debug!(seq, latest = state.issued, "dropping superseded response");
                return false;
            }
            state.loading = false;
            match result {
                Ok(items) => {
                    state.items = items;
                    state.error = None;
                    state.applied = seq;
                    outcome = FetchOutcome::Applied;
                }
                Err(err) => {
                    tracing::debug!(seq, error = %err, "fetch failed; keeping previous items");
                    outcome = FetchOutcome::Failed(err.clone());
                    state.error = Some(err);
                }
            }
            true
        });
        outcome
    }
}

impl<S> RemoteCollection<S>
where
    S: CollectionSource,
    S::Item: PartialEq,
{
    /// Removes an optimistically appended item. Returns false if it is no
    /// longer present (e.g. a refresh already replaced the list).
    pub fn rollback(&self, item: &S::Item) -> bool {
        let at = self.source.insert_at();
        self.state.send_if_modified(|state| {
            let position = match at {
                InsertAt::Head => state.items.iter().position(|i| i == item),
                InsertAt::Tail => state.items.iter().rposition(|i| i == item),
            };
            match position {
                Some(index) => {
                    state.items.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    /// Replaces an optimistic item with the server's version of it.
    pub fn confirm(&self, pending: &S::Item, confirmed: S::Item) -> bool {
        self.state.send_if_modified(|state| {
            match state.items.iter_mut().find(|i| *i == pending) {
                Some(slot) => {
                    *slot = confirmed;
                    true
                }
                None => false,
            }
        })
    }
}

fn begin_fetch<T, F>(state: &mut CollectionState<T, F>) -> u64 {
    state.issued += 1;
    state.loading = true;
    state.issued
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    /// Each fetch pops the next scripted (delay, outcome) and labels items
    /// with the filter and call number.
    struct ScriptedSource {
        script: Mutex<VecDeque<(u64, bool)>>,
        calls: AtomicUsize,
        insert_at: InsertAt,
    }

    impl ScriptedSource {
        fn new(script: &[(u64, bool)]) -> Self {
            Self {
                script: Mutex::new(script.iter().copied().collect()),
                calls: AtomicUsize::new(0),
                insert_at: InsertAt::Tail,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CollectionSource for ScriptedSource {
        type Item = String;
        type Filter = &'static str;

        async fn fetch(&self, filter: &&'static str) -> SyncResult<Vec<String>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let (delay_ms, ok) = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((0, true));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if ok {
                Ok(vec![format!("{filter}-{call}")])
            } else {
                Err(SyncError::network("connection reset"))
            }
        }

        fn insert_at(&self) -> InsertAt {
            self.insert_at
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_applies_items() {
        let collection = RemoteCollection::new(ScriptedSource::new(&[(10, true)]), "couple");

        assert_eq!(collection.refresh().await, FetchOutcome::Applied);

        let state = collection.snapshot();
        assert_eq!(state.items, vec!["couple-1"]);
        assert!(!state.loading);
        assert_eq!(state.applied, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_filter_is_noop() {
        let collection = RemoteCollection::new(ScriptedSource::new(&[]), "couple");

        assert_eq!(collection.set_filter("couple").await, FetchOutcome::Unchanged);
        assert_eq!(collection.source().calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_stale_filter_response_is_dropped() {
        // First fetch (lover) is slow, second (couple) is fast.
        let collection = RemoteCollection::new(
            ScriptedSource::new(&[(10, true), (100, true), (5, true)]),
            "couple",
        );
        collection.refresh().await;

        let (slow, fast) = tokio::join!(collection.set_filter("lover"), async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            collection.set_filter("couple").await
        });

        assert_eq!(slow, FetchOutcome::Superseded);
        assert_eq!(fast, FetchOutcome::Applied);
        let state = collection.snapshot();
        assert_eq!(state.filter, "couple");
        assert_eq!(state.items, vec!["couple-3"]);
        assert!(!state.loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_issued_wins_for_any_arrival_order() {
        let orders: [[u64; 3]; 4] = [
            [30, 20, 10],
            [10, 20, 30],
            [20, 30, 10],
            [10, 30, 20],
        ];

        for delays in orders {
            let script: Vec<_> = delays.iter().map(|d| (*d, true)).collect();
            let collection = RemoteCollection::new(ScriptedSource::new(&script), "start");

            tokio::join!(
                collection.set_filter("a"),
                collection.set_filter("b"),
                collection.set_filter("c"),
            );

            let state = collection.snapshot();
            assert_eq!(state.items, vec!["c-3"], "delays {delays:?}");
            assert_eq!(state.applied, 3);
            assert!(!state.loading);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_refreshes_keep_newest() {
        let collection =
            RemoteCollection::new(ScriptedSource::new(&[(50, true), (10, true)]), "couple");

        let (first, second) = tokio::join!(collection.refresh(), collection.refresh());

        assert_eq!(first, FetchOutcome::Superseded);
        assert_eq!(second, FetchOutcome::Applied);
        assert_eq!(collection.items(), vec!["couple-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_fetches_current_filter() {
        let collection = RemoteCollection::new(ScriptedSource::new(&[]), "couple");
        collection.set_filter("lover").await;

        assert_eq!(collection.refresh().await, FetchOutcome::Applied);
        assert_eq!(collection.items(), vec!["lover-2"]);
        assert_eq!(collection.snapshot().applied, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_items() {
        let collection =
            RemoteCollection::new(ScriptedSource::new(&[(5, true), (5, false)]), "couple");
        collection.refresh().await;

        let outcome = collection.refresh().await;

        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        let state = collection.snapshot();
        assert_eq!(state.items, vec!["couple-1"]);
        assert!(!state.loading);
        assert_eq!(
            state.error.map(|e| e.kind),
            Some(crate::error::SyncErrorKind::NetworkFailure)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_does_not_set_error() {
        let collection =
            RemoteCollection::new(ScriptedSource::new(&[(50, false), (10, true)]), "couple");

        tokio::join!(collection.refresh(), collection.refresh());

        assert_eq!(collection.error(), None);
        assert_eq!(collection.items(), vec!["couple-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_does_not_clear_items_while_loading() {
        let collection =
            RemoteCollection::new(ScriptedSource::new(&[(5, true), (50, true)]), "couple");
        collection.refresh().await;
        let mut rx = collection.subscribe();

        let observer = async {
            rx.changed().await.unwrap();
            let state = rx.borrow_and_update().clone();
            assert!(state.loading);
            assert_eq!(state.items, vec!["couple-1"]);
        };
        tokio::join!(collection.refresh(), observer);

        assert_eq!(collection.items(), vec!["couple-2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_and_rollback() {
        let mut source = ScriptedSource::new(&[(1, true)]);
        source.insert_at = InsertAt::Head;
        let collection = RemoteCollection::new(source, "couple");
        collection.refresh().await;

        collection.append("local".to_string());
        assert_eq!(collection.items(), vec!["local", "couple-1"]);

        assert!(collection.rollback(&"local".to_string()));
        assert_eq!(collection.items(), vec!["couple-1"]);
        assert!(!collection.rollback(&"local".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_replaces_pending_item() {
        let collection = RemoteCollection::new(ScriptedSource::new(&[(1, true)]), "couple");
        collection.refresh().await;
        collection.append("pending".to_string());

        assert!(collection.confirm(&"pending".to_string(), "saved".to_string()));
        assert_eq!(collection.items(), vec!["couple-1", "saved"]);
    }
}
