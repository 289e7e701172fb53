//! Optimistic mutation execution with snapshot-based rollback.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::MutationError;
use crate::invalidation::{MutationId, dependents};
use crate::key::CacheKey;
use crate::store::CacheStore;
use crate::value::{CacheValue, CommentThread};

/// Pre-mutation values of a mutation's target keys.
///
/// Captured before the optimistic write, so rollback is always well-defined
/// even if other mutations interleave on unrelated keys.
#[derive(Debug, Clone)]
pub struct Snapshot {
    values: HashMap<CacheKey, Option<CacheValue>>,
}

impl Snapshot {
    fn capture(store: &CacheStore, keys: &[CacheKey]) -> Self {
        let values = keys
            .iter()
            .map(|key| (key.clone(), store.read(key)))
            .collect();
        Self { values }
    }

    /// The snapshotted value of a key, absent entries flattened away.
    pub fn get(&self, key: &CacheKey) -> Option<&CacheValue> {
        self.values.get(key).and_then(|v| v.as_ref())
    }

    /// Boolean payload of a snapshotted key.
    pub fn flag(&self, key: &CacheKey) -> Option<bool> {
        self.get(key).and_then(CacheValue::as_flag)
    }

    /// Counter payload of a snapshotted key.
    pub fn count(&self, key: &CacheKey) -> Option<u64> {
        self.get(key).and_then(CacheValue::as_count)
    }

    /// Comment thread payload of a snapshotted key.
    pub fn comments(&self, key: &CacheKey) -> Option<&CommentThread> {
        self.get(key).and_then(CacheValue::as_comments)
    }

    fn into_writes(self) -> Vec<(CacheKey, Option<CacheValue>)> {
        self.values.into_iter().collect()
    }
}

/// Lifecycle of one in-flight mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Committed,
    RolledBack,
}

/// Bookkeeping for one mutation, alive from begin until settle completes.
#[derive(Debug)]
pub struct MutationRecord {
    pub mutation: MutationId,
    pub target_keys: Vec<CacheKey>,
    pub status: MutationStatus,
}

/// Executes named asynchronous actions against the cache store with
/// optimistic-apply, all-or-nothing rollback, and post-settle invalidation.
pub struct MutationEngine {
    store: Arc<CacheStore>,
}

impl MutationEngine {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// The store this engine writes through.
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Run one mutation to completion.
    ///
    /// 1. Snapshot `target_keys`, write `optimistic(&snapshot)` synchronously
    ///    before the request future is polled — the cache reflects the new
    ///    state in the same tick as the user action.
    /// 2. Await `request`, the only suspension point.
    /// 3. On success apply `commit(&response)` (authoritative server values;
    ///    return an empty vec to keep the optimistic ones).
    /// 4. On failure restore the entire snapshot: either all target keys
    ///    revert or none do.
    /// 5. Always settle: mark every dependent key stale, then surface the
    ///    outcome. Request errors re-throw after rollback completes so the
    ///    call site can show a notification without managing cache state.
    pub async fn run<T, O, C, Fut>(
        &self,
        mutation: MutationId,
        target_keys: Vec<CacheKey>,
        optimistic: O,
        request: Fut,
        commit: C,
    ) -> Result<T, MutationError>
    where
        O: FnOnce(&Snapshot) -> Vec<(CacheKey, CacheValue)>,
        C: FnOnce(&T) -> Vec<(CacheKey, CacheValue)>,
        Fut: Future<Output = Result<T, MutationError>>,
    {
        let snapshot = Snapshot::capture(&self.store, &target_keys);
        let mut record = MutationRecord {
            mutation,
            target_keys,
            status: MutationStatus::Pending,
        };

        self.store.write_all(optimistic(&snapshot));
        debug!(mutation = ?record.mutation, keys = record.target_keys.len(), "optimistic write applied");

        let outcome = request.await;

        let result = match outcome {
            Ok(response) => {
                let authoritative = commit(&response);
                if !authoritative.is_empty() {
                    self.store.write_all(authoritative);
                }
                record.status = MutationStatus::Committed;
                Ok(response)
            }
            Err(e) => {
                self.store.restore_all(snapshot.into_writes());
                record.status = MutationStatus::RolledBack;
                warn!(mutation = ?record.mutation, error = %e, "mutation rolled back");
                Err(e)
            }
        };

        self.settle(&record);
        result
    }

    /// Mark every dependent of the settled mutation stale, exactly once.
    fn settle(&self, record: &MutationRecord) {
        for key in dependents(&record.mutation) {
            self.store.mark_stale(&key);
        }
        debug!(mutation = ?record.mutation, status = ?record.status, "mutation settled");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn status_key() -> CacheKey {
        CacheKey::BookmarkStatus { post_id: 1 }
    }

    fn count_key() -> CacheKey {
        CacheKey::BookmarkCount { post_id: 1 }
    }

    fn toggle_mutation() -> MutationId {
        MutationId::ToggleBookmark {
            post_id: 1,
            user_id: 7,
        }
    }

    fn toggle_optimistic(snapshot: &Snapshot) -> Vec<(CacheKey, CacheValue)> {
        let active = snapshot.flag(&status_key()).unwrap_or(false);
        let count = snapshot.count(&count_key()).unwrap_or(0);
        let next = !active;
        let next_count = if next { count + 1 } else { count.saturating_sub(1) };
        vec![
            (status_key(), CacheValue::Flag(next)),
            (count_key(), CacheValue::Count(next_count)),
        ]
    }

    #[tokio::test]
    async fn commit_retains_optimistic_values() {
        let store = CacheStore::new();
        store.write(status_key(), CacheValue::Flag(false));
        store.write(count_key(), CacheValue::Count(5));

        let engine = MutationEngine::new(Arc::clone(&store));
        let result = engine
            .run(
                toggle_mutation(),
                vec![status_key(), count_key()],
                toggle_optimistic,
                async { Ok(()) },
                |_| Vec::new(),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(store.read(&status_key()), Some(CacheValue::Flag(true)));
        assert_eq!(store.read(&count_key()), Some(CacheValue::Count(6)));
        // Dependent keys are marked stale after settle.
        assert!(store.is_stale(&status_key()));
        assert!(store.is_stale(&count_key()));
        assert!(store.is_stale(&CacheKey::BookmarkedPosts { user_id: 7 }));
    }

    #[tokio::test]
    async fn rollback_restores_both_keys_together() {
        let store = CacheStore::new();
        store.write(status_key(), CacheValue::Flag(false));
        store.write(count_key(), CacheValue::Count(5));

        let engine = MutationEngine::new(Arc::clone(&store));
        let result: Result<(), _> = engine
            .run(
                toggle_mutation(),
                vec![status_key(), count_key()],
                toggle_optimistic,
                async { Err(MutationError::Service("nope".to_string())) },
                |_| Vec::new(),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(store.read(&status_key()), Some(CacheValue::Flag(false)));
        assert_eq!(store.read(&count_key()), Some(CacheValue::Count(5)));
    }

    #[tokio::test]
    async fn rollback_restores_absent_entries_to_absent() {
        let store = CacheStore::new();
        // No prior values: the optimistic write creates them, the rollback
        // must take them away again.
        let engine = MutationEngine::new(Arc::clone(&store));
        let result: Result<(), _> = engine
            .run(
                toggle_mutation(),
                vec![status_key(), count_key()],
                toggle_optimistic,
                async { Err(MutationError::Service("nope".to_string())) },
                |_| Vec::new(),
            )
            .await;

        assert!(result.is_err());
        assert!(store.read(&status_key()).is_none());
        assert!(store.read(&count_key()).is_none());
    }

    #[tokio::test]
    async fn commit_applies_authoritative_values() {
        let store = CacheStore::new();
        store.write(status_key(), CacheValue::Flag(false));
        store.write(count_key(), CacheValue::Count(5));

        let engine = MutationEngine::new(Arc::clone(&store));
        // Server disagrees with the optimistic guess (someone else
        // bookmarked concurrently).
        let result = engine
            .run(
                toggle_mutation(),
                vec![status_key(), count_key()],
                toggle_optimistic,
                async { Ok(8u64) },
                |server_count| vec![(count_key(), CacheValue::Count(*server_count))],
            )
            .await;

        assert_eq!(result.unwrap(), 8);
        assert_eq!(store.read(&count_key()), Some(CacheValue::Count(8)));
        assert_eq!(store.read(&status_key()), Some(CacheValue::Flag(true)));
    }

    #[tokio::test]
    async fn optimistic_value_visible_before_request_resolves() {
        let store = CacheStore::new();
        store.write(status_key(), CacheValue::Flag(false));
        store.write(count_key(), CacheValue::Count(5));

        let engine = MutationEngine::new(Arc::clone(&store));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let store_reader = Arc::clone(&store);
        let run = engine.run(
            toggle_mutation(),
            vec![status_key(), count_key()],
            toggle_optimistic,
            async move {
                // Any read between begin and settle observes the optimistic
                // value, never a torn state.
                assert_eq!(
                    store_reader.read(&status_key()),
                    Some(CacheValue::Flag(true))
                );
                assert_eq!(store_reader.read(&count_key()), Some(CacheValue::Count(6)));
                rx.await.ok();
                Ok(())
            },
            |_: &()| Vec::new(),
        );

        tx.send(()).ok();
        run.await.unwrap();
    }

    proptest! {
        // Whatever the starting state, a failed toggle leaves status and
        // count exactly as they were before run().
        #[test]
        fn failed_toggle_is_a_no_op(
            initial_active in any::<bool>(),
            initial_count in 0u64..10_000,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(async {
                let store = CacheStore::new();
                store.write(status_key(), CacheValue::Flag(initial_active));
                store.write(count_key(), CacheValue::Count(initial_count));

                let engine = MutationEngine::new(Arc::clone(&store));
                let _ = engine
                    .run(
                        toggle_mutation(),
                        vec![status_key(), count_key()],
                        toggle_optimistic,
                        async { Err::<(), _>(MutationError::Service("down".to_string())) },
                        |_| Vec::new(),
                    )
                    .await;

                prop_assert_eq!(
                    store.read(&status_key()),
                    Some(CacheValue::Flag(initial_active))
                );
                prop_assert_eq!(
                    store.read(&count_key()),
                    Some(CacheValue::Count(initial_count))
                );
                Ok(())
            })?;
        }
    }
}
