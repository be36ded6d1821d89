/// The optimistic mutation protocol
///
/// Three phases per state-changing call:
///
/// 1. [`speculate`] patches every cached entry of the affected families
///    with the predicted post-mutation value and retains snapshots.
/// 2. [`MutationCycle::settle`] commits or rolls back once the network
///    call resolves. Rollback restores the retained snapshots in one
///    synchronous step — but only into entries this mutation was the last
///    writer of, so an overlapping later mutation's speculative value
///    survives. Either way, every affected family (including aggregates
///    the patch could not predict) is marked stale.
/// 3. [`reconcile`] refetches the stale queries; the responses are
///    authoritative and overwrite any residual optimistic value.
///
/// Mutations never block on each other; each cycle runs independently to
/// completion or failure, and the reconciling refetch is idempotent.

use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::future::Future;

use crate::api::ClientError;
use crate::cache::{MutationId, QueryCache, QueryFamily, QueryKey};

/// An in-flight optimistic mutation
///
/// Created by [`speculate`]; must be settled exactly once.
#[derive(Debug)]
pub struct MutationCycle {
    id: MutationId,
    families: Vec<QueryFamily>,
    snapshots: Vec<(QueryKey, Value)>,
}

/// What settling did to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The mutation succeeded; speculative values stand until reconciled
    Committed,

    /// The mutation failed; snapshots were restored
    RolledBack {
        /// Entries actually restored (entries a later mutation overwrote
        /// are skipped and keep the later value)
        restored: usize,
    },
}

/// Phase 1: applies the speculative patch and captures snapshots
///
/// `patch` sees every cached entry of every affected family and returns
/// the predicted value, or `None` for entries it cannot predict (those
/// are still invalidated at settle time).
pub fn speculate<F>(
    cache: &mut QueryCache,
    families: &[QueryFamily],
    patch: F,
) -> MutationCycle
where
    F: Fn(&QueryKey, &Value) -> Option<Value>,
{
    let id = cache.allocate_mutation_id();
    let mut snapshots = Vec::new();

    for family in families {
        snapshots.extend(cache.patch_family(*family, id, &patch));
    }

    MutationCycle {
        id,
        families: families.to_vec(),
        snapshots,
    }
}

impl MutationCycle {
    /// This cycle's mutation ID
    pub fn id(&self) -> MutationId {
        self.id
    }

    /// Number of entries the speculative patch touched
    pub fn patched(&self) -> usize {
        self.snapshots.len()
    }

    /// Phase 2: commits or rolls back, then marks families stale
    ///
    /// Rollback happens in one synchronous step over every retained
    /// snapshot; no failure can leave a view half-patched. Staleness is
    /// applied regardless of outcome so the reconciling refetch always
    /// runs.
    pub fn settle<T, E>(self, cache: &mut QueryCache, outcome: &Result<T, E>) -> SettleOutcome {
        let settled = match outcome {
            Ok(_) => SettleOutcome::Committed,
            Err(_) => {
                let restored = cache.restore(self.id, &self.snapshots);
                SettleOutcome::RolledBack { restored }
            }
        };

        for family in &self.families {
            cache.invalidate_family(*family);
        }

        settled
    }
}

/// Runs a full speculate-call-settle cycle around a network operation
///
/// The caller still runs [`reconcile`] afterwards; keeping it separate is
/// what lets several mutations settle before one refetch sweep.
pub async fn run_optimistic<T, E, P, Fut>(
    cache: &mut QueryCache,
    families: &[QueryFamily],
    patch: P,
    operation: Fut,
) -> (Result<T, E>, SettleOutcome)
where
    P: Fn(&QueryKey, &Value) -> Option<Value>,
    Fut: Future<Output = Result<T, E>>,
{
    let cycle = speculate(cache, families, patch);
    let outcome = operation.await;
    let settled = cycle.settle(cache, &outcome);
    (outcome, settled)
}

/// Source of authoritative values for reconciliation
///
/// Implemented by [`AdminClient`](crate::api::AdminClient) against the
/// live API and by in-memory fakes in tests. Futures are local: the
/// console's cache runs on a single-threaded, cooperative scheduler.
pub trait QueryFetcher {
    /// Replays a cached request and returns the fresh response body
    fn fetch<'a>(&'a self, key: &'a QueryKey) -> LocalBoxFuture<'a, Result<Value, ClientError>>;
}

/// Phase 3: refetches every stale entry
///
/// Each refetched value is committed as server truth, clearing staleness
/// and any optimistic writer tag. A failed refetch leaves its entry stale
/// for the next sweep; it never reinstates a speculative value.
///
/// # Returns
///
/// The number of entries refreshed
pub async fn reconcile<F>(cache: &mut QueryCache, fetcher: &F) -> usize
where
    F: QueryFetcher,
{
    let mut refreshed = 0;

    for key in cache.stale_keys() {
        match fetcher.fetch(&key).await {
            Ok(value) => {
                cache.commit(key, value);
                refreshed += 1;
            }
            Err(e) => {
                tracing::warn!(
                    family = ?key.family,
                    request = %key.request,
                    error = %e,
                    "Reconciling refetch failed; entry stays stale"
                );
            }
        }
    }

    refreshed
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory fetcher standing in for the live API
    struct FakeServer {
        responses: HashMap<QueryKey, Value>,
        calls: RefCell<Vec<QueryKey>>,
    }

    impl FakeServer {
        fn new(responses: Vec<(QueryKey, Value)>) -> Self {
            Self {
                responses: responses.into_iter().collect(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl QueryFetcher for FakeServer {
        fn fetch<'a>(
            &'a self,
            key: &'a QueryKey,
        ) -> LocalBoxFuture<'a, Result<Value, ClientError>> {
            async move {
                self.calls.borrow_mut().push(key.clone());
                self.responses.get(key).cloned().ok_or(ClientError::Api {
                    status: 404,
                    code: "not_found".to_string(),
                    message: "no such query".to_string(),
                })
            }
            .boxed_local()
        }
    }

    fn users_key() -> QueryKey {
        QueryKey::new(QueryFamily::Users, "users?page=1&limit=20")
    }

    fn counts_key() -> QueryKey {
        QueryKey::new(QueryFamily::UserCounts, "users?status=banned&limit=1")
    }

    fn seeded_cache() -> QueryCache {
        let mut cache = QueryCache::new();
        cache.insert(users_key(), json!({"enabled": true}));
        cache.insert(counts_key(), json!({"banned": 0}));
        cache
    }

    fn ban_patch(_: &QueryKey, _: &Value) -> Option<Value> {
        Some(json!({"enabled": false}))
    }

    #[tokio::test]
    async fn test_successful_mutation_commits_and_marks_stale() {
        let mut cache = seeded_cache();

        let (outcome, settled) = run_optimistic(
            &mut cache,
            &[QueryFamily::Users, QueryFamily::UserCounts],
            |key, value| (key.family == QueryFamily::Users).then(|| ban_patch(key, value)).flatten(),
            async { Ok::<_, ClientError>(()) },
        )
        .await;

        assert!(outcome.is_ok());
        assert_eq!(settled, SettleOutcome::Committed);

        // Speculative value stands, and both families (including the
        // aggregate the patch could not predict) are stale.
        assert_eq!(cache.get(&users_key()), Some(&json!({"enabled": false})));
        assert!(cache.is_stale(&users_key()));
        assert!(cache.is_stale(&counts_key()));
    }

    #[tokio::test]
    async fn test_failed_mutation_rolls_back_every_patched_key() {
        let mut cache = seeded_cache();
        let second_page = QueryKey::new(QueryFamily::Users, "users?page=2&limit=20");
        cache.insert(second_page.clone(), json!({"enabled": true}));

        let (outcome, settled) = run_optimistic(
            &mut cache,
            &[QueryFamily::Users],
            ban_patch,
            async { Err::<(), _>("network down") },
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(settled, SettleOutcome::RolledBack { restored: 2 });

        // All-or-nothing: both patched pages are back to their snapshots.
        assert_eq!(cache.get(&users_key()), Some(&json!({"enabled": true})));
        assert_eq!(cache.get(&second_page), Some(&json!({"enabled": true})));
        // Failure still schedules reconciliation.
        assert!(cache.is_stale(&users_key()));
    }

    #[tokio::test]
    async fn test_overlapping_mutations_last_speculative_write_wins() {
        // The ban toggle scenario: A fires, B fires before A resolves,
        // then A fails. The cache must show B's speculative value, not
        // A's rollback value, until the refetch lands.
        let mut cache = seeded_cache();

        let first = speculate(&mut cache, &[QueryFamily::Users], |_, _| {
            Some(json!({"enabled": false}))
        });
        let second = speculate(&mut cache, &[QueryFamily::Users], |_, _| {
            Some(json!({"enabled": true}))
        });

        let settled = first.settle(&mut cache, &Err::<(), _>("timeout"));
        assert_eq!(settled, SettleOutcome::RolledBack { restored: 0 });
        assert_eq!(cache.get(&users_key()), Some(&json!({"enabled": true})));

        // Second mutation succeeds; its value stands until reconciled.
        second.settle::<(), ClientError>(&mut cache, &Ok(()));
        assert_eq!(cache.get(&users_key()), Some(&json!({"enabled": true})));

        // Server truth wins unconditionally once the refetch lands.
        let server = FakeServer::new(vec![
            (users_key(), json!({"enabled": false, "source": "server"})),
            (counts_key(), json!({"banned": 1})),
        ]);
        let refreshed = reconcile(&mut cache, &server).await;

        assert_eq!(refreshed, 1);
        assert_eq!(
            cache.get(&users_key()),
            Some(&json!({"enabled": false, "source": "server"}))
        );
        assert!(!cache.is_stale(&users_key()));
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let mut cache = seeded_cache();
        cache.invalidate_family(QueryFamily::Users);

        let server = FakeServer::new(vec![(users_key(), json!({"fresh": 1}))]);

        assert_eq!(reconcile(&mut cache, &server).await, 1);
        // Nothing left stale: a second sweep fetches nothing.
        assert_eq!(reconcile(&mut cache, &server).await, 0);
        assert_eq!(server.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_refetch_leaves_entry_stale() {
        let mut cache = seeded_cache();
        cache.invalidate_family(QueryFamily::UserCounts);

        // FakeServer has no response for the counts key.
        let server = FakeServer::new(vec![]);
        let refreshed = reconcile(&mut cache, &server).await;

        assert_eq!(refreshed, 0);
        assert!(cache.is_stale(&counts_key()));
        // The stale value is still readable while we wait for the next sweep.
        assert_eq!(cache.get(&counts_key()), Some(&json!({"banned": 0})));
    }

    #[tokio::test]
    async fn test_mutations_do_not_block_each_other() {
        // Two cycles open at once against different families; settling
        // one leaves the other's speculative state untouched.
        let mut cache = seeded_cache();

        let users_cycle = speculate(&mut cache, &[QueryFamily::Users], |_, _| {
            Some(json!({"enabled": false}))
        });
        let counts_cycle = speculate(&mut cache, &[QueryFamily::UserCounts], |_, _| {
            Some(json!({"banned": 1}))
        });

        users_cycle.settle(&mut cache, &Err::<(), _>("boom"));

        assert_eq!(cache.get(&users_key()), Some(&json!({"enabled": true})));
        assert_eq!(cache.get(&counts_key()), Some(&json!({"banned": 1})));

        counts_cycle.settle::<(), ClientError>(&mut cache, &Ok(()));
        assert_eq!(cache.get(&counts_key()), Some(&json!({"banned": 1})));
    }
}
