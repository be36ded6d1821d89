/// Typed registry of named query families
///
/// The console keeps every server response it has seen in a single cache
/// keyed by `(family, request)`. Families are a closed set, so
/// invalidation and patching are explicit per-family operations rather
/// than string-prefix matching over loosely structured keys.
///
/// Entries track two pieces of bookkeeping beyond the value itself:
///
/// - `stale`: set when a mutation settles; cleared by an authoritative
///   [`commit`](QueryCache::commit) from a reconciling refetch
/// - `last_writer`: the mutation that last speculatively patched the
///   entry. A rollback only restores entries it was the last writer of,
///   which is what makes overlapping mutations resolve "last speculative
///   write wins" until server truth lands.

use serde_json::Value;
use std::collections::HashMap;

/// The closed set of cached query families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryFamily {
    /// Paginated directory listings
    Users,

    /// Aggregate counts derived from the directory
    UserCounts,

    /// Token-credit balances shown next to users
    Balances,
}

/// Cache key: a family plus the request that produced the entry
///
/// `request` is the relative request path-and-query under the admin
/// namespace (e.g. `users?page=1&limit=20`); the reconciler replays it
/// verbatim to refetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    /// Family this entry belongs to
    pub family: QueryFamily,

    /// Relative request that produced (and refetches) the entry
    pub request: String,
}

impl QueryKey {
    /// Builds a key
    pub fn new(family: QueryFamily, request: impl Into<String>) -> Self {
        Self {
            family,
            request: request.into(),
        }
    }
}

/// Identifier of one optimistic mutation cycle
pub type MutationId = u64;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stale: bool,
    last_writer: Option<MutationId>,
}

/// The console's query cache
///
/// Single-threaded by design: the console runs mutations cooperatively
/// and the cache is only ever touched through `&mut` access, so there is
/// no internal locking.
#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, CacheEntry>,
    next_mutation_id: MutationId,
}

impl QueryCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a server-derived value
    pub fn insert(&mut self, key: QueryKey, value: Value) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stale: false,
                last_writer: None,
            },
        );
    }

    /// Reads a cached value
    pub fn get(&self, key: &QueryKey) -> Option<&Value> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Whether an entry is marked stale
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries.get(key).map(|e| e.stale).unwrap_or(false)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Allocates an ID for a new mutation cycle
    pub fn allocate_mutation_id(&mut self) -> MutationId {
        self.next_mutation_id += 1;
        self.next_mutation_id
    }

    /// Speculatively patches every entry of a family in place
    ///
    /// `patch` sees each entry and returns the predicted value, or `None`
    /// to leave that entry untouched (e.g. an aggregate it cannot
    /// predict). Patched entries record `mutation` as their last writer.
    ///
    /// # Returns
    ///
    /// The prior values of every patched entry, for rollback
    pub fn patch_family<F>(
        &mut self,
        family: QueryFamily,
        mutation: MutationId,
        patch: F,
    ) -> Vec<(QueryKey, Value)>
    where
        F: Fn(&QueryKey, &Value) -> Option<Value>,
    {
        let mut snapshots = Vec::new();

        for (key, entry) in self.entries.iter_mut() {
            if key.family != family {
                continue;
            }
            if let Some(predicted) = patch(key, &entry.value) {
                snapshots.push((key.clone(), entry.value.clone()));
                entry.value = predicted;
                entry.last_writer = Some(mutation);
            }
        }

        snapshots
    }

    /// Restores snapshots for a failed mutation
    ///
    /// A snapshot is applied only to entries the mutation is still the
    /// last writer of; entries a later speculative write has overwritten
    /// keep the later value ("last speculative write wins").
    ///
    /// # Returns
    ///
    /// The number of entries actually restored
    pub fn restore(&mut self, mutation: MutationId, snapshots: &[(QueryKey, Value)]) -> usize {
        let mut restored = 0;

        for (key, prior) in snapshots {
            if let Some(entry) = self.entries.get_mut(key) {
                if entry.last_writer == Some(mutation) {
                    entry.value = prior.clone();
                    entry.last_writer = None;
                    restored += 1;
                }
            }
        }

        restored
    }

    /// Marks every entry of a family stale
    pub fn invalidate_family(&mut self, family: QueryFamily) {
        for (key, entry) in self.entries.iter_mut() {
            if key.family == family {
                entry.stale = true;
            }
        }
    }

    /// Keys currently marked stale
    pub fn stale_keys(&self) -> Vec<QueryKey> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.stale)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Commits an authoritative (server) value
    ///
    /// Clears staleness and any optimistic writer tag; server truth wins
    /// unconditionally over residual speculative values.
    pub fn commit(&mut self, key: QueryKey, value: Value) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                stale: false,
                last_writer: None,
            },
        );
    }
}
