//! # Parley Admin Console Client
//!
//! Client runtime for the admin console: a typed HTTP client for the
//! directory API plus the optimistic query-cache synchronizer that keeps
//! paginated list views consistent while mutations are in flight.
//!
//! ## Modules
//!
//! - `api`: reqwest-based client for the `/api/admin` surface
//! - `cache`: typed registry of named query families
//! - `optimistic`: the speculate / settle / reconcile protocol
//!
//! ## Mutation protocol
//!
//! Every state-changing call runs in three phases:
//!
//! 1. **Speculate** - patch affected cached queries in place with the
//!    predicted value, retaining snapshots
//! 2. **Settle** - on failure restore the snapshots (skipping entries a
//!    later mutation has since overwritten); either way mark the affected
//!    families stale
//! 3. **Reconcile** - refetch stale queries; the server response is
//!    authoritative and overwrites any residual optimistic value

pub mod api;
pub mod cache;
pub mod optimistic;

pub use api::{AdminClient, ClientError};
pub use cache::{QueryCache, QueryFamily, QueryKey};
pub use optimistic::{reconcile, run_optimistic, speculate, MutationCycle, QueryFetcher, SettleOutcome};
