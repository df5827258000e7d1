//! Two-tier response cache (§4.4): L1 in-process exact-fingerprint, L2 shared
//! across replicas. Cached values are rankings, never passage content — content is
//! always re-hydrated from the vector store on a hit.

pub mod fingerprint;
pub mod l1;
pub mod l2;
pub mod tiered;
pub mod types;

pub use fingerprint::fingerprint as compute_fingerprint;
pub use l1::{L1Cache, L1CacheHandle};
pub use l2::{L2CacheError, SharedCache};
#[cfg(any(test, feature = "mock"))]
pub use l2::InMemorySharedCache;
#[cfg(any(test, feature = "mock"))]
pub use tiered::MockTieredCache;
pub use tiered::{TieredCache, TieredLookupResult};
pub use types::{CacheEntry, CacheLayerHit};
