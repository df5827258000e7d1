//! Cache key derivation (§4.4): a query is never cached on its raw text — the
//! fingerprint folds in `k` and the canonical filter so two requests that would
//! retrieve from different slices of the corpus never collide.

use md5::{Digest, Md5};

use crate::filter::Filter;
use crate::types::Query;

/// Computes the 16-byte MD5 fingerprint `md5("q:" + normalize(query) + "|k:" + k +
/// "|f:" + canonical(filter))` used as the L1/L2 cache key.
pub fn fingerprint(query: &Query, k: usize, filter: &Filter) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(b"q:");
    hasher.update(query.normalize().as_bytes());
    hasher.update(b"|k:");
    hasher.update(k.to_string().as_bytes());
    hasher.update(b"|f:");
    hasher.update(filter.canonical_json().as_bytes());
    hasher.finalize().into()
}
