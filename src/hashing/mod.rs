use blake3::Hasher;

#[inline]
pub fn hash_prompt(prompt: &str) -> [u8; 32] {
    *blake3::hash(prompt.as_bytes()).as_bytes()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// # Truncation Rationale
///
/// This function takes the first 8 bytes (64 bits) of a BLAKE3 hash. This truncation
/// is acceptable for the following use cases:
///
/// - **Cache keys**: Fast lookups in hash maps and tiered caches
/// - **Identifiers**: Tenant IDs, context hashes, and content fingerprints
/// - **Deduplication**: Detecting likely-duplicate entries before expensive operations
///
/// # Collision Probability
///
/// With 64 bits of entropy, the birthday paradox gives us the following collision probabilities:
///
/// | Number of Items | Collision Probability |
/// |-----------------|----------------------|
/// | 1 million       | ~0.00003% (negligible) |
/// | 10 million      | ~0.003% (very low) |
/// | 100 million     | ~0.3% (low) |
/// | 1 billion       | ~3% (noticeable) |
/// | ~4.3 billion    | ~50% (birthday bound) |
///
/// For practical cache sizes (millions of entries), the collision probability is negligible.
/// The formula is approximately: `P(collision) ≈ n² / (2 × 2^64)` for `n` items.
///
/// # Collision Tolerance
///
/// The higher-level logic (tiered cache, content-addressed storage) is designed to tolerate
/// rare collisions gracefully:
///
/// - **Cache lookups**: A collision results in a cache miss, not data corruption. The full
///   content is verified downstream, so a false positive simply triggers a cache refresh.
/// - **No security dependency**: This hash is not used for cryptographic verification or
///   authentication—only for fast indexing and probabilistic deduplication.
///
/// # When to Use Full 256-bit Hashes
///
/// If stricter uniqueness guarantees are ever required (e.g., content-addressed storage
/// where collisions would cause data loss), use [`hash_prompt`] or [`hash_cache_content`]
/// which return the full 32-byte BLAKE3 output. The full hash provides ~128 bits of
/// collision resistance, making collisions computationally infeasible.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(bytes)
}

#[inline]
pub fn hash_context(role: &str, plan: &str) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(role.as_bytes());
    hasher.update(b"|");
    hasher.update(plan.as_bytes());

    let hash = hasher.finalize();
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(bytes)
}

#[inline]
pub fn hash_tenant_id(tenant: &str) -> u64 {
    hash_to_u64(tenant.as_bytes())
}

#[inline]
pub fn hash_cache_content(
    tenant_id: u64,
    context_hash: u64,
    embedding: &[u8],
    payload: &[u8],
) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(&tenant_id.to_le_bytes());
    hasher.update(&context_hash.to_le_bytes());
    hasher.update(embedding);
    hasher.update(payload);
    *hasher.finalize().as_bytes()
}
