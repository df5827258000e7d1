use thiserror::Error;

/// Errors returned by [`super::VectorStoreAdapter`] implementations.
#[derive(Debug, Error)]
pub enum VectorDbError {
    /// Could not connect to the store endpoint.
    #[error("failed to connect to vector store at '{url}': {message}")]
    ConnectionFailed { url: String, message: String },

    /// Collection/index creation failed.
    #[error("failed to create collection '{collection}': {message}")]
    CreateCollectionFailed { collection: String, message: String },

    /// The configured collection does not exist.
    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    /// `search` failed.
    #[error("failed to search in '{collection}': {message}")]
    SearchFailed { collection: String, message: String },

    /// `fetch` failed.
    #[error("failed to fetch points from '{collection}': {message}")]
    FetchFailed { collection: String, message: String },

    /// The query embedding's dimension didn't match [`super::VectorStoreAdapter::dimension`].
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    /// A stored point's payload could not be decoded back into a [`crate::types::Passage`].
    #[error("malformed passage payload for point '{point_id}': {reason}")]
    MalformedPayload { point_id: String, reason: String },
}
