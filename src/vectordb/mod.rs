//! Vector store adapter (§4.2): the single seam between the core and whichever
//! vector database an operator runs. Qdrant is the default backend; the
//! [`VectorStoreAdapter`] trait is what the retriever family and orchestrator
//! actually depend on.

pub mod client;
mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
pub mod model;

pub use client::{QdrantVectorStoreAdapter, VectorStoreAdapter};
pub use error::VectorDbError;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockVectorStoreAdapter, cosine_similarity};

/// Default collection name used when a deployment doesn't override it.
pub const DEFAULT_COLLECTION_NAME: &str = "lexvi_passages";
