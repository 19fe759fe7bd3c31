//! Category prototypes, embedding providers and the classifier.

pub mod catalog;
pub mod classifier;
pub mod provider;
pub mod registry;

pub use catalog::{CategoryCatalog, CategorySpec};
pub use classifier::{Classifier, DEFAULT_THRESHOLD, MAX_EXAMPLES};
pub use provider::{
    provider_from_config, CallOptions, CancelToken, EmbeddingProvider, HashingEmbedder,
    OpenAiEmbedder,
};
pub use registry::CategoryRegistry;
