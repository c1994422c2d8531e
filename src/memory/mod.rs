//! 记忆层：学习经验的存取与相关性评分

pub mod backend;
pub mod relevance;
pub mod store;

pub use backend::BackendMemoryStore;
pub use relevance::{RelevanceScorer, SubstringRelevance};
pub use store::{filter_relevant, InMemoryMemoryStore, MemoryEntry, MemoryStore};
