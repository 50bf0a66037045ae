mod similarity;
mod store;

pub use similarity::cosine_similarity;
pub use store::{Fact, KnowledgeStore};
