pub mod embedder;
pub mod evidence;
pub mod graph;
pub mod knowledge;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod scraper;
pub mod search;
pub mod service;
pub mod synthesis;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use knowledge::{Fact, KnowledgeStore};
pub use orchestrator::ResearchOrchestrator;
pub use progress::{ProgressChannel, ProgressSink};
pub use retry::RetryPolicy;
pub use service::ResearchService;
