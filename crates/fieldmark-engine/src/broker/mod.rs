//! Conversation session and observer fan-out.

mod observers;
mod session;

pub use observers::{ObserverChannel, ObserverHub, ObserverId};
pub use session::SessionBroker;

use async_trait::async_trait;
use fieldmark_common::FieldmarkError;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Finite sequence of reply chunks.
pub type ChunkStream = BoxStream<'static, Result<String, FieldmarkError>>;

/// Factory for conversation sessions.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn create(&self, system_prompt: &str) -> Result<Arc<dyn ModelSession>, FieldmarkError>;
}

#[async_trait]
pub trait ModelSession: Send + Sync {
    async fn prompt_streaming(&self, text: &str) -> Result<ChunkStream, FieldmarkError>;
}
