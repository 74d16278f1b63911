use crate::error::Result;
use async_trait::async_trait;

/// A chat-completion backend. One request in, one text completion out; retry
/// and fallback policy live in [`crate::Narrator`], not here.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}
