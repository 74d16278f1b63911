//! Fail-soft narration over a chat-completion provider
//!
//! Every public method returns a plain `String`. Provider failures, timeouts
//! and missing credentials all degrade to fixed fallback text; the session
//! pipeline never sees a narration error.

use crate::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

pub const THREAT_FALLBACK: &str = "Warning: Security system offline";
pub const SCENE_FALLBACK: &str = "scene description unavailable";

pub struct Narrator {
    provider: Option<Arc<dyn Provider>>,
    timeout: Duration,
}

impl Narrator {
    pub fn new(provider: Option<Arc<dyn Provider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Narrator with no backend; every call returns the fallback immediately.
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(1))
    }

    pub fn is_online(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.name())
    }

    /// One-sentence threat assessment for a single tracked object. The object
    /// is passed as its serialized wire form so the model sees exactly what
    /// the client will.
    pub async fn assess_threat(&self, object: &serde_json::Value) -> String {
        let prompt = format!(
            "You are an AI security analyst. Assess this potential threat:\n{}\n\n\
             Respond with ONE concise sentence in this format:\n\
             \"[Threat Level] Alert: [Description] at [Position] ([Distance])\"",
            serde_json::to_string_pretty(object).unwrap_or_else(|_| object.to_string())
        );

        match self.complete(&prompt).await {
            Some(text) => extract_sentence(&text).unwrap_or(text),
            None => THREAT_FALLBACK.to_string(),
        }
    }

    /// Short description of the whole visible scene.
    pub async fn describe_scene(&self, objects: &serde_json::Value) -> String {
        let prompt = format!(
            "You are assisting a visually impaired person. Describe this scene \
             in one short sentence, mentioning object positions and proximity:\n{}",
            serde_json::to_string_pretty(objects).unwrap_or_else(|_| objects.to_string())
        );

        match self.complete(&prompt).await {
            Some(text) => extract_sentence(&text).unwrap_or(text),
            None => SCENE_FALLBACK.to_string(),
        }
    }

    async fn complete(&self, prompt: &str) -> Option<String> {
        let provider = self.provider.as_ref()?;

        match timeout(self.timeout, provider.complete(prompt)).await {
            Ok(Ok(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    warn!(provider = provider.name(), "Empty narration response");
                    None
                } else {
                    Some(text.to_string())
                }
            }
            Ok(Err(e)) => {
                warn!(provider = provider.name(), error = %e, "Narration request failed");
                None
            }
            Err(_) => {
                warn!(provider = provider.name(), "Narration request timed out");
                None
            }
        }
    }
}

/// Pull the single expected sentence out of a chatty completion. Strips code
/// fences, prefers a quoted sentence when one is present, otherwise takes the
/// first non-empty line. Returns `None` if nothing usable remains so the
/// caller can fall back to the raw text.
fn extract_sentence(text: &str) -> Option<String> {
    let mut text = text.trim();

    if let Some(stripped) = text.strip_prefix("```") {
        let stripped = stripped.trim_start_matches(|c: char| c.is_alphanumeric());
        text = stripped.strip_suffix("```").unwrap_or(stripped).trim();
    }

    // A quoted span is the formatted answer; surrounding prose is commentary
    if let Some(start) = text.find('"') {
        if let Some(len) = text[start + 1..].find('"') {
            let quoted = text[start + 1..start + 1 + len].trim();
            if !quoted.is_empty() {
                return Some(quoted.to_string());
            }
        }
    }

    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NarrationError, Result};
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedProvider(&'static str);

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(NarrationError::InvalidResponse("boom".to_string()))
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_offline_narrator_uses_fallbacks() {
        let narrator = Narrator::offline();
        assert!(!narrator.is_online());
        assert_eq!(narrator.assess_threat(&json!({})).await, THREAT_FALLBACK);
        assert_eq!(narrator.describe_scene(&json!([])).await, SCENE_FALLBACK);
    }

    #[tokio::test]
    async fn test_provider_text_is_returned() {
        let narrator = Narrator::new(
            Some(Arc::new(FixedProvider("Medium Alert: person at left (4.0)"))),
            Duration::from_secs(1),
        );
        let out = narrator.assess_threat(&json!({"object": "person"})).await;
        assert_eq!(out, "Medium Alert: person at left (4.0)");
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_fallback() {
        let narrator = Narrator::new(Some(Arc::new(FailingProvider)), Duration::from_secs(1));
        assert_eq!(narrator.assess_threat(&json!({})).await, THREAT_FALLBACK);
        assert_eq!(narrator.describe_scene(&json!([])).await, SCENE_FALLBACK);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_to_fallback() {
        let narrator = Narrator::new(Some(Arc::new(SlowProvider)), Duration::from_millis(100));
        assert_eq!(narrator.assess_threat(&json!({})).await, THREAT_FALLBACK);
    }

    #[tokio::test]
    async fn test_empty_completion_degrades_to_fallback() {
        let narrator = Narrator::new(Some(Arc::new(FixedProvider("   "))), Duration::from_secs(1));
        assert_eq!(narrator.assess_threat(&json!({})).await, THREAT_FALLBACK);
    }

    #[test]
    fn test_extract_quoted_sentence() {
        let text = "Sure! Here is the assessment:\n\"High Alert: knife at center (2.1)\"\nLet me know if you need more.";
        assert_eq!(
            extract_sentence(text).unwrap(),
            "High Alert: knife at center (2.1)"
        );
    }

    #[test]
    fn test_extract_strips_code_fence() {
        let text = "```text\nMedium Alert: car at right (6.5)\n```";
        assert_eq!(
            extract_sentence(text).unwrap(),
            "Medium Alert: car at right (6.5)"
        );
    }

    #[test]
    fn test_extract_plain_text_takes_first_line() {
        let text = "A person is close on your left.\nExtra commentary.";
        assert_eq!(
            extract_sentence(text).unwrap(),
            "A person is close on your left."
        );
    }

    #[test]
    fn test_extract_empty_returns_none() {
        assert!(extract_sentence("").is_none());
        assert!(extract_sentence("   \n  ").is_none());
    }
}
