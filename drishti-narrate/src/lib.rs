//! drishti-narrate: natural-language narration of tracked scenes
//!
//! Wraps a chat-completion provider behind the [`Provider`] trait and a
//! fail-soft [`Narrator`] facade. Callers always get a string back; the
//! fallback constants stand in whenever the backend is missing, slow or
//! misbehaving.

pub mod error;
pub mod groq;
pub mod narrator;
pub mod provider;

pub use error::{NarrationError, Result};
pub use groq::GroqProvider;
pub use narrator::{Narrator, SCENE_FALLBACK, THREAT_FALLBACK};
pub use provider::Provider;
