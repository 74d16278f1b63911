//! drishti-core: shared types for the Drishti assistive vision backend
//!
//! Holds the workspace-wide error type and the environment-driven server
//! configuration. Domain logic lives in drishti-vision, drishti-narrate and
//! drishti-server.

pub mod config;
pub mod error;

pub use config::ServerConfig;
pub use error::{Error, Result};
