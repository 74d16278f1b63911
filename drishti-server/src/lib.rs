//! drishti-server: transport and session layer over the vision pipeline
//!
//! Serves browser clients over WebSocket (`/ws`) or HTTP POST + SSE
//! (`/process-frame` + `/events/{id}`). Each connection owns an isolated
//! `Session` with its own tracker and alert state.

pub mod protocol;
pub mod routes;
pub mod session;
pub mod sse;
pub mod state;
pub mod ws;
