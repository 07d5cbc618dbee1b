//! Task orchestration modules.
//!
//! Covers task submission, status polling, and per-session
//! single-flight coordination with dependency chaining.

pub mod launcher;
pub mod poller;
pub mod session;
