#![forbid(unsafe_code)]

//! Client-side orchestration for long-running tasks on a remote task service.

pub mod api;
pub mod config;
pub mod display;
pub mod errors;
pub mod models;
pub mod orchestrator;

pub use config::ClientConfig;
pub use errors::{AppError, Result};
