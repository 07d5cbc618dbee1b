//! Domain model module declarations.

pub mod status;
pub mod task;
