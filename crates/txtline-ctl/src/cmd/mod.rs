//! CLI command modules.

pub mod http;
pub mod queue;
pub mod send;
pub mod status;
pub mod zone;
