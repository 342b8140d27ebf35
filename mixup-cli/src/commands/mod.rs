//! CLI command implementations

pub mod federate;
pub mod rerank;
