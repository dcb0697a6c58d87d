//! CLI command implementations.

pub mod catalog;
pub mod pending;
pub mod run;
pub mod status;
