//! Core business logic modules.

pub mod disambiguation;
pub mod linker;
pub mod orchestrator;
pub mod parser;
pub mod placement;
pub mod resolver;
pub mod scanner;
pub mod store;
pub mod unaccounted;
pub mod watch;
