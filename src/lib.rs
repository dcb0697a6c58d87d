//! Media Symlinker Library
//!
//! Identifies loosely-named downloads against an external metadata catalog and
//! mirrors them into a canonical tree of relative symlinks, tracking every
//! outcome in a SQLite state store so repeated passes never redo work.

pub mod cli;
pub mod core;
pub mod error;
pub mod models;
pub mod preflight;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
