//! External service clients.

pub mod cinemeta;
pub mod ffprobe;
pub mod tmdb;
