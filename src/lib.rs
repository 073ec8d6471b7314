//! hlsgate - Live HLS segmenter
//!
//! This library crate exposes the server, configuration and stream sources
//! for integration testing.

pub mod config;
pub mod server;
pub mod snapshot;
pub mod source;
pub mod streaming;
pub mod tools;
