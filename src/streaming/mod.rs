//! Live HLS streaming.
//!
//! # Routes
//!
//! - `GET /{stream}/index.m3u8` - Primary playlist
//! - `GET /{stream}/stream.m3u8` - Live playlist (long-polls until the first segment)
//! - `GET /{stream}/{segment}.ts` - MPEG-TS segment

mod hls;
mod streams;

pub use hls::serve_file;
pub use streams::StreamSet;

use axum::{routing::get, Router};

use crate::server::AppContext;

/// Name of the primary playlist under each stream.
pub const PRIMARY_PLAYLIST_NAME: &str = "index.m3u8";

/// Create HLS streaming router.
pub fn hls_router() -> Router<AppContext> {
    Router::new().route("/:stream/:file", get(serve_file))
}
