//! HLS streaming handlers.
//!
//! Playlists and segments come straight from the stream's muxer. The live
//! playlist read blocks until a segment exists, so it runs on the blocking
//! pool with the configured timeout. Dropping the request (client gone)
//! cancels the read and frees the blocking thread.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use hlsgate_media::hls::STREAM_PLAYLIST_NAME;
use hlsgate_media::{MuxerHandle, ReadCancel};
use std::time::Duration;

use super::PRIMARY_PLAYLIST_NAME;
use crate::server::AppContext;

const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

/// Serve a playlist or segment of a live stream.
pub async fn serve_file(
    State(ctx): State<AppContext>,
    Path((stream, file)): Path<(String, String)>,
) -> Result<Response, StatusCode> {
    let handle = ctx
        .streams
        .get(&stream)
        .map(|entry| entry.value().clone())
        .ok_or(StatusCode::NOT_FOUND)?;

    match file.as_str() {
        PRIMARY_PLAYLIST_NAME => Ok(playlist_response(handle.primary_playlist(), "max-age=60")),
        STREAM_PLAYLIST_NAME => {
            let timeout = Duration::from_secs(ctx.config.server.playlist_timeout_secs);
            stream_playlist(&stream, handle, timeout).await
        }
        _ => segment(&stream, &handle, &file),
    }
}

async fn stream_playlist(
    stream: &str,
    handle: MuxerHandle,
    timeout: Duration,
) -> Result<Response, StatusCode> {
    let guard = CancelOnDrop {
        handle: handle.clone(),
        cancel: ReadCancel::new(),
        armed: true,
    };
    let cancel = guard.cancel.clone();
    let body = tokio::task::spawn_blocking(move || {
        handle.stream_playlist_cancellable(timeout, &cancel)
    })
    .await
    .map_err(|e| {
        tracing::error!(stream = %stream, "Playlist reader failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    guard.disarm();

    match body {
        Some(body) if !body.is_empty() => Ok(playlist_response(body, "no-cache")),
        Some(_) => {
            tracing::debug!(stream = %stream, "Stream closed before any segment was ready");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
        None => {
            tracing::debug!(stream = %stream, "No segment ready within {:?}", timeout);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Releases the blocking playlist read if the request is dropped while
/// waiting, e.g. when the client disconnects.
struct CancelOnDrop {
    handle: MuxerHandle,
    cancel: ReadCancel,
    armed: bool,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::trace!("Playlist request dropped, cancelling read");
            self.handle.cancel_read(&self.cancel);
        }
    }
}

fn segment(stream: &str, handle: &MuxerHandle, file: &str) -> Result<Response, StatusCode> {
    match handle.segment(file) {
        Some(data) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, SEGMENT_CONTENT_TYPE),
                (header::CACHE_CONTROL, "max-age=60"),
            ],
            data,
        )
            .into_response()),
        None => {
            tracing::trace!(stream = %stream, segment = %file, "Segment not found");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

fn playlist_response(body: Bytes, cache_control: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
            (header::CACHE_CONTROL, cache_control),
        ],
        body,
    )
        .into_response()
}
