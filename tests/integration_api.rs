//! API integration tests
//!
//! Tests for the HLS endpoints using axum's test utilities. Muxers are fed
//! directly instead of from input files.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use bytes::Bytes;
use dashmap::DashMap;
use hlsgate::config::Config;
use hlsgate::server::{create_router, AppContext};
use hlsgate_media::{AacProfile, AudioTrack, Muxer, Tracks, VideoTrack};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn tracks() -> Tracks {
    let video = VideoTrack::new(
        Bytes::from_static(&[0x67, 0x42, 0xC0, 0x1E, 0xD9]),
        Bytes::from_static(&[0x68, 0xCE, 0x3C, 0x80]),
    )
    .unwrap();
    let audio = AudioTrack::new(AacProfile::Lc, 44100, 2).unwrap();
    Tracks::new(Some(video), Some(audio)).unwrap()
}

/// Feed `seconds` of 25 fps video with a keyframe every second.
fn feed(muxer: &mut Muxer, seconds: u64) {
    let idr = vec![Bytes::from_static(&[0x65, 0x88, 0x84, 0x21])];
    let p_frame = vec![Bytes::from_static(&[0x41, 0x9A, 0x21])];
    let au = vec![Bytes::from_static(&[0x21, 0x10, 0x04]); 2];

    for i in 0..seconds * 25 {
        let pts = Duration::from_millis(i * 40);
        let nalus = if i % 25 == 0 { &idr } else { &p_frame };
        muxer.write_video(pts, nalus).unwrap();
        muxer.write_audio(pts, &au).unwrap();
    }
}

/// Create a test context serving one stream named `live`.
///
/// The muxer is returned so the stream stays open for the test.
fn create_test_context(mut config: Config, seconds: u64) -> (AppContext, Muxer) {
    config.hls.segment_duration_secs = 0.9;
    let mut muxer = Muxer::new(config.muxer_config(), tracks(), None).unwrap();
    feed(&mut muxer, seconds);

    let streams = Arc::new(DashMap::new());
    streams.insert("live".to_string(), muxer.handle());

    let ctx = AppContext {
        config: Arc::new(config),
        streams,
    };
    (ctx, muxer)
}

fn short_timeout_config() -> Config {
    let mut config = Config::default();
    config.server.playlist_timeout_secs = 0;
    config
}

/// Helper to get response body as string
async fn body_to_string(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn get(ctx: AppContext, uri: &str) -> axum::response::Response {
    create_router(ctx)
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (ctx, _muxer) = create_test_context(Config::default(), 0);
    let response = get(ctx, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_primary_playlist() {
    let (ctx, _muxer) = create_test_context(Config::default(), 0);
    let response = get(ctx, "/live/index.m3u8").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/vnd.apple.mpegurl"
    );

    let body = body_to_string(response.into_body()).await;
    assert_eq!(
        body,
        "#EXTM3U\n\
         #EXT-X-STREAM-INF:BANDWIDTH=200000,CODECS=\"avc1.42c01e,mp4a.40.2\"\n\
         stream.m3u8\n"
    );
}

#[tokio::test]
async fn test_stream_playlist_lists_segments() {
    let (ctx, _muxer) = create_test_context(short_timeout_config(), 5);
    let response = get(ctx, "/live/stream.m3u8").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let body = body_to_string(response.into_body()).await;
    assert!(body.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n"));
    assert!(body.contains("#EXT-X-MEDIA-SEQUENCE:1\n"));
    assert_eq!(body.lines().filter(|l| l.ends_with(".ts")).count(), 3);
}

#[tokio::test]
async fn test_stream_playlist_unavailable_before_first_segment() {
    let (ctx, _muxer) = create_test_context(short_timeout_config(), 0);
    let response = get(ctx, "/live/stream.m3u8").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_stream_playlist_unavailable_after_close() {
    let (ctx, mut muxer) = create_test_context(Config::default(), 0);
    muxer.close();

    // A closed stream answers at once even with the default timeout.
    let response = tokio::time::timeout(Duration::from_secs(5), get(ctx, "/live/stream.m3u8"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_segment_endpoint() {
    let (ctx, _muxer) = create_test_context(short_timeout_config(), 4);
    let playlist = String::from_utf8(ctx.streams.get("live").unwrap().stream_playlist().to_vec())
        .unwrap();
    let name = playlist.lines().rfind(|l| l.ends_with(".ts")).unwrap().to_string();

    let response = get(ctx.clone(), &format!("/live/{}", name)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/MP2T");

    let data = response.into_body().collect().await.unwrap().to_bytes();
    assert!(!data.is_empty());
    assert_eq!(data.len() % 188, 0);
    assert_eq!(data[0], 0x47);

    let response = get(ctx, "/live/0.ts").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_stream_returns_404() {
    let (ctx, _muxer) = create_test_context(Config::default(), 0);

    let response = get(ctx.clone(), "/other/index.m3u8").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(ctx, "/other/stream.m3u8").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_disconnected_reader_frees_blocking_thread() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .max_blocking_threads(1)
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let (ctx, _live) = create_test_context(Config::default(), 3);
        let empty = Muxer::new(ctx.config.muxer_config(), tracks(), None).unwrap();
        ctx.streams.insert("empty".to_string(), empty.handle());

        // Occupies the only blocking thread until cancelled.
        let waiting = tokio::spawn(get(ctx.clone(), "/empty/stream.m3u8"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        waiting.abort();
        assert!(waiting.await.unwrap_err().is_cancelled());

        let response = tokio::time::timeout(Duration::from_secs(3), get(ctx, "/live/stream.m3u8"))
            .await
            .expect("blocking thread still held by the dropped request");
        assert_eq!(response.status(), StatusCode::OK);
        drop(empty);
    });
}
