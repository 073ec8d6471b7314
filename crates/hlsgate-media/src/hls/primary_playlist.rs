//! Primary (master) playlist.

use bytes::Bytes;
use std::fmt::Write;

use crate::track::Tracks;

/// Nominal bandwidth advertised for the single variant.
const BANDWIDTH: u32 = 200_000;

/// Name of the live playlist the primary playlist points to.
pub const STREAM_PLAYLIST_NAME: &str = "stream.m3u8";

/// Master playlist, rendered once from the track configuration.
#[derive(Debug, Clone)]
pub struct PrimaryPlaylist {
    body: Bytes,
}

impl PrimaryPlaylist {
    pub fn new(tracks: &Tracks) -> Self {
        let mut playlist = String::new();
        writeln!(playlist, "#EXTM3U").unwrap();
        writeln!(
            playlist,
            "#EXT-X-STREAM-INF:BANDWIDTH={},CODECS=\"{}\"",
            BANDWIDTH,
            tracks.codecs()
        )
        .unwrap();
        writeln!(playlist, "{}", STREAM_PLAYLIST_NAME).unwrap();

        Self {
            body: Bytes::from(playlist),
        }
    }

    pub fn body(&self) -> Bytes {
        self.body.clone()
    }
}
