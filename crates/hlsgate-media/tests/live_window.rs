//! End-to-end tests: feed a muxer and read it back the way HTTP clients do.

use bytes::Bytes;
use hlsgate_media::ts::{PID_AUDIO, PID_VIDEO, TS_PACKET_SIZE};
use hlsgate_media::{AacProfile, AudioTrack, Muxer, MuxerConfig, Tracks, VideoTrack};
use std::thread;
use std::time::Duration;

fn tracks() -> Tracks {
    let video = VideoTrack::new(
        Bytes::from_static(&[0x67, 0x64, 0x00, 0x1F, 0xAC]),
        Bytes::from_static(&[0x68, 0xEE, 0x3C, 0x80]),
    )
    .unwrap();
    let audio = AudioTrack::new(AacProfile::Lc, 48000, 2).unwrap();
    Tracks::new(Some(video), Some(audio)).unwrap()
}

/// Audio trails each frame by one AU, so a keyframe-to-keyframe span
/// measures just under a second.
fn config() -> MuxerConfig {
    MuxerConfig {
        segment_duration: Duration::from_millis(900),
        ..Default::default()
    }
}

/// Feed `seconds` of 25 fps video (keyframe every 25 frames) plus audio.
fn feed(muxer: &mut Muxer, from_frame: u64, seconds: u64) {
    let idr = vec![
        Bytes::from_static(&[0x06, 0x05, 0x01]),
        Bytes::from_static(&[0x65, 0x88, 0x84, 0x21]),
    ];
    let p_frame = vec![Bytes::from_static(&[0x41, 0x9A, 0x21])];
    let au = vec![Bytes::from_static(&[0x21, 0x10, 0x04]); 2];

    for i in from_frame..from_frame + seconds * 25 {
        let pts = Duration::from_millis(i * 40);
        let nalus = if i % 25 == 0 { &idr } else { &p_frame };
        muxer.write_video(pts, nalus).unwrap();
        muxer.write_audio(pts, &au).unwrap();
    }
}

fn playlist_segments(playlist: &str) -> Vec<String> {
    playlist
        .lines()
        .filter(|l| l.ends_with(".ts"))
        .map(String::from)
        .collect()
}

fn pid(packet: &[u8]) -> u16 {
    (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16
}

#[test]
fn window_serves_latest_segments() {
    let mut muxer = Muxer::new(config(), tracks(), None).unwrap();
    let handle = muxer.handle();

    feed(&mut muxer, 0, 6);

    let playlist = String::from_utf8(handle.stream_playlist().to_vec()).unwrap();
    assert!(playlist.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-ALLOW-CACHE:NO\n"));
    assert!(playlist.contains("#EXT-X-TARGETDURATION:1\n"));
    // Five sealed one-second segments, three kept.
    assert!(playlist.contains("#EXT-X-MEDIA-SEQUENCE:2\n"));

    let names = playlist_segments(&playlist);
    assert_eq!(names.len(), 3);
    for name in &names {
        let data = handle.segment(name).unwrap();
        assert_eq!(data.len() % TS_PACKET_SIZE, 0);
        assert!(data.chunks(TS_PACKET_SIZE).all(|p| p[0] == 0x47));
        assert!(data.chunks(TS_PACKET_SIZE).any(|p| pid(p) == PID_VIDEO));
        assert!(data.chunks(TS_PACKET_SIZE).any(|p| pid(p) == PID_AUDIO));
    }

    feed(&mut muxer, 150, 2);
    let later = String::from_utf8(handle.stream_playlist().to_vec()).unwrap();
    assert!(handle.segment(&names[0]).is_none());
    assert!(playlist_segments(&later).contains(&names[2]));
}

#[test]
fn segments_start_with_keyframe() {
    let mut muxer = Muxer::new(config(), tracks(), None).unwrap();
    let handle = muxer.handle();

    // Leading non-keyframes and audio are discarded.
    muxer
        .write_video(Duration::ZERO, &[Bytes::from_static(&[0x41, 0x9A])])
        .unwrap();
    muxer
        .write_audio(Duration::ZERO, &[Bytes::from_static(&[0x21])])
        .unwrap();
    assert!(!muxer.first_packet_written());

    feed(&mut muxer, 1, 3);
    let playlist = String::from_utf8(handle.stream_playlist().to_vec()).unwrap();
    for name in playlist_segments(&playlist) {
        let data = handle.segment(&name).unwrap();
        let first_video = data
            .chunks(TS_PACKET_SIZE)
            .find(|p| pid(p) == PID_VIDEO)
            .unwrap();
        // Adaptation field present with the random access indicator set.
        assert_eq!((first_video[3] >> 4) & 0x03, 0b11);
        assert_ne!(first_video[5] & 0x40, 0);
    }
}

#[test]
fn long_poll_wakes_on_first_segment() {
    let mut muxer = Muxer::new(config(), tracks(), None).unwrap();
    let handle = muxer.handle();

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let handle = handle.clone();
            thread::spawn(move || handle.stream_playlist())
        })
        .collect();

    assert_eq!(handle.stream_playlist_timeout(Duration::from_millis(20)), None);
    feed(&mut muxer, 0, 2);

    for reader in readers {
        let body = reader.join().unwrap();
        assert!(body.starts_with(b"#EXTM3U\n"));
    }
}

#[test]
fn dropping_the_muxer_releases_readers() {
    let muxer = Muxer::new(config(), tracks(), None).unwrap();
    let handle = muxer.handle();

    let reader = {
        let handle = handle.clone();
        thread::spawn(move || handle.stream_playlist())
    };
    thread::sleep(Duration::from_millis(50));
    drop(muxer);

    assert!(reader.join().unwrap().is_empty());
    assert!(handle.is_closed());
    assert!(handle.primary_playlist().starts_with(b"#EXTM3U\n"));
}
