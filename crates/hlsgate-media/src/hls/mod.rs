//! Live HLS: segments, the sliding stream playlist, the master playlist and
//! the muxer that drives them.

mod muxer;
mod primary_playlist;
mod segment;
mod snapshot;
mod stream_playlist;

pub use muxer::{Muxer, MuxerConfig, MuxerHandle};
pub use primary_playlist::{PrimaryPlaylist, STREAM_PLAYLIST_NAME};
pub use segment::{SealedSegment, Segment};
pub use snapshot::SnapshotSink;
pub use stream_playlist::{ReadCancel, StreamPlaylist, SEGMENT_SUFFIX};
