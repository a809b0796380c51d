//! # linkplay-timeline
//!
//! Presents several linked container files as one seamless logical stream.
//!
//! Matroska ordered chapters let a file's chapter edition pull content from
//! other segments, found on disk by SegmentUID. This crate builds the
//! stitched timeline: [`SegmentCache`] resolves linked segments against the
//! media file's directory, and [`TimelineDemuxer`] drives one single-file
//! [`Demuxer`] per distinct source, remapping every packet into a unified
//! display timeline. A plain-text sidecar file is supported as an alternate
//! chapter source.
//!
//! ## Example
//!
//! ```no_run
//! use linkplay_timeline::{LocalFileSystem, SegmentCache, TimelineDemuxer, TimelineOutcome};
//! use std::path::Path;
//!
//! # fn open_primary() -> Box<dyn linkplay_timeline::Demuxer> { unimplemented!() }
//! # fn factory() -> Box<dyn linkplay_timeline::DemuxerFactory> { unimplemented!() }
//! let primary = open_primary();
//! let factory = factory();
//! let mut cache = SegmentCache::new(LocalFileSystem);
//! let path = Path::new("/media/show.mkv");
//! match TimelineDemuxer::create(primary, path, &mut cache, factory.as_ref()) {
//!     TimelineOutcome::Stitched(timeline) => {
//!         println!("{} chapters stitched", timeline.chapter_count());
//!     }
//!     TimelineOutcome::Single(_demuxer) => println!("plain single-file playback"),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod sidecar;
pub mod timeline;
pub mod traits;

pub use cache::{SegmentCache, SegmentLocator};
pub use sidecar::{SidecarEntry, SIDECAR_SUFFIX};
pub use timeline::{ChapterInfo, TimelineDemuxer, TimelineOutcome};
pub use traits::{Demuxer, DemuxerFactory, FileSystem, LocalFileSystem, StreamInfo, StreamKind};
