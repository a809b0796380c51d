//! # linkplay-mkv
//!
//! Matroska metadata parsing for the linkplay timeline demuxer.
//!
//! This crate reads segment-level metadata only: EBML primitives
//! ([`ebml`]), segment identity and clock, the SeekHead index, and chapter
//! editions ([`document`]). It never decodes cluster payloads; packet
//! demuxing is someone else's job.
//!
//! ## Example
//!
//! ```no_run
//! use linkplay_mkv::MatroskaDocument;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! # fn main() -> linkplay_mkv::Result<()> {
//! let file = File::open("movie.mkv")?;
//! let mut reader = BufReader::new(file);
//! let doc = MatroskaDocument::parse(&mut reader, true)?;
//! if let Some(edition) = doc.ordered_edition() {
//!     println!("{} ordered chapters", edition.atoms.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod ebml;
pub mod elements;
pub mod error;

pub use document::{
    ChapterAtom, ChapterDisplay, Edition, MatroskaDocument, SeekIndex, SegmentInfo,
};
pub use error::{MkvError, Result};
