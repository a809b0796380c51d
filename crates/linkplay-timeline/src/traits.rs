//! Collaborator seams: the demuxer the timeline drives, the file access it
//! resolves segments through, and the factory that opens new demuxers.

use linkplay_core::{OwnedPacket, Result};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

/// Coarse stream classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Video stream.
    Video,
    /// Audio stream.
    Audio,
    /// Subtitle stream.
    Subtitle,
    /// Anything else.
    Data,
}

/// Description of one elementary stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Stream index within the container.
    pub index: u32,
    /// Stream kind.
    pub kind: StreamKind,
    /// Codec name, e.g. "h264".
    pub codec_name: String,
}

/// A single-file demuxer the timeline composes.
///
/// Timestamps cross this seam in the source file's own domain; the timeline
/// shifts them into display time. `abort` takes `&self` so a second thread
/// can unblock an in-progress `read`; implementations signal it through an
/// internal atomic.
pub trait Demuxer {
    /// Pull the next packet, or `None` at end of stream.
    fn read(&mut self) -> Option<OwnedPacket>;

    /// Seek to `time_ms`. With `backwards` the demuxer lands at or before
    /// the target (keyframe-exact). Returns the achieved start timestamp in
    /// milliseconds, or `None` when the seek failed.
    fn seek_time(&mut self, time_ms: i64, backwards: bool) -> Option<i64>;

    /// Return to the state right after open.
    fn reset(&mut self);

    /// Unblock any in-progress blocking call. Callable from another thread.
    fn abort(&self);

    /// Drop buffered packets.
    fn flush(&mut self);

    /// Playback speed hint, in per-mille of normal speed.
    fn set_speed(&mut self, speed: i32);

    /// Enable or disable demuxing of one stream.
    fn enable_stream(&mut self, stream_index: u32, enable: bool);

    /// All streams in the container.
    fn streams(&self) -> Vec<StreamInfo>;

    /// Look up one stream.
    fn stream(&self, index: u32) -> Option<StreamInfo>;

    /// Codec name of one stream.
    fn stream_codec_name(&self, index: u32) -> Option<String> {
        self.stream(index).map(|s| s.codec_name)
    }

    /// Number of streams.
    fn stream_count(&self) -> usize {
        self.streams().len()
    }

    /// Total length in milliseconds.
    fn stream_length_ms(&self) -> i64;

    /// Name of the backing file.
    fn file_name(&self) -> String;
}

/// Read-only file access, abstracted so tests can run against in-memory
/// files.
pub trait FileSystem {
    /// The byte stream an opened file yields.
    type Stream: Read + Seek;

    /// Open a file for reading.
    fn open(&self, path: &Path) -> std::io::Result<Self::Stream>;

    /// List the files directly inside a directory.
    fn list_dir(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>>;
}

/// Opens a [`Demuxer`] for a file, positioned at a byte offset (non-zero for
/// the later segments of a back-to-back file).
pub trait DemuxerFactory {
    /// Open a demuxer for the given file and segment offset.
    fn open(&self, path: &Path, offset: u64) -> Result<Box<dyn Demuxer>>;
}

/// [`FileSystem`] backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

impl FileSystem for LocalFileSystem {
    type Stream = BufReader<File>;

    fn open(&self, path: &Path) -> std::io::Result<Self::Stream> {
        Ok(BufReader::new(File::open(path)?))
    }

    fn list_dir(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                entries.push(entry.path());
            }
        }
        entries.sort();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_local_list_dir_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut f = File::create(dir.path().join("b.mkv")).unwrap();
        f.write_all(b"x").unwrap();
        File::create(dir.path().join("a.mkv")).unwrap();

        let listed = LocalFileSystem.list_dir(dir.path()).unwrap();
        let names: Vec<_> = listed
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mkv", "b.mkv"]);
    }

    #[test]
    fn test_local_open_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"hello").unwrap();
        let mut stream = LocalFileSystem.open(&path).unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }
}
