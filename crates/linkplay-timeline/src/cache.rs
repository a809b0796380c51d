//! Segment-resolution cache.
//!
//! Ordered chapters may pull content from other files in the same directory,
//! named only by SegmentUID. The cache maps wanted UIDs to file locations,
//! parsing each candidate file for identity at most once, ever. It holds no
//! open file handles; callers reopen through their own factory. There is no
//! eviction, only a recency order over the known locators.

use crate::traits::FileSystem;
use linkplay_mkv::MatroskaDocument;
use std::collections::{HashMap, VecDeque};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File extensions considered container candidates during a directory scan.
const CONTAINER_EXTENSIONS: &[&str] = &["mkv", "mka", "mk3d"];

/// Where a segment lives: file, byte offset of its EBML header, and UID.
///
/// The offset is non-zero for the later segments of a back-to-back file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLocator {
    /// Path of the containing file.
    pub path: PathBuf,
    /// Absolute byte offset where this segment's EBML header starts.
    pub offset: u64,
    /// SegmentUID.
    pub uid: Vec<u8>,
}

/// UID-to-file resolution with parse-once-per-file bookkeeping.
pub struct SegmentCache<F: FileSystem> {
    fs: F,
    /// Locator arena; indices stay stable for the cache's lifetime.
    segments: Vec<SegmentLocator>,
    /// Arena indices, most recently used first.
    recency: VecDeque<usize>,
    by_uid: HashMap<Vec<u8>, usize>,
    /// Every file ever identified, including ones holding no segments.
    by_file: HashMap<PathBuf, Vec<usize>>,
}

impl<F: FileSystem> SegmentCache<F> {
    /// Create an empty cache over the given file access.
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            segments: Vec::new(),
            recency: VecDeque::new(),
            by_uid: HashMap::new(),
            by_file: HashMap::new(),
        }
    }

    /// The file access the cache scans with.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Number of known segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the cache knows no segments yet.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Look up a UID without scanning or touching recency.
    pub fn get(&self, uid: &[u8]) -> Option<&SegmentLocator> {
        self.by_uid.get(uid).map(|&idx| &self.segments[idx])
    }

    /// Identify every segment in a file, parsing it only if it has never
    /// been seen. Returns the arena indices of the file's segments.
    pub fn identify_file(&mut self, path: &Path) -> Vec<usize> {
        if let Some(known) = self.by_file.get(path) {
            return known.clone();
        }
        let mut found = Vec::new();
        match self.fs.open(path) {
            Ok(mut stream) => {
                let mut pos = 0u64;
                loop {
                    if stream.seek(SeekFrom::Start(pos)).is_err() {
                        break;
                    }
                    match MatroskaDocument::parse(&mut stream, false) {
                        Ok(doc) => {
                            if doc.info.uid.is_empty() {
                                debug!(path = %path.display(), offset = pos, "segment without UID, not linkable");
                            } else if let Some(idx) = self.insert(SegmentLocator {
                                path: path.to_owned(),
                                offset: pos,
                                uid: doc.info.uid.clone(),
                            }) {
                                found.push(idx);
                            }
                            if doc.segment_end <= pos {
                                break;
                            }
                            // Another segment may start back-to-back here.
                            pos = doc.segment_end;
                        }
                        Err(err) => {
                            if pos == 0 {
                                debug!(path = %path.display(), error = %err, "not a usable matroska file");
                            }
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to open candidate file");
            }
        }
        self.by_file.insert(path.to_owned(), found.clone());
        found
    }

    /// Resolve a set of wanted UIDs against a directory.
    ///
    /// Known UIDs are answered from the index and moved to the front of the
    /// recency order. Remaining ones trigger a directory scan that stops as
    /// soon as everything wanted has been found. UIDs absent from the
    /// returned map are unresolved; the caller proceeds without them.
    pub fn resolve_set(
        &mut self,
        wanted: &[Vec<u8>],
        dir: &Path,
    ) -> HashMap<Vec<u8>, SegmentLocator> {
        let mut resolved = HashMap::new();
        let mut pending: Vec<Vec<u8>> = wanted.iter().filter(|u| !u.is_empty()).cloned().collect();
        pending.sort();
        pending.dedup();

        pending = self.drain_known(pending, &mut resolved);
        if pending.is_empty() {
            return resolved;
        }

        let entries = match self.fs.list_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "directory scan failed");
                return resolved;
            }
        };
        for path in entries {
            if pending.is_empty() {
                break;
            }
            if !has_container_extension(&path) {
                continue;
            }
            self.identify_file(&path);
            pending = self.drain_known(pending, &mut resolved);
        }
        for uid in &pending {
            debug!(uid = %hex(uid), "segment not found in directory");
        }
        resolved
    }

    /// Resolve a single UID against a directory.
    pub fn resolve(&mut self, uid: &[u8], dir: &Path) -> Option<SegmentLocator> {
        self.resolve_set(std::slice::from_ref(&uid.to_vec()), dir)
            .remove(uid)
    }

    fn drain_known(
        &mut self,
        pending: Vec<Vec<u8>>,
        resolved: &mut HashMap<Vec<u8>, SegmentLocator>,
    ) -> Vec<Vec<u8>> {
        let mut still = Vec::new();
        for uid in pending {
            match self.by_uid.get(&uid).copied() {
                Some(idx) => {
                    self.touch(idx);
                    resolved.insert(uid, self.segments[idx].clone());
                }
                None => still.push(uid),
            }
        }
        still
    }

    fn insert(&mut self, locator: SegmentLocator) -> Option<usize> {
        if self.by_uid.contains_key(&locator.uid) {
            debug!(path = %locator.path.display(), uid = %hex(&locator.uid), "duplicate segment UID, keeping first");
            return None;
        }
        let idx = self.segments.len();
        self.by_uid.insert(locator.uid.clone(), idx);
        self.segments.push(locator);
        // New entries start at the least-recently-used end; a wanted-set hit
        // promotes them right after.
        self.recency.push_back(idx);
        Some(idx)
    }

    fn touch(&mut self, idx: usize) {
        if let Some(pos) = self.recency.iter().position(|&i| i == idx) {
            self.recency.remove(pos);
        }
        self.recency.push_front(idx);
    }
}

fn has_container_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| CONTAINER_EXTENSIONS.iter().any(|c| e.eq_ignore_ascii_case(c)))
        .unwrap_or(false)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_extension_filter() {
        assert!(has_container_extension(Path::new("/x/a.mkv")));
        assert!(has_container_extension(Path::new("/x/a.MKV")));
        assert!(has_container_extension(Path::new("/x/a.mka")));
        assert!(!has_container_extension(Path::new("/x/a.avi")));
        assert!(!has_container_extension(Path::new("/x/noext")));
    }

    #[test]
    fn test_hex_format() {
        assert_eq!(hex(&[0x0A, 0xFF]), "0aff");
    }
}
