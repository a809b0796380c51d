//! The timeline demuxer.
//!
//! Composes several single-file demuxers into one virtual demuxer following
//! an ordered chapter list. Each chapter maps a source-time window of its
//! backing file onto a slot of the unified display timeline; packets are
//! pulled from the current chapter's demuxer, clipped to the chapter window,
//! and shifted into display time.

use crate::cache::SegmentCache;
use crate::sidecar;
use crate::traits::{Demuxer, DemuxerFactory, FileSystem, StreamInfo};
use linkplay_core::timestamp::{Duration, TimeBase};
use linkplay_core::OwnedPacket;
use linkplay_mkv::MatroskaDocument;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One chapter of the stitched timeline.
///
/// `start_src_ms` is where the chapter's content starts inside its source
/// file; `start_disp_ms` is where it lands on the display timeline. Chapters
/// are stored in display order with contiguous, non-overlapping display
/// ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterInfo {
    /// Index into the timeline's demuxer arena.
    pub(crate) demuxer: usize,
    /// Start within the source file, milliseconds.
    pub start_src_ms: i64,
    /// Start on the display timeline, milliseconds.
    pub start_disp_ms: i64,
    /// Chapter length, milliseconds. Never negative.
    pub duration_ms: i64,
    /// Chapter title, when the source declares one.
    pub title: Option<String>,
}

impl ChapterInfo {
    /// End of the source window (exclusive).
    pub fn stop_src_ms(&self) -> i64 {
        self.start_src_ms + self.duration_ms
    }

    /// End of the display slot (exclusive).
    pub fn stop_disp_ms(&self) -> i64 {
        self.start_disp_ms + self.duration_ms
    }

    /// Additive offset from source time to display time.
    pub fn shift_ms(&self) -> i64 {
        self.start_disp_ms - self.start_src_ms
    }
}

/// Outcome of attempting timeline construction.
///
/// When the file carries no usable ordered-chapter structure the primary
/// demuxer is handed back untouched for ordinary single-file playback.
pub enum TimelineOutcome {
    /// A stitched timeline was built.
    Stitched(TimelineDemuxer),
    /// Not applicable; the primary demuxer is returned.
    Single(Box<dyn Demuxer>),
}

impl TimelineOutcome {
    /// The demuxer to play, stitched or not.
    pub fn into_demuxer(self) -> Box<dyn Demuxer> {
        match self {
            TimelineOutcome::Stitched(timeline) => Box::new(timeline),
            TimelineOutcome::Single(demuxer) => demuxer,
        }
    }

    /// The stitched timeline, if one was built.
    pub fn stitched(self) -> Option<TimelineDemuxer> {
        match self {
            TimelineOutcome::Stitched(timeline) => Some(timeline),
            TimelineOutcome::Single(_) => None,
        }
    }
}

enum SourceRef {
    Primary,
    Linked { path: PathBuf, offset: u64 },
}

struct ChapterPlan {
    source: SourceRef,
    start_src_ms: i64,
    duration_ms: i64,
    title: Option<String>,
}

/// A virtual demuxer over an ordered chapter list.
pub struct TimelineDemuxer {
    /// Demuxer arena; index 0 is the primary. Chapters reference entries by
    /// index, several chapters may share one.
    demuxers: Vec<Box<dyn Demuxer>>,
    chapters: Vec<ChapterInfo>,
    /// Each chapter's last display millisecond (stop − 1) to its index, for
    /// O(log n) "which chapter owns display time t".
    chapter_map: BTreeMap<i64, usize>,
    cur_chapter: usize,
    /// Segment UIDs of chapters dropped because no file on disk carried them.
    unresolved: Vec<Vec<u8>>,
}

impl TimelineDemuxer {
    /// Build a timeline from the media file's ordered chapter edition,
    /// falling back to its sidecar file, else hand the primary back.
    pub fn create<F: FileSystem>(
        primary: Box<dyn Demuxer>,
        media_path: &Path,
        cache: &mut SegmentCache<F>,
        factory: &dyn DemuxerFactory,
    ) -> TimelineOutcome {
        match plan_from_matroska(media_path, cache) {
            Some((plans, unresolved)) => build(primary, plans, unresolved, factory),
            None => Self::from_sidecar(primary, media_path, cache.fs(), factory),
        }
    }

    /// Build a timeline from the media file's ordered chapter edition.
    pub fn from_matroska<F: FileSystem>(
        primary: Box<dyn Demuxer>,
        media_path: &Path,
        cache: &mut SegmentCache<F>,
        factory: &dyn DemuxerFactory,
    ) -> TimelineOutcome {
        match plan_from_matroska(media_path, cache) {
            Some((plans, unresolved)) => build(primary, plans, unresolved, factory),
            None => TimelineOutcome::Single(primary),
        }
    }

    /// Build a timeline from the media file's sidecar chapter file.
    pub fn from_sidecar<F: FileSystem>(
        primary: Box<dyn Demuxer>,
        media_path: &Path,
        fs: &F,
        factory: &dyn DemuxerFactory,
    ) -> TimelineOutcome {
        match plan_from_sidecar(media_path, fs) {
            Some(plans) => build(primary, plans, Vec::new(), factory),
            None => TimelineOutcome::Single(primary),
        }
    }

    /// The chapters, in display order.
    pub fn chapters(&self) -> &[ChapterInfo] {
        &self.chapters
    }

    /// Number of chapters.
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// The current chapter, 1-based.
    pub fn current_chapter(&self) -> usize {
        self.cur_chapter + 1
    }

    /// Title of a chapter, 1-based.
    pub fn chapter_name(&self, chapter: usize) -> Option<&str> {
        self.chapters
            .get(chapter.checked_sub(1)?)
            .and_then(|c| c.title.as_deref())
    }

    /// Display start of a chapter in milliseconds, 1-based.
    pub fn chapter_start_ms(&self, chapter: usize) -> Option<i64> {
        self.chapters
            .get(chapter.checked_sub(1)?)
            .map(|c| c.start_disp_ms)
    }

    /// Jump to a chapter, 1-based. Returns the achieved display timestamp,
    /// or `None` (current chapter unchanged) when the index is out of range
    /// or the underlying seek failed.
    pub fn seek_chapter(&mut self, chapter: usize) -> Option<i64> {
        let idx = chapter.checked_sub(1)?;
        if idx >= self.chapters.len() {
            return None;
        }
        let (demuxer, start_src, shift) = {
            let ch = &self.chapters[idx];
            (ch.demuxer, ch.start_src_ms, ch.shift_ms())
        };
        let achieved = self.demuxers[demuxer].seek_time(start_src, true)?;
        self.cur_chapter = idx;
        Some(achieved + shift)
    }

    /// Segment UIDs of chapter links that could not be resolved on disk.
    pub fn unresolved_links(&self) -> &[Vec<u8>] {
        &self.unresolved
    }

    /// Advance the cursor to the next chapter and position its demuxer.
    /// Fails (cursor unchanged) when the current chapter is the last.
    fn switch_to_next_chapter(&mut self) -> bool {
        if self.cur_chapter + 1 >= self.chapters.len() {
            return false;
        }
        self.cur_chapter += 1;
        let (demuxer, start_src) = {
            let ch = &self.chapters[self.cur_chapter];
            (ch.demuxer, ch.start_src_ms)
        };
        let _ = self.demuxers[demuxer].seek_time(start_src, true);
        true
    }
}

impl Demuxer for TimelineDemuxer {
    fn read(&mut self) -> Option<OwnedPacket> {
        loop {
            let (demuxer, start_src, stop_src, shift) = {
                let ch = self.chapters.get(self.cur_chapter)?;
                (ch.demuxer, ch.start_src_ms, ch.stop_src_ms(), ch.shift_ms())
            };
            let Some(mut packet) = self.demuxers[demuxer].read() else {
                if !self.switch_to_next_chapter() {
                    return None;
                }
                continue;
            };
            let Some(ts) = packet.best_timestamp().to_millis() else {
                // Untimed packets cannot be placed on the timeline.
                continue;
            };
            if ts >= stop_src {
                if !self.switch_to_next_chapter() {
                    return None;
                }
                continue;
            }
            if ts + packet.duration.to_millis() < start_src {
                // Entirely before the chapter window.
                continue;
            }
            let shift_dur = Duration::from_millis(shift);
            packet.pts = packet.pts.rescale(TimeBase::MILLISECONDS) + shift_dur;
            packet.dts = packet.dts.rescale(TimeBase::MILLISECONDS) + shift_dur;
            // Clip so the packet's display range stays inside its chapter.
            let clipped = packet.duration.to_millis().min(stop_src - ts);
            packet.duration = Duration::from_millis(clipped);
            packet.disp_time_ms = Some(ts + shift);
            return Some(packet);
        }
    }

    fn seek_time(&mut self, time_ms: i64, backwards: bool) -> Option<i64> {
        let (_, &idx) = self.chapter_map.range(time_ms..).next()?;
        let (demuxer, shift) = {
            let ch = &self.chapters[idx];
            (ch.demuxer, ch.shift_ms())
        };
        let achieved = self.demuxers[demuxer].seek_time(time_ms - shift, backwards)?;
        self.cur_chapter = idx;
        Some(achieved + shift)
    }

    fn reset(&mut self) {
        for demuxer in &mut self.demuxers {
            demuxer.reset();
        }
        self.cur_chapter = 0;
        if let Some(ch) = self.chapters.first() {
            let (demuxer, start_src) = (ch.demuxer, ch.start_src_ms);
            let _ = self.demuxers[demuxer].seek_time(start_src, true);
        }
    }

    fn abort(&self) {
        for demuxer in &self.demuxers {
            demuxer.abort();
        }
    }

    fn flush(&mut self) {
        for demuxer in &mut self.demuxers {
            demuxer.flush();
        }
    }

    fn set_speed(&mut self, speed: i32) {
        // Inactive chapters must not come back with stale decoder state.
        for demuxer in &mut self.demuxers {
            demuxer.set_speed(speed);
        }
    }

    fn enable_stream(&mut self, stream_index: u32, enable: bool) {
        for demuxer in &mut self.demuxers {
            demuxer.enable_stream(stream_index, enable);
        }
    }

    fn streams(&self) -> Vec<StreamInfo> {
        self.demuxers[0].streams()
    }

    fn stream(&self, index: u32) -> Option<StreamInfo> {
        self.demuxers[0].stream(index)
    }

    fn stream_count(&self) -> usize {
        self.demuxers[0].stream_count()
    }

    fn stream_length_ms(&self) -> i64 {
        self.chapters.last().map(|c| c.stop_disp_ms()).unwrap_or(0)
    }

    fn file_name(&self) -> String {
        self.demuxers[0].file_name()
    }
}

fn plan_from_matroska<F: FileSystem>(
    media_path: &Path,
    cache: &mut SegmentCache<F>,
) -> Option<(Vec<ChapterPlan>, Vec<Vec<u8>>)> {
    let mut stream = cache.fs().open(media_path).ok()?;
    let doc = match MatroskaDocument::parse(&mut stream, true) {
        Ok(doc) => doc,
        Err(err) => {
            debug!(path = %media_path.display(), error = %err, "no usable matroska metadata");
            return None;
        }
    };
    drop(stream);
    let edition = doc.ordered_edition()?;
    let atoms: Vec<_> = edition
        .atoms
        .iter()
        .filter(|a| a.enabled && a.duration_ms() > 0)
        .collect();
    if atoms.is_empty() {
        return None;
    }

    let dir = media_path.parent().unwrap_or_else(|| Path::new("."));
    let wanted: Vec<Vec<u8>> = atoms
        .iter()
        .filter_map(|a| a.segment_uid.clone())
        .filter(|uid| !uid.is_empty() && *uid != doc.info.uid)
        .collect();
    let resolved = cache.resolve_set(&wanted, dir);

    let mut plans = Vec::new();
    let mut unresolved: Vec<Vec<u8>> = Vec::new();
    for atom in atoms {
        let source = match &atom.segment_uid {
            // An empty UID links to the declaring file itself.
            Some(uid) if !uid.is_empty() && *uid != doc.info.uid => match resolved.get(uid) {
                Some(locator) => SourceRef::Linked {
                    path: locator.path.clone(),
                    offset: locator.offset,
                },
                None => {
                    warn!(uid = ?uid, "dropping chapter with unresolved segment link");
                    if !unresolved.contains(uid) {
                        unresolved.push(uid.clone());
                    }
                    continue;
                }
            },
            _ => SourceRef::Primary,
        };
        plans.push(ChapterPlan {
            source,
            start_src_ms: atom.time_start_ms,
            duration_ms: atom.duration_ms(),
            title: atom.title().map(str::to_owned),
        });
    }
    if plans.is_empty() {
        return None;
    }
    Some((plans, unresolved))
}

fn plan_from_sidecar<F: FileSystem>(media_path: &Path, fs: &F) -> Option<Vec<ChapterPlan>> {
    let stream = fs.open(&sidecar::sidecar_path(media_path)).ok()?;
    let entries = sidecar::parse_sidecar(stream).ok()?;
    if entries.is_empty() {
        return None;
    }
    let dir = media_path.parent().unwrap_or_else(|| Path::new("."));
    Some(
        entries
            .into_iter()
            .map(|entry| {
                let start_src_ms = entry.start_ms;
                let duration_ms = entry.duration_ms();
                ChapterPlan {
                    source: match entry.source {
                        None => SourceRef::Primary,
                        Some(name) => SourceRef::Linked {
                            path: dir.join(name),
                            offset: 0,
                        },
                    },
                    start_src_ms,
                    duration_ms,
                    title: None,
                }
            })
            .collect(),
    )
}

/// Open demuxers for the planned chapters and assemble the timeline.
/// Chapters whose source cannot be opened are dropped; if none survive the
/// primary is handed back.
fn build(
    primary: Box<dyn Demuxer>,
    plans: Vec<ChapterPlan>,
    unresolved: Vec<Vec<u8>>,
    factory: &dyn DemuxerFactory,
) -> TimelineOutcome {
    let mut demuxers: Vec<Box<dyn Demuxer>> = vec![primary];
    let mut opened: HashMap<(PathBuf, u64), usize> = HashMap::new();
    let mut chapters = Vec::new();
    let mut disp = 0i64;
    for plan in plans {
        let demuxer = match plan.source {
            SourceRef::Primary => 0,
            SourceRef::Linked { path, offset } => match opened.get(&(path.clone(), offset)) {
                Some(&idx) => idx,
                None => match factory.open(&path, offset) {
                    Ok(demuxer) => {
                        demuxers.push(demuxer);
                        let idx = demuxers.len() - 1;
                        opened.insert((path, offset), idx);
                        idx
                    }
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "dropping chapter, cannot open source");
                        continue;
                    }
                },
            },
        };
        chapters.push(ChapterInfo {
            demuxer,
            start_src_ms: plan.start_src_ms,
            start_disp_ms: disp,
            duration_ms: plan.duration_ms,
            title: plan.title,
        });
        disp += plan.duration_ms;
    }
    if chapters.is_empty() {
        return TimelineOutcome::Single(demuxers.remove(0));
    }

    let chapter_map = chapters
        .iter()
        .enumerate()
        .map(|(idx, ch)| (ch.stop_disp_ms() - 1, idx))
        .collect();
    let mut timeline = TimelineDemuxer {
        demuxers,
        chapters,
        chapter_map,
        cur_chapter: 0,
        unresolved,
    };
    // Position at chapter 0.
    let (demuxer, start_src) = {
        let ch = &timeline.chapters[0];
        (ch.demuxer, ch.start_src_ms)
    };
    let _ = timeline.demuxers[demuxer].seek_time(start_src, true);
    TimelineOutcome::Stitched(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(demuxer: usize, start_src: i64, start_disp: i64, duration: i64) -> ChapterInfo {
        ChapterInfo {
            demuxer,
            start_src_ms: start_src,
            start_disp_ms: start_disp,
            duration_ms: duration,
            title: None,
        }
    }

    #[test]
    fn test_chapter_derived_times() {
        let ch = chapter(0, 5_000, 60_000, 30_000);
        assert_eq!(ch.stop_src_ms(), 35_000);
        assert_eq!(ch.stop_disp_ms(), 90_000);
        assert_eq!(ch.shift_ms(), 55_000);
    }

    #[test]
    fn test_chapter_map_ownership() {
        // Display ranges [0,100) and [100,250): keys 99 and 249.
        let chapters = vec![chapter(0, 0, 0, 100), chapter(0, 0, 100, 150)];
        let map: BTreeMap<i64, usize> = chapters
            .iter()
            .enumerate()
            .map(|(i, c)| (c.stop_disp_ms() - 1, i))
            .collect();
        let owner = |t: i64| map.range(t..).next().map(|(_, &i)| i);
        assert_eq!(owner(0), Some(0));
        assert_eq!(owner(99), Some(0));
        assert_eq!(owner(100), Some(1));
        assert_eq!(owner(249), Some(1));
        assert_eq!(owner(250), None);
    }
}
