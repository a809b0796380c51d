//! Segment-level Matroska metadata.
//!
//! [`MatroskaDocument::parse`] reads just enough of a file to answer two
//! questions: which segment is this (SegmentUID), and how is it stitched
//! (chapter editions). It scans the segment's top-level children linearly
//! until it finds a SeekHead, then jumps straight to the elements it wants.
//! Cluster payloads are never touched.

use crate::ebml::{self, ElementHeader, HandlerTable};
use crate::elements;
use crate::error::{MkvError, Result};
use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

/// Longest SegmentUID retained, in bytes.
const MAX_UID_LEN: usize = 16;
/// Longest chapter title retained, in bytes.
const MAX_TITLE_LEN: usize = 1024;
/// Longest language tag or doctype retained, in bytes.
const MAX_TAG_LEN: usize = 32;

/// Top-level element positions from the SeekHead, relative to the segment
/// payload start. Multi-valued: a SeekHead may list several occurrences of
/// the same element ID.
pub type SeekIndex = BTreeMap<u32, Vec<u64>>;

/// Identity and clock of a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// SegmentUID, an opaque byte string (empty when the file has none).
    pub uid: Vec<u8>,
    /// Nanoseconds per timecode tick.
    pub timecode_scale: u64,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            uid: Vec::new(),
            timecode_scale: 1_000_000,
        }
    }
}

/// A localized chapter name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterDisplay {
    /// ISO 639-2 language tag.
    pub language: String,
    /// Chapter title in that language.
    pub title: String,
}

/// One chapter of an edition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterAtom {
    /// ChapterUID.
    pub uid: u64,
    /// Start time in milliseconds within the source segment.
    pub time_start_ms: i64,
    /// End time in milliseconds within the source segment.
    pub time_end_ms: i64,
    /// Hidden from chapter listings.
    pub hidden: bool,
    /// Enabled for playback.
    pub enabled: bool,
    /// UID of the segment this chapter's content lives in, when it is not
    /// the segment that declares the chapter.
    pub segment_uid: Option<Vec<u8>>,
    /// Edition within the linked segment.
    pub segment_edition_uid: Option<u64>,
    /// Localized names.
    pub displays: Vec<ChapterDisplay>,
}

impl ChapterAtom {
    /// Chapter length in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.time_end_ms - self.time_start_ms
    }

    /// Display title, preferring English.
    pub fn title(&self) -> Option<&str> {
        self.displays
            .iter()
            .find(|d| d.language == "eng")
            .or_else(|| self.displays.first())
            .map(|d| d.title.as_str())
    }
}

/// A chapter edition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edition {
    /// EditionUID.
    pub uid: u64,
    /// Hidden from edition listings.
    pub hidden: bool,
    /// Selected by default.
    pub is_default: bool,
    /// Ordered edition: chapters define the playback timeline.
    pub ordered: bool,
    /// Chapters, in declaration order.
    pub atoms: Vec<ChapterAtom>,
}

/// Parsed segment metadata.
#[derive(Debug, Clone)]
pub struct MatroskaDocument {
    /// Segment identity and clock.
    pub info: SegmentInfo,
    /// Top-level element positions from the SeekHead.
    pub seek_index: SeekIndex,
    /// Chapter editions (empty unless requested and present).
    pub editions: Vec<Edition>,
    /// Absolute offset of the segment payload.
    pub segment_data_offset: u64,
    /// Absolute offset one past the segment payload. Another segment may
    /// start here in a back-to-back file.
    pub segment_end: u64,
}

impl MatroskaDocument {
    /// Parse one segment starting at the stream's current position.
    ///
    /// The stream must be positioned at an EBML header. With `want_chapters`
    /// the Chapters element is parsed too; identity-only callers skip it.
    /// Fails unless the doctype is "matroska" and an Info element is found.
    pub fn parse<R: Read + Seek>(reader: &mut R, want_chapters: bool) -> Result<Self> {
        let header = ElementHeader::read(reader)?;
        if header.id != elements::EBML {
            return Err(MkvError::InvalidEbmlHeader("missing EBML header".into()));
        }
        let mut doc_type = String::new();
        {
            let mut table = HandlerTable::new().on(elements::DOC_TYPE, |r: &mut R, l| {
                doc_type = ebml::read_string(r, l, MAX_TAG_LEN)?;
                Ok(())
            });
            ebml::parse_master(reader, header.size, &mut table, false)?;
        }
        if doc_type != "matroska" {
            return Err(MkvError::InvalidEbmlHeader(format!(
                "unsupported doctype {doc_type:?}"
            )));
        }

        let segment = ElementHeader::read(reader)?;
        if segment.id != elements::SEGMENT {
            return Err(MkvError::UnexpectedElement {
                expected: elements::SEGMENT,
                found: segment.id,
            });
        }
        let segment_data_offset = reader.stream_position()?;
        let segment_end = segment_data_offset + segment.size;

        let mut info: Option<SegmentInfo> = None;
        let mut seek_index = SeekIndex::new();
        let mut editions: Option<Vec<Edition>> = None;

        // Linear scan of top-level children. A SeekHead ends the scan since
        // everything else can be reached by jumping.
        while reader.stream_position()? < segment_end {
            let child = match ElementHeader::read(reader) {
                Ok(child) => child,
                Err(MkvError::Io(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => return Err(e),
            };
            let child_end = reader.stream_position()? + child.size;
            match child.id {
                elements::INFO => info = Some(parse_segment_info(reader, child.size)?),
                elements::CHAPTERS if want_chapters => {
                    editions = Some(parse_chapters(reader, child.size)?)
                }
                elements::SEEK_HEAD => {
                    parse_seek_head(reader, child.size, &mut seek_index)?;
                    reader.seek(SeekFrom::Start(child_end))?;
                    break;
                }
                _ => {}
            }
            reader.seek(SeekFrom::Start(child_end))?;
            if info.is_some() && (!want_chapters || editions.is_some()) {
                break;
            }
        }

        if info.is_none() {
            if let Some(positions) = seek_index.get(&elements::INFO) {
                for &pos in positions {
                    reader.seek(SeekFrom::Start(segment_data_offset + pos))?;
                    if let Ok(h) = ElementHeader::read(reader) {
                        if h.id == elements::INFO {
                            info = Some(parse_segment_info(reader, h.size)?);
                            break;
                        }
                    }
                }
            }
        }
        let info = info.ok_or_else(|| MkvError::MissingElement("Info".into()))?;

        if want_chapters && editions.is_none() {
            if let Some(positions) = seek_index.get(&elements::CHAPTERS) {
                for &pos in positions {
                    reader.seek(SeekFrom::Start(segment_data_offset + pos))?;
                    if let Ok(h) = ElementHeader::read(reader) {
                        if h.id == elements::CHAPTERS {
                            editions = Some(parse_chapters(reader, h.size)?);
                            break;
                        }
                    }
                }
            }
        }

        Ok(Self {
            info,
            seek_index,
            editions: editions.unwrap_or_default(),
            segment_data_offset,
            segment_end,
        })
    }

    /// The edition that defines an ordered timeline, if any.
    ///
    /// The first edition carrying the ordered flag wins; later ordered
    /// editions are ignored.
    pub fn ordered_edition(&self) -> Option<&Edition> {
        self.editions.iter().find(|e| e.ordered)
    }
}

fn parse_segment_info<R: Read + Seek>(reader: &mut R, len: u64) -> Result<SegmentInfo> {
    let mut uid = Vec::new();
    let mut timecode_scale = 1_000_000u64;
    let mut table = HandlerTable::new()
        .on(elements::SEGMENT_UID, |r: &mut R, l| {
            uid = ebml::read_bytes(r, l, MAX_UID_LEN)?;
            Ok(())
        })
        .on(elements::TIMECODE_SCALE, |r: &mut R, l| {
            timecode_scale = ebml::read_uint(r, l)?;
            Ok(())
        });
    ebml::parse_master(reader, len, &mut table, false)?;
    drop(table);
    Ok(SegmentInfo {
        uid,
        timecode_scale,
    })
}

fn parse_seek_head<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    index: &mut SeekIndex,
) -> Result<()> {
    let mut entries: Vec<(u32, u64)> = Vec::new();
    let mut table = HandlerTable::new().on(elements::SEEK, |r: &mut R, l| {
        if let Some(entry) = parse_seek_entry(r, l)? {
            entries.push(entry);
        }
        Ok(())
    });
    ebml::parse_master(reader, len, &mut table, false)?;
    drop(table);
    for (id, pos) in entries {
        index.entry(id).or_default().push(pos);
    }
    Ok(())
}

fn parse_seek_entry<R: Read + Seek>(reader: &mut R, len: u64) -> Result<Option<(u32, u64)>> {
    let mut id = None;
    let mut position = None;
    let mut table = HandlerTable::new()
        .on(elements::SEEK_ID, |r: &mut R, l| {
            // SeekID holds the target's encoded element ID as binary.
            let bytes = ebml::read_bytes(r, l, 4)?;
            let mut value = 0u32;
            for b in bytes {
                value = (value << 8) | u32::from(b);
            }
            id = Some(value);
            Ok(())
        })
        .on(elements::SEEK_POSITION, |r: &mut R, l| {
            position = Some(ebml::read_uint(r, l)?);
            Ok(())
        });
    ebml::parse_master(reader, len, &mut table, false)?;
    drop(table);
    Ok(id.zip(position))
}

fn parse_chapters<R: Read + Seek>(reader: &mut R, len: u64) -> Result<Vec<Edition>> {
    let mut editions = Vec::new();
    let mut table = HandlerTable::new().on(elements::EDITION_ENTRY, |r: &mut R, l| {
        editions.push(parse_edition(r, l)?);
        Ok(())
    });
    ebml::parse_master(reader, len, &mut table, false)?;
    drop(table);
    Ok(editions)
}

fn parse_edition<R: Read + Seek>(reader: &mut R, len: u64) -> Result<Edition> {
    let mut uid = 0u64;
    let mut hidden = false;
    let mut is_default = false;
    let mut ordered = false;
    let mut atoms = Vec::new();
    let mut table = HandlerTable::new()
        .on(elements::EDITION_UID, |r: &mut R, l| {
            uid = ebml::read_uint(r, l)?;
            Ok(())
        })
        .on(elements::EDITION_FLAG_HIDDEN, |r: &mut R, l| {
            hidden = ebml::read_uint(r, l)? != 0;
            Ok(())
        })
        .on(elements::EDITION_FLAG_DEFAULT, |r: &mut R, l| {
            is_default = ebml::read_uint(r, l)? != 0;
            Ok(())
        })
        .on(elements::EDITION_FLAG_ORDERED, |r: &mut R, l| {
            ordered = ebml::read_uint(r, l)? != 0;
            Ok(())
        })
        .on(elements::CHAPTER_ATOM, |r: &mut R, l| {
            atoms.push(parse_chapter_atom(r, l)?);
            Ok(())
        });
    ebml::parse_master(reader, len, &mut table, false)?;
    drop(table);
    Ok(Edition {
        uid,
        hidden,
        is_default,
        ordered,
        atoms,
    })
}

fn parse_chapter_atom<R: Read + Seek>(reader: &mut R, len: u64) -> Result<ChapterAtom> {
    let mut uid = 0u64;
    let mut time_start_ms = 0i64;
    let mut time_end_ms = 0i64;
    let mut hidden = false;
    let mut enabled = true;
    let mut segment_uid = None;
    let mut segment_edition_uid = None;
    let mut displays = Vec::new();
    let mut table = HandlerTable::new()
        .on(elements::CHAPTER_UID, |r: &mut R, l| {
            uid = ebml::read_uint(r, l)?;
            Ok(())
        })
        .on(elements::CHAPTER_TIME_START, |r: &mut R, l| {
            time_start_ms = (ebml::read_uint(r, l)? / 1_000_000) as i64;
            Ok(())
        })
        .on(elements::CHAPTER_TIME_END, |r: &mut R, l| {
            time_end_ms = (ebml::read_uint(r, l)? / 1_000_000) as i64;
            Ok(())
        })
        .on(elements::CHAPTER_FLAG_HIDDEN, |r: &mut R, l| {
            hidden = ebml::read_uint(r, l)? != 0;
            Ok(())
        })
        .on(elements::CHAPTER_FLAG_ENABLED, |r: &mut R, l| {
            enabled = ebml::read_uint(r, l)? != 0;
            Ok(())
        })
        .on(elements::CHAPTER_SEGMENT_UID, |r: &mut R, l| {
            let uid = ebml::read_bytes(r, l, MAX_UID_LEN)?;
            // A zero-length UID means the declaring file itself.
            if !uid.is_empty() {
                segment_uid = Some(uid);
            }
            Ok(())
        })
        .on(elements::CHAPTER_SEGMENT_EDITION_UID, |r: &mut R, l| {
            segment_edition_uid = Some(ebml::read_uint(r, l)?);
            Ok(())
        })
        .on(elements::CHAPTER_DISPLAY, |r: &mut R, l| {
            displays.push(parse_chapter_display(r, l)?);
            Ok(())
        });
    ebml::parse_master(reader, len, &mut table, false)?;
    drop(table);
    Ok(ChapterAtom {
        uid,
        time_start_ms,
        time_end_ms,
        hidden,
        enabled,
        segment_uid,
        segment_edition_uid,
        displays,
    })
}

fn parse_chapter_display<R: Read + Seek>(reader: &mut R, len: u64) -> Result<ChapterDisplay> {
    let mut language = String::new();
    let mut title = String::new();
    let mut table = HandlerTable::new()
        .on(elements::CHAP_STRING, |r: &mut R, l| {
            title = ebml::read_string(r, l, MAX_TITLE_LEN)?;
            Ok(())
        })
        .on(elements::CHAP_LANGUAGE, |r: &mut R, l| {
            language = ebml::read_string(r, l, MAX_TAG_LEN)?;
            Ok(())
        });
    ebml::parse_master(reader, len, &mut table, false)?;
    drop(table);
    if language.is_empty() {
        language = "eng".into();
    }
    Ok(ChapterDisplay { language, title })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::{encode_element_id, encode_vint};
    use std::io::Cursor;

    fn element(id: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = encode_element_id(id);
        out.extend(encode_vint(payload.len() as u64));
        out.extend_from_slice(payload);
        out
    }

    fn uint(id: u32, value: u64) -> Vec<u8> {
        let mut payload = value.to_be_bytes().to_vec();
        while payload.len() > 1 && payload[0] == 0 {
            payload.remove(0);
        }
        element(id, &payload)
    }

    fn ebml_header(doc_type: &str) -> Vec<u8> {
        element(elements::EBML, &element(elements::DOC_TYPE, doc_type.as_bytes()))
    }

    fn info_element(uid: &[u8]) -> Vec<u8> {
        let mut payload = element(elements::SEGMENT_UID, uid);
        payload.extend(uint(elements::TIMECODE_SCALE, 1_000_000));
        element(elements::INFO, &payload)
    }

    fn chapter_atom(start_ns: u64, end_ns: u64, link: Option<&[u8]>) -> Vec<u8> {
        let mut payload = uint(elements::CHAPTER_TIME_START, start_ns);
        payload.extend(uint(elements::CHAPTER_TIME_END, end_ns));
        if let Some(uid) = link {
            payload.extend(element(elements::CHAPTER_SEGMENT_UID, uid));
        }
        element(elements::CHAPTER_ATOM, &payload)
    }

    fn build_file(segment_children: &[Vec<u8>]) -> Vec<u8> {
        let mut file = ebml_header("matroska");
        let payload: Vec<u8> = segment_children.concat();
        file.extend(element(elements::SEGMENT, &payload));
        file
    }

    #[test]
    fn test_parse_inline_info() {
        let uid = [0xAAu8; 16];
        let file = build_file(&[info_element(&uid)]);
        let mut cursor = Cursor::new(file);
        let doc = MatroskaDocument::parse(&mut cursor, false).unwrap();
        assert_eq!(doc.info.uid, uid.to_vec());
        assert_eq!(doc.info.timecode_scale, 1_000_000);
        assert!(doc.editions.is_empty());
    }

    #[test]
    fn test_rejects_wrong_doctype() {
        let mut file = ebml_header("webm");
        file.extend(element(elements::SEGMENT, &info_element(&[1; 16])));
        let mut cursor = Cursor::new(file);
        assert!(matches!(
            MatroskaDocument::parse(&mut cursor, false),
            Err(MkvError::InvalidEbmlHeader(_))
        ));
    }

    #[test]
    fn test_missing_info_fails() {
        let file = build_file(&[element(0xEC, &[0u8; 4])]);
        let mut cursor = Cursor::new(file);
        assert!(matches!(
            MatroskaDocument::parse(&mut cursor, false),
            Err(MkvError::MissingElement(_))
        ));
    }

    #[test]
    fn test_info_reached_through_seek_head() {
        // Segment payload: SeekHead, a filler, then Info. The scan stops at
        // the SeekHead and must jump to the Info through the index.
        let filler = element(0xEC, &[0u8; 10]);
        let info = info_element(&[0xBB; 16]);

        // SeekHead sizes are fixed by construction below.
        let seek_id = element(elements::SEEK_ID, &encode_element_id(elements::INFO));
        let seek_head_len = {
            // One Seek entry: SeekID + SeekPosition(1 byte position).
            let pos_probe = uint(elements::SEEK_POSITION, 0);
            let entry = element(elements::SEEK, &[seek_id.clone(), pos_probe].concat());
            element(elements::SEEK_HEAD, &entry).len() as u64
        };
        let info_pos = seek_head_len + filler.len() as u64;
        assert!(info_pos < 0x7F, "position must stay a 1-byte uint");

        let entry = element(
            elements::SEEK,
            &[seek_id, uint(elements::SEEK_POSITION, info_pos)].concat(),
        );
        let seek_head = element(elements::SEEK_HEAD, &entry);
        assert_eq!(seek_head.len() as u64, seek_head_len);

        let file = build_file(&[seek_head, filler, info]);
        let mut cursor = Cursor::new(file);
        let doc = MatroskaDocument::parse(&mut cursor, false).unwrap();
        assert_eq!(doc.info.uid, vec![0xBB; 16]);
        assert_eq!(doc.seek_index[&elements::INFO], vec![info_pos]);
    }

    #[test]
    fn test_parse_ordered_chapters() {
        let link_uid = [0x11u8; 16];
        let mut edition_payload = uint(elements::EDITION_FLAG_ORDERED, 1);
        edition_payload.extend(chapter_atom(0, 60_000_000_000, None));
        edition_payload.extend(chapter_atom(
            5_000_000_000,
            35_000_000_000,
            Some(&link_uid),
        ));
        let chapters = element(
            elements::CHAPTERS,
            &element(elements::EDITION_ENTRY, &edition_payload),
        );
        let file = build_file(&[info_element(&[0xCC; 16]), chapters]);

        let mut cursor = Cursor::new(file);
        let doc = MatroskaDocument::parse(&mut cursor, true).unwrap();
        let edition = doc.ordered_edition().unwrap();
        assert_eq!(edition.atoms.len(), 2);
        assert_eq!(edition.atoms[0].time_start_ms, 0);
        assert_eq!(edition.atoms[0].time_end_ms, 60_000);
        assert_eq!(edition.atoms[0].duration_ms(), 60_000);
        assert!(edition.atoms[0].segment_uid.is_none());
        assert_eq!(edition.atoms[1].time_start_ms, 5_000);
        assert_eq!(edition.atoms[1].time_end_ms, 35_000);
        assert_eq!(edition.atoms[1].segment_uid.as_deref(), Some(&link_uid[..]));
    }

    #[test]
    fn test_empty_chapter_segment_uid_means_own_file() {
        let mut edition_payload = uint(elements::EDITION_FLAG_ORDERED, 1);
        edition_payload.extend(chapter_atom(0, 10_000_000_000, Some(&[])));
        let chapters = element(
            elements::CHAPTERS,
            &element(elements::EDITION_ENTRY, &edition_payload),
        );
        let file = build_file(&[info_element(&[0x22; 16]), chapters]);
        let mut cursor = Cursor::new(file);
        let doc = MatroskaDocument::parse(&mut cursor, true).unwrap();
        assert_eq!(doc.ordered_edition().unwrap().atoms[0].segment_uid, None);
    }

    #[test]
    fn test_chapters_skipped_when_not_wanted() {
        let mut edition_payload = uint(elements::EDITION_FLAG_ORDERED, 1);
        edition_payload.extend(chapter_atom(0, 1_000_000_000, None));
        let chapters = element(
            elements::CHAPTERS,
            &element(elements::EDITION_ENTRY, &edition_payload),
        );
        let file = build_file(&[chapters, info_element(&[0xDD; 16])]);
        let mut cursor = Cursor::new(file);
        let doc = MatroskaDocument::parse(&mut cursor, false).unwrap();
        assert!(doc.editions.is_empty());
        assert!(doc.ordered_edition().is_none());
    }

    #[test]
    fn test_segment_end_reported() {
        let file = build_file(&[info_element(&[0xEE; 16])]);
        let total = file.len() as u64;
        let mut cursor = Cursor::new(file);
        let doc = MatroskaDocument::parse(&mut cursor, false).unwrap();
        assert_eq!(doc.segment_end, total);
    }

    #[test]
    fn test_chapter_title_prefers_english() {
        let atom = ChapterAtom {
            displays: vec![
                ChapterDisplay {
                    language: "jpn".into(),
                    title: "第一章".into(),
                },
                ChapterDisplay {
                    language: "eng".into(),
                    title: "Chapter One".into(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(atom.title(), Some("Chapter One"));
    }
}
