//! Matroska element IDs.
//!
//! IDs keep their length-marker bits, matching what [`crate::ebml::read_element_id`]
//! returns. Only the elements the metadata parser consumes are listed.

/// EBML header (top level).
pub const EBML: u32 = 0x1A45DFA3;
/// DocType (in EBML header).
pub const DOC_TYPE: u32 = 0x4282;

/// Segment (top level).
pub const SEGMENT: u32 = 0x18538067;

/// SeekHead (in Segment).
pub const SEEK_HEAD: u32 = 0x114D9B74;
/// Seek entry (in SeekHead).
pub const SEEK: u32 = 0x4DBB;
/// SeekID (in Seek).
pub const SEEK_ID: u32 = 0x53AB;
/// SeekPosition (in Seek), relative to the Segment payload start.
pub const SEEK_POSITION: u32 = 0x53AC;

/// Info (in Segment).
pub const INFO: u32 = 0x1549A966;
/// SegmentUID (in Info).
pub const SEGMENT_UID: u32 = 0x73A4;
/// TimecodeScale (in Info).
pub const TIMECODE_SCALE: u32 = 0x2AD7B1;

/// Chapters (in Segment).
pub const CHAPTERS: u32 = 0x1043A770;
/// EditionEntry (in Chapters).
pub const EDITION_ENTRY: u32 = 0x45B9;
/// EditionUID (in EditionEntry).
pub const EDITION_UID: u32 = 0x45BC;
/// EditionFlagHidden (in EditionEntry).
pub const EDITION_FLAG_HIDDEN: u32 = 0x45BD;
/// EditionFlagDefault (in EditionEntry).
pub const EDITION_FLAG_DEFAULT: u32 = 0x45DB;
/// EditionFlagOrdered (in EditionEntry).
pub const EDITION_FLAG_ORDERED: u32 = 0x45DD;

/// ChapterAtom (in EditionEntry).
pub const CHAPTER_ATOM: u32 = 0xB6;
/// ChapterUID (in ChapterAtom).
pub const CHAPTER_UID: u32 = 0x73C4;
/// ChapterTimeStart (in ChapterAtom), nanoseconds.
pub const CHAPTER_TIME_START: u32 = 0x91;
/// ChapterTimeEnd (in ChapterAtom), nanoseconds.
pub const CHAPTER_TIME_END: u32 = 0x92;
/// ChapterFlagHidden (in ChapterAtom).
pub const CHAPTER_FLAG_HIDDEN: u32 = 0x98;
/// ChapterFlagEnabled (in ChapterAtom).
pub const CHAPTER_FLAG_ENABLED: u32 = 0x4598;
/// ChapterSegmentUID (in ChapterAtom), links to another segment.
pub const CHAPTER_SEGMENT_UID: u32 = 0x6E67;
/// ChapterSegmentEditionUID (in ChapterAtom).
pub const CHAPTER_SEGMENT_EDITION_UID: u32 = 0x6EBC;
/// ChapterDisplay (in ChapterAtom).
pub const CHAPTER_DISPLAY: u32 = 0x80;
/// ChapString (in ChapterDisplay).
pub const CHAP_STRING: u32 = 0x85;
/// ChapLanguage (in ChapterDisplay).
pub const CHAP_LANGUAGE: u32 = 0x437C;
