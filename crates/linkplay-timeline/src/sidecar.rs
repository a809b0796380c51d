//! Sidecar chapter files.
//!
//! A plain-text companion to a media file, named by appending
//! `.OrderedChapters.csv` to the full media filename. One line per chapter:
//!
//! ```text
//! startH:startM:startS.ms, <ignored>, endH:endM:endS.ms, <ignored>, [sourceFilename]
//! ```
//!
//! An empty source filename means the primary file; otherwise the name
//! refers to a file in the media file's directory. Malformed lines and
//! lines whose end time is not after their start are skipped, never fatal.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suffix appended to the media filename to form the sidecar filename.
pub const SIDECAR_SUFFIX: &str = ".OrderedChapters.csv";

/// One usable sidecar line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarEntry {
    /// Chapter start within its source file, milliseconds.
    pub start_ms: i64,
    /// Chapter end within its source file, milliseconds. Always > start.
    pub end_ms: i64,
    /// Source filename relative to the media file's directory, or `None`
    /// for the primary file.
    pub source: Option<String>,
}

impl SidecarEntry {
    /// Chapter length in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

/// The sidecar path for a media file: the full filename plus the suffix.
pub fn sidecar_path(media_path: &Path) -> PathBuf {
    let mut name = media_path.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Read every usable entry from a sidecar stream.
pub fn parse_sidecar<R: Read>(reader: R) -> std::io::Result<Vec<SidecarEntry>> {
    let mut entries = Vec::new();
    for (lineno, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Some(entry) => entries.push(entry),
            None => debug!(line = lineno + 1, "skipping unusable sidecar line"),
        }
    }
    Ok(entries)
}

fn parse_line(line: &str) -> Option<SidecarEntry> {
    let fields: Vec<&str> = line.splitn(5, ',').collect();
    if fields.len() < 4 {
        return None;
    }
    let start_ms = parse_clock(fields[0])?;
    let end_ms = parse_clock(fields[2])?;
    if end_ms <= start_ms {
        return None;
    }
    let source = fields
        .get(4)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned);
    Some(SidecarEntry {
        start_ms,
        end_ms,
        source,
    })
}

/// Parse `H:M:S` or `H:M:S.frac` into milliseconds.
fn parse_clock(field: &str) -> Option<i64> {
    let mut parts = field.trim().split(':');
    let hours: i64 = parts.next()?.trim().parse().ok()?;
    let minutes: i64 = parts.next()?.trim().parse().ok()?;
    let seconds_part = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }
    let (seconds, millis) = match seconds_part.split_once('.') {
        Some((secs, frac)) => {
            let seconds: i64 = secs.parse().ok()?;
            // Fraction is milliseconds, right-padded to three digits.
            let padded = format!("{frac:0<3}");
            let millis: i64 = padded.get(..3)?.parse().ok()?;
            (seconds, millis)
        }
        None => (seconds_part.parse().ok()?, 0),
    };
    if hours < 0 || minutes < 0 || seconds < 0 {
        return None;
    }
    Some(((hours * 60 + minutes) * 60 + seconds) * 1000 + millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("00:00:00.000"), Some(0));
        assert_eq!(parse_clock("00:01:00.000"), Some(60_000));
        assert_eq!(parse_clock("01:02:03.500"), Some(3_723_500));
        assert_eq!(parse_clock("00:00:30"), Some(30_000));
        assert_eq!(parse_clock("00:00:01.5"), Some(1_500));
        assert_eq!(parse_clock("garbage"), None);
        assert_eq!(parse_clock("00:00"), None);
        assert_eq!(parse_clock("00:00:00:00"), None);
    }

    #[test]
    fn test_sidecar_path_appends_suffix() {
        assert_eq!(
            sidecar_path(Path::new("/media/show.mkv")),
            PathBuf::from("/media/show.mkv.OrderedChapters.csv")
        );
    }

    #[test]
    fn test_parse_sidecar_scenario() {
        let text = "00:00:00.000,x,00:01:00.000,x,\n00:00:00.000,x,00:00:30.000,x,part2.mkv\n";
        let entries = parse_sidecar(Cursor::new(text)).unwrap();
        assert_eq!(
            entries,
            vec![
                SidecarEntry {
                    start_ms: 0,
                    end_ms: 60_000,
                    source: None,
                },
                SidecarEntry {
                    start_ms: 0,
                    end_ms: 30_000,
                    source: Some("part2.mkv".into()),
                },
            ]
        );
    }

    #[test]
    fn test_parse_sidecar_skips_bad_lines() {
        let text = "\
not a chapter line
00:00:10.000,x,00:00:05.000,x,
00:00:00.000,x
00:00:00.000,x,00:00:20.000,x,extra.mkv
";
        let entries = parse_sidecar(Cursor::new(text)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].end_ms, 20_000);
        assert_eq!(entries[0].source.as_deref(), Some("extra.mkv"));
    }

    #[test]
    fn test_parse_sidecar_empty_source_is_primary() {
        let entries =
            parse_sidecar(Cursor::new("00:00:00.000,x,00:00:01.000,x,  \n")).unwrap();
        assert_eq!(entries[0].source, None);
    }
}
