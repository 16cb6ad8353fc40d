//! Snapshot filename codec.
//!
//! Snapshot names follow `<prefix>-<tag>-<timestamp>[-<style>].<ext>`, e.g.
//! `dxcc-EU-20250101T120000-light.png`. Two timestamp encodings coexist on
//! disk: the compact `YYYYMMDDhhmm` written by older feeds and the delimited
//! `YYYYMMDDThhmmss` written since. Each encoding is an independent
//! [`TimestampFormat`] strategy; the codec tries them in order.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use super::Style;

/// Identifies which timestamp encoding a name was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// `YYYYMMDDhhmm`, minute precision.
    Compact,
    /// `YYYYMMDDThhmmss`, second precision.
    Delimited,
}

/// A single recognizer for the timestamp field of a snapshot name.
pub trait TimestampFormat: fmt::Debug + Send + Sync {
    /// Which encoding this strategy recognizes.
    fn kind(&self) -> FormatKind;

    /// Parse the timestamp field. Returns `None` when the field is not in
    /// this encoding or names an impossible date.
    fn parse(&self, field: &str) -> Option<DateTime<Utc>>;
}

/// Compact encoding: `YYYYMMDDhhmm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactFormat;

impl TimestampFormat for CompactFormat {
    fn kind(&self) -> FormatKind {
        FormatKind::Compact
    }

    fn parse(&self, field: &str) -> Option<DateTime<Utc>> {
        if field.len() != 12 {
            return None;
        }
        let f = digit_fields(field, &[4, 2, 2, 2, 2])?;
        to_utc(f[0], f[1], f[2], f[3], f[4], 0)
    }
}

/// Delimited encoding: `YYYYMMDDThhmmss`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedFormat;

impl TimestampFormat for DelimitedFormat {
    fn kind(&self) -> FormatKind {
        FormatKind::Delimited
    }

    fn parse(&self, field: &str) -> Option<DateTime<Utc>> {
        let (date, time) = field.split_once('T')?;
        if date.len() != 8 || time.len() != 6 {
            return None;
        }
        let d = digit_fields(date, &[4, 2, 2])?;
        let t = digit_fields(time, &[2, 2, 2])?;
        to_utc(d[0], d[1], d[2], t[0], t[1], t[2])
    }
}

/// Recognizers tried in order. New encodings are appended here.
pub static FORMATS: &[&dyn TimestampFormat] = &[&DelimitedFormat, &CompactFormat];

/// Split an all-digit string into fixed-width numeric fields.
fn digit_fields(s: &str, widths: &[usize]) -> Option<Vec<u32>> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut pos = 0;
    let mut out = Vec::with_capacity(widths.len());
    for &w in widths {
        out.push(s.get(pos..pos + w)?.parse().ok()?);
        pos += w;
    }
    Some(out)
}

fn to_utc(y: u32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(y as i32, mo, d)?
        .and_hms_opt(h, mi, s)
        .map(|naive| naive.and_utc())
}

/// Components of a recognized snapshot filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Zone/continent code between the prefix and the timestamp.
    pub tag: String,
    /// Embedded timestamp, normalized to UTC.
    pub timestamp: DateTime<Utc>,
    /// Encoding the timestamp was written in.
    pub format: FormatKind,
    /// Rendering style suffix, if any.
    pub style: Option<Style>,
}

/// Parses and renders snapshot filenames.
#[derive(Debug, Clone)]
pub struct SnapshotCodec {
    prefix: String,
    extension: String,
    formats: &'static [&'static dyn TimestampFormat],
}

impl Default for SnapshotCodec {
    fn default() -> Self {
        Self::new("dxcc", "png")
    }
}

impl SnapshotCodec {
    /// Create a codec for `<prefix>-...<ext>` names.
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            extension: extension.into(),
            formats: FORMATS,
        }
    }

    /// Filename prefix without the trailing dash.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Extension without the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Cheap pre-filter: does this name start with `<prefix>-`?
    pub fn has_prefix(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Parse a filename. Names outside the grammar yield `None`.
    pub fn parse(&self, file_name: &str) -> Option<ParsedName> {
        let stem = file_name
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')?;
        let rest = stem.strip_prefix(self.prefix.as_str())?.strip_prefix('-')?;

        let (rest, style) = match rest.rsplit_once('-') {
            Some((head, last)) => match last.parse::<Style>() {
                Ok(style) => (head, Some(style)),
                Err(_) => (rest, None),
            },
            None => return None,
        };

        let (tag, field) = rest.rsplit_once('-')?;
        if tag.is_empty() {
            return None;
        }

        self.formats.iter().find_map(|format| {
            format.parse(field).map(|timestamp| ParsedName {
                tag: tag.to_string(),
                timestamp,
                format: format.kind(),
                style,
            })
        })
    }

    /// Render a name in the delimited encoding.
    pub fn render(&self, tag: &str, timestamp: DateTime<Utc>, style: Option<Style>) -> String {
        let stamp = timestamp.format("%Y%m%dT%H%M%S");
        match style {
            Some(style) => format!(
                "{}-{}-{}-{}.{}",
                self.prefix, tag, stamp, style, self.extension
            ),
            None => format!("{}-{}-{}.{}", self.prefix, tag, stamp, self.extension),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_parse_compact() {
        let codec = SnapshotCodec::default();
        let parsed = codec.parse("dxcc-EU-202501011230.png").unwrap();
        assert_eq!(parsed.tag, "EU");
        assert_eq!(parsed.format, FormatKind::Compact);
        assert_eq!(parsed.style, None);
        assert_eq!(
            parsed.timestamp,
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_delimited_with_style() {
        let codec = SnapshotCodec::default();
        let parsed = codec.parse("dxcc-NA-20240315T060045-dark.png").unwrap();
        assert_eq!(parsed.tag, "NA");
        assert_eq!(parsed.format, FormatKind::Delimited);
        assert_eq!(parsed.style, Some(Style::Dark));
        assert_eq!(
            parsed.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 45).unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        let codec = SnapshotCodec::default();
        for name in [
            "canvas-light.png",
            "dxcc-00001.png",
            "dxcc-EU-2025010112.png",
            "dxcc-EU-202513011230.png",
            "dxcc-EU-20250101T1230.png",
            "dxcc-EU-202501011230.jpg",
            "dxcc--202501011230.png",
            "dxcc-EU-202501011230-sepia.png",
            "workdir-123",
        ] {
            assert!(codec.parse(name).is_none(), "{name} should not parse");
        }
    }

    #[test]
    fn test_has_prefix() {
        let codec = SnapshotCodec::default();
        assert!(codec.has_prefix("dxcc-EU-202501011230.png"));
        assert!(!codec.has_prefix("dxccEU.png"));
        assert!(!codec.has_prefix("canvas.png"));
    }

    #[test]
    fn test_render_uses_delimited_form() {
        let codec = SnapshotCodec::default();
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(codec.render("EU", ts, None), "dxcc-EU-20250102T030405.png");
        assert_eq!(
            codec.render("14", ts, Some(Style::Light)),
            "dxcc-14-20250102T030405-light.png"
        );
    }

    proptest! {
        #[test]
        fn prop_delimited_roundtrip(secs in 0i64..4_102_444_800, tag in "[A-Z0-9]{1,4}") {
            let codec = SnapshotCodec::default();
            let ts = DateTime::from_timestamp(secs, 0).unwrap();
            let name = codec.render(&tag, ts, None);
            let parsed = codec.parse(&name).unwrap();
            prop_assert_eq!(parsed.timestamp, ts);
            prop_assert_eq!(parsed.tag, tag);
            prop_assert_eq!(parsed.format, FormatKind::Delimited);
        }

        #[test]
        fn prop_compact_normalizes(minutes in 0i64..68_374_080) {
            let codec = SnapshotCodec::default();
            let ts = DateTime::from_timestamp(minutes * 60, 0).unwrap();
            let compact = format!("dxcc-EU-{}.png", ts.format("%Y%m%d%H%M"));
            let first = codec.parse(&compact).unwrap();
            let upgraded = codec.render(&first.tag, first.timestamp, first.style);
            let second = codec.parse(&upgraded).unwrap();
            prop_assert_eq!(first.timestamp, ts);
            prop_assert_eq!(second.timestamp, ts);
        }
    }
}
