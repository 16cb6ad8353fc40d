//! Snapshot and zone types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConfigError, FormatKind, ParsedName};

/// Rendering style of a snapshot or overview canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Light,
    Dark,
}

impl Style {
    pub fn as_str(self) -> &'static str {
        match self {
            Style::Light => "light",
            Style::Dark => "dark",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Style::Light),
            "dark" => Ok(Style::Dark),
            other => Err(ConfigError::UnknownStyle(other.to_string())),
        }
    }
}

/// A snapshot image discovered on disk.
///
/// Snapshots are never created or modified here, only linked or deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    /// Full path to the image.
    pub path: PathBuf,
    /// Bare file name.
    pub file_name: String,
    /// Zone/continent tag embedded in the name.
    pub tag: String,
    /// Embedded timestamp (UTC).
    pub timestamp: DateTime<Utc>,
    /// Style suffix, if any.
    pub style: Option<Style>,
    /// Timestamp encoding used in the name.
    pub format: FormatKind,
}

impl SnapshotFile {
    /// Build from a path and its parsed name.
    pub fn from_parsed(path: PathBuf, file_name: String, parsed: ParsedName) -> Self {
        Self {
            path,
            file_name,
            tag: parsed.tag,
            timestamp: parsed.timestamp,
            style: parsed.style,
            format: parsed.format,
        }
    }
}

/// Continent codes accepted for the `continent` zone kind.
pub const CONTINENTS: [&str; 6] = ["AF", "AS", "EU", "NA", "OC", "SA"];

/// How the upstream feed partitions snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Continent,
    CqZone,
    ItuZone,
}

impl ZoneKind {
    /// Subdirectory of the source root holding this kind of zone.
    pub fn dir_name(self) -> &'static str {
        match self {
            ZoneKind::Continent => "continent",
            ZoneKind::CqZone => "cqzone",
            ZoneKind::ItuZone => "ituzone",
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One logical partition of the snapshot feed, animated independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Zone {
    pub kind: ZoneKind,
    pub name: String,
}

impl Zone {
    /// A continent zone; the code must be one of [`CONTINENTS`].
    pub fn continent(code: &str) -> Result<Self, ConfigError> {
        if !CONTINENTS.contains(&code) {
            return Err(ConfigError::UnknownContinent(code.to_string()));
        }
        Ok(Self {
            kind: ZoneKind::Continent,
            name: code.to_string(),
        })
    }

    /// A CQ zone by number.
    pub fn cq(number: u32) -> Self {
        Self {
            kind: ZoneKind::CqZone,
            name: number.to_string(),
        }
    }

    /// An ITU zone by number.
    pub fn itu(number: u32) -> Self {
        Self {
            kind: ZoneKind::ItuZone,
            name: number.to_string(),
        }
    }

    /// Directory holding this zone's snapshots: `<root>/<kind>/<name>`.
    pub fn source_dir(&self, root: &Path) -> PathBuf {
        root.join(self.kind.dir_name()).join(&self.name)
    }

    /// Published artifact path: `<dir>/<prefix>-<name>.<container>`.
    pub fn artifact_path(&self, dir: &Path, prefix: &str, container: &str) -> PathBuf {
        dir.join(format!("{}-{}.{}", prefix, self.name, container))
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parse() {
        assert_eq!("light".parse::<Style>().unwrap(), Style::Light);
        assert_eq!("dark".parse::<Style>().unwrap(), Style::Dark);
        assert!("Light".parse::<Style>().is_err());
    }

    #[test]
    fn test_zone_paths() {
        let zone = Zone::continent("EU").unwrap();
        assert_eq!(
            zone.source_dir(Path::new("/var/tmp/DXCC")),
            PathBuf::from("/var/tmp/DXCC/continent/EU")
        );
        assert_eq!(
            zone.artifact_path(Path::new("/tmp"), "dxcc", "mp4"),
            PathBuf::from("/tmp/dxcc-EU.mp4")
        );
        assert_eq!(
            Zone::cq(14).source_dir(Path::new("/src")),
            PathBuf::from("/src/cqzone/14")
        );
    }

    #[test]
    fn test_unknown_continent() {
        assert!(matches!(
            Zone::continent("XX"),
            Err(ConfigError::UnknownContinent(_))
        ));
    }
}
