use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Date, Month};

use crate::DomainError;

static SORT_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})-(\d{2})-(\d{2})_a(\d+)_.*_split(\d+)").expect("valid sort key regex")
});

static SESSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2}_a\d+)").expect("valid session regex"));

/// Julian day number of 0000-12-31, so that 0001-01-01 has ordinal 1.
const ORDINAL_EPOCH_JULIAN_DAY: i32 = 1_721_425;

const SORT_KEY_EXPECTED: &str = "YYYY-MM-DD_a<take>_..._split<split>";
const SESSION_EXPECTED: &str = "YYYY-MM-DD_a<take>";

/// Total-order key for recordings: capture day, then take, then split.
///
/// Field order matters: the derived `Ord` compares lexicographically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey {
    /// Proleptic Gregorian day count, 0001-01-01 = 1.
    pub ordinal_day: i32,
    pub take: u32,
    pub split: u32,
}

impl SessionKey {
    /// Extracts the key from a file stem.
    pub fn from_stem(stem: &str) -> Result<Self, DomainError> {
        let (date, take, split) = parse_stem(stem)?;
        Ok(Self {
            ordinal_day: ordinal_day(date),
            take,
            split,
        })
    }
}

/// Recording session identity, e.g. `2023-05-01_a2`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Finds the first `YYYY-MM-DD_a<N>` substring anywhere in `input`.
    pub fn extract(input: &str) -> Result<Self, DomainError> {
        SESSION_PATTERN
            .captures(input)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| DomainError::pattern_mismatch(input, SESSION_EXPECTED))
    }

    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        Self::extract(&path.to_string_lossy())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A video file together with everything derivable from its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoAsset {
    pub path: PathBuf,
    pub session: SessionId,
    pub capture_date: Date,
    pub take: u32,
    pub split: u32,
}

impl VideoAsset {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        let (capture_date, take, split) = parse_stem(&file_stem(&path)?)?;
        let session = SessionId::from_path(&path)?;
        Ok(Self {
            path,
            session,
            capture_date,
            take,
            split,
        })
    }

    pub fn sort_key(&self) -> SessionKey {
        SessionKey {
            ordinal_day: ordinal_day(self.capture_date),
            take: self.take,
            split: self.split,
        }
    }

    /// File name including extension, as used in exports.
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Parses every path into an asset and orders the assets by session key,
/// failing on the first malformed name.
pub fn sort_by_session_key(paths: Vec<PathBuf>) -> Result<Vec<VideoAsset>, DomainError> {
    let mut assets = paths
        .into_iter()
        .map(VideoAsset::from_path)
        .collect::<Result<Vec<_>, _>>()?;
    assets.sort_by(|a, b| {
        a.sort_key()
            .cmp(&b.sort_key())
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(assets)
}

fn file_stem(path: &Path) -> Result<String, DomainError> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| {
            DomainError::pattern_mismatch(path.to_string_lossy(), SORT_KEY_EXPECTED)
        })
}

fn parse_stem(stem: &str) -> Result<(Date, u32, u32), DomainError> {
    let mismatch = || DomainError::pattern_mismatch(stem, SORT_KEY_EXPECTED);
    let caps = SORT_KEY_PATTERN.captures(stem).ok_or_else(mismatch)?;
    let number = |index: usize| -> Result<u32, DomainError> {
        caps.get(index)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .ok_or_else(mismatch)
    };
    let year = number(1)? as i32;
    let month = u8::try_from(number(2)?).map_err(|_| mismatch())?;
    let day = u8::try_from(number(3)?).map_err(|_| mismatch())?;
    let month = Month::try_from(month).map_err(|_| mismatch())?;
    let date = Date::from_calendar_date(year, month, day).map_err(|_| mismatch())?;
    Ok((date, number(4)?, number(5)?))
}

fn ordinal_day(date: Date) -> i32 {
    date.to_julian_day() - ORDINAL_EPOCH_JULIAN_DAY
}
