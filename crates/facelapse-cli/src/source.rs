//! Photo discovery, timestamp parsing, and chronological frame access.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use facelapse_core::pipeline::{BoxError, Frame, FrameSource};
use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::overlay::DayLabeler;

/// One discovered photo: path, embedded timestamp, 1-based day index.
pub struct PhotoEntry {
    pub path: PathBuf,
    pub taken_at: NaiveDateTime,
    pub day: i64,
}

/// Parse the timestamp embedded in a Telegram photo export name:
/// `photo_<n>@DD-MM-YYYY_HH-MM-SS.jpg`.
pub fn parse_photo_timestamp(filename: &str) -> Option<NaiveDateTime> {
    let stem = filename.strip_suffix(".jpg")?;
    let rest = stem.strip_prefix("photo_")?;
    let (counter, stamp) = rest.split_once('@')?;
    if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(stamp, "%d-%m-%Y_%H-%M-%S").ok()
}

/// Day index of a photo, counting from 1 on the first photo's date.
pub fn day_index(taken: NaiveDate, first: NaiveDate) -> i64 {
    (taken - first).num_days() + 1
}

/// Discover timestamped photos in a directory, ascending by timestamp.
pub fn discover(dir: &Path) -> Result<Vec<PhotoEntry>> {
    let mut found: Vec<(PathBuf, NaiveDateTime)> = Vec::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(taken_at) = parse_photo_timestamp(name) {
            found.push((entry.path(), taken_at));
        }
    }
    found.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let Some(first_date) = found.first().map(|(_, t)| t.date()) else {
        return Ok(Vec::new());
    };
    Ok(found
        .into_iter()
        .map(|(path, taken_at)| PhotoEntry {
            day: day_index(taken_at.date(), first_date),
            path,
            taken_at,
        })
        .collect())
}

/// Chronological frame source backed by photo files on disk.
///
/// The sequence resolution is the first photo's resolution; every frame is
/// decoded and resized to it on each request rather than held in memory,
/// since the pipeline asks for each frame twice.
pub struct PhotoSequence {
    entries: Vec<PhotoEntry>,
    resolution: (u32, u32),
    labeler: Option<DayLabeler>,
}

impl PhotoSequence {
    /// Probe the first photo for the sequence resolution.
    pub fn open(entries: Vec<PhotoEntry>, labeler: Option<DayLabeler>) -> Result<Self> {
        anyhow::ensure!(!entries.is_empty(), "no photos to process");
        let first = image::open(&entries[0].path)
            .with_context(|| format!("decoding {}", entries[0].path.display()))?;
        let resolution = (first.width(), first.height());
        tracing::info!(
            width = resolution.0,
            height = resolution.1,
            photos = entries.len(),
            "photo sequence opened"
        );
        Ok(Self {
            entries,
            resolution,
            labeler,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn load(&self, entry: &PhotoEntry) -> Result<RgbImage> {
        let decoded = image::open(&entry.path)
            .with_context(|| format!("decoding {}", entry.path.display()))?
            .to_rgb8();
        let mut frame = if decoded.dimensions() == self.resolution {
            decoded
        } else {
            image::imageops::resize(
                &decoded,
                self.resolution.0,
                self.resolution.1,
                image::imageops::FilterType::Triangle,
            )
        };
        if let Some(labeler) = &self.labeler {
            labeler.draw(&mut frame, entry.day, entry.taken_at.date());
        }
        Ok(frame)
    }
}

impl FrameSource for PhotoSequence {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn frame(&mut self, index: usize) -> Result<Frame, BoxError> {
        let Some(entry) = self.entries.get(index) else {
            return Err(format!("frame index {index} out of range").into());
        };
        let image = self.load(entry).map_err(|e| -> BoxError { e.into() })?;
        Ok(Frame { image, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_telegram_filename() {
        let ts = parse_photo_timestamp("photo_12@17-03-2021_09-15-30.jpg").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2021, 3, 17).unwrap());
        assert_eq!(ts.time(), chrono::NaiveTime::from_hms_opt(9, 15, 30).unwrap());
    }

    #[test]
    fn test_parse_rejects_non_conforming_names() {
        assert!(parse_photo_timestamp("selfie.jpg").is_none());
        assert!(parse_photo_timestamp("photo_@17-03-2021_09-15-30.jpg").is_none());
        assert!(parse_photo_timestamp("photo_x@17-03-2021_09-15-30.jpg").is_none());
        assert!(parse_photo_timestamp("photo_1@2021-03-17_09-15-30.jpg").is_none());
        assert!(parse_photo_timestamp("photo_1@17-03-2021_09-15-30.png").is_none());
        assert!(parse_photo_timestamp("photo_1@31-02-2021_09-15-30.jpg").is_none());
    }

    #[test]
    fn test_day_index_is_one_based() {
        let first = NaiveDate::from_ymd_opt(2021, 3, 17).unwrap();
        assert_eq!(day_index(first, first), 1);
        let next = NaiveDate::from_ymd_opt(2021, 3, 18).unwrap();
        assert_eq!(day_index(next, first), 2);
        let later = NaiveDate::from_ymd_opt(2021, 4, 16).unwrap();
        assert_eq!(day_index(later, first), 31);
    }

    #[test]
    fn test_discover_orders_chronologically() {
        let dir = std::env::temp_dir().join(format!("facelapse-discover-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in [
            "photo_3@19-03-2021_08-00-00.jpg",
            "photo_1@17-03-2021_08-00-00.jpg",
            "photo_2@17-03-2021_20-30-00.jpg",
            "notes.txt",
        ] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let entries = discover(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(entries.len(), 3);
        assert!(entries[0].path.ends_with("photo_1@17-03-2021_08-00-00.jpg"));
        assert!(entries[1].path.ends_with("photo_2@17-03-2021_20-30-00.jpg"));
        assert!(entries[2].path.ends_with("photo_3@19-03-2021_08-00-00.jpg"));
        assert_eq!(entries[0].day, 1);
        assert_eq!(entries[1].day, 1);
        assert_eq!(entries[2].day, 3);
    }
}
