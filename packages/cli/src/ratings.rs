//! Local 1–5 star ratings for alerts, kept in a JSON file keyed by alert
//! id. Ratings never leave this machine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const MIN_STARS: u8 = 1;
pub const MAX_STARS: u8 = 5;

#[derive(Debug, Error)]
pub enum RatingError {
    /// Outside `1..=5`.
    #[error("Rating must be between {MIN_STARS} and {MAX_STARS} stars, got {stars}")]
    OutOfRange { stars: u8 },

    #[error("Failed to access ratings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Ratings file {path} is corrupt: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Star ratings backed by a JSON file.
#[derive(Debug)]
pub struct RatingStore {
    path: PathBuf,
    ratings: BTreeMap<String, u8>,
}

impl RatingStore {
    /// Opens the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::Io`] if the file exists but can't be read,
    /// or [`RatingError::Parse`] if it isn't a JSON object of ratings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RatingError> {
        let path = path.into();

        let ratings = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let stored: BTreeMap<String, u8> =
                    serde_json::from_str(&text).map_err(|source| RatingError::Parse {
                        path: path.display().to_string(),
                        source,
                    })?;
                // Drop anything a hand edit put out of range.
                stored
                    .into_iter()
                    .filter(|(_, stars)| (MIN_STARS..=MAX_STARS).contains(stars))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(RatingError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        Ok(Self { path, ratings })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stars given to `alert_id`, if rated.
    #[must_use]
    pub fn get(&self, alert_id: &str) -> Option<u8> {
        self.ratings.get(alert_id).copied()
    }

    /// Rates `alert_id` and writes the store back to disk.
    ///
    /// # Errors
    ///
    /// Returns [`RatingError::OutOfRange`] for ratings outside `1..=5`, or
    /// [`RatingError::Io`] if the file can't be written.
    pub fn rate(&mut self, alert_id: &str, stars: u8) -> Result<(), RatingError> {
        if !(MIN_STARS..=MAX_STARS).contains(&stars) {
            return Err(RatingError::OutOfRange { stars });
        }
        self.ratings.insert(alert_id.to_string(), stars);
        self.save()
    }

    fn save(&self) -> Result<(), RatingError> {
        let io_err = |source| RatingError::Io {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&self.ratings).map_err(|source| {
            RatingError::Parse {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        std::fs::write(&self.path, json).map_err(io_err)
    }
}

/// Renders a rating as filled and empty stars, e.g. `★★★☆☆`.
#[must_use]
pub fn stars(rating: u8) -> String {
    let filled = usize::from(rating.min(MAX_STARS));
    let empty = usize::from(MAX_STARS) - filled;
    format!("{}{}", "★".repeat(filled), "☆".repeat(empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "alert_feed_ratings_{name}_{}.json",
            std::process::id()
        ))
    }

    #[test]
    fn missing_file_is_empty() {
        let store = RatingStore::open(temp_path("missing")).unwrap();
        assert_eq!(store.get("1"), None);
    }

    #[test]
    fn rating_persists_across_opens() {
        let path = temp_path("persist");
        let mut store = RatingStore::open(&path).unwrap();
        store.rate("abc", 4).unwrap();
        store.rate("abc", 2).unwrap();
        store.rate("def", 5).unwrap();

        let reopened = RatingStore::open(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(reopened.get("abc"), Some(2));
        assert_eq!(reopened.get("def"), Some(5));
    }

    #[test]
    fn rejects_out_of_range() {
        let path = temp_path("range");
        let mut store = RatingStore::open(&path).unwrap();
        assert!(matches!(store.rate("x", 0), Err(RatingError::OutOfRange { stars: 0 })));
        assert!(matches!(store.rate("x", 6), Err(RatingError::OutOfRange { stars: 6 })));
        assert_eq!(store.get("x"), None);
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json").unwrap();
        let result = RatingStore::open(&path);
        std::fs::remove_file(&path).ok();

        let err = result.unwrap_err();
        assert!(matches!(err, RatingError::Parse { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn ignores_out_of_range_entries_on_disk() {
        let path = temp_path("edited");
        std::fs::write(&path, r#"{"a": 3, "b": 9}"#).unwrap();
        let store = RatingStore::open(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(store.get("a"), Some(3));
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn renders_stars() {
        assert_eq!(stars(3), "★★★☆☆");
        assert_eq!(stars(5), "★★★★★");
        assert_eq!(stars(0), "☆☆☆☆☆");
    }
}
