//! Data file row model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use obsarchive_core::types::ObsId;

/// One archived file that has not been deleted yet, as returned by the
/// undeleted-files query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DataFile {
    /// Owning observation.
    pub observation_num: ObsId,
    /// Bare filename.
    pub filename: String,
    /// Catalog storage location number.
    pub location: i32,
    /// Bucket within the location.
    pub bucket: String,
    /// Object key: `folder || filename`.
    pub key: String,
}

impl DataFile {
    /// Build a file whose key is `folder` followed by `filename`.
    pub fn new(
        observation_num: ObsId,
        filename: impl Into<String>,
        location: i32,
        bucket: impl Into<String>,
        folder: Option<&str>,
    ) -> Self {
        let filename = filename.into();
        let key = format!("{}{}", folder.unwrap_or_default(), filename);
        Self {
            observation_num,
            filename,
            location,
            bucket: bucket.into(),
            key,
        }
    }
}

/// Reduce an object key to its bare filename.
pub fn filename_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_joins_folder_and_filename() {
        let f = DataFile::new(ObsId(1), "1_a.fits", 3, "mwa01fs", Some("1/"));
        assert_eq!(f.key, "1/1_a.fits");
        let bare = DataFile::new(ObsId(1), "1_a.fits", 3, "mwa01fs", None);
        assert_eq!(bare.key, "1_a.fits");
    }

    #[test]
    fn filename_of_strips_folders() {
        assert_eq!(filename_of("a/b/c.fits"), "c.fits");
        assert_eq!(filename_of("c.fits"), "c.fits");
    }
}
