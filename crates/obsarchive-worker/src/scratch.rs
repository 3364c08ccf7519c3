//! Per-unit scratch directories under the configured working path.

use std::fmt::Display;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use obsarchive_core::result::AppResult;

/// Empty `root` (creating it if needed). Run once at start-up so nothing
/// left by a crashed run survives.
pub async fn reset_working_root(root: &Path) -> AppResult<()> {
    match tokio::fs::remove_dir_all(root).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(root).await?;
    tracing::debug!("Working path {} reset", root.display());
    Ok(())
}

/// Create a fresh `root/<unit>` directory, replacing any leftover one.
pub async fn create_unit_dir(root: &Path, unit: &impl Display) -> AppResult<PathBuf> {
    let dir = root.join(unit.to_string());
    remove_unit_dir(&dir).await?;
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// Remove a unit directory. A directory that is already gone is fine.
pub async fn remove_unit_dir(dir: &Path) -> AppResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unit_dir_is_recreated_empty() {
        let root = tempfile::tempdir().unwrap();
        let dir = create_unit_dir(root.path(), &1234567890).await.unwrap();
        tokio::fs::write(dir.join("leftover"), b"x").await.unwrap();

        let again = create_unit_dir(root.path(), &1234567890).await.unwrap();
        assert_eq!(dir, again);
        assert!(!again.join("leftover").exists());

        remove_unit_dir(&again).await.unwrap();
        assert!(!again.exists());
        remove_unit_dir(&again).await.unwrap();
    }

    #[tokio::test]
    async fn reset_clears_root() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        tokio::fs::create_dir_all(work.join("old")).await.unwrap();
        reset_working_root(&work).await.unwrap();
        assert!(work.exists());
        assert!(!work.join("old").exists());
    }
}
