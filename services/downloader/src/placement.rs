//! Moving finished archives into the dated output tree.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tokio::fs;
use tracing::{debug, info};

/// Move `archive` to `output_dir/YYYYMMDD/<file name>`.
///
/// The archive must exist. Falls back to copy + delete when a rename is not
/// possible (work and output directories on different filesystems).
pub async fn place_archive(archive: &Path, output_dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    if !fs::try_exists(archive).await.unwrap_or(false) {
        bail!("archive {} does not exist", archive.display());
    }
    let file_name = archive
        .file_name()
        .with_context(|| format!("archive path {} has no file name", archive.display()))?;

    let dated_dir = output_dir.join(date.format("%Y%m%d").to_string());
    fs::create_dir_all(&dated_dir)
        .await
        .with_context(|| format!("failed to create {}", dated_dir.display()))?;

    let target = dated_dir.join(file_name);
    if let Err(e) = fs::rename(archive, &target).await {
        debug!(error = %e, "Rename failed, copying instead");
        fs::copy(archive, &target)
            .await
            .with_context(|| format!("failed to copy {} to {}", archive.display(), target.display()))?;
        fs::remove_file(archive)
            .await
            .with_context(|| format!("failed to remove {}", archive.display()))?;
    }

    info!(path = %target.display(), "Archive placed");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_moves_into_dated_directory() {
        let work = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let archive = work.path().join("crudosFNL_2022-05-20__2022-05-26.nc");
        std::fs::write(&archive, b"CDF").unwrap();

        let date = NaiveDate::from_ymd_opt(2022, 5, 28).unwrap();
        let placed = place_archive(&archive, output.path(), date).await.unwrap();

        assert_eq!(
            placed,
            output
                .path()
                .join("20220528")
                .join("crudosFNL_2022-05-20__2022-05-26.nc")
        );
        assert!(placed.exists());
        assert!(!archive.exists());
        assert_eq!(std::fs::read(&placed).unwrap(), b"CDF");
    }

    #[tokio::test]
    async fn test_missing_archive_is_an_error() {
        let output = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2022, 5, 28).unwrap();
        let err = place_archive(&output.path().join("absent.nc"), output.path(), date)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        assert!(!output.path().join("20220528").exists());
    }
}
