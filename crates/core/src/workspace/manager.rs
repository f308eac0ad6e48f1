//! Workspace manager implementation.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::item::{file_base, Item, ItemLayout, ItemName};

use super::error::WorkspaceError;

/// Allocates and tears down per-item working directories under `data_dir`.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    data_dir: PathBuf,
    file_prefix: String,
}

impl WorkspaceManager {
    /// A relative `data_dir` is resolved against the current directory now.
    /// Downloads and uploads run in other directories, so every path handed
    /// to them must be absolute.
    pub fn new(data_dir: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        let data_dir = data_dir.into();
        Self {
            data_dir: std::path::absolute(&data_dir).unwrap_or(data_dir),
            file_prefix: file_prefix.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Prepares a workspace stamped with the current local time.
    pub async fn prepare(&self, item: &mut Item) -> Result<ItemLayout, WorkspaceError> {
        self.prepare_at(item, Local::now().naive_local()).await
    }

    /// Prepares a fresh working directory for `item`.
    ///
    /// Any directory left at the target path by an earlier attempt is
    /// removed first; it is never reused. A zero-byte placeholder named after
    /// the file base is created inside the new directory.
    pub async fn prepare_at(
        &self,
        item: &mut Item,
        now: NaiveDateTime,
    ) -> Result<ItemLayout, WorkspaceError> {
        let name = ItemName::parse(item.name())?;
        let layout = ItemLayout::new(
            &self.data_dir,
            name.file_id(),
            file_base(&self.file_prefix, now, name.file_id()),
        );

        match fs::symlink_metadata(&layout.work_dir).await {
            Ok(meta) if meta.is_dir() => {
                warn!(path = %layout.work_dir.display(), "Removing stale working directory");
                fs::remove_dir_all(&layout.work_dir).await?;
            }
            Ok(_) => {
                warn!(path = %layout.work_dir.display(), "Removing stale file at working directory path");
                fs::remove_file(&layout.work_dir).await?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorkspaceError::Io(e)),
        }

        fs::create_dir_all(&layout.work_dir)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: layout.work_dir.clone(),
                source,
            })?;

        let placeholder = layout.work_artifact();
        fs::File::create(&placeholder)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: placeholder.clone(),
                source,
            })?;

        debug!(work_dir = %layout.work_dir.display(), file_base = %layout.file_base, "Workspace prepared");
        item.set_layout(layout.clone());
        Ok(layout)
    }

    /// Moves `{workDir}/{fileBase}` to `{dataDir}/{fileBase}` and removes the
    /// working directory. Returns the final artifact path.
    ///
    /// When the artifact is missing nothing is moved or removed.
    pub async fn finalize(&self, item: &Item) -> Result<PathBuf, WorkspaceError> {
        let layout = item.layout().ok_or_else(|| WorkspaceError::NotPrepared {
            name: item.name().to_string(),
        })?;

        let source = layout.work_artifact();
        if !fs::try_exists(&source).await.unwrap_or(false) {
            return Err(WorkspaceError::Relocation { path: source });
        }

        let destination = layout.final_artifact();
        move_file(&source, &destination).await?;
        fs::remove_dir_all(&layout.work_dir).await?;

        info!(artifact = %destination.display(), "Artifact relocated");
        Ok(destination)
    }
}

/// Renames `source` to `destination`, copying across filesystems when needed.
async fn move_file(source: &Path, destination: &Path) -> Result<(), WorkspaceError> {
    let move_failed = |error| WorkspaceError::MoveFailed {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        error,
    };

    match fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        // EXDEV is 18 on Linux.
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) => {
            debug!("Cross-device move, falling back to copy");
            fs::copy(source, destination).await.map_err(move_failed)?;
            fs::remove_file(source).await.map_err(move_failed)?;
            Ok(())
        }
        Err(e) => Err(move_failed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const NAME: &str = "http://blip.tv/example-show/ep-1.flv";

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2013, 10, 11)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_prepare_creates_layout_and_placeholder() {
        let data = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(data.path(), "bliptv");
        let mut item = Item::claimed("blip", NAME);

        let layout = manager.prepare_at(&mut item, noon()).await.unwrap();

        assert_eq!(layout.file_id, "ep-1.flv");
        assert_eq!(layout.file_base, "bliptv-20131011-120000-ep-1.flv");
        assert_eq!(layout.work_dir, data.path().join("ep-1.flv"));
        let placeholder = std::fs::metadata(layout.work_artifact()).unwrap();
        assert_eq!(placeholder.len(), 0);
        assert_eq!(item.layout(), Some(&layout));
    }

    #[test]
    fn test_relative_data_dir_made_absolute() {
        let manager = WorkspaceManager::new("data", "bliptv");
        assert!(manager.data_dir().is_absolute());
        assert_eq!(
            manager.data_dir(),
            std::env::current_dir().unwrap().join("data")
        );
    }

    #[tokio::test]
    async fn test_prepare_removes_stale_directory() {
        let data = TempDir::new().unwrap();
        let stale = data.path().join("ep-1.flv");
        std::fs::create_dir_all(stale.join("nested")).unwrap();
        std::fs::write(stale.join("nested/partial.warc"), b"old").unwrap();
        std::fs::write(stale.join("wget.log"), b"old log").unwrap();

        let manager = WorkspaceManager::new(data.path(), "bliptv");
        let mut item = Item::claimed("blip", NAME);
        let layout = manager.prepare_at(&mut item, noon()).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(&layout.work_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from(&layout.file_base)]);
    }

    #[tokio::test]
    async fn test_prepare_rejects_invalid_name() {
        let data = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(data.path(), "bliptv");
        let mut item = Item::claimed("blip", "not a url");

        let err = manager.prepare_at(&mut item, noon()).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidItemName { .. }));
        assert!(item.layout().is_none());
        assert_eq!(std::fs::read_dir(data.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_finalize_moves_artifact_and_removes_workdir() {
        let data = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(data.path(), "bliptv");
        let mut item = Item::claimed("blip", NAME);
        let layout = manager.prepare_at(&mut item, noon()).await.unwrap();
        std::fs::write(layout.work_artifact(), b"video bytes").unwrap();

        let dest = manager.finalize(&item).await.unwrap();

        assert_eq!(dest, data.path().join("bliptv-20131011-120000-ep-1.flv"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"video bytes");
        assert!(!layout.work_dir.exists());
    }

    #[tokio::test]
    async fn test_finalize_missing_artifact_leaves_data_dir_untouched() {
        let data = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(data.path(), "bliptv");
        let mut item = Item::claimed("blip", NAME);
        let layout = manager.prepare_at(&mut item, noon()).await.unwrap();
        std::fs::remove_file(layout.work_artifact()).unwrap();

        let err = manager.finalize(&item).await.unwrap_err();

        assert!(matches!(err, WorkspaceError::Relocation { .. }));
        assert!(!layout.final_artifact().exists());
        assert!(layout.work_dir.exists());
    }

    #[tokio::test]
    async fn test_finalize_unprepared_item() {
        let data = TempDir::new().unwrap();
        let manager = WorkspaceManager::new(data.path(), "bliptv");
        let item = Item::claimed("blip", NAME);
        assert!(matches!(
            manager.finalize(&item).await,
            Err(WorkspaceError::NotPrepared { .. })
        ));
    }
}
