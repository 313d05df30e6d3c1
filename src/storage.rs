//! Output directory for generated images and the timer that empties it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Local;
use log::{debug, info, warn};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{Error, RenderedImage, Result};

/// Flat directory of generated PNGs
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Use `root`, creating it when missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::StorageError(format!("Failed to create {}: {}", root.display(), e)))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a stored file, or `None` when `name` could escape the directory.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', '\0'])
            && !name.contains("..");
        plain.then(|| self.root.join(name))
    }

    /// Write `image` under its filename and return the final path.
    pub fn put(&self, image: &RenderedImage) -> Result<PathBuf> {
        let path = self
            .path_for(&image.filename)
            .ok_or_else(|| Error::StorageError(format!("invalid filename {:?}", image.filename)))?;
        // readers never see a partial file
        let tmp = self.root.join(format!(".{}.tmp", image.filename));
        std::fs::write(&tmp, &image.bytes)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| Error::StorageError(format!("Failed to write {}: {}", path.display(), e)))?;
        debug!("Stored {} ({} bytes)", path.display(), image.bytes.len());
        Ok(path)
    }

    /// Read a stored file. Unknown or unsafe names are `Ok(None)`.
    pub fn open(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.path_for(name) else {
            return Ok(None);
        };
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageError(format!("Failed to read {}: {}", path.display(), e))),
        }
    }

    /// Delete regular files last modified more than `max_age` before `now`.
    /// Returns the deleted names; per-file failures are logged and skipped.
    pub fn sweep(&self, now: SystemTime, max_age: Duration) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| Error::StorageError(format!("Failed to list {}: {}", self.root.display(), e)))?;

        let mut deleted = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.root.display(), e);
                    continue;
                }
            };
            let modified = match entry.metadata().and_then(|m| {
                if m.is_file() {
                    m.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Cannot stat {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            // files from the future are never stale
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= max_age {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    info!("Deleted old file: {}", name);
                    deleted.push(name);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete {}: {}", name, e),
            }
        }
        Ok(deleted)
    }
}

/// Handle to the periodic sweep task
pub struct Housekeeping {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Housekeeping {
    /// Stop the timer and wait for an in-flight sweep to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
    }
}

/// Sweep `store` every `interval`, deleting files older than `max_age`.
///
/// Must be called from within a tokio runtime. The first sweep runs one
/// interval after the call.
pub fn spawn_housekeeping(store: Arc<DirectoryStore>, interval: Duration, max_age: Duration) -> Housekeeping {
    let (tx, mut rx) = oneshot::channel::<()>();
    let period = interval.max(Duration::from_millis(10));

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut rx => break,
                _ = ticker.tick() => {
                    let store = store.clone();
                    match tokio::task::spawn_blocking(move || store.sweep(SystemTime::now(), max_age)).await {
                        Ok(Ok(_)) => info!("Cleanup done at {}", Local::now().format("%H:%M:%S")),
                        Ok(Err(e)) => warn!("Cleanup failed: {}", e),
                        Err(e) => warn!("Cleanup task failed: {}", e),
                    }
                }
            }
        }
        debug!("Housekeeping stopped");
    });

    Housekeeping { shutdown: Some(tx), handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::layout::{bubble_geometry, CanvasGeometry, TextBlock};

    fn image(name: &str) -> RenderedImage {
        let canvas = CanvasGeometry::default();
        let block = TextBlock { lines: vec!["hi".into()], line_height: 20.0, measured_width: 16.0 };
        RenderedImage {
            bytes: vec![1, 2, 3],
            filename: name.to_string(),
            width: 1,
            height: 1,
            lines: block.lines.clone(),
            bubble: bubble_geometry(&canvas, &block),
            avatar_fallback: true,
        }
    }

    #[test]
    fn put_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("Generated")).unwrap();
        let path = store.put(&image("image-1.png")).unwrap();
        assert!(path.ends_with("Generated/image-1.png"));
        assert_eq!(store.open("image-1.png").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.open("image-2.png").unwrap(), None);
    }

    #[test]
    fn traversal_names_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path()).unwrap();
        for name in ["../etc/passwd", "a/b.png", "..", "", ".hidden", "a\\b"] {
            assert!(store.path_for(name).is_none(), "{name}");
            assert_eq!(store.open(name).unwrap(), None);
        }
        assert!(store.put(&image("../escape.png")).is_err());
    }

    #[test]
    fn sweep_respects_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path()).unwrap();
        store.put(&image("image-1.png")).unwrap();
        store.put(&image("image-2.png")).unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let now = SystemTime::now();
        assert!(store.sweep(now, Duration::from_secs(30)).unwrap().is_empty());

        let mut deleted = store.sweep(now + Duration::from_secs(60), Duration::from_secs(30)).unwrap();
        deleted.sort();
        assert_eq!(deleted, vec!["image-1.png", "image-2.png"]);
        assert!(dir.path().join("nested").is_dir());
        assert_eq!(store.open("image-1.png").unwrap(), None);
    }

    #[tokio::test]
    async fn housekeeping_sweeps_until_shut_down() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DirectoryStore::new(dir.path()).unwrap());
        store.put(&image("image-1.png")).unwrap();

        let task = spawn_housekeeping(store.clone(), Duration::from_millis(20), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(store.open("image-1.png").unwrap(), None);
        task.shutdown().await;

        store.put(&image("image-2.png")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.open("image-2.png").unwrap().is_some());
    }
}
