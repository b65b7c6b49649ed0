//! Image storage.
//!
//! [`FsStore`] is the real file system; [`MemoryStore`] keeps everything in a
//! map and records the order of operations so tests can check exactly what an
//! assertion wrote.

use crate::result::{ShotmatchError, ShotmatchResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Scoped read/write/existence access to image bytes
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Whether a file exists. Missing and inaccessible both map to `false`.
    async fn exists(&self, path: &Path) -> bool;

    /// Read a whole file
    async fn read_file(&self, path: &Path) -> ShotmatchResult<Vec<u8>>;

    /// Write a whole file, creating missing parent directories first
    async fn write_file(&self, path: &Path, data: &[u8]) -> ShotmatchResult<()>;
}

/// Issue every write concurrently and wait for all of them.
///
/// Fails with the first error; writes that already landed are left in place.
pub async fn write_all(store: &dyn FileStore, writes: &[(&Path, &[u8])]) -> ShotmatchResult<()> {
    futures::future::try_join_all(writes.iter().map(|(path, data)| store.write_file(path, data)))
        .await
        .map(|_| ())
}

/// File store backed by the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl FsStore {
    /// Create a file-system store
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileStore for FsStore {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn read_file(&self, path: &Path) -> ShotmatchResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|source| ShotmatchError::ReadBaseline {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> ShotmatchResult<()> {
        let write_error = |source| ShotmatchError::WriteArtifact {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
            }
        }
        tokio::fs::write(path, data).await.map_err(write_error)
    }
}

/// Store operation, as recorded by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// `exists` was called
    Exists(PathBuf),
    /// `read_file` was called
    Read(PathBuf),
    /// `write_file` was called
    Write(PathBuf),
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    history: Vec<StoreOp>,
    failing_writes: Vec<PathBuf>,
}

/// In-memory file store for tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a file
    #[must_use]
    pub fn with_file(self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Self {
        let _ = self.state().files.insert(path.into(), data.into());
        self
    }

    /// Make every write to `path` fail
    #[must_use]
    pub fn with_failing_write(self, path: impl Into<PathBuf>) -> Self {
        self.state().failing_writes.push(path.into());
        self
    }

    /// Contents of a file, if present
    #[must_use]
    pub fn file(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.state().files.get(path.as_ref()).cloned()
    }

    /// Paths written so far, in call order
    #[must_use]
    pub fn written(&self) -> Vec<PathBuf> {
        self.state()
            .history
            .iter()
            .filter_map(|op| match op {
                StoreOp::Write(path) => Some(path.clone()),
                StoreOp::Exists(_) | StoreOp::Read(_) => None,
            })
            .collect()
    }

    /// Every operation so far
    #[must_use]
    pub fn history(&self) -> Vec<StoreOp> {
        self.state().history.clone()
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn exists(&self, path: &Path) -> bool {
        let mut state = self.state();
        state.history.push(StoreOp::Exists(path.to_path_buf()));
        state.files.contains_key(path)
    }

    async fn read_file(&self, path: &Path) -> ShotmatchResult<Vec<u8>> {
        let mut state = self.state();
        state.history.push(StoreOp::Read(path.to_path_buf()));
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| ShotmatchError::ReadBaseline {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            })
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> ShotmatchResult<()> {
        let mut state = self.state();
        state.history.push(StoreOp::Write(path.to_path_buf()));
        if state.failing_writes.iter().any(|p| p == path) {
            return Err(ShotmatchError::WriteArtifact {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "write refused"),
            });
        }
        let _ = state.files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }
}
