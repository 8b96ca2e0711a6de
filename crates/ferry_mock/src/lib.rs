use bytes::Bytes;
use ferry_core::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// An asset bundle held in memory.
///
/// Directories are implied by the paths of the files inserted. Clones share the same
/// bundle and counters, so a test can keep a handle after moving one into an extractor.
#[derive(Clone, Default)]
pub struct MemoryAssets {
    inner: Arc<Mutex<Inner>>,
    opens: Arc<AtomicUsize>,
}

#[derive(Default)]
struct Inner {
    files: BTreeMap<String, Bytes>,
    fail_read: HashSet<String>,
    fail_list: HashSet<String>,
    stall: HashSet<String>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.lock().files.insert(path.into(), data.into());
    }

    pub fn remove(&self, path: &str) {
        self.lock().files.remove(path);
    }

    /// Readers of `path` fail halfway through the content.
    pub fn fail_read(self, path: impl Into<String>) -> Self {
        self.lock().fail_read.insert(path.into());
        self
    }

    /// Listing `path` returns an error.
    pub fn fail_list(self, path: impl Into<String>) -> Self {
        self.lock().fail_list.insert(path.into());
        self
    }

    /// Readers of `path` never make progress.
    pub fn stall(self, path: impl Into<String>) -> Self {
        self.lock().stall.insert(path.into());
        self
    }

    /// Number of assets opened so far, i.e. copies attempted.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reset_open_count(&self) {
        self.opens.store(0, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AssetSource for MemoryAssets {
    type Reader = MemoryReader;

    async fn list(&self, path: &str) -> Result<Vec<String>, AssetError> {
        let inner = self.lock();
        if inner.fail_list.contains(path) {
            return Err(AssetError::Generic(format!("cannot list {path}")));
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}{SEPARATOR}", path.trim_end_matches(SEPARATOR))
        };

        let children: BTreeSet<&str> = inner
            .files
            .keys()
            .filter_map(|key| key.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.split(SEPARATOR).next())
            .filter(|name| !name.is_empty())
            .collect();

        Ok(children.into_iter().map(str::to_owned).collect())
    }

    async fn open(&self, path: &str) -> Result<MemoryReader, AssetError> {
        let inner = self.lock();
        let data = inner
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound(path.to_string()))?;

        self.opens.fetch_add(1, Ordering::SeqCst);

        let mode = if inner.stall.contains(path) {
            ReadMode::Stall
        } else if inner.fail_read.contains(path) {
            ReadMode::FailHalfway
        } else {
            ReadMode::Normal
        };

        Ok(MemoryReader { data, pos: 0, mode })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadMode {
    Normal,
    FailHalfway,
    Stall,
}

pub struct MemoryReader {
    data: Bytes,
    pos: usize,
    mode: ReadMode,
}

impl AsyncRead for MemoryReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        let limit = match this.mode {
            ReadMode::Stall => return Poll::Pending,
            ReadMode::FailHalfway => this.data.len() / 2,
            ReadMode::Normal => this.data.len(),
        };

        if this.mode == ReadMode::FailHalfway && this.pos >= limit {
            return Poll::Ready(Err(io::Error::other("injected read failure")));
        }

        let n = (limit - this.pos).min(buf.remaining());
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// An identity provider that never resolves, like an app whose package info is missing.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableIdentity;

impl IdentityProvider for UnavailableIdentity {
    fn current_version_identity(&self) -> Result<VersionIdentity, IdentityError> {
        Err(IdentityError::Unavailable("package info not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn bundle() -> MemoryAssets {
        MemoryAssets::new()
            .with("flutter_assets/kernel_blob.bin", "kernel")
            .with("flutter_assets/fonts/Roboto.ttf", "font")
            .with("icudtl.dat", "icu")
    }

    #[tokio::test]
    async fn lists_implied_directories() {
        let assets = bundle();
        assert_eq!(
            assets.list("").await.unwrap(),
            vec!["flutter_assets", "icudtl.dat"]
        );
        assert_eq!(
            assets.list("flutter_assets").await.unwrap(),
            vec!["fonts", "kernel_blob.bin"]
        );
        assert!(assets.list("icudtl.dat").await.unwrap().is_empty());
        assert!(assets.list("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_counts_and_reads() {
        let assets = bundle();
        let mut reader = assets.open("icudtl.dat").await.unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();

        assert_eq!(out, "icu");
        assert_eq!(assets.open_count(), 1);
        assert!(matches!(
            assets.open("flutter_assets").await,
            Err(AssetError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn injected_read_failure() {
        let assets = bundle().fail_read("flutter_assets/kernel_blob.bin");
        let mut reader = assets.open("flutter_assets/kernel_blob.bin").await.unwrap();
        let mut buf = [0u8; 16];

        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ker");
        assert!(reader.read(&mut buf).await.is_err());
    }
}
