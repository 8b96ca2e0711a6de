use ferry_core::prelude::*;

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

/// Reads and writes the version marker of a destination directory.
///
/// The marker is an empty file whose *name* is `<prefix><versionCode>-<lastUpdateTime>`.
/// A destination is current only when it holds exactly one marker and that marker matches
/// the installed application.
#[derive(Clone, Debug)]
pub struct VersionMarker {
    prefix: String,
}

impl VersionMarker {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Marker used when the application identity cannot be resolved. It never matches, so
    /// every run re-extracts.
    pub fn sentinel(&self) -> &str {
        &self.prefix
    }

    pub fn expected(&self, identity: &VersionIdentity) -> String {
        format!("{}{identity}", self.prefix)
    }

    pub fn is_marker(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
    }

    /// Names of the marker files currently in `dest`, sorted. A missing directory has none.
    pub async fn current(&self, dest: &Path) -> io::Result<Vec<String>> {
        let mut entries = match fs::read_dir(dest).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut markers = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if self.is_marker(&name) && entry.file_type().await?.is_file() {
                markers.push(name);
            }
        }
        markers.sort();
        Ok(markers)
    }

    /// Returns the marker a fresh extraction must write, or `None` if `dest` is current.
    pub async fn is_stale<I>(&self, dest: &Path, identity: &I) -> Option<String>
    where
        I: IdentityProvider + ?Sized,
    {
        let expected = match identity.current_version_identity() {
            Ok(identity) => self.expected(&identity),
            Err(e) => {
                warn!("{e}, falling back to sentinel marker");
                return Some(self.sentinel().to_string());
            }
        };

        let existing = match self.current(dest).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!("Failed to read markers in {dest:?}: {e}");
                return Some(expected);
            }
        };

        match existing.as_slice() {
            [only] if *only == expected => {
                debug!(marker = %expected, "Destination is current");
                None
            }
            [] => {
                info!(marker = %expected, "No marker found, extraction required");
                Some(expected)
            }
            found => {
                info!(marker = %expected, ?found, "Marker mismatch, extraction required");
                Some(expected)
            }
        }
    }

    pub async fn write(&self, dest: &Path, marker: &str) -> io::Result<()> {
        fs::create_dir_all(dest).await?;
        fs::File::create(dest.join(marker)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PREFIX: &str = "res_timestamp-";

    struct Unavailable;

    impl IdentityProvider for Unavailable {
        fn current_version_identity(&self) -> Result<VersionIdentity, IdentityError> {
            Err(IdentityError::Unavailable("no package info".into()))
        }
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn expected_marker_format() {
        let marker = VersionMarker::new(PREFIX);
        assert_eq!(
            marker.expected(&VersionIdentity::new(1, 1000)),
            "res_timestamp-1-1000"
        );
    }

    #[tokio::test]
    async fn missing_destination_is_stale() {
        let tmp = TempDir::new().unwrap();
        let marker = VersionMarker::new(PREFIX);
        let stale = marker
            .is_stale(&tmp.path().join("nope"), &VersionIdentity::new(1, 1000))
            .await;
        assert_eq!(stale.as_deref(), Some("res_timestamp-1-1000"));
    }

    #[tokio::test]
    async fn single_matching_marker_is_current() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "res_timestamp-1-1000");
        touch(tmp.path(), "unrelated.txt");

        let marker = VersionMarker::new(PREFIX);
        assert_eq!(
            marker
                .is_stale(tmp.path(), &VersionIdentity::new(1, 1000))
                .await,
            None
        );
    }

    #[tokio::test]
    async fn mismatched_or_duplicate_markers_are_stale() {
        let tmp = TempDir::new().unwrap();
        let marker = VersionMarker::new(PREFIX);
        let identity = VersionIdentity::new(2, 2000);

        touch(tmp.path(), "res_timestamp-1-1000");
        assert!(marker.is_stale(tmp.path(), &identity).await.is_some());

        touch(tmp.path(), "res_timestamp-2-2000");
        assert_eq!(
            marker.current(tmp.path()).await.unwrap(),
            vec!["res_timestamp-1-1000", "res_timestamp-2-2000"]
        );
        assert!(marker.is_stale(tmp.path(), &identity).await.is_some());
    }

    #[tokio::test]
    async fn unavailable_identity_yields_sentinel() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), PREFIX);

        let marker = VersionMarker::new(PREFIX);
        assert_eq!(
            marker.is_stale(tmp.path(), &Unavailable).await.as_deref(),
            Some(PREFIX)
        );
    }

    #[tokio::test]
    async fn directories_are_not_markers() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("res_timestamp-dir")).unwrap();

        let marker = VersionMarker::new(PREFIX);
        assert!(marker.current(tmp.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_creates_destination() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("data");
        let marker = VersionMarker::new(PREFIX);

        marker.write(&dest, "res_timestamp-3-3000").await.unwrap();
        assert_eq!(
            marker.current(&dest).await.unwrap(),
            vec!["res_timestamp-3-3000"]
        );
    }
}
