//! # Ferry FileSystem
//!
//! Local file system implementations of the ferry collaborator traits.
//!
//! * [`DirectoryAssets`]: an [`AssetSource`] serving a bundle unpacked into a directory.
//! * [`PackageInfoFile`]: an [`IdentityProvider`] reading the application version from a
//!   JSON file shipped with the application.
//! * [`AppDataDirectory`]: a [`DataDirectory`] inside the platform's per-user data directory.
//!
//! ## Usage
//!
//! ```no_run
//! use ferry_fs::{AppDataDirectory, DirectoryAssets, PackageInfoFile};
//!
//! let assets = DirectoryAssets::new("./bundle");
//! let identity = PackageInfoFile::new("./bundle/package_info.json");
//! let destination = AppDataDirectory::new("com.example.app");
//! ```

use chrono::{DateTime, Utc};
use ferry_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { root: path.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn get_path(&self, path: &str) -> Result<PathBuf, AssetError> {
        if path.is_empty() {
            return Ok(self.root.clone());
        }
        validate_resource_path(path)
            .map(|relative| self.root.join(relative))
            .map_err(|e| AssetError::Generic(e.to_string()))
    }
}

impl AssetSource for DirectoryAssets {
    type Reader = fs::File;

    async fn list(&self, path: &str) -> Result<Vec<String>, AssetError> {
        let dir = self.get_path(path)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e)
                if e.kind() == io::ErrorKind::NotFound
                    || e.kind() == io::ErrorKind::NotADirectory =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(AssetError::Io(e)),
        };

        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            match entry.file_name().into_string() {
                Ok(name) => children.push(name),
                Err(name) => debug!(?name, "Skipping non UTF-8 asset name"),
            }
        }
        children.sort();
        Ok(children)
    }

    async fn open(&self, path: &str) -> Result<fs::File, AssetError> {
        let file_path = self.get_path(path)?;
        match fs::metadata(&file_path).await {
            Ok(metadata) if metadata.is_dir() => {
                // An empty directory lists no children but has nothing to copy either.
                Err(AssetError::NotFound(format!("{path} is a directory")))
            }
            Ok(_) => Ok(fs::File::open(&file_path).await?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(AssetError::NotFound(path.to_string()))
            }
            Err(e) => Err(AssetError::Io(e)),
        }
    }
}

/// Contents of a package info file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub version_code: i64,

    /// Milliseconds since the Unix epoch. Falls back to the file's modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<i64>,
}

/// Reads the application identity from a JSON [`PackageInfo`] file on every call.
#[derive(Clone, Debug)]
pub struct PackageInfoFile {
    path: PathBuf,
}

impl PackageInfoFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> IdentityError {
        IdentityError::Unavailable(format!("{}: {reason}", self.path.display()))
    }
}

impl IdentityProvider for PackageInfoFile {
    fn current_version_identity(&self) -> Result<VersionIdentity, IdentityError> {
        let data = std::fs::read(&self.path).map_err(|e| self.unavailable(e))?;
        let info: PackageInfo = serde_json::from_slice(&data).map_err(|e| self.unavailable(e))?;

        let last_update_time = match info.last_update_time {
            Some(millis) => millis,
            None => {
                let modified = std::fs::metadata(&self.path)
                    .and_then(|metadata| metadata.modified())
                    .map_err(|e| self.unavailable(e))?;
                DateTime::<Utc>::from(modified).timestamp_millis()
            }
        };

        Ok(VersionIdentity::new(info.version_code, last_update_time))
    }
}

/// `<platform data dir>/<app_id>`, e.g. `~/.local/share/com.example.app` on Linux.
#[derive(Clone, Debug)]
pub struct AppDataDirectory {
    app_id: String,
}

impl AppDataDirectory {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
        }
    }
}

impl DataDirectory for AppDataDirectory {
    fn data_directory(&self) -> Result<PathBuf, ExtractError> {
        let path = dirs::data_local_dir()
            .map(|dir| dir.join(&self.app_id))
            .ok_or_else(|| ExtractError::Destination("no platform data directory".into()))?;
        std::fs::create_dir_all(&path)
            .map_err(|e| ExtractError::Destination(format!("{}: {e}", path.display())))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn bundle() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("flutter_assets/fonts")).unwrap();
        std::fs::create_dir_all(tmp.path().join("flutter_assets/empty")).unwrap();
        std::fs::write(tmp.path().join("flutter_assets/kernel_blob.bin"), "kernel").unwrap();
        std::fs::write(tmp.path().join("flutter_assets/fonts/Roboto.ttf"), "font").unwrap();
        tmp
    }

    #[tokio::test]
    async fn lists_directories_only() {
        let tmp = bundle();
        let assets = DirectoryAssets::new(tmp.path());

        assert_eq!(assets.list("").await.unwrap(), vec!["flutter_assets"]);
        assert_eq!(
            assets.list("flutter_assets").await.unwrap(),
            vec!["empty", "fonts", "kernel_blob.bin"]
        );
        assert!(
            assets
                .list("flutter_assets/kernel_blob.bin")
                .await
                .unwrap()
                .is_empty()
        );
        assert!(assets.list("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn opens_files() {
        let tmp = bundle();
        let assets = DirectoryAssets::new(tmp.path());

        let mut content = String::new();
        assets
            .open("flutter_assets/fonts/Roboto.ttf")
            .await
            .unwrap()
            .read_to_string(&mut content)
            .await
            .unwrap();
        assert_eq!(content, "font");

        assert!(matches!(
            assets.open("missing.bin").await,
            Err(AssetError::NotFound(_))
        ));
        assert!(matches!(
            assets.open("flutter_assets/empty").await,
            Err(AssetError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let tmp = bundle();
        let assets = DirectoryAssets::new(tmp.path().join("flutter_assets"));
        assert!(matches!(
            assets.list("../flutter_assets").await,
            Err(AssetError::Generic(_))
        ));
    }

    #[test]
    fn package_info_with_explicit_time() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("package_info.json");
        std::fs::write(&path, r#"{"version_code": 3, "last_update_time": 3000}"#).unwrap();

        let identity = PackageInfoFile::new(&path)
            .current_version_identity()
            .unwrap();
        assert_eq!(identity, VersionIdentity::new(3, 3000));
    }

    #[test]
    fn package_info_falls_back_to_mtime() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("package_info.json");
        std::fs::write(&path, r#"{"version_code": 4}"#).unwrap();

        let identity = PackageInfoFile::new(&path)
            .current_version_identity()
            .unwrap();
        assert_eq!(identity.version_code, 4);
        assert!(identity.last_update_time > 0);
    }

    #[test]
    fn malformed_package_info_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("package_info.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            PackageInfoFile::new(&path).current_version_identity(),
            Err(IdentityError::Unavailable(_))
        ));
        assert!(
            PackageInfoFile::new(tmp.path().join("missing.json"))
                .current_version_identity()
                .is_err()
        );
    }
}
