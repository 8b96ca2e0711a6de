use crate::error::*;
use crate::identity::VersionIdentity;

use std::path::PathBuf;
use tokio::io::AsyncRead;

/// A read-only, hierarchical store of bundled assets.
///
/// A path is a directory iff [`AssetSource::list`] returns at least one child.
pub trait AssetSource: Send + Sync + 'static {
    type Reader: AsyncRead + Send + Unpin;

    /// Child names of `path`. Empty for leaves and for paths that do not exist.
    fn list(&self, path: &str) -> impl Future<Output = Result<Vec<String>, AssetError>> + Send;

    fn open(&self, path: &str) -> impl Future<Output = Result<Self::Reader, AssetError>> + Send;
}

pub trait IdentityProvider: Send + Sync + 'static {
    fn current_version_identity(&self) -> Result<VersionIdentity, IdentityError>;
}

impl IdentityProvider for VersionIdentity {
    fn current_version_identity(&self) -> Result<VersionIdentity, IdentityError> {
        Ok(*self)
    }
}

/// Provides the writable, persistent directory assets are deployed into.
pub trait DataDirectory: Send + Sync + 'static {
    fn data_directory(&self) -> Result<PathBuf, ExtractError>;
}

impl DataDirectory for PathBuf {
    fn data_directory(&self) -> Result<PathBuf, ExtractError> {
        Ok(self.clone())
    }
}
