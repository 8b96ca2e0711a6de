use ferry_core::prelude::*;

use std::io;
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    /// Leaves streamed into the destination.
    pub copied: usize,
    /// Leaves left alone because something already existed at their destination path.
    pub skipped: usize,
    /// Leaves the asset source does not actually contain.
    pub missing: usize,
}

/// Copies every leaf that does not exist yet into `dest`.
///
/// The first read or write error aborts the whole copy. Cancellation is checked before each
/// leaf and while a leaf streams.
#[instrument(skip_all, fields(dest = %dest.display(), leaves = leaves.len()))]
pub async fn copy_all<S: AssetSource>(
    source: &S,
    dest: &Path,
    leaves: &[String],
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<CopyStats> {
    let mut stats = CopyStats::default();

    for leaf in leaves {
        if cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        let output = dest.join(validate_resource_path(leaf)?);

        if exists(&output).await? {
            debug!(%leaf, "Already present, skipping");
            stats.skipped += 1;
            continue;
        }

        if copy_one(source, leaf, &output, buffer_size, cancel).await? {
            stats.copied += 1;
        } else {
            stats.missing += 1;
        }
    }

    Ok(stats)
}

/// Does not follow symlinks, so a dangling link still counts as present.
async fn exists(path: &Path) -> io::Result<bool> {
    match fs::symlink_metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

async fn copy_one<S: AssetSource>(
    source: &S,
    leaf: &str,
    output: &Path,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<bool> {
    let reader = match source.open(leaf).await {
        Ok(reader) => reader,
        Err(AssetError::NotFound(_)) => {
            warn!(leaf, "Asset not found in source, skipping");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut reader = BufReader::with_capacity(buffer_size, reader);
    let mut file = fs::File::create(output).await?;
    let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
        bytes = tokio::io::copy_buf(&mut reader, &mut file) => bytes?,
    };
    file.flush().await?;

    debug!(leaf, bytes, "Copied asset");
    Ok(true)
}
