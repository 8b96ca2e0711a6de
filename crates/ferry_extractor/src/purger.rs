use crate::marker::VersionMarker;
use ferry_core::prelude::*;

use std::cmp::Reverse;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    /// Files (including markers) deleted.
    pub removed: usize,
    /// Paths that could not be inspected or deleted.
    pub failed: usize,
    /// Empty directories removed afterwards.
    pub pruned: usize,
}

/// Deletes every tracked resource under `dest`, then every marker file.
///
/// Never stops early: a path that cannot be deleted is logged and the rest are still tried.
#[instrument(skip_all, fields(dest = %dest.display(), resources = membership.len()))]
pub async fn purge(
    dest: &Path,
    membership: &ResourceSet,
    marker: &VersionMarker,
    prune_empty_dirs: bool,
) -> PurgeReport {
    let mut report = PurgeReport::default();
    let mut pending: VecDeque<String> = membership.iter().cloned().collect();
    let mut directories: Vec<PathBuf> = Vec::new();

    while let Some(resource) = pending.pop_front() {
        let Ok(relative) = validate_resource_path(&resource) else {
            warn!(%resource, "Refusing to purge path outside the destination");
            continue;
        };
        let path = dest.join(relative);

        let metadata = match fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(%resource, "Failed to inspect resource: {e}");
                report.failed += 1;
                continue;
            }
        };

        if metadata.is_dir() {
            match child_names(&path).await {
                Ok(children) => pending.extend(
                    children
                        .iter()
                        .map(|child| child_path(&resource, child)),
                ),
                Err(e) => {
                    warn!(%resource, "Failed to list directory: {e}");
                    report.failed += 1;
                }
            }
            directories.push(path);
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(%resource, "Deleted");
                report.removed += 1;
            }
            Err(e) => {
                warn!(%resource, "Failed to delete resource: {e}");
                report.failed += 1;
            }
        }
    }

    match marker.current(dest).await {
        Ok(markers) => {
            for name in markers {
                match fs::remove_file(dest.join(&name)).await {
                    Ok(()) => report.removed += 1,
                    Err(e) => {
                        warn!(marker = %name, "Failed to delete marker: {e}");
                        report.failed += 1;
                    }
                }
            }
        }
        Err(e) => {
            warn!("Failed to list markers: {e}");
            report.failed += 1;
        }
    }

    if prune_empty_dirs {
        directories.sort_by_key(|dir| Reverse(dir.components().count()));
        directories.dedup();
        for dir in directories {
            // Non-empty directories hold files we do not own.
            if fs::remove_dir(&dir).await.is_ok() {
                report.pruned += 1;
            }
        }
    }

    info!(
        removed = report.removed,
        failed = report.failed,
        pruned = report.pruned,
        "Purge finished"
    );
    report
}

async fn child_names(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => warn!(?name, "Skipping non UTF-8 file name"),
        }
    }
    Ok(names)
}
