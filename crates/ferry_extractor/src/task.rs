use crate::config::ExtractorConfig;
use crate::copier::{self, CopyStats};
use crate::marker::VersionMarker;
use crate::{purger, walker};
use ferry_core::prelude::*;

use std::any::Any;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Created,
    Running,
    Completed,
    Failed,
}

/// What happened to the version marker during a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerStatus {
    /// The destination was already current; no marker was needed.
    Current,
    /// The run was stale and wrote this marker.
    Written(String),
    /// The run was stale but this marker could not be written. The copied files are kept
    /// and the next run re-extracts.
    WriteFailed(String),
}

impl MarkerStatus {
    /// The marker written by this run, if any.
    pub fn written(&self) -> Option<&str> {
        match self {
            Self::Written(marker) => Some(marker),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    pub marker: MarkerStatus,
    pub stats: CopyStats,
}

#[derive(Error, Debug)]
pub enum FailureReason {
    #[error(transparent)]
    Error(ExtractError),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Extraction worker panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    DestinationUnavailable(String),
}

impl From<ExtractError> for FailureReason {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Cancelled => Self::Cancelled,
            err => Self::Error(err),
        }
    }
}

/// How an extraction run settled.
///
/// A failed run has already been purged: the destination holds none of the registered
/// resources and no marker.
#[derive(Debug)]
pub enum ExtractionOutcome {
    Completed(ExtractionReport),
    Failed(FailureReason),
}

impl ExtractionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn state(&self) -> ExtractionState {
        match self {
            Self::Completed(_) => ExtractionState::Completed,
            Self::Failed(_) => ExtractionState::Failed,
        }
    }
}

/// Builder for an extraction run, the `Created` state of its lifecycle.
///
/// Resources can only be registered here; [`ResourceExtractor::start`] consumes the builder.
///
/// ```no_run
/// # async fn run() {
/// use ferry_core::prelude::*;
/// use ferry_extractor::ResourceExtractor;
/// # let assets = ferry_mock::MemoryAssets::new();
///
/// let dest = std::path::PathBuf::from("./data");
/// let task = ResourceExtractor::new(assets, VersionIdentity::new(1, 1000), dest)
///     .add_resource("icudtl.dat")
///     .add_resources(["flutter_assets"])
///     .start();
///
/// let outcome = task.wait_for_completion().await;
/// # }
/// ```
pub struct ResourceExtractor<S, I, D> {
    source: S,
    identity: I,
    destination: D,
    resources: ResourceSet,
    config: ExtractorConfig,
    runtime: Option<Handle>,
}

impl<S, I, D> ResourceExtractor<S, I, D>
where
    S: AssetSource,
    I: IdentityProvider,
    D: DataDirectory,
{
    pub fn new(source: S, identity: I, destination: D) -> Self {
        Self {
            source,
            identity,
            destination,
            resources: ResourceSet::new(),
            config: ExtractorConfig::default(),
            runtime: None,
        }
    }

    pub fn add_resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.insert(resource);
        self
    }

    pub fn add_resources<T, R>(mut self, resources: T) -> Self
    where
        T: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.resources.extend(resources);
        self
    }

    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime the worker is spawned on. Defaults to the runtime `start` is called from.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    pub fn state(&self) -> ExtractionState {
        ExtractionState::Created
    }

    /// Spawns the extraction on a background task and returns immediately.
    ///
    /// # Panics
    ///
    /// Panics if no runtime was configured and this is not called from within a tokio runtime.
    pub fn start(self) -> ExtractionTask {
        let runtime = self.runtime.unwrap_or_else(Handle::current);
        let marker = VersionMarker::new(self.config.marker_prefix.clone());
        let cancel = CancellationToken::new();
        let (state, state_rx) = watch::channel(ExtractionState::Running);
        let registered = self.resources.clone();
        let prune_empty_dirs = self.config.prune_empty_dirs;

        let (handle, destination) = match self.destination.data_directory() {
            Ok(dest) => {
                let worker = Worker {
                    source: self.source,
                    identity: self.identity,
                    dest: dest.clone(),
                    membership: self.resources,
                    marker: marker.clone(),
                    config: self.config,
                    cancel: cancel.clone(),
                    state,
                };
                (runtime.spawn(worker.run()), Some(dest))
            }
            Err(e) => {
                error!("Cannot extract resources: {e}");
                state.send_replace(ExtractionState::Failed);
                let reason = FailureReason::DestinationUnavailable(e.to_string());
                (
                    runtime.spawn(async move { ExtractionOutcome::Failed(reason) }),
                    None,
                )
            }
        };

        ExtractionTask {
            handle,
            cancel,
            state: state_rx,
            destination,
            registered,
            marker,
            prune_empty_dirs,
            runtime,
        }
    }
}

/// A running extraction, the `Running` state of its lifecycle.
///
/// Dropping the task detaches the worker; it still purges after itself if it fails.
pub struct ExtractionTask {
    handle: JoinHandle<ExtractionOutcome>,
    cancel: CancellationToken,
    state: watch::Receiver<ExtractionState>,
    destination: Option<PathBuf>,
    registered: ResourceSet,
    marker: VersionMarker,
    prune_empty_dirs: bool,
    runtime: Handle,
}

impl ExtractionTask {
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn state(&self) -> ExtractionState {
        match *self.state.borrow() {
            // A worker that finished without reporting was aborted or panicked.
            ExtractionState::Running if self.handle.is_finished() => ExtractionState::Failed,
            state => state,
        }
    }

    /// Asks the worker to stop. The run then fails and purges like any other failure.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Aborts the worker without letting it clean up; the wait purges on its behalf.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Waits for the worker to settle.
    ///
    /// Never fails: a worker that errored, was cancelled or panicked yields
    /// [`ExtractionOutcome::Failed`] with the destination purged.
    pub async fn wait_for_completion(mut self) -> ExtractionOutcome {
        let joined = (&mut self.handle).await;
        self.settle(joined).await
    }

    /// Like [`ExtractionTask::wait_for_completion`], but cancels the worker once `timeout`
    /// has elapsed.
    pub async fn wait_for_completion_timeout(mut self, timeout: Duration) -> ExtractionOutcome {
        let joined = match tokio::time::timeout(timeout, &mut self.handle).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(?timeout, "Timed out waiting for extraction, cancelling");
                self.cancel.cancel();
                (&mut self.handle).await
            }
        };
        self.settle(joined).await
    }

    /// Blocks the current thread until the worker settles.
    ///
    /// Must not be called from within an async context.
    pub fn wait_for_completion_blocking(self) -> ExtractionOutcome {
        let runtime = self.runtime.clone();
        let _guard = runtime.enter();
        futures::executor::block_on(self.wait_for_completion())
    }

    async fn settle(self, joined: Result<ExtractionOutcome, JoinError>) -> ExtractionOutcome {
        let err = match joined {
            Ok(outcome) => return outcome,
            Err(err) => err,
        };

        let reason = if err.is_panic() {
            FailureReason::Panicked(panic_message(err.into_panic()))
        } else {
            FailureReason::Cancelled
        };
        error!("Extraction worker terminated abnormally: {reason}");

        if let Some(dest) = &self.destination {
            purger::purge(dest, &self.registered, &self.marker, self.prune_empty_dirs).await;
        }
        ExtractionOutcome::Failed(reason)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| msg.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

struct Worker<S, I> {
    source: S,
    identity: I,
    dest: PathBuf,
    membership: ResourceSet,
    marker: VersionMarker,
    config: ExtractorConfig,
    cancel: CancellationToken,
    state: watch::Sender<ExtractionState>,
}

impl<S: AssetSource, I: IdentityProvider> Worker<S, I> {
    #[instrument(name = "extract", skip_all, fields(dest = %self.dest.display()))]
    async fn run(mut self) -> ExtractionOutcome {
        info!(resources = self.membership.len(), "Starting resource extraction");

        let outcome = match self.extract().await {
            Ok(report) => {
                info!(
                    copied = report.stats.copied,
                    skipped = report.stats.skipped,
                    missing = report.stats.missing,
                    marker = ?report.marker,
                    "Resource extraction finished"
                );
                ExtractionOutcome::Completed(report)
            }
            Err(e) => {
                match &e {
                    ExtractError::Cancelled => warn!("Resource extraction cancelled"),
                    e => error!("Failed to extract resources: {e}"),
                }
                purger::purge(
                    &self.dest,
                    &self.membership,
                    &self.marker,
                    self.config.prune_empty_dirs,
                )
                .await;
                ExtractionOutcome::Failed(e.into())
            }
        };

        self.state.send_replace(outcome.state());
        outcome
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        Ok(())
    }

    /// Cancellation is only observed between destination writes, so nothing lands on disk
    /// after the purge that follows it.
    async fn extract(&mut self) -> Result<ExtractionReport> {
        self.check_cancelled()?;
        let stale = self.marker.is_stale(&self.dest, &self.identity).await;
        if stale.is_some() {
            purger::purge(
                &self.dest,
                &self.membership,
                &self.marker,
                self.config.prune_empty_dirs,
            )
            .await;
        }

        // The walk only reads the asset source, so it can be dropped at any point.
        let cancel = self.cancel.clone();
        let leaves = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractError::Cancelled),
            leaves = walker::expand(&self.source, &mut self.membership) => leaves?,
        };

        let stats = copier::copy_all(
            &self.source,
            &self.dest,
            &leaves,
            self.config.buffer_size,
            &self.cancel,
        )
        .await?;

        self.check_cancelled()?;
        let marker = match stale {
            Some(marker) => match self.marker.write(&self.dest, &marker).await {
                Ok(()) => MarkerStatus::Written(marker),
                Err(e) => {
                    warn!("Failed to write marker {marker}: {e}");
                    MarkerStatus::WriteFailed(marker)
                }
            },
            None => MarkerStatus::Current,
        };

        Ok(ExtractionReport { marker, stats })
    }
}
