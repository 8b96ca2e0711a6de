//! # Ferry Extractor
//!
//! Deploys a named subset of bundled, read-only assets into a writable data directory,
//! exactly once per application version.
//!
//! A run checks the version marker of the destination, purges stale output, expands
//! directory assets into their leaves, copies every leaf that is not present yet and
//! finally writes a new marker. Any failure purges the destination again, so after
//! [`ExtractionTask::wait_for_completion`] it is either fully extracted and marked or
//! holds none of the registered resources.

pub mod config;
pub mod copier;
pub mod marker;
pub mod purger;
pub mod task;
pub mod walker;

pub use config::ExtractorConfig;
pub use copier::CopyStats;
pub use marker::VersionMarker;
pub use purger::{PurgeReport, purge};
pub use task::{
    ExtractionOutcome, ExtractionReport, ExtractionState, ExtractionTask, FailureReason,
    MarkerStatus, ResourceExtractor,
};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::copier::CopyStats;
    pub use crate::marker::VersionMarker;
    pub use crate::purger::PurgeReport;
    pub use crate::task::*;
}
