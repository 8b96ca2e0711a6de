use clap::{Args, Parser, Subcommand};
use ferry_core::prelude::*;
use ferry_extractor::prelude::*;
use ferry_extractor::purge;
use ferry_fs::{DirectoryAssets, PackageInfoFile};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Deploy bundled assets into a data directory once per application version")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory the assets are deployed into
    #[arg(short, long, env = "FERRY_DEST")]
    dest: PathBuf,

    /// Name prefix of marker files
    #[arg(long, default_value = DEFAULT_MARKER_PREFIX)]
    marker_prefix: String,

    #[command(flatten)]
    identity: IdentityArgs,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Args)]
struct IdentityArgs {
    /// JSON file with `version_code` and optional `last_update_time`
    #[arg(long, conflicts_with = "version_code")]
    package_info: Option<PathBuf>,

    #[arg(long)]
    version_code: Option<i64>,

    /// Milliseconds since the epoch of the last update
    #[arg(long, requires = "version_code")]
    last_update: Option<i64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract resources from a bundle directory
    Extract {
        /// The directory containing the bundled assets (e.g., "./bundle")
        #[arg(long)]
        assets: PathBuf,

        /// Asset paths to deploy; directories are deployed recursively
        #[arg(short, long = "resource", required = true)]
        resources: Vec<String>,

        /// Give up (and clean up) after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Leave directories emptied by a purge in place
        #[arg(long)]
        keep_empty_dirs: bool,
    },
    /// Show the expected and the deployed marker
    Status,
    /// Delete deployed resources and every marker
    Purge {
        #[arg(short, long = "resource")]
        resources: Vec<String>,

        #[arg(long)]
        keep_empty_dirs: bool,
    },
}

enum CliIdentity {
    PackageInfo(PackageInfoFile),
    Fixed(VersionIdentity),
    Unknown,
}

impl From<IdentityArgs> for CliIdentity {
    fn from(args: IdentityArgs) -> Self {
        match (args.package_info, args.version_code) {
            (Some(path), _) => Self::PackageInfo(PackageInfoFile::new(path)),
            (None, Some(code)) => {
                let last_update = args.last_update.unwrap_or_default();
                Self::Fixed(VersionIdentity::new(code, last_update))
            }
            (None, None) => Self::Unknown,
        }
    }
}

impl IdentityProvider for CliIdentity {
    fn current_version_identity(&self) -> Result<VersionIdentity, IdentityError> {
        match self {
            Self::PackageInfo(file) => file.current_version_identity(),
            Self::Fixed(identity) => Ok(*identity),
            Self::Unknown => Err(IdentityError::Unavailable(
                "neither --package-info nor --version-code given".into(),
            )),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let identity = CliIdentity::from(cli.identity);
    let marker = VersionMarker::new(cli.marker_prefix.clone());

    match cli.command {
        Commands::Extract {
            assets,
            resources,
            timeout,
            keep_empty_dirs,
        } => {
            println!(
                "🚀 Extracting {} resource(s) from {assets:?} into {:?}...",
                resources.len(),
                cli.dest
            );

            let config = ExtractorConfig {
                marker_prefix: cli.marker_prefix,
                prune_empty_dirs: !keep_empty_dirs,
                ..Default::default()
            };
            let task = ResourceExtractor::new(DirectoryAssets::new(assets), identity, cli.dest)
                .with_config(config)
                .add_resources(resources)
                .start();

            let outcome = match timeout {
                Some(secs) => {
                    task.wait_for_completion_timeout(Duration::from_secs(secs))
                        .await
                }
                None => task.wait_for_completion().await,
            };

            match outcome {
                ExtractionOutcome::Completed(report) => {
                    let CopyStats {
                        copied,
                        skipped,
                        missing,
                    } = report.stats;
                    println!(
                        "✅ Done: {copied} copied, {skipped} already present, {missing} missing."
                    );
                    match report.marker {
                        MarkerStatus::Current => println!("Destination was already current."),
                        MarkerStatus::Written(marker) => println!("Marked as {marker}"),
                        MarkerStatus::WriteFailed(marker) => println!(
                            "⚠️ Could not write marker {marker}; the next run re-extracts."
                        ),
                    }
                }
                ExtractionOutcome::Failed(reason) => {
                    anyhow::bail!("Extraction failed, destination purged: {reason}");
                }
            }
        }
        Commands::Status => {
            let markers = marker.current(&cli.dest).await?;
            println!("🔍 Destination: {:?}", cli.dest);
            match identity.current_version_identity() {
                Ok(version) => println!("Expected marker: {}", marker.expected(&version)),
                Err(e) => println!("Expected marker: {} ({e})", marker.sentinel()),
            }
            if markers.is_empty() {
                println!("Markers on disk: none");
            } else {
                println!("Markers on disk: {}", markers.join(", "));
            }

            match marker.is_stale(&cli.dest, &identity).await {
                Some(expected) => println!("⚠️ Extraction required (would write {expected})"),
                None => println!("✅ Up to date"),
            }
        }
        Commands::Purge {
            resources,
            keep_empty_dirs,
        } => {
            println!("🧹 Purging {:?}...", cli.dest);
            let membership: ResourceSet = resources.into_iter().collect();
            let report = purge(&cli.dest, &membership, &marker, !keep_empty_dirs).await;
            println!(
                "✅ Removed {} file(s), pruned {} empty dir(s), {} failure(s).",
                report.removed, report.pruned, report.failed
            );
        }
    }

    Ok(())
}
