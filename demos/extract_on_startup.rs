//! # Startup Example
//!
//! Deploys a bundle directory into the per-user data directory while the "application"
//! keeps starting up, then waits for it before using the files.
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example extract_on_startup --features fs -- ./bundle flutter_assets icudtl.dat
//! ```

use ferry::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let bundle = args.next().unwrap_or_else(|| "./bundle".to_string());
    let resources: Vec<String> = args.collect();

    let task = ResourceExtractor::new(
        DirectoryAssets::new(&bundle),
        PackageInfoFile::new(format!("{bundle}/package_info.json")),
        AppDataDirectory::new("dev.ferry.demo"),
    )
    .add_resources(resources)
    .start();

    println!("Extraction running in the background...");

    // Extraction failures are not fatal: the app continues without the extracted files.
    match task.wait_for_completion().await {
        ExtractionOutcome::Completed(report) => println!("Resources ready: {:?}", report.stats),
        ExtractionOutcome::Failed(reason) => println!("Continuing without resources: {reason}"),
    }
}
