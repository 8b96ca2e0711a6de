use ferry::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let assets = MemoryAssets::new()
        .with("flutter_assets/isolate_snapshot_data", "snapshot")
        .with("flutter_assets/kernel_blob.bin", "kernel");
    let dest = std::env::temp_dir().join("ferry-memory-demo");

    let versions = [
        VersionIdentity::new(1, 1000),
        VersionIdentity::new(1, 1000),
        VersionIdentity::new(2, 2000),
    ];
    for version in versions {
        assets.reset_open_count();
        let outcome = ResourceExtractor::new(assets.clone(), version, dest.clone())
            .add_resource("flutter_assets")
            .start()
            .wait_for_completion()
            .await;

        println!("{version}: {:?} after {} copies", outcome.state(), assets.open_count());
    }

    std::fs::remove_dir_all(&dest)?;
    Ok(())
}
