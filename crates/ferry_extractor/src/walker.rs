use ferry_core::prelude::*;

use std::collections::VecDeque;
use tracing::{debug, instrument};

/// Expands the members of `membership` into the leaf assets that have to be copied.
///
/// Entries the source reports as directories are replaced by their children, breadth-first.
/// Every discovered child is added to `membership` so a later purge can find it.
#[instrument(skip_all, fields(resources = membership.len()))]
pub async fn expand<S: AssetSource>(
    source: &S,
    membership: &mut ResourceSet,
) -> Result<Vec<String>> {
    let mut pending: VecDeque<String> = membership.iter().cloned().collect();
    let mut leaves = Vec::new();

    while let Some(entry) = pending.pop_front() {
        validate_resource_path(&entry)?;

        let children = source.list(&entry).await?;
        if children.is_empty() {
            leaves.push(entry);
            continue;
        }

        debug!(%entry, children = children.len(), "Expanding directory asset");
        for child in children {
            let path = child_path(&entry, &child);
            if membership.insert(path.clone()) {
                pending.push_back(path);
            }
        }
    }

    debug!(leaves = leaves.len(), "Asset tree expanded");
    Ok(leaves)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_mock::MemoryAssets;

    fn bundle() -> MemoryAssets {
        MemoryAssets::new()
            .with("flutter_assets/kernel_blob.bin", "kernel")
            .with("flutter_assets/fonts/Roboto.ttf", "font")
            .with("flutter_assets/fonts/icons/Material.otf", "icons")
            .with("icudtl.dat", "icu")
    }

    fn sorted(mut leaves: Vec<String>) -> Vec<String> {
        leaves.sort();
        leaves
    }

    #[tokio::test]
    async fn expands_nested_directories() {
        let mut membership: ResourceSet = ["flutter_assets"].into_iter().collect();
        let leaves = expand(&bundle(), &mut membership).await.unwrap();

        assert_eq!(
            sorted(leaves),
            vec![
                "flutter_assets/fonts/Roboto.ttf",
                "flutter_assets/fonts/icons/Material.otf",
                "flutter_assets/kernel_blob.bin",
            ]
        );
        for tracked in [
            "flutter_assets",
            "flutter_assets/fonts",
            "flutter_assets/fonts/icons",
            "flutter_assets/fonts/icons/Material.otf",
        ] {
            assert!(membership.contains(tracked), "{tracked} not tracked");
        }
        assert!(!membership.contains("icudtl.dat"));
    }

    #[tokio::test]
    async fn trailing_separator_does_not_double_up() {
        let mut membership: ResourceSet = ["flutter_assets/"].into_iter().collect();
        let leaves = expand(&bundle(), &mut membership).await.unwrap();

        assert!(leaves.contains(&"flutter_assets/kernel_blob.bin".to_string()));
        assert!(membership.contains("flutter_assets/fonts/Roboto.ttf"));
        assert!(leaves.iter().all(|leaf| !leaf.contains("//")), "{leaves:?}");
    }

    #[tokio::test]
    async fn overlapping_entries_are_yielded_once() {
        let mut membership: ResourceSet = ["flutter_assets", "flutter_assets/kernel_blob.bin"]
            .into_iter()
            .collect();
        let leaves = expand(&bundle(), &mut membership).await.unwrap();

        let kernel = leaves
            .iter()
            .filter(|leaf| *leaf == "flutter_assets/kernel_blob.bin")
            .count();
        assert_eq!(kernel, 1);
        assert_eq!(leaves.len(), 3);
    }

    #[tokio::test]
    async fn unknown_entries_are_leaves() {
        let mut membership: ResourceSet = ["missing.bin"].into_iter().collect();
        let leaves = expand(&bundle(), &mut membership).await.unwrap();
        assert_eq!(leaves, vec!["missing.bin"]);
    }

    #[tokio::test]
    async fn list_failure_fails_the_walk() {
        let assets = bundle().fail_list("flutter_assets/fonts");
        let mut membership: ResourceSet = ["flutter_assets"].into_iter().collect();

        let err = expand(&assets, &mut membership).await.unwrap_err();
        assert!(matches!(err, ExtractError::Asset(_)), "{err}");
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let mut membership: ResourceSet = ["../etc"].into_iter().collect();
        let err = expand(&bundle(), &mut membership).await.unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPath(_)));
    }
}
