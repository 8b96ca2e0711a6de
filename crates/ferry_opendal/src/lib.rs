use bytes::Bytes;
use ferry_core::prelude::*;
use opendal::{ErrorKind, Operator};
use std::io::Cursor;
use tracing::debug;

#[derive(Clone)]
pub struct OpendalAssets {
    op: Operator,
}

impl OpendalAssets {
    /// Create a new asset source from an OpenDAL Operator.
    /// The Operator can be configured for any supported backend e.g., fs, memory, s3, etc.
    pub fn new(op: Operator) -> Self {
        Self { op }
    }
}

fn map_err(path: &str, e: opendal::Error) -> AssetError {
    match e.kind() {
        ErrorKind::NotFound => AssetError::NotFound(path.to_string()),
        _ => AssetError::Generic(format!("OpenDAL Error: {e}")),
    }
}

impl AssetSource for OpendalAssets {
    type Reader = Cursor<Bytes>;

    async fn list(&self, path: &str) -> Result<Vec<String>, AssetError> {
        let dir = match path.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => {
                // Directories only exist implicitly on some services, so stat the file form.
                match self.op.stat(trimmed).await {
                    Ok(metadata) if metadata.is_file() => return Ok(Vec::new()),
                    Ok(_) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(map_err(path, e)),
                }
                format!("{trimmed}/")
            }
        };

        let entries = match self.op.list(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(map_err(path, e)),
        };

        let mut children: Vec<String> = entries
            .iter()
            .filter(|entry| entry.path() != dir)
            .map(|entry| entry.name().trim_end_matches('/').to_string())
            .filter(|name| !name.is_empty())
            .collect();
        children.sort();
        children.dedup();

        debug!(path, children = children.len(), "Listed assets");
        Ok(children)
    }

    async fn open(&self, path: &str) -> Result<Cursor<Bytes>, AssetError> {
        let buffer = self.op.read(path).await.map_err(|e| map_err(path, e))?;
        Ok(Cursor::new(buffer.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendal::services::Memory;
    use tokio::io::AsyncReadExt;

    async fn bundle() -> OpendalAssets {
        let op = Operator::new(Memory::default()).unwrap().finish();
        op.write("flutter_assets/kernel_blob.bin", b"kernel".to_vec())
            .await
            .unwrap();
        op.write("flutter_assets/fonts/Roboto.ttf", b"font".to_vec())
            .await
            .unwrap();
        op.write("icudtl.dat", b"icu".to_vec()).await.unwrap();
        OpendalAssets::new(op)
    }

    #[tokio::test]
    async fn lists_children() {
        let assets = bundle().await;
        assert_eq!(
            assets.list("flutter_assets").await.unwrap(),
            vec!["fonts", "kernel_blob.bin"]
        );
        assert!(assets.list("icudtl.dat").await.unwrap().is_empty());
        assert!(assets.list("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn opens_and_maps_not_found() {
        let assets = bundle().await;
        let mut content = String::new();
        assets
            .open("icudtl.dat")
            .await
            .unwrap()
            .read_to_string(&mut content)
            .await
            .unwrap();
        assert_eq!(content, "icu");

        assert!(matches!(
            assets.open("missing.bin").await,
            Err(AssetError::NotFound(_))
        ));
    }
}
