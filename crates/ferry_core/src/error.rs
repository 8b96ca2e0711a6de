use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset not found: {0}")]
    NotFound(String),

    #[error("Asset source error: {0}")]
    Generic(String),
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Application identity unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Asset source error: {0}")]
    Asset(#[from] AssetError),

    #[error("Destination directory unavailable: {0}")]
    Destination(String),

    #[error("Invalid resource path: {0}")]
    InvalidPath(String),

    #[error("Extraction cancelled")]
    Cancelled,
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
