use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Invalid asset key: {0}")]
    InvalidKey(String),

    #[error("Asset {0} not found")]
    NotFound(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Upload was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Keys are relative, slash-separated paths without empty or parent segments
pub fn validate_key(key: &str) -> Result<(), AssetError> {
    let valid = !key.is_empty()
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");

    if valid {
        Ok(())
    } else {
        Err(AssetError::InvalidKey(key.to_string()))
    }
}
