/// Binary payload stored in the asset storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Asset {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Size of the payload in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Progress of a running upload, published while the transfer is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadProgress {
    Pending,
    Transferring {
        bytes_transferred: u64,
        total_bytes: u64,
    },
    Completed,
}
