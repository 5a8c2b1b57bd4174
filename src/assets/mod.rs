pub mod entities;
pub mod error;
mod router;
pub mod storage;
pub mod upload;

pub use router::router;
