pub mod entities;
pub mod error;
pub mod observer;
mod router;
pub mod service;

pub use router::router;
