pub mod database;
pub mod entities;
pub mod error;
pub mod provider;
