pub mod inmemory;
pub mod pool;
pub mod s3;
pub mod sqlite;
