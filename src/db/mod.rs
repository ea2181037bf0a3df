pub mod json_store;
pub mod memory_store;
pub mod models;
pub mod pg_store;
pub mod pool;
pub mod store;
