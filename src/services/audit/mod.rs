pub mod export;
pub mod log;
pub mod stats;
