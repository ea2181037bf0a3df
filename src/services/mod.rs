pub mod audit;
pub mod converter;
pub mod lifecycle;
pub mod moderation;
pub mod stats;
