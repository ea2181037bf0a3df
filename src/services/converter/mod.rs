pub mod delivery;
pub mod slots;
pub mod transcoder;
