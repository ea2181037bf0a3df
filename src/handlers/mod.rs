pub mod background;
pub mod event_handler;
pub mod interaction;
