pub mod client;
pub mod config;
pub mod errors;
pub mod round_timer;
pub mod state;
