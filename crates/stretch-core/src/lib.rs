pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod executor;
pub mod gate;
pub mod params;
pub mod playback;
pub mod probe;
pub mod request;
pub mod session;
pub mod status_log;
