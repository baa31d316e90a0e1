//! Ratatui UI loop.
//!
//! Keys:
//! - Up/Down: select tempo, pitch or speed
//! - Left/Right: adjust by 1
//! - Shift+Left/Right or [/]: adjust by 10
//! - r: reset all controls
//! - Enter or p: process the input file
//! - c: cancel the running request
//! - l: logs
//! - q: quit

mod app;
mod render;

pub(crate) use app::run_tui;
