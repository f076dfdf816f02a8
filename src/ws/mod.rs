//! WebSocket session sync

pub mod hub;

pub use hub::{serve_ws, SessionHub};
