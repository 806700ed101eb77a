//! relay-server
//!
//! Multi-client WebSocket server for the presence relay.

pub mod config;
pub mod types;
pub mod server;

// these are internal modules, not re-exported
mod client;
mod relay_task;
