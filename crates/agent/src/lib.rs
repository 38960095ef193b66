//! `fieldlink-agent` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod actuator;
pub mod config;
pub mod hardware;
pub mod heartbeat;
pub mod listener;
pub mod notify;
pub mod role;
pub mod sender;
