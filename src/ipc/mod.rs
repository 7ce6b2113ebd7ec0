//! IPC listener that accepts events over a Unix socket.
//!
//! The compositor-side script (and helpers bound to keyboard shortcuts)
//! connect to the socket and send newline-delimited JSON events.

pub mod listener;
