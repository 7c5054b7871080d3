//! The binding process.
//!
//! Runs out-of-process from the browser (or on an in-process task in
//! single-process configurations) and owns every per-renderer channel: the
//! root script object, route-id allocation, and feature binding against the
//! provider registry. The browser drives it over one control connection per
//! host, speaking the `tether-proto` frame protocol.

pub mod channel;
pub mod context;
pub mod ipc;

pub use channel::Channel;
pub use context::{FIRST_ROUTE_ID, ProcessContext};
pub use ipc::{handle_connection, serve};
