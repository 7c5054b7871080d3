//! Browser-side half of the binding subsystem.
//!
//! The [`ProcessHost`] owns the single binding process (launched out of
//! process, or run on an in-process task in single-process configurations)
//! and multiplexes every renderer's requests over one control connection.
//! Frames submitted before the connection is up queue in FIFO order and
//! flush exactly once on the connected transition; replies resolve through a
//! pending-request table. When the last channel closes, a cancellable
//! delayed-release timer lets a quick reconnect skip process startup.
//!
//! The per-tab [`BindingHelper`] sits in front: it evaluates the feature
//! policy for the page URL and only involves the process host when the
//! granted set is non-empty.

pub mod error;
pub mod helper;
pub mod host;
pub mod launcher;
mod pending;
mod queue;

pub use error::HostError;
pub use helper::{BindingHelper, OpenedChannel};
pub use host::{HostConfig, ProcessHost};
pub use launcher::{BindingInstance, BindingLauncher, InProcessLauncher, ProcessLauncher};
