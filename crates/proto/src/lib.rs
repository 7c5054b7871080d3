//! Shared wire types for the tether binding IPC.
//!
//! This crate defines the protocol messages exchanged between the browser
//! process and the binding process over Unix domain sockets. The protocol
//! uses binary framing with postcard encoding: a little-endian u32 length
//! prefix followed by the encoded frame.

pub mod codec;
pub mod paths;
pub mod types;

pub use codec::{read_frame, write_frame};
pub use types::*;
