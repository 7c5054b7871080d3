//! Error types for the browser-side binding host.

use tether_proto::ErrorCode;
use thiserror::Error;

/// Errors surfaced to callers of the process host and helper.
#[derive(Debug, Error)]
pub enum HostError {
	/// The binding process could not be launched or connected.
	#[error("failed to launch binding process: {0}")]
	Launch(String),

	/// I/O error on the control connection.
	#[error("control connection error: {0}")]
	Io(#[from] std::io::Error),

	/// The connection dropped before a reply arrived.
	#[error("control connection lost before a reply arrived")]
	Disconnected,

	/// The binding process announced shutdown; the request will never be
	/// answered.
	#[error("binding process is shutting down")]
	ShuttingDown,

	/// The helper stopped listening for binding replies.
	#[error("helper is not listening")]
	NotListening,

	/// The binding process replied with a payload the caller did not expect.
	#[error("unexpected response payload")]
	UnexpectedResponse,

	/// The binding process rejected the request.
	#[error("binding process rejected the request: {0:?}")]
	Remote(ErrorCode),
}
