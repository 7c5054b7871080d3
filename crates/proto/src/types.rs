//! Wire types for the binding control protocol.

use serde::{Deserialize, Serialize};

/// Unique identifier for requests and responses on one control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

/// Identifier the browser assigns to each renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RendererId(pub u32);

/// IPC routing identifier allocated by the binding process.
///
/// 0 is reserved for the window object and 1 is implicit by convention;
/// allocation starts at 2 and never reuses or wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteId(pub u64);

/// Opaque handle identifying one renderer's channel in the binding process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHandle {
	/// Channel key, `"{pid}.{renderer}"` in the binding process.
	pub key: String,
}

/// A single IPC frame between browser and binding process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IpcFrame {
	/// A request from browser to binding process.
	Request(Request),
	/// A response from binding process to browser.
	Response(Response),
	/// An async event (no response expected).
	Event(Event),
}

/// A request from the browser to the binding process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	/// Unique identifier for this request.
	pub id: RequestId,
	/// The request payload.
	pub payload: RequestPayload,
}

/// Request payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestPayload {
	/// Simple ping for connectivity check.
	Ping,
	/// Create (or reuse) the per-renderer channel.
	OpenChannel {
		/// Renderer the channel belongs to.
		renderer_id: RendererId,
		/// The page URL, when known at channel-open time.
		url: Option<String>,
		/// Feature URIs the policy granted to the page.
		features: Vec<String>,
	},
	/// Allocate the next IPC route id.
	GenerateRouteId,
	/// Bind the requested features onto the renderer's root object.
	BindApis {
		/// Renderer whose channel to bind on.
		renderer_id: RendererId,
		/// Feature URIs to bind.
		features: Vec<String>,
	},
}

/// A response from the binding process to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	/// The request this responds to.
	pub request_id: RequestId,
	/// The response payload when successful.
	pub payload: Option<ResponsePayload>,
	/// The error code when the request failed.
	pub error: Option<ErrorCode>,
}

/// Response payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
	/// Simple pong response.
	Pong,
	/// Channel creation finished.
	ChannelOpened {
		/// The channel handle, or `None` when no channel was created.
		handle: Option<ChannelHandle>,
	},
	/// A freshly allocated route id.
	RouteId {
		/// The allocated id.
		id: RouteId,
	},
	/// Bind attempt finished for every requested feature.
	ApisBound {
		/// Feature URIs that failed to bind. Best-effort: the request as a
		/// whole still succeeded.
		failed: Vec<String>,
	},
}

/// Error codes for binding-process operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
	/// Generic internal error.
	Internal,
	/// No channel exists for the renderer.
	UnknownRenderer,
	/// Invalid arguments.
	InvalidArgs,
}

/// Async event from the binding process (no response expected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
	/// The binding process is shutting down; pending and future requests on
	/// this connection will not be answered.
	ShuttingDown,
}
