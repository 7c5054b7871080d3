//! Per-tab binding helper.
//!
//! Intercepts a renderer's "open binding channel" request: the feature
//! policy is consulted first, and only a non-empty grant set involves the
//! process host. The renderer's synchronous call resolves when the channel
//! handle is actually available.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use url::Url;

use tether_policy::Policy;
use tether_proto::{ChannelHandle, RendererId, RequestPayload, ResponsePayload, RouteId};

use crate::error::HostError;
use crate::host::ProcessHost;

/// A channel the binding process opened for one renderer.
///
/// Dropping it tells the host the channel closed; the last channel arms the
/// delayed process release.
pub struct OpenedChannel {
	handle: ChannelHandle,
	renderer: RendererId,
	features: Vec<String>,
	host: Arc<ProcessHost>,
}

impl OpenedChannel {
	/// The handle identifying this channel in the binding process.
	#[must_use]
	pub fn handle(&self) -> &ChannelHandle {
		&self.handle
	}

	/// The features the policy granted when the channel opened.
	#[must_use]
	pub fn features(&self) -> &[String] {
		&self.features
	}

	/// Binds every granted feature onto the renderer's root object.
	///
	/// Best-effort: returns the URIs that failed to bind; the call as a
	/// whole succeeds as long as every feature was attempted.
	///
	/// # Errors
	///
	/// Fails only on transport problems, never for individual features.
	pub async fn bind_apis(&self) -> Result<Vec<String>, HostError> {
		let response = self
			.host
			.request(RequestPayload::BindApis {
				renderer_id: self.renderer,
				features: self.features.clone(),
			})
			.await?;
		match response {
			ResponsePayload::ApisBound { failed } => Ok(failed),
			_ => Err(HostError::UnexpectedResponse),
		}
	}

	/// Allocates a fresh IPC route id from the binding process.
	///
	/// # Errors
	///
	/// Fails on transport problems.
	pub async fn generate_route_id(&self) -> Result<RouteId, HostError> {
		let response = self.host.request(RequestPayload::GenerateRouteId).await?;
		match response {
			ResponsePayload::RouteId { id } => Ok(id),
			_ => Err(HostError::UnexpectedResponse),
		}
	}
}

impl Drop for OpenedChannel {
	fn drop(&mut self) {
		self.host.note_channel_closed();
	}
}

/// Per-tab entry point to the binding subsystem.
pub struct BindingHelper {
	policy: Arc<Policy>,
	host: Arc<ProcessHost>,
	renderer: RendererId,
	listening: AtomicBool,
}

impl BindingHelper {
	/// Creates the helper for one renderer.
	#[must_use]
	pub fn new(policy: Arc<Policy>, host: Arc<ProcessHost>, renderer: RendererId) -> Self {
		Self {
			policy,
			host,
			renderer,
			listening: AtomicBool::new(true),
		}
	}

	/// Toggles the listening filter. While false, [`Self::open_channel`]
	/// fails fast instead of waiting on the binding process; used so a
	/// debugger-stalled process does not hang the renderer.
	pub fn set_listening(&self, listening: bool) {
		self.listening.store(listening, Ordering::SeqCst);
	}

	/// Opens the binding channel for a page.
	///
	/// Consults the policy first: a page no entry grants anything gets
	/// `Ok(None)` immediately and the binding process is never involved.
	///
	/// # Errors
	///
	/// Fails fast when the helper stopped listening or the host is shutting
	/// down, otherwise on launch or transport problems.
	pub async fn open_channel(&self, url: &Url) -> Result<Option<OpenedChannel>, HostError> {
		if !self.listening.load(Ordering::SeqCst) {
			return Err(HostError::NotListening);
		}

		let features = self.policy.features_for(url);
		if features.is_empty() {
			tracing::debug!(url = %url, "no features granted; skipping channel");
			return Ok(None);
		}

		let response = self
			.host
			.request(RequestPayload::OpenChannel {
				renderer_id: self.renderer,
				url: Some(url.to_string()),
				features: features.clone(),
			})
			.await?;

		match response {
			ResponsePayload::ChannelOpened {
				handle: Some(handle),
			} => {
				self.host.note_channel_opened();
				Ok(Some(OpenedChannel {
					handle,
					renderer: self.renderer,
					features,
					host: self.host.clone(),
				}))
			}
			ResponsePayload::ChannelOpened { handle: None } => Ok(None),
			_ => Err(HostError::UnexpectedResponse),
		}
	}
}
