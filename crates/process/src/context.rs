//! Binding-process context: channel registry and route-id allocation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tether_proto::{ChannelHandle, RendererId, RouteId};
use tether_registry::Registry;

use crate::channel::Channel;

/// First allocatable route id. 0 is reserved for the window object and 1 is
/// implicit by convention.
pub const FIRST_ROUTE_ID: u64 = 2;

/// Process-wide state of the binding process.
///
/// Owned by the process entry point and shared with every control
/// connection; the registry it wraps is read-only from here on.
pub struct ProcessContext {
	registry: Arc<Registry>,
	channels: Mutex<HashMap<String, Arc<Channel>>>,
	next_route_id: AtomicU64,
}

impl ProcessContext {
	/// Creates the context over a populated registry.
	#[must_use]
	pub fn new(registry: Arc<Registry>) -> Self {
		Self {
			registry,
			channels: Mutex::new(HashMap::new()),
			next_route_id: AtomicU64::new(FIRST_ROUTE_ID),
		}
	}

	/// The provider registry.
	#[must_use]
	pub fn registry(&self) -> &Arc<Registry> {
		&self.registry
	}

	/// Allocates the next route id. Monotonic, never reused.
	pub fn next_route_id(&self) -> RouteId {
		RouteId(self.next_route_id.fetch_add(1, Ordering::Relaxed))
	}

	/// The channel-registry key for a renderer in this process.
	#[must_use]
	pub fn channel_key(renderer: RendererId) -> String {
		format!("{}.{}", std::process::id(), renderer.0)
	}

	/// Opens the channel for `renderer`, or returns the existing one.
	///
	/// At most one channel exists per renderer; a repeated open for the same
	/// renderer hands back the original channel and handle.
	pub fn open_channel(
		&self,
		renderer: RendererId,
		url: Option<String>,
		features: Vec<String>,
	) -> (Arc<Channel>, ChannelHandle) {
		let key = Self::channel_key(renderer);
		let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);

		let channel = channels
			.entry(key.clone())
			.or_insert_with(|| {
				tracing::info!(?renderer, url = url.as_deref(), "creating binding channel");
				Arc::new(Channel::new(renderer, url, features))
			})
			.clone();

		(channel, ChannelHandle { key })
	}

	/// Looks up the channel for `renderer`.
	#[must_use]
	pub fn channel(&self, renderer: RendererId) -> Option<Arc<Channel>> {
		self.channels
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.get(&Self::channel_key(renderer))
			.cloned()
	}

	/// Drops the channel for `renderer` when its connection goes away.
	pub fn close_channel(&self, renderer: RendererId) {
		let removed = self
			.channels
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.remove(&Self::channel_key(renderer));
		if removed.is_some() {
			tracing::info!(?renderer, "closed binding channel");
		}
	}

	/// Number of live channels.
	#[must_use]
	pub fn channel_count(&self) -> usize {
		self.channels
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}
}
