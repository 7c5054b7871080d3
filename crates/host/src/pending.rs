//! Pending-request table for the control connection.

use std::collections::HashMap;

use tether_proto::{RequestId, Response};
use tokio::sync::oneshot;

/// Requests awaiting a reply, keyed by request id.
///
/// Dropping a sender (via [`PendingRequests::fail_all`]) wakes the waiting
/// caller with a closed-channel error, which the host maps to a disconnect.
#[derive(Default)]
pub(crate) struct PendingRequests {
	inflight: HashMap<RequestId, oneshot::Sender<Response>>,
}

impl PendingRequests {
	pub(crate) fn insert(&mut self, id: RequestId, tx: oneshot::Sender<Response>) {
		self.inflight.insert(id, tx);
	}

	/// Resolves the matching request. Returns false for unknown ids.
	pub(crate) fn complete(&mut self, response: Response) -> bool {
		match self.inflight.remove(&response.request_id) {
			Some(tx) => tx.send(response).is_ok(),
			None => false,
		}
	}

	/// Fails every in-flight request by dropping its reply sender.
	pub(crate) fn fail_all(&mut self) {
		self.inflight.clear();
	}
}
