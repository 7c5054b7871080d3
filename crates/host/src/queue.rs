//! Pre-connect outbound frame queue.

use std::collections::VecDeque;

use tether_proto::IpcFrame;
use tokio::sync::mpsc::UnboundedSender;

/// FIFO queue for frames submitted while the control connection is still
/// connecting. Flushes exactly once per connection attempt.
#[derive(Default)]
pub(crate) struct FrameQueue {
	frames: VecDeque<IpcFrame>,
	flushed: bool,
}

impl FrameQueue {
	pub(crate) fn push(&mut self, frame: IpcFrame) {
		debug_assert!(!self.flushed, "queued a frame after flush");
		self.frames.push_back(frame);
	}

	/// Drains queued frames into `sink` in submission order. A second call
	/// for the same connection attempt is a no-op.
	pub(crate) fn flush(&mut self, sink: &UnboundedSender<IpcFrame>) -> usize {
		if self.flushed {
			return 0;
		}
		self.flushed = true;

		let mut sent = 0;
		while let Some(frame) = self.frames.pop_front() {
			if sink.send(frame).is_err() {
				break;
			}
			sent += 1;
		}
		sent
	}

	/// Rearms the queue for a fresh connection attempt, dropping anything
	/// left from the previous one.
	pub(crate) fn reset(&mut self) {
		self.frames.clear();
		self.flushed = false;
	}
}
