//! The binding process host.
//!
//! Owns the single binding process and its control connection. Requests may
//! be submitted at any time: while the connection is still coming up they
//! queue in FIFO order and flush exactly once on the connected transition.
//! Replies resolve through the pending-request table; the synchronous
//! "open channel" call a renderer blocks on is completed only when the
//! binding process has actually produced the channel handle.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use tether_proto::{
	Event, IpcFrame, Request, RequestId, RequestPayload, Response, ResponsePayload, read_frame,
	write_frame,
};

use crate::error::HostError;
use crate::launcher::BindingLauncher;
use crate::pending::PendingRequests;
use crate::queue::FrameQueue;

/// Tunables for the process host.
#[derive(Debug, Clone)]
pub struct HostConfig {
	/// How long the binding process outlives its last channel before it is
	/// released. A reconnect inside the grace period skips process startup.
	pub release_grace: Duration,
}

impl Default for HostConfig {
	fn default() -> Self {
		Self {
			release_grace: Duration::from_secs(120),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
	Idle,
	Connecting,
	Ready,
}

struct HostState {
	conn: ConnState,
	/// Bumped on every teardown; stale reader tasks check it and bail.
	generation: u64,
	writer: Option<mpsc::UnboundedSender<IpcFrame>>,
	queue: FrameQueue,
	pending: PendingRequests,
	next_request_id: u64,
	shutting_down: bool,
	release: Option<CancellationToken>,
	instance_terminate: Option<CancellationToken>,
	channels: usize,
}

/// Browser-side owner of the binding process.
pub struct ProcessHost {
	launcher: Arc<dyn BindingLauncher>,
	config: HostConfig,
	state: Mutex<HostState>,
}

impl ProcessHost {
	/// Creates a host; the binding process launches lazily on the first
	/// request.
	#[must_use]
	pub fn new(launcher: Arc<dyn BindingLauncher>, config: HostConfig) -> Arc<Self> {
		Arc::new(Self {
			launcher,
			config,
			state: Mutex::new(HostState {
				conn: ConnState::Idle,
				generation: 0,
				writer: None,
				queue: FrameQueue::default(),
				pending: PendingRequests::default(),
				next_request_id: 1,
				shutting_down: false,
				release: None,
				instance_terminate: None,
				channels: 0,
			}),
		})
	}

	/// Sends a request and waits for its reply.
	///
	/// # Errors
	///
	/// Fails fast when the host is shutting down; otherwise fails if the
	/// binding process cannot be launched, the connection drops before the
	/// reply, or the process rejects the request.
	pub async fn request(
		self: &Arc<Self>,
		payload: RequestPayload,
	) -> Result<ResponsePayload, HostError> {
		let rx = self.submit(payload)?;
		let response = rx.await.map_err(|_| self.disconnect_error())?;
		if let Some(error) = response.error {
			return Err(HostError::Remote(error));
		}
		response.payload.ok_or(HostError::UnexpectedResponse)
	}

	fn submit(
		self: &Arc<Self>,
		payload: RequestPayload,
	) -> Result<oneshot::Receiver<Response>, HostError> {
		let mut state = self.lock_state();
		if state.shutting_down {
			return Err(HostError::ShuttingDown);
		}
		Self::cancel_release(&mut state);

		let id = RequestId(state.next_request_id);
		state.next_request_id += 1;
		let (tx, rx) = oneshot::channel();
		state.pending.insert(id, tx);

		let frame = IpcFrame::Request(Request { id, payload });
		match state.conn {
			ConnState::Ready => {
				let sent = state
					.writer
					.as_ref()
					.is_some_and(|writer| writer.send(frame).is_ok());
				if !sent {
					// Writer died; the reader task is about to reset state.
					return Err(HostError::Disconnected);
				}
			}
			ConnState::Connecting => state.queue.push(frame),
			ConnState::Idle => {
				state.queue.reset();
				state.queue.push(frame);
				state.conn = ConnState::Connecting;
				state.generation += 1;
				let generation = state.generation;
				drop(state);
				self.clone().spawn_connect(generation);
			}
		}
		Ok(rx)
	}

	fn spawn_connect(self: Arc<Self>, generation: u64) {
		tokio::spawn(async move {
			let result = self.launcher.launch().await;
			let mut state = self.lock_state();
			match result {
				Ok(instance) => {
					if state.generation != generation {
						// Superseded by a shutdown or release meanwhile.
						drop(state);
						instance.terminate.cancel();
						return;
					}
					let (read_half, write_half) = instance.stream.into_split();
					let (tx, frames) = mpsc::unbounded_channel();
					state.writer = Some(tx.clone());
					state.instance_terminate = Some(instance.terminate);
					state.conn = ConnState::Ready;
					let flushed = state.queue.flush(&tx);
					drop(state);

					tracing::debug!(flushed, "binding control connection ready");
					tokio::spawn(writer_task(frames, write_half));
					tokio::spawn(self.clone().reader_task(read_half, generation));
				}
				Err(error) => {
					if state.generation != generation {
						return;
					}
					tracing::warn!(%error, "binding process launch failed");
					state.conn = ConnState::Idle;
					state.queue.reset();
					state.pending.fail_all();
				}
			}
		});
	}

	async fn reader_task(self: Arc<Self>, mut read_half: OwnedReadHalf, generation: u64) {
		loop {
			match read_frame(&mut read_half).await {
				Ok(IpcFrame::Response(response)) => {
					let mut state = self.lock_state();
					if state.generation != generation {
						return;
					}
					if !state.pending.complete(response) {
						tracing::warn!("response for unknown request id");
					}
				}
				Ok(IpcFrame::Event(Event::ShuttingDown)) => {
					let mut state = self.lock_state();
					if state.generation != generation {
						return;
					}
					tracing::info!("binding process announced shutdown");
					state.shutting_down = true;
					state.pending.fail_all();
				}
				Ok(frame) => {
					tracing::warn!(?frame, "unexpected frame from binding process");
				}
				Err(_) => break,
			}
		}
		self.on_disconnect(generation);
	}

	/// Tears connection state down after the control stream broke. The
	/// process is presumed gone; the next request launches a fresh one.
	fn on_disconnect(self: &Arc<Self>, generation: u64) {
		let terminate = {
			let mut state = self.lock_state();
			if state.generation != generation {
				return;
			}
			state.generation += 1;
			state.conn = ConnState::Idle;
			state.writer = None;
			state.pending.fail_all();
			state.queue.reset();
			state.channels = 0;
			Self::cancel_release(&mut state);
			state.instance_terminate.take()
		};
		tracing::info!("binding control connection lost");
		if let Some(token) = terminate {
			token.cancel();
		}
	}

	/// Records a newly opened channel and cancels any pending release.
	pub(crate) fn note_channel_opened(&self) {
		let mut state = self.lock_state();
		state.channels += 1;
		Self::cancel_release(&mut state);
	}

	/// Records a closed channel; the last one schedules the delayed release.
	pub(crate) fn note_channel_closed(self: &Arc<Self>) {
		let mut state = self.lock_state();
		state.channels = state.channels.saturating_sub(1);
		if state.channels == 0 && state.instance_terminate.is_some() && !state.shutting_down {
			self.schedule_release(&mut state);
		}
	}

	fn schedule_release(self: &Arc<Self>, state: &mut HostState) {
		if state.release.is_some() {
			return;
		}
		let token = CancellationToken::new();
		state.release = Some(token.clone());

		let grace = self.config.release_grace;
		let host = self.clone();
		tracing::debug!(?grace, "scheduling binding process release");
		tokio::spawn(async move {
			tokio::select! {
				_ = tokio::time::sleep(grace) => host.release_now(),
				_ = token.cancelled() => {}
			}
		});
	}

	fn cancel_release(state: &mut HostState) {
		if let Some(token) = state.release.take() {
			token.cancel();
		}
	}

	fn release_now(&self) {
		let terminate = {
			let mut state = self.lock_state();
			state.release = None;
			if state.channels > 0 {
				return;
			}
			state.generation += 1;
			state.conn = ConnState::Idle;
			state.writer = None;
			state.pending.fail_all();
			state.queue.reset();
			state.instance_terminate.take()
		};
		if let Some(token) = terminate {
			tracing::info!("releasing binding process after idle grace period");
			token.cancel();
		}
	}

	/// Tears the binding process down for good; subsequent requests fail
	/// fast with [`HostError::ShuttingDown`].
	pub fn shutdown(&self) {
		let terminate = {
			let mut state = self.lock_state();
			state.shutting_down = true;
			state.generation += 1;
			state.conn = ConnState::Idle;
			state.writer = None;
			state.pending.fail_all();
			state.queue.reset();
			Self::cancel_release(&mut state);
			state.instance_terminate.take()
		};
		if let Some(token) = terminate {
			token.cancel();
		}
	}

	/// True while the control connection is up.
	#[must_use]
	pub fn is_connected(&self) -> bool {
		self.lock_state().conn == ConnState::Ready
	}

	/// True once the binding process announced shutdown (or [`Self::shutdown`]
	/// ran).
	#[must_use]
	pub fn is_shutting_down(&self) -> bool {
		self.lock_state().shutting_down
	}

	/// Number of channels currently open through this host.
	#[must_use]
	pub fn channel_count(&self) -> usize {
		self.lock_state().channels
	}

	/// True while a delayed release is scheduled.
	#[must_use]
	pub fn has_pending_release(&self) -> bool {
		self.lock_state().release.is_some()
	}

	fn disconnect_error(&self) -> HostError {
		if self.is_shutting_down() {
			HostError::ShuttingDown
		} else {
			HostError::Disconnected
		}
	}

	fn lock_state(&self) -> std::sync::MutexGuard<'_, HostState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

async fn writer_task(mut frames: mpsc::UnboundedReceiver<IpcFrame>, mut write_half: OwnedWriteHalf) {
	while let Some(frame) = frames.recv().await {
		if let Err(error) = write_frame(&mut write_half, &frame).await {
			tracing::debug!(%error, "control write failed");
			break;
		}
	}
}
