//! Binding process launchers.
//!
//! The trait splits production from tests and from single-process mode: the
//! production launcher spawns the current executable with `--binding` and
//! connects to its control socket, while the in-process launcher serves the
//! binding side on a local task over a socket pair.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;

use tether_process::ProcessContext;

use crate::error::HostError;

/// A launched binding process with its connected control stream.
pub struct BindingInstance {
	/// The control connection.
	pub stream: UnixStream,
	/// Cancelling this token tears the binding process down.
	pub terminate: CancellationToken,
}

/// Launches binding process instances.
pub trait BindingLauncher: Send + Sync {
	/// Launches the binding process and connects its control socket.
	fn launch(
		&self,
	) -> Pin<Box<dyn Future<Output = Result<BindingInstance, HostError>> + Send>>;
}

/// Production launcher: spawns the binding executable and connects to its
/// socket.
pub struct ProcessLauncher {
	program: Option<PathBuf>,
	wrapper: Option<PathBuf>,
	socket_path: PathBuf,
	extra_args: Vec<String>,
}

impl ProcessLauncher {
	/// Launcher for the binding process listening on `socket_path`.
	///
	/// By default the current executable is re-run with `--binding`.
	#[must_use]
	pub fn new(socket_path: PathBuf) -> Self {
		Self {
			program: None,
			wrapper: None,
			socket_path,
			extra_args: Vec::new(),
		}
	}

	/// Overrides the binding executable (defaults to the current one).
	#[must_use]
	pub fn program(mut self, program: PathBuf) -> Self {
		self.program = Some(program);
		self
	}

	/// Wrapper executable the binding process is launched through
	/// (`--binding-launcher`).
	#[must_use]
	pub fn wrapper(mut self, wrapper: Option<PathBuf>) -> Self {
		self.wrapper = wrapper;
		self
	}

	/// Extra arguments forwarded to the binding process (e.g. the
	/// startup-dialog switch).
	#[must_use]
	pub fn extra_args(mut self, args: Vec<String>) -> Self {
		self.extra_args = args;
		self
	}
}

impl BindingLauncher for ProcessLauncher {
	fn launch(
		&self,
	) -> Pin<Box<dyn Future<Output = Result<BindingInstance, HostError>> + Send>> {
		let program = self.program.clone();
		let wrapper = self.wrapper.clone();
		let socket_path = self.socket_path.clone();
		let extra_args = self.extra_args.clone();

		Box::pin(async move {
			let program = match program {
				Some(program) => program,
				None => std::env::current_exe()
					.map_err(|e| HostError::Launch(format!("cannot resolve executable: {e}")))?,
			};

			let mut command = match &wrapper {
				Some(wrapper) => {
					let mut cmd = tokio::process::Command::new(wrapper);
					cmd.arg(&program);
					cmd
				}
				None => tokio::process::Command::new(&program),
			};
			command
				.arg("--binding")
				.arg("--socket")
				.arg(&socket_path)
				.args(&extra_args);

			let mut child = command
				.spawn()
				.map_err(|e| HostError::Launch(format!("spawn failed: {e}")))?;
			tracing::info!(program = %program.display(), "launched binding process");

			let stream = connect_with_retry(&socket_path).await?;

			let terminate = CancellationToken::new();
			let monitor = terminate.clone();
			tokio::spawn(async move {
				tokio::select! {
					status = child.wait() => {
						tracing::info!(?status, "binding process exited");
					}
					_ = monitor.cancelled() => {
						tracing::info!("terminating binding process");
						let _ = child.kill().await;
						let _ = tokio::time::timeout(Duration::from_secs(1), child.wait()).await;
					}
				}
			});

			Ok(BindingInstance { stream, terminate })
		})
	}
}

/// Polls the control socket until the freshly spawned process binds it.
async fn connect_with_retry(socket_path: &std::path::Path) -> Result<UnixStream, HostError> {
	const ATTEMPTS: u32 = 100;
	const BACKOFF: Duration = Duration::from_millis(50);

	let mut last_error = None;
	for _ in 0..ATTEMPTS {
		match UnixStream::connect(socket_path).await {
			Ok(stream) => return Ok(stream),
			Err(error) => {
				last_error = Some(error);
				tokio::time::sleep(BACKOFF).await;
			}
		}
	}
	Err(HostError::Launch(format!(
		"binding socket {} not ready: {}",
		socket_path.display(),
		last_error.map(|e| e.to_string()).unwrap_or_default()
	)))
}

/// In-process launcher for single-process mode and tests: the binding side
/// runs on a local task over a socket pair.
pub struct InProcessLauncher {
	ctx: Arc<ProcessContext>,
}

impl InProcessLauncher {
	/// Launcher serving `ctx` from an in-process task.
	#[must_use]
	pub fn new(ctx: Arc<ProcessContext>) -> Self {
		Self { ctx }
	}
}

impl BindingLauncher for InProcessLauncher {
	fn launch(
		&self,
	) -> Pin<Box<dyn Future<Output = Result<BindingInstance, HostError>> + Send>> {
		let ctx = self.ctx.clone();
		Box::pin(async move {
			let (host_end, process_end) = UnixStream::pair()?;
			let terminate = CancellationToken::new();
			tokio::spawn(tether_process::handle_connection(
				process_end,
				ctx,
				terminate.clone(),
			));
			Ok(BindingInstance {
				stream: host_end,
				terminate,
			})
		})
	}
}
