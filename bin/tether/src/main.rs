//! Tether binary.
//!
//! One executable, two roles: by default it runs the browser-side host
//! driver; with `--binding` it becomes the binding process serving the
//! control socket. The host relaunches this same executable for the
//! out-of-process configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use tether_host::{
	BindingHelper, BindingLauncher, HostConfig, InProcessLauncher, ProcessHost, ProcessLauncher,
};
use tether_policy::{Policy, QueryTestEntry};
use tether_process::ProcessContext;
use tether_proto::RendererId;
use tether_registry::{DsoLoader, Registry, RegistryConfig};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Native binding bridge for embedded web pages")]
struct Args {
	/// Run as the binding process instead of the browser host.
	#[arg(long)]
	binding: bool,

	/// Run the binding side on an in-process task instead of a child process.
	#[arg(long = "binding-in-process")]
	binding_in_process: bool,

	/// Wrapper executable the binding process is launched through.
	#[arg(long = "binding-launcher", value_name = "PATH")]
	binding_launcher: Option<PathBuf>,

	/// Pause at binding-process start so a debugger can attach.
	#[arg(long = "binding-startup-dialog")]
	binding_startup_dialog: bool,

	/// Activate the query-string test policy entry.
	#[arg(long = "binding-test")]
	binding_test: bool,

	/// Control socket path.
	#[arg(short, long, value_name = "PATH")]
	socket: Option<PathBuf>,

	/// Verbose logging.
	#[arg(short, long)]
	verbose: bool,

	/// Page URL the host driver opens a channel for.
	url: Option<Url>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	let subscriber = tracing_subscriber::fmt()
		.with_max_level(if args.verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::INFO
		})
		.finish();
	tracing::subscriber::set_global_default(subscriber)?;

	let socket_path = args
		.socket
		.clone()
		.unwrap_or_else(tether_proto::paths::default_socket_path);

	if args.binding {
		run_binding_process(&args, socket_path).await
	} else {
		run_host(&args, socket_path).await
	}
}

/// Entry point for `--binding`: scan providers, serve the control socket.
async fn run_binding_process(
	args: &Args,
	socket_path: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
	info!(socket = %socket_path.display(), "starting binding process");

	if args.binding_startup_dialog {
		wait_for_debugger().await;
	}

	// Scan and cache I/O stay off the IO loop.
	let registry = tokio::task::spawn_blocking(load_registry).await?;
	info!(features = registry.feature_uris().len(), "provider registry ready");

	let ctx = Arc::new(ProcessContext::new(Arc::new(registry)));

	let shutdown = CancellationToken::new();
	let token = shutdown.clone();
	tokio::spawn(async move {
		let _ = tokio::signal::ctrl_c().await;
		token.cancel();
	});

	tether_process::serve(&socket_path, ctx, shutdown).await?;
	Ok(())
}

/// Host-mode driver: evaluate policy for a page and bind its features.
async fn run_host(args: &Args, socket_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
	let mut policy = Policy::new();
	if args.binding_test {
		policy.add_entry(Box::new(QueryTestEntry));
	}
	let policy = Arc::new(policy);

	let launcher: Arc<dyn BindingLauncher> = if args.binding_in_process {
		let registry = tokio::task::spawn_blocking(load_registry).await?;
		Arc::new(InProcessLauncher::new(Arc::new(ProcessContext::new(
			Arc::new(registry),
		))))
	} else {
		let mut extra_args = Vec::new();
		if args.binding_startup_dialog {
			extra_args.push("--binding-startup-dialog".to_string());
		}
		if args.verbose {
			extra_args.push("--verbose".to_string());
		}
		Arc::new(
			ProcessLauncher::new(socket_path)
				.wrapper(args.binding_launcher.clone())
				.extra_args(extra_args),
		)
	};

	let host = ProcessHost::new(launcher, HostConfig::default());

	let Some(url) = &args.url else {
		info!("no page URL given; nothing to bind");
		return Ok(());
	};

	let helper = BindingHelper::new(policy, host.clone(), RendererId(1));
	match helper.open_channel(url).await? {
		None => info!(url = %url, "page was granted no features; no channel created"),
		Some(channel) => {
			info!(
				handle = %channel.handle().key,
				features = channel.features().len(),
				"binding channel open"
			);
			let failed = channel.bind_apis().await?;
			if failed.is_empty() {
				info!("all granted features bound");
			} else {
				warn!(?failed, "some features failed to bind");
			}
		}
	}

	host.shutdown();
	Ok(())
}

fn load_registry() -> Registry {
	let mut registry = Registry::new(RegistryConfig::discover());
	registry.load_or_scan(&DsoLoader::new());
	registry
}

async fn wait_for_debugger() {
	warn!(pid = std::process::id(), "waiting 30s for a debugger to attach");
	tokio::time::sleep(Duration::from_secs(30)).await;
}
