//! End-to-end host tests over the in-process launcher.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use url::Url;

use tether_host::{
	BindingHelper, BindingInstance, BindingLauncher, HostConfig, HostError, InProcessLauncher,
	ProcessHost,
};
use tether_policy::{Policy, QueryTestEntry};
use tether_process::ProcessContext;
use tether_proto::{RendererId, RouteId};
use tether_provider::{FeatureEntry, Provider, StaticModule};
use tether_registry::{Registry, RegistryConfig};
use tether_script::ScriptObject;

/// Wraps a launcher, counting launches and optionally delaying them.
struct CountingLauncher {
	inner: InProcessLauncher,
	launches: AtomicUsize,
	delay: Option<Duration>,
}

impl CountingLauncher {
	fn new(ctx: Arc<ProcessContext>) -> Self {
		Self {
			inner: InProcessLauncher::new(ctx),
			launches: AtomicUsize::new(0),
			delay: None,
		}
	}

	fn with_delay(ctx: Arc<ProcessContext>, delay: Duration) -> Self {
		Self {
			delay: Some(delay),
			..Self::new(ctx)
		}
	}

	fn launches(&self) -> usize {
		self.launches.load(Ordering::SeqCst)
	}
}

impl BindingLauncher for CountingLauncher {
	fn launch(
		&self,
	) -> Pin<Box<dyn Future<Output = Result<BindingInstance, HostError>> + Send>> {
		self.launches.fetch_add(1, Ordering::SeqCst);
		let delay = self.delay;
		let inner = self.inner.launch();
		Box::pin(async move {
			if let Some(delay) = delay {
				tokio::time::sleep(delay).await;
			}
			inner.await
		})
	}
}

fn test_context() -> Arc<ProcessContext> {
	let mut registry = Registry::new(RegistryConfig {
		search_dirs: Vec::new(),
		cache_path: None,
	});
	registry.add_provider(Arc::new(Provider::new(Arc::new(StaticModule::new(
		vec![FeatureEntry::new("app.echo", "app.echo")],
		Box::new(|_, _| Some(ScriptObject::new())),
	)))));
	registry.add_provider(Arc::new(Provider::new(Arc::new(StaticModule::new(
		vec![FeatureEntry::new("app.broken", "app.broken")],
		Box::new(|_, _| None),
	)))));
	Arc::new(ProcessContext::new(Arc::new(registry)))
}

fn test_policy() -> Arc<Policy> {
	let mut policy = Policy::new();
	policy.add_entry(Box::new(QueryTestEntry));
	Arc::new(policy)
}

fn grace(millis: u64) -> HostConfig {
	HostConfig {
		release_grace: Duration::from_millis(millis),
	}
}

#[tokio::test]
async fn open_channel_binds_granted_features() {
	let ctx = test_context();
	let launcher = Arc::new(CountingLauncher::new(ctx.clone()));
	let host = ProcessHost::new(launcher.clone(), HostConfig::default());
	let helper = BindingHelper::new(test_policy(), host.clone(), RendererId(1));

	let url = Url::parse("https://example.com/app?app.echo&app.broken").unwrap();
	let channel = helper.open_channel(&url).await.unwrap().expect("channel");
	assert_eq!(channel.features().len(), 2);
	assert_eq!(host.channel_count(), 1);

	let mut failed = channel.bind_apis().await.unwrap();
	failed.sort();
	assert_eq!(failed, ["app.broken"]);

	// The good feature is attached on the renderer's root object.
	let root = ctx.channel(RendererId(1)).unwrap().root().clone();
	assert!(root.get("app").unwrap().get("echo").is_some());
	assert!(root.get("app").unwrap().get("broken").is_none());

	assert_eq!(channel.generate_route_id().await.unwrap(), RouteId(2));
	assert_eq!(launcher.launches(), 1);
}

#[tokio::test]
async fn page_without_grants_gets_no_channel() {
	let ctx = test_context();
	let launcher = Arc::new(CountingLauncher::new(ctx));
	let host = ProcessHost::new(launcher.clone(), HostConfig::default());
	let helper = BindingHelper::new(test_policy(), host.clone(), RendererId(1));

	let url = Url::parse("https://example.com/plain").unwrap();
	assert!(helper.open_channel(&url).await.unwrap().is_none());

	// The binding process was never involved.
	assert_eq!(launcher.launches(), 0);
	assert_eq!(host.channel_count(), 0);
	assert!(!host.is_connected());
}

#[tokio::test]
async fn queued_requests_flush_in_fifo_order() {
	let ctx = test_context();
	let launcher = Arc::new(CountingLauncher::with_delay(
		ctx,
		Duration::from_millis(100),
	));
	let host = ProcessHost::new(launcher.clone(), HostConfig::default());

	// All three submit while the connection is still coming up; route ids
	// prove delivery in submission order.
	let (a, b, c) = tokio::join!(
		host.request(tether_proto::RequestPayload::GenerateRouteId),
		host.request(tether_proto::RequestPayload::GenerateRouteId),
		host.request(tether_proto::RequestPayload::GenerateRouteId),
	);

	let ids: Vec<_> = [a, b, c]
		.into_iter()
		.map(|resp| match resp.unwrap() {
			tether_proto::ResponsePayload::RouteId { id } => id.0,
			payload => panic!("unexpected payload {payload:?}"),
		})
		.collect();
	assert_eq!(ids, [2, 3, 4]);
	assert_eq!(launcher.launches(), 1);
}

#[tokio::test]
async fn reopening_same_renderer_reuses_channel() {
	let ctx = test_context();
	let launcher = Arc::new(CountingLauncher::new(ctx));
	let host = ProcessHost::new(launcher, HostConfig::default());
	let helper = BindingHelper::new(test_policy(), host.clone(), RendererId(5));

	let url = Url::parse("https://example.com/?app.echo").unwrap();
	let first = helper.open_channel(&url).await.unwrap().unwrap();
	let second = helper.open_channel(&url).await.unwrap().unwrap();

	assert_eq!(first.handle(), second.handle());
}

#[tokio::test]
async fn release_waits_for_grace_and_reconnect_cancels_it() {
	let ctx = test_context();
	let launcher = Arc::new(CountingLauncher::new(ctx));
	let host = ProcessHost::new(launcher.clone(), grace(150));
	let helper = BindingHelper::new(test_policy(), host.clone(), RendererId(1));

	let url = Url::parse("https://example.com/?app.echo").unwrap();
	let channel = helper.open_channel(&url).await.unwrap().unwrap();
	assert_eq!(launcher.launches(), 1);

	// Closing the last channel arms the release without tearing down.
	drop(channel);
	assert!(host.has_pending_release());
	assert!(host.is_connected());

	// A quick reconnect cancels the pending release and reuses the process.
	tokio::time::sleep(Duration::from_millis(20)).await;
	let channel = helper.open_channel(&url).await.unwrap().unwrap();
	assert!(!host.has_pending_release());
	assert_eq!(launcher.launches(), 1);

	// Without a reconnect the grace period expires and the process goes.
	drop(channel);
	tokio::time::sleep(Duration::from_millis(400)).await;
	assert!(!host.is_connected());
	assert!(!host.has_pending_release());
	assert_eq!(launcher.launches(), 1);

	// The next open pays a fresh launch.
	let _channel = helper.open_channel(&url).await.unwrap().unwrap();
	assert_eq!(launcher.launches(), 2);
}

#[tokio::test]
async fn shutdown_fails_requests_fast() {
	let ctx = test_context();
	let launcher = Arc::new(CountingLauncher::new(ctx));
	let host = ProcessHost::new(launcher.clone(), HostConfig::default());
	let helper = BindingHelper::new(test_policy(), host.clone(), RendererId(1));

	host.shutdown();

	let url = Url::parse("https://example.com/?app.echo").unwrap();
	assert!(matches!(
		helper.open_channel(&url).await,
		Err(HostError::ShuttingDown)
	));
	assert_eq!(launcher.launches(), 0);
}

#[tokio::test]
async fn non_listening_helper_fails_fast() {
	let ctx = test_context();
	let launcher = Arc::new(CountingLauncher::new(ctx));
	let host = ProcessHost::new(launcher.clone(), HostConfig::default());
	let helper = BindingHelper::new(test_policy(), host, RendererId(1));

	helper.set_listening(false);
	let url = Url::parse("https://example.com/?app.echo").unwrap();
	assert!(matches!(
		helper.open_channel(&url).await,
		Err(HostError::NotListening)
	));

	helper.set_listening(true);
	assert!(helper.open_channel(&url).await.unwrap().is_some());
}
