//! Provider lifecycle: reference-counted lazy init and shutdown.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tether_script::ScriptObject;

use crate::error::{ProviderError, Result};
use crate::module::{FeatureEntry, ProviderModule, strip_query};

/// Lifecycle state of a provider's module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeState {
	/// Module not loaded; no consumers.
	Unloaded,
	/// Module initialized; at least one consumer.
	Loaded,
	/// Last consumer released; module teardown in progress.
	ShuttingDown,
}

struct Lifecycle {
	state: LifeState,
	consumers: usize,
}

/// One registered binding provider.
///
/// Owned exclusively by the registry. Consumers hold a [`ProviderGuard`]
/// while they keep objects created by the module alive; module `init` runs
/// on the first acquire, `shutdown` on the last release.
pub struct Provider {
	module: Arc<dyn ProviderModule>,
	lifecycle: Mutex<Lifecycle>,
}

impl Provider {
	/// Wraps a module. The module stays untouched until the first acquire.
	#[must_use]
	pub fn new(module: Arc<dyn ProviderModule>) -> Self {
		Self {
			module,
			lifecycle: Mutex::new(Lifecycle {
				state: LifeState::Unloaded,
				consumers: 0,
			}),
		}
	}

	/// The module's declared feature table.
	#[must_use]
	pub fn features(&self) -> &[FeatureEntry] {
		self.module.features()
	}

	/// Path to the module on disk; `None` for in-process providers.
	#[must_use]
	pub fn path(&self) -> Option<&Path> {
		self.module.path()
	}

	/// The configured binding path for `uri` (query suffix ignored).
	#[must_use]
	pub fn binding_path(&self, uri: &str) -> Option<&str> {
		let wanted = strip_query(uri);
		self.module
			.features()
			.iter()
			.find(|f| f.uri == wanted)
			.map(|f| f.binding.as_str())
	}

	/// Current lifecycle state.
	#[must_use]
	pub fn state(&self) -> LifeState {
		self.lifecycle
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.state
	}

	/// Acquires the provider, initializing the module on the 0→1 consumer
	/// transition.
	///
	/// # Errors
	///
	/// Fails if module init fails, or if the provider is mid-shutdown;
	/// shutting-down providers are not resurrected.
	pub fn acquire(self: &Arc<Self>) -> Result<ProviderGuard> {
		let mut lifecycle = self
			.lifecycle
			.lock()
			.unwrap_or_else(PoisonError::into_inner);
		match lifecycle.state {
			LifeState::ShuttingDown => Err(ProviderError::ShuttingDown),
			LifeState::Loaded => {
				lifecycle.consumers += 1;
				Ok(ProviderGuard {
					provider: self.clone(),
				})
			}
			LifeState::Unloaded => {
				self.module.init()?;
				lifecycle.state = LifeState::Loaded;
				lifecycle.consumers = 1;
				Ok(ProviderGuard {
					provider: self.clone(),
				})
			}
		}
	}

	fn release(&self) {
		let last = {
			let mut lifecycle = self
				.lifecycle
				.lock()
				.unwrap_or_else(PoisonError::into_inner);
			lifecycle.consumers = lifecycle.consumers.saturating_sub(1);
			if lifecycle.consumers == 0 && lifecycle.state == LifeState::Loaded {
				lifecycle.state = LifeState::ShuttingDown;
				true
			} else {
				false
			}
		};

		if last {
			self.module.shutdown();
			self.lifecycle
				.lock()
				.unwrap_or_else(PoisonError::into_inner)
				.state = LifeState::Unloaded;
		}
	}

	/// Constructs the native object for `uri`.
	///
	/// Only valid while at least one guard is held; callers anchor the
	/// returned object in the script graph and keep the guard alongside it.
	#[must_use]
	pub fn create_object(&self, uri: &str, root: &ScriptObject) -> Option<ScriptObject> {
		self.module.create_object(uri, root)
	}
}

/// Keeps a provider's module initialized while held.
pub struct ProviderGuard {
	provider: Arc<Provider>,
}

impl ProviderGuard {
	/// The guarded provider.
	#[must_use]
	pub fn provider(&self) -> &Arc<Provider> {
		&self.provider
	}
}

impl Drop for ProviderGuard {
	fn drop(&mut self) {
		self.provider.release();
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[derive(Default)]
	struct CountingModule {
		features: Vec<FeatureEntry>,
		inits: AtomicUsize,
		shutdowns: AtomicUsize,
	}

	impl CountingModule {
		fn with_feature(uri: &str, binding: &str) -> Self {
			Self {
				features: vec![FeatureEntry::new(uri, binding)],
				..Self::default()
			}
		}
	}

	impl ProviderModule for CountingModule {
		fn features(&self) -> &[FeatureEntry] {
			&self.features
		}

		fn init(&self) -> Result<()> {
			self.inits.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}

		fn shutdown(&self) {
			self.shutdowns.fetch_add(1, Ordering::SeqCst);
		}

		fn create_object(&self, _uri: &str, _root: &ScriptObject) -> Option<ScriptObject> {
			Some(ScriptObject::new())
		}
	}

	#[test]
	fn init_runs_once_across_overlapping_acquires() {
		let module = Arc::new(CountingModule::with_feature("app.echo", "app.echo"));
		let provider = Arc::new(Provider::new(module.clone()));

		let a = provider.acquire().unwrap();
		let b = provider.acquire().unwrap();
		assert_eq!(module.inits.load(Ordering::SeqCst), 1);
		assert_eq!(provider.state(), LifeState::Loaded);

		drop(a);
		assert_eq!(module.shutdowns.load(Ordering::SeqCst), 0);
		drop(b);
		assert_eq!(module.shutdowns.load(Ordering::SeqCst), 1);
		assert_eq!(provider.state(), LifeState::Unloaded);
	}

	#[test]
	fn reacquire_after_shutdown_reinitializes() {
		let module = Arc::new(CountingModule::with_feature("app.echo", "app.echo"));
		let provider = Arc::new(Provider::new(module.clone()));

		drop(provider.acquire().unwrap());
		drop(provider.acquire().unwrap());

		assert_eq!(module.inits.load(Ordering::SeqCst), 2);
		assert_eq!(module.shutdowns.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn failed_init_stays_unloaded() {
		struct FailingModule(Vec<FeatureEntry>);

		impl ProviderModule for FailingModule {
			fn features(&self) -> &[FeatureEntry] {
				&self.0
			}
			fn init(&self) -> Result<()> {
				Err(ProviderError::InitFailed {
					reason: "nope".into(),
				})
			}
			fn shutdown(&self) {}
			fn create_object(&self, _uri: &str, _root: &ScriptObject) -> Option<ScriptObject> {
				None
			}
		}

		let provider = Arc::new(Provider::new(Arc::new(FailingModule(vec![
			FeatureEntry::new("x", "x"),
		]))));
		assert!(provider.acquire().is_err());
		assert_eq!(provider.state(), LifeState::Unloaded);
	}

	#[test]
	fn binding_path_ignores_query_suffix() {
		let provider = Provider::new(Arc::new(CountingModule::with_feature(
			"app.device",
			"device",
		)));
		assert_eq!(provider.binding_path("app.device?foo=1"), Some("device"));
		assert_eq!(provider.binding_path("app.device"), Some("device"));
		assert_eq!(provider.binding_path("app.other"), None);
	}
}
