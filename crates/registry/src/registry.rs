//! The provider registry proper.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tether_provider::{FeatureEntry, Provider, ProviderModule, strip_query};

use crate::cache::{self, CacheFile, CachedFeature, CachedProvider};
use crate::error::CacheError;
use crate::scan::{ModuleLoader, module_files};
use crate::search::discover_search_dirs;

/// Configuration for a registry instance.
///
/// The embedder constructs exactly one registry per process and passes it
/// down; tests construct their own with temp directories.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
	/// Ordered provider search directories.
	pub search_dirs: Vec<PathBuf>,
	/// Cache file override; `None` uses the per-user default.
	pub cache_path: Option<PathBuf>,
}

impl RegistryConfig {
	/// Discovers search directories from the environment and platform.
	#[must_use]
	pub fn discover() -> Self {
		Self {
			search_dirs: discover_search_dirs(),
			cache_path: None,
		}
	}
}

/// URI→provider and binding-path→URI indexes over all known providers.
pub struct Registry {
	config: RegistryConfig,
	/// Feature URI → owning provider. First registrant wins.
	providers: HashMap<String, Arc<Provider>>,
	/// Binding path → feature URI, for dependency resolution.
	bindings: HashMap<String, String>,
	/// All accepted providers in registration order, for cache export and
	/// identity-based dedup.
	ordered: Vec<Arc<Provider>>,
}

impl Registry {
	/// Creates an empty registry.
	#[must_use]
	pub fn new(config: RegistryConfig) -> Self {
		Self {
			config,
			providers: HashMap::new(),
			bindings: HashMap::new(),
			ordered: Vec::new(),
		}
	}

	/// The configured search directories, in priority order.
	#[must_use]
	pub fn search_dirs(&self) -> &[PathBuf] {
		&self.config.search_dirs
	}

	/// The cache file path in effect.
	#[must_use]
	pub fn cache_path(&self) -> PathBuf {
		self.config
			.cache_path
			.clone()
			.unwrap_or_else(cache::default_cache_path)
	}

	/// Registers a provider's features. Idempotent by provider identity.
	///
	/// A feature URI already claimed by an earlier provider is kept with its
	/// first owner; the duplicate declaration is logged and dropped.
	pub fn add_provider(&mut self, provider: Arc<Provider>) {
		if self.ordered.iter().any(|p| Arc::ptr_eq(p, &provider)) {
			return;
		}

		for feature in provider.features() {
			if self.providers.contains_key(&feature.uri) {
				tracing::warn!(uri = %feature.uri, "feature already registered; dropping duplicate");
				continue;
			}
			self.providers.insert(feature.uri.clone(), provider.clone());
			if !feature.binding.is_empty() {
				self.bindings
					.entry(feature.binding.clone())
					.or_insert_with(|| feature.uri.clone());
			}
		}

		self.ordered.push(provider);
	}

	/// Looks up the provider owning `uri`, ignoring any `?query` suffix.
	#[must_use]
	pub fn provider(&self, uri: &str) -> Option<&Arc<Provider>> {
		self.providers.get(strip_query(uri))
	}

	/// Reverse lookup: the feature URI registered at a full binding path.
	#[must_use]
	pub fn binding_owner(&self, binding_path: &str) -> Option<&str> {
		self.bindings.get(binding_path).map(String::as_str)
	}

	/// All registered feature URIs, unordered.
	#[must_use]
	pub fn feature_uris(&self) -> Vec<String> {
		self.providers.keys().cloned().collect()
	}

	/// Restores providers from a valid cache, or scans every search
	/// directory and rewrites the cache.
	///
	/// Cache problems never fail startup: an invalid cache triggers a full
	/// rescan, and a failed rewrite is logged and ignored.
	pub fn load_or_scan(&mut self, loader: &dyn ModuleLoader) {
		let cache_path = self.cache_path();

		if let Some(cache) = cache::load_valid(&cache_path, &self.config.search_dirs) {
			tracing::info!(
				cache = %cache_path.display(),
				providers = cache.providers.len(),
				"restoring providers from cache"
			);
			for cached in cache.providers {
				let features = cached
					.features
					.into_iter()
					.map(|f| FeatureEntry::new(f.uri, f.binding))
					.collect();
				let module = loader.restore(cached.path, features);
				self.add_provider(Arc::new(Provider::new(module)));
			}
			return;
		}

		let dirs = self.config.search_dirs.clone();
		for dir in &dirs {
			self.scan_directory(loader, dir);
		}

		if let Err(error) = self.export_cache(&cache_path) {
			tracing::warn!(%error, "failed to write provider cache");
		}
	}

	/// Scans one directory for provider modules, non-recursively.
	///
	/// A module that fails to preload or declares no features is skipped
	/// with a log line; the rest of the directory still scans.
	pub fn scan_directory(&mut self, loader: &dyn ModuleLoader, dir: &Path) {
		for path in module_files(dir) {
			match loader.preload(&path) {
				Ok(module) if module.features().is_empty() => {
					tracing::warn!(module = %path.display(), "module declares no features; skipping");
				}
				Ok(module) => {
					tracing::info!(module = %path.display(), "loaded binding provider");
					self.add_provider(Arc::new(Provider::new(module)));
				}
				Err(error) => {
					tracing::warn!(module = %path.display(), %error, "failed to preload module");
				}
			}
		}
	}

	fn export_cache(&self, cache_path: &Path) -> Result<(), CacheError> {
		let providers = self
			.ordered
			.iter()
			.filter_map(|provider| {
				// Static providers have no on-disk identity to validate.
				let path = provider.path()?.to_path_buf();
				let features = provider
					.features()
					.iter()
					.map(|f| CachedFeature {
						uri: f.uri.clone(),
						binding: f.binding.clone(),
					})
					.collect();
				Some(CachedProvider { path, features })
			})
			.collect();

		cache::write_cache(
			cache_path,
			&CacheFile {
				directories: self.config.search_dirs.clone(),
				providers,
			},
		)
	}
}
