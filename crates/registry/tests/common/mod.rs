//! Shared fixtures for registry integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use tether_provider::{FeatureEntry, ProviderError, ProviderModule};
use tether_registry::ModuleLoader;
use tether_script::{BindingObject, ScriptObject};

/// Marker native object recording which feature created it.
pub struct Marker(pub String);

impl BindingObject for Marker {
	fn feature_uri(&self) -> &str {
		&self.0
	}
}

/// In-process module standing in for a DSO on disk.
pub struct FakeModule {
	path: PathBuf,
	features: Vec<FeatureEntry>,
}

impl ProviderModule for FakeModule {
	fn features(&self) -> &[FeatureEntry] {
		&self.features
	}

	fn path(&self) -> Option<&Path> {
		Some(&self.path)
	}

	fn init(&self) -> Result<(), ProviderError> {
		Ok(())
	}

	fn shutdown(&self) {}

	fn create_object(&self, uri: &str, _root: &ScriptObject) -> Option<ScriptObject> {
		Some(ScriptObject::with_native(Arc::new(Marker(uri.to_string()))))
	}
}

/// Loader serving canned feature tables, counting preloads and restores.
#[derive(Default)]
pub struct FakeLoader {
	tables: HashMap<PathBuf, Vec<FeatureEntry>>,
	pub preloads: AtomicUsize,
	pub restores: AtomicUsize,
}

impl FakeLoader {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_module(mut self, path: &Path, entries: &[(&str, &str)]) -> Self {
		self.tables.insert(
			path.to_path_buf(),
			entries
				.iter()
				.map(|(uri, binding)| FeatureEntry::new(*uri, *binding))
				.collect(),
		);
		self
	}

	pub fn preload_count(&self) -> usize {
		self.preloads.load(Ordering::SeqCst)
	}

	pub fn restore_count(&self) -> usize {
		self.restores.load(Ordering::SeqCst)
	}
}

impl ModuleLoader for FakeLoader {
	fn preload(&self, path: &Path) -> Result<Arc<dyn ProviderModule>, ProviderError> {
		self.preloads.fetch_add(1, Ordering::SeqCst);
		let features = self
			.tables
			.get(path)
			.cloned()
			.ok_or_else(|| ProviderError::EmptyFeatureTable {
				path: path.to_path_buf(),
			})?;
		Ok(Arc::new(FakeModule {
			path: path.to_path_buf(),
			features,
		}))
	}

	fn restore(&self, path: PathBuf, features: Vec<FeatureEntry>) -> Arc<dyn ProviderModule> {
		self.restores.fetch_add(1, Ordering::SeqCst);
		Arc::new(FakeModule { path, features })
	}
}

/// Creates an empty module file and backdates its mtime so a cache written
/// "now" is strictly newer.
pub fn write_module(dir: &Path, name: &str) -> PathBuf {
	let path = dir.join(name);
	std::fs::write(&path, b"").unwrap();
	backdate(&path);
	path
}

/// Sets a path's mtime 60 seconds into the past.
pub fn backdate(path: &Path) {
	let past = SystemTime::now() - Duration::from_secs(60);
	let file = std::fs::File::open(path).unwrap();
	file.set_modified(past).unwrap();
}

/// Sets a path's mtime to now, invalidating any older cache.
pub fn touch(path: &Path) {
	let file = std::fs::File::open(path).unwrap();
	file.set_modified(SystemTime::now()).unwrap();
}
