//! Directory scanning and the module loader seam.
//!
//! The loader trait lets production code load real shared libraries while
//! tests inject in-process fakes, mirroring how the process host swaps its
//! launcher.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tether_provider::{DsoModule, FeatureEntry, ProviderError, ProviderModule};

/// Loads provider modules for the registry.
pub trait ModuleLoader: Send + Sync {
	/// Preloads the module at `path`: read its static feature table without
	/// running its startup.
	fn preload(&self, path: &Path) -> Result<Arc<dyn ProviderModule>, ProviderError>;

	/// Restores a module from cached metadata without touching the file.
	fn restore(&self, path: PathBuf, features: Vec<FeatureEntry>) -> Arc<dyn ProviderModule>;
}

/// Production loader backed by shared libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DsoLoader;

impl DsoLoader {
	/// Creates the loader.
	#[must_use]
	pub fn new() -> Self {
		Self
	}
}

impl ModuleLoader for DsoLoader {
	fn preload(&self, path: &Path) -> Result<Arc<dyn ProviderModule>, ProviderError> {
		Ok(Arc::new(DsoModule::preload(path)?))
	}

	fn restore(&self, path: PathBuf, features: Vec<FeatureEntry>) -> Arc<dyn ProviderModule> {
		Arc::new(DsoModule::from_cache(path, features))
	}
}

/// Returns true for files with the platform's shared-library extension.
pub(crate) fn is_module_file(path: &Path) -> bool {
	if !path.is_file() {
		return false;
	}
	matches!(
		path.extension().and_then(OsStr::to_str),
		Some("so" | "dylib" | "dll")
	)
}

/// Lists module files directly inside `dir`, sorted by file name.
///
/// Non-recursive; an unreadable directory yields an empty list.
pub(crate) fn module_files(dir: &Path) -> Vec<PathBuf> {
	let Ok(entries) = std::fs::read_dir(dir) else {
		return Vec::new();
	};
	let mut files: Vec<PathBuf> = entries
		.flatten()
		.map(|entry| entry.path())
		.filter(|path| is_module_file(path))
		.collect();
	files.sort();
	files
}
