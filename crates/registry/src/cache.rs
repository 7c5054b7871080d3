//! The on-disk provider cache.
//!
//! A JSON file recording the scanned search directories and every DSO-backed
//! provider's feature table, so later startups skip preloading each module.
//! The cache is only trusted when every recorded directory still matches the
//! current discovery result and every directory and module mtime is strictly
//! older than the cache file's own mtime.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::scan::module_files;

/// Serialized cache contents.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CacheFile {
	/// Search directories at export time, in priority order.
	pub directories: Vec<PathBuf>,
	/// DSO-backed providers; static providers are never persisted.
	pub providers: Vec<CachedProvider>,
}

/// One persisted provider.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedProvider {
	/// Module path on disk.
	pub path: PathBuf,
	/// The module's declared feature table.
	pub features: Vec<CachedFeature>,
}

/// One persisted feature declaration.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CachedFeature {
	/// Feature URI.
	pub uri: String,
	/// Dotted binding path.
	pub binding: String,
}

/// Default cache location under the user's profile.
#[must_use]
pub fn default_cache_path() -> PathBuf {
	dirs::cache_dir()
		.map(|dir| dir.join("tether").join("providers.json"))
		.or_else(|| dirs::home_dir().map(|home| home.join(".tether-providers.json")))
		.unwrap_or_else(|| std::env::temp_dir().join("tether-providers.json"))
}

pub(crate) fn read_cache(path: &Path) -> Result<CacheFile, CacheError> {
	let bytes = std::fs::read(path).map_err(|error| CacheError::Io {
		path: path.to_path_buf(),
		error,
	})?;
	serde_json::from_slice(&bytes).map_err(|error| CacheError::Parse {
		path: path.to_path_buf(),
		error,
	})
}

pub(crate) fn write_cache(path: &Path, cache: &CacheFile) -> Result<(), CacheError> {
	let io_err = |error| CacheError::Io {
		path: path.to_path_buf(),
		error,
	};
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).map_err(io_err)?;
	}
	let bytes = serde_json::to_vec_pretty(cache).map_err(|error| CacheError::Parse {
		path: path.to_path_buf(),
		error,
	})?;
	std::fs::write(path, bytes).map_err(io_err)
}

/// Loads the cache if it is still valid for `current_dirs`; `None` means the
/// caller must rescan.
pub(crate) fn load_valid(cache_path: &Path, current_dirs: &[PathBuf]) -> Option<CacheFile> {
	let cache_mtime = mtime(cache_path)?;

	let cache = match read_cache(cache_path) {
		Ok(cache) => cache,
		Err(error) => {
			tracing::debug!(%error, "provider cache unreadable; rescanning");
			return None;
		}
	};

	if cache.directories != current_dirs {
		tracing::debug!("search directory set changed; discarding provider cache");
		return None;
	}

	for dir in current_dirs {
		if !older_than(dir, cache_mtime) {
			tracing::debug!(dir = %dir.display(), "search directory newer than cache; rescanning");
			return None;
		}
		for module in module_files(dir) {
			if !older_than(&module, cache_mtime) {
				tracing::debug!(module = %module.display(), "module newer than cache; rescanning");
				return None;
			}
		}
	}

	Some(cache)
}

/// True iff the cache at `cache_path` would be accepted for `current_dirs`.
#[must_use]
pub fn validate_cache(cache_path: &Path, current_dirs: &[PathBuf]) -> bool {
	load_valid(cache_path, current_dirs).is_some()
}

fn mtime(path: &Path) -> Option<SystemTime> {
	std::fs::metadata(path).ok()?.modified().ok()
}

fn older_than(path: &Path, reference: SystemTime) -> bool {
	mtime(path).is_some_and(|m| m < reference)
}
