//! Error types for the registry.

use std::path::PathBuf;

use tether_provider::ProviderError;
use thiserror::Error;

/// Errors from reading or writing the provider cache.
///
/// Cache errors are never fatal; the registry logs them and falls back to a
/// full directory scan.
#[derive(Debug, Error)]
pub enum CacheError {
	/// Cache file could not be read or written.
	#[error("I/O error on cache {path}: {error}")]
	Io {
		/// Path to the cache file.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Cache file is not valid JSON in the expected shape.
	#[error("malformed cache {path}: {error}")]
	Parse {
		/// Path to the cache file.
		path: PathBuf,
		/// The underlying parse error.
		error: serde_json::Error,
	},
}

/// Errors from binding a single feature onto a root object.
///
/// Scoped to the one feature being bound; the bind-APIs layer collects these
/// per feature and carries on with the rest of the request.
#[derive(Debug, Error)]
pub enum BindError {
	/// No provider owns the requested feature URI.
	#[error("no provider registered for feature {uri}")]
	UnknownFeature {
		/// The requested feature URI (query suffix stripped).
		uri: String,
	},

	/// The owning provider could not be initialized.
	#[error("provider for {uri} failed to initialize: {source}")]
	Provider {
		/// The requested feature URI.
		uri: String,
		/// The underlying provider error.
		source: ProviderError,
	},

	/// The provider's factory returned no object.
	#[error("provider returned no object for feature {uri}")]
	CreateFailed {
		/// The requested feature URI.
		uri: String,
	},

	/// A path segment mapped to a dependency that, once bound, still did not
	/// materialize the expected property.
	#[error("binding {uri}: dependency at {prefix} did not materialize")]
	DependencyUnresolved {
		/// The feature whose bind failed.
		uri: String,
		/// The binding-path prefix that stayed missing.
		prefix: String,
	},

	/// Two features' binding paths depend on each other.
	#[error("circular binding dependency at {uri}")]
	CircularDependency {
		/// The feature URI whose resolution re-entered itself.
		uri: String,
	},
}
