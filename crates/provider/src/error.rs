//! Error types for provider loading and lifecycle.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading or driving a provider module.
#[derive(Debug, Error)]
pub enum ProviderError {
	/// The shared library could not be loaded or a symbol was missing.
	#[error("failed to load module {path}: {error}")]
	Load {
		/// Path to the module on disk.
		path: PathBuf,
		/// The underlying loader error.
		error: libloading::Error,
	},

	/// The module's entry symbol reported a failure.
	#[error("module {path} entry returned failure")]
	EntryFailed {
		/// Path to the module on disk.
		path: PathBuf,
	},

	/// The module was built against a different ABI version.
	#[error("module {path} has incompatible ABI version {got} (host {host})")]
	Incompatible {
		/// Path to the module on disk.
		path: PathBuf,
		/// Version the module reported.
		got: u32,
		/// Version this host speaks.
		host: u32,
	},

	/// The guest table is missing required entries.
	#[error("module {path} has a malformed table: {reason}")]
	MalformedTable {
		/// Path to the module on disk.
		path: PathBuf,
		/// What was wrong with the table.
		reason: &'static str,
	},

	/// The module declared no features.
	#[error("module {path} declares no features")]
	EmptyFeatureTable {
		/// Path to the module on disk.
		path: PathBuf,
	},

	/// The module's `init` returned a failure.
	#[error("module init failed: {reason}")]
	InitFailed {
		/// Status or message the module reported.
		reason: String,
	},

	/// The provider is mid-shutdown and cannot hand out new guards.
	#[error("provider is shutting down")]
	ShuttingDown,
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
