//! The provider module capability trait and the in-process implementation.

use std::path::Path;

use tether_script::ScriptObject;

use crate::error::Result;

/// One feature a module declares: the URI pages request, and the dotted
/// binding path the feature's object attaches at (empty for side-effect-only
/// features).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureEntry {
	/// Feature identifier, e.g. `"device.battery"`.
	pub uri: String,
	/// Dotted attachment path, e.g. `"device.battery"`. May be empty.
	pub binding: String,
}

impl FeatureEntry {
	/// Convenience constructor.
	#[must_use]
	pub fn new(uri: impl Into<String>, binding: impl Into<String>) -> Self {
		Self {
			uri: uri.into(),
			binding: binding.into(),
		}
	}
}

/// Strips a trailing `?query` suffix from a feature URI.
///
/// Binding URIs may carry query-string-like decoration that parameterizes the
/// created object but is not part of the feature's identity.
#[must_use]
pub fn strip_query(uri: &str) -> &str {
	match uri.find('?') {
		Some(idx) => &uri[..idx],
		None => uri,
	}
}

/// Capability interface over one native binding module.
///
/// `init`/`shutdown` bracket the module's real lifetime and are driven by the
/// owning [`Provider`](crate::Provider); implementations may assume `init`
/// ran before `create_object` and that calls are not re-entrant.
pub trait ProviderModule: Send + Sync {
	/// The static feature table, readable without running `init`.
	fn features(&self) -> &[FeatureEntry];

	/// Path to the module on disk; `None` for in-process modules.
	fn path(&self) -> Option<&Path> {
		None
	}

	/// Runs the module's real startup.
	fn init(&self) -> Result<()>;

	/// Tears the module down.
	fn shutdown(&self);

	/// Constructs the native object for `uri`, attached logically under
	/// `root`. Returns `None` on failure; the bind for that feature fails.
	fn create_object(&self, uri: &str, root: &ScriptObject) -> Option<ScriptObject>;
}

/// Factory signature for [`StaticModule`].
pub type StaticFactory = Box<dyn Fn(&str, &ScriptObject) -> Option<ScriptObject> + Send + Sync>;

/// In-process provider module backed by a Rust factory instead of a DSO.
///
/// Static modules have no on-disk path and are never persisted to the
/// provider cache.
pub struct StaticModule {
	features: Vec<FeatureEntry>,
	factory: StaticFactory,
}

impl StaticModule {
	/// Creates a module from a feature table and an object factory.
	#[must_use]
	pub fn new(features: Vec<FeatureEntry>, factory: StaticFactory) -> Self {
		Self { features, factory }
	}
}

impl ProviderModule for StaticModule {
	fn features(&self) -> &[FeatureEntry] {
		&self.features
	}

	fn init(&self) -> Result<()> {
		Ok(())
	}

	fn shutdown(&self) {}

	fn create_object(&self, uri: &str, root: &ScriptObject) -> Option<ScriptObject> {
		(self.factory)(uri, root)
	}
}
