//! Script-object graph for the binding layer.
//!
//! The real page global lives in the embedding engine; this crate models the
//! slice of it the binder needs: objects with named properties, optionally
//! backed by a provider-created native object, with pointer identity. A
//! channel owns one root object per renderer and hands it to the binder,
//! which attaches feature objects along dotted paths.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Native object a provider's factory returns.
///
/// Implementations wrap either a C-ABI object handle or an in-process Rust
/// value. The binding layer never looks inside; it only anchors the object in
/// the script graph and keeps it alive.
pub trait BindingObject: Send + Sync {
	/// Feature URI this object was created for.
	fn feature_uri(&self) -> &str;
}

struct ObjectInner {
	native: Option<Arc<dyn BindingObject>>,
	props: RwLock<HashMap<String, ScriptObject>>,
}

/// A node in the script-object graph.
///
/// Cloning is shallow; two clones refer to the same object and compare equal
/// under [`ScriptObject::ptr_eq`].
#[derive(Clone)]
pub struct ScriptObject {
	inner: Arc<ObjectInner>,
}

impl ScriptObject {
	/// Creates an empty plain object.
	#[must_use]
	pub fn new() -> Self {
		Self {
			inner: Arc::new(ObjectInner {
				native: None,
				props: RwLock::new(HashMap::new()),
			}),
		}
	}

	/// Creates an object backed by a native binding object.
	#[must_use]
	pub fn with_native(native: Arc<dyn BindingObject>) -> Self {
		Self {
			inner: Arc::new(ObjectInner {
				native: Some(native),
				props: RwLock::new(HashMap::new()),
			}),
		}
	}

	/// Returns the backing native object, if any.
	#[must_use]
	pub fn native(&self) -> Option<Arc<dyn BindingObject>> {
		self.inner.native.clone()
	}

	/// Looks up a property.
	#[must_use]
	pub fn get(&self, name: &str) -> Option<ScriptObject> {
		self.inner
			.props
			.read()
			.ok()
			.and_then(|props| props.get(name).cloned())
	}

	/// Returns true if the property exists.
	#[must_use]
	pub fn has(&self, name: &str) -> bool {
		self.inner
			.props
			.read()
			.map(|props| props.contains_key(name))
			.unwrap_or(false)
	}

	/// Sets a property, replacing any previous value.
	pub fn set(&self, name: impl Into<String>, value: ScriptObject) {
		if let Ok(mut props) = self.inner.props.write() {
			props.insert(name.into(), value);
		}
	}

	/// Number of properties.
	#[must_use]
	pub fn len(&self) -> usize {
		self.inner.props.read().map(|props| props.len()).unwrap_or(0)
	}

	/// Returns true if the object has no properties.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Identity comparison: true iff both handles refer to the same object.
	#[must_use]
	pub fn ptr_eq(a: &ScriptObject, b: &ScriptObject) -> bool {
		Arc::ptr_eq(&a.inner, &b.inner)
	}
}

impl Default for ScriptObject {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for ScriptObject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let keys: Vec<String> = self
			.inner
			.props
			.read()
			.map(|props| props.keys().cloned().collect())
			.unwrap_or_default();
		f.debug_struct("ScriptObject")
			.field("native", &self.inner.native.as_ref().map(|n| n.feature_uri().to_string()))
			.field("props", &keys)
			.finish()
	}
}
