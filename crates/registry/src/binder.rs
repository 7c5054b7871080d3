//! Dotted-path feature binding.
//!
//! Given a feature URI with binding path `"a.b.c"`, attaches the provider's
//! object at `root.a.b.c`, creating plain intermediate objects where no
//! feature claims the prefix and transitively binding registered
//! dependencies where one does. Intermediates are applied only after the
//! whole walk succeeds, so a failed bind leaves the root graph untouched.

use std::collections::HashSet;

use tether_provider::{ProviderGuard, strip_query};
use tether_script::ScriptObject;

use crate::error::BindError;
use crate::registry::Registry;

/// Everything a successful bind produced that the caller must keep alive.
///
/// Field order matters: anchored objects drop before the guards that keep
/// their module loaded.
#[derive(Default)]
pub struct Bound {
	/// Created objects with an empty binding path: retained, not attached.
	pub anchors: Vec<ScriptObject>,
	/// Guards holding the involved providers initialized.
	pub guards: Vec<ProviderGuard>,
}

impl std::fmt::Debug for Bound {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Bound")
			.field("anchors", &self.anchors.len())
			.field("guards", &self.guards.len())
			.finish()
	}
}

impl Bound {
	fn merge(&mut self, other: Bound) {
		self.guards.extend(other.guards);
		self.anchors.extend(other.anchors);
	}
}

impl Registry {
	/// Binds `uri` onto `root`, resolving dependencies transitively.
	///
	/// # Errors
	///
	/// Fails without modifying `root` if the feature is unknown, its provider
	/// cannot initialize or returns no object, a path dependency cannot be
	/// resolved, or the dependency chain is circular. A failure is scoped to
	/// this feature; other features on the same root are unaffected.
	pub fn bind_feature(&self, root: &ScriptObject, uri: &str) -> Result<Bound, BindError> {
		let mut resolving = HashSet::new();
		self.bind_recursive(root, uri, &mut resolving)
	}

	fn bind_recursive(
		&self,
		root: &ScriptObject,
		uri: &str,
		resolving: &mut HashSet<String>,
	) -> Result<Bound, BindError> {
		let key = strip_query(uri).to_string();
		if !resolving.insert(key.clone()) {
			return Err(BindError::CircularDependency { uri: key });
		}
		let result = self.bind_one(root, uri, &key, resolving);
		resolving.remove(&key);
		result
	}

	fn bind_one(
		&self,
		root: &ScriptObject,
		uri: &str,
		key: &str,
		resolving: &mut HashSet<String>,
	) -> Result<Bound, BindError> {
		let provider = self.provider(uri).ok_or_else(|| BindError::UnknownFeature {
			uri: key.to_string(),
		})?;

		let guard = provider.acquire().map_err(|source| BindError::Provider {
			uri: key.to_string(),
			source,
		})?;

		let object = provider
			.create_object(uri, root)
			.ok_or_else(|| BindError::CreateFailed {
				uri: key.to_string(),
			})?;

		let binding = provider.binding_path(uri).unwrap_or_default().to_string();

		let mut bound = Bound::default();
		if binding.is_empty() {
			// Side-effect-only feature: keep the object alive, attach nothing.
			bound.anchors.push(object);
			bound.guards.push(guard);
			return Ok(bound);
		}

		let segments: Vec<&str> = binding.split('.').collect();
		// Prefixes whose dependency already got one bind attempt; a second
		// miss means the dependency attached somewhere unexpected.
		let mut attempted: HashSet<String> = HashSet::new();

		'walk: loop {
			let mut pending: Vec<(ScriptObject, String, ScriptObject)> = Vec::new();
			let mut cursor = root.clone();

			for (i, segment) in segments[..segments.len() - 1].iter().enumerate() {
				if let Some(next) = cursor.get(segment) {
					cursor = next;
					continue;
				}

				let prefix = segments[..=i].join(".");
				if let Some(dep_uri) = self.binding_owner(&prefix).map(str::to_string) {
					if !attempted.insert(prefix.clone()) {
						return Err(BindError::DependencyUnresolved {
							uri: key.to_string(),
							prefix,
						});
					}
					bound.merge(self.bind_recursive(root, &dep_uri, resolving)?);
					// The dependency mutated the graph; re-walk from the root.
					continue 'walk;
				}

				let fresh = ScriptObject::new();
				pending.push((cursor.clone(), (*segment).to_string(), fresh.clone()));
				cursor = fresh;
			}

			for (parent, name, child) in pending {
				parent.set(name, child);
			}
			// `segments` is non-empty: `binding` was checked non-empty above.
			cursor.set(segments[segments.len() - 1], object);
			bound.guards.push(guard);
			return Ok(bound);
		}
	}
}
