//! Per-renderer binding channel.

use std::sync::{Mutex, PoisonError};

use tether_proto::RendererId;
use tether_registry::{Bound, Registry};
use tether_script::ScriptObject;

/// One renderer's channel: its root script object and everything bound onto
/// it.
///
/// Field order matters: the root graph (holding attached native objects)
/// drops before the retained provider guards.
pub struct Channel {
	renderer: RendererId,
	url: Option<String>,
	features: Vec<String>,
	root: ScriptObject,
	retained: Mutex<Vec<Bound>>,
}

impl Channel {
	/// Creates a channel with a fresh, empty root object.
	#[must_use]
	pub fn new(renderer: RendererId, url: Option<String>, features: Vec<String>) -> Self {
		Self {
			renderer,
			url,
			features,
			root: ScriptObject::new(),
			retained: Mutex::new(Vec::new()),
		}
	}

	/// The renderer this channel belongs to.
	#[must_use]
	pub fn renderer(&self) -> RendererId {
		self.renderer
	}

	/// The page URL known at channel-open time, if any.
	#[must_use]
	pub fn url(&self) -> Option<&str> {
		self.url.as_deref()
	}

	/// The feature URIs granted when the channel was opened.
	#[must_use]
	pub fn features(&self) -> &[String] {
		&self.features
	}

	/// The root script object features attach to.
	#[must_use]
	pub fn root(&self) -> &ScriptObject {
		&self.root
	}

	/// Binds every requested feature, best-effort.
	///
	/// A feature that fails to bind is logged and reported in the returned
	/// list; the remaining features still bind. The page sees a missing
	/// property, never an error.
	pub fn bind_apis(&self, registry: &Registry, features: &[String]) -> Vec<String> {
		let mut failed = Vec::new();
		for uri in features {
			match registry.bind_feature(&self.root, uri) {
				Ok(bound) => {
					self.retained
						.lock()
						.unwrap_or_else(PoisonError::into_inner)
						.push(bound);
				}
				Err(error) => {
					tracing::warn!(renderer = ?self.renderer, %uri, %error, "failed to bind feature");
					failed.push(uri.clone());
				}
			}
		}
		failed
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use tether_provider::{FeatureEntry, Provider, StaticModule};
	use tether_registry::RegistryConfig;

	use super::*;

	fn test_registry() -> Registry {
		let mut registry = Registry::new(RegistryConfig {
			search_dirs: Vec::new(),
			cache_path: None,
		});
		registry.add_provider(Arc::new(Provider::new(Arc::new(StaticModule::new(
			vec![FeatureEntry::new("app.echo", "app.echo")],
			Box::new(|_, _| Some(ScriptObject::new())),
		)))));
		registry.add_provider(Arc::new(Provider::new(Arc::new(StaticModule::new(
			vec![FeatureEntry::new("app.broken", "app.broken")],
			Box::new(|_, _| None),
		)))));
		registry
	}

	#[test]
	fn bind_apis_reports_failures_and_continues() {
		let registry = test_registry();
		let channel = Channel::new(RendererId(1), None, vec![]);

		let failed = channel.bind_apis(
			&registry,
			&[
				"app.broken".to_string(),
				"app.echo".to_string(),
				"app.unknown".to_string(),
			],
		);

		assert_eq!(failed, ["app.broken", "app.unknown"]);
		// The good feature still bound.
		assert!(channel.root().get("app").unwrap().get("echo").is_some());
	}
}
