//! Feature policy: which feature URIs a page URL may use.
//!
//! Entries are polymorphic over grant and deny; the final allowed set is the
//! union of every entry's grants minus the union of every entry's denies.
//! Grants are fully applied before any deny, and set semantics make the
//! result independent of entry registration order. A feature no entry grants
//! is denied by omission; nothing is ever exposed by default.

use std::collections::HashSet;

use url::Url;

/// One pluggable policy rule.
///
/// The defaults grant and deny nothing, so an entry only overrides the side
/// it cares about.
pub trait PolicyEntry: Send + Sync {
	/// Feature URIs this entry grants to `url`.
	fn grant(&self, url: &Url) -> HashSet<String> {
		let _ = url;
		HashSet::new()
	}

	/// Feature URIs this entry strips from the granted set for `url`.
	fn deny(&self, url: &Url) -> HashSet<String> {
		let _ = url;
		HashSet::new()
	}
}

/// Handle for removing a registered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryId(u64);

/// Ordered collection of policy entries.
///
/// Entries are registered at process start and the set is read-mostly
/// afterwards; the embedder owns the instance and passes it down.
#[derive(Default)]
pub struct Policy {
	entries: Vec<(EntryId, Box<dyn PolicyEntry>)>,
	next_id: u64,
}

impl Policy {
	/// Creates an empty policy that grants nothing.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an entry and returns its removal handle.
	pub fn add_entry(&mut self, entry: Box<dyn PolicyEntry>) -> EntryId {
		let id = EntryId(self.next_id);
		self.next_id += 1;
		self.entries.push((id, entry));
		id
	}

	/// Removes an entry. Returns false if the id is unknown.
	pub fn remove_entry(&mut self, id: EntryId) -> bool {
		let before = self.entries.len();
		self.entries.retain(|(eid, _)| *eid != id);
		self.entries.len() != before
	}

	/// The allowed feature set for `url`: union of grants minus union of
	/// denies, unordered.
	#[must_use]
	pub fn features_for(&self, url: &Url) -> Vec<String> {
		let mut granted: HashSet<String> = HashSet::new();
		for (_, entry) in &self.entries {
			granted.extend(entry.grant(url));
		}
		for (_, entry) in &self.entries {
			for denied in entry.deny(url) {
				granted.remove(&denied);
			}
		}

		tracing::debug!(url = %url, allowed = granted.len(), "evaluated feature policy");
		granted.into_iter().collect()
	}
}

/// Test-only entry driven by the page URL itself.
///
/// Grants one feature per `&`-delimited token in the URL's query string, or
/// the whole URL string for `file:` URLs. Registered only when the binding
/// test switch is present on the command line.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryTestEntry;

impl PolicyEntry for QueryTestEntry {
	fn grant(&self, url: &Url) -> HashSet<String> {
		if url.scheme() == "file" {
			return HashSet::from([url.as_str().to_string()]);
		}
		url.query()
			.map(|query| {
				query
					.split('&')
					.filter(|token| !token.is_empty())
					.map(str::to_string)
					.collect()
			})
			.unwrap_or_default()
	}
}
