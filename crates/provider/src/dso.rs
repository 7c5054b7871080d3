//! Shared-library provider modules.
//!
//! Preload loads the library transiently, reads the static feature table
//! through the versioned entry symbol, and unloads again without running the
//! module's `init`. The real load happens on first acquire.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use libloading::{Library, Symbol};
use tether_cabi::{
	TETHER_CABI_VERSION, TETHER_PROVIDER_ENTRY_SYMBOL, TetherDestroyFn, TetherFeatureV1,
	TetherGuestV1, TetherHostV1, TetherProviderEntryV1, TetherStatus, TetherStr,
};
use tether_script::{BindingObject, ScriptObject};

use crate::error::{ProviderError, Result};
use crate::module::{FeatureEntry, ProviderModule, strip_query};

extern "C" fn host_log(msg: TetherStr) {
	// SAFETY: the ABI contract requires a valid UTF-8 view for the call.
	let msg = unsafe { msg.to_str() };
	tracing::info!(target: "tether::module", "{msg}");
}

fn host_table() -> TetherHostV1 {
	TetherHostV1 {
		abi_version: TETHER_CABI_VERSION,
		log: Some(host_log),
	}
}

struct LoadedDso {
	guest: TetherGuestV1,
	// Dropped last; `guest` points into the library's static data.
	_lib: Library,
}

enum DsoState {
	Unloaded,
	Loaded(LoadedDso),
}

// SAFETY: the guest table's pointers reference static data owned by the
// library in the same variant, and all access is serialized through the
// module's mutex. The ABI requires modules to be callable from any thread.
unsafe impl Send for DsoState {}

/// A provider module backed by a shared library on disk.
pub struct DsoModule {
	path: PathBuf,
	features: Vec<FeatureEntry>,
	state: Mutex<DsoState>,
}

impl DsoModule {
	/// Loads the module transiently, copies its static feature table out, and
	/// unloads it again. The module's `init` does not run.
	pub fn preload(path: &Path) -> Result<Self> {
		let (lib, guest) = load_and_verify(path)?;
		let features = copy_features(path, &guest)?;
		drop(lib);
		Ok(Self {
			path: path.to_path_buf(),
			features,
			state: Mutex::new(DsoState::Unloaded),
		})
	}

	/// Restores a module from cached metadata without touching the file.
	///
	/// The feature table is trusted; cache validation already established the
	/// file is unchanged since it was scanned.
	#[must_use]
	pub fn from_cache(path: PathBuf, features: Vec<FeatureEntry>) -> Self {
		Self {
			path,
			features,
			state: Mutex::new(DsoState::Unloaded),
		}
	}
}

impl ProviderModule for DsoModule {
	fn features(&self) -> &[FeatureEntry] {
		&self.features
	}

	fn path(&self) -> Option<&Path> {
		Some(&self.path)
	}

	fn init(&self) -> Result<()> {
		let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		if matches!(*state, DsoState::Loaded(_)) {
			return Ok(());
		}

		let (lib, guest) = load_and_verify(&self.path)?;
		let Some(init) = guest.init else {
			return Err(ProviderError::MalformedTable {
				path: self.path.clone(),
				reason: "missing init",
			});
		};

		let host = host_table();
		let status = init(&host);
		if status != TetherStatus::Ok {
			return Err(ProviderError::InitFailed {
				reason: format!("{status:?}"),
			});
		}

		*state = DsoState::Loaded(LoadedDso { guest, _lib: lib });
		Ok(())
	}

	fn shutdown(&self) {
		let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		if let DsoState::Loaded(loaded) = std::mem::replace(&mut *state, DsoState::Unloaded)
			&& let Some(shutdown) = loaded.guest.shutdown
		{
			shutdown();
		}
	}

	fn create_object(&self, uri: &str, _root: &ScriptObject) -> Option<ScriptObject> {
		let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
		let DsoState::Loaded(loaded) = &*state else {
			tracing::warn!(path = %self.path.display(), uri, "create_object on unloaded module");
			return None;
		};

		let wanted = strip_query(uri);
		// SAFETY: verified non-null with `feature_count` entries at load.
		let table = unsafe {
			std::slice::from_raw_parts(loaded.guest.features, loaded.guest.feature_count)
		};
		let entry = table.iter().find(|f| {
			// SAFETY: table strings are static module data, alive while loaded.
			(unsafe { f.uri.to_str() }) == wanted
		})?;

		let construct = entry.construct?;
		let handle = construct(TetherStr::new(uri), entry.user_data);
		if handle.is_null() {
			return None;
		}

		Some(ScriptObject::with_native(Arc::new(DsoObject {
			uri: wanted.to_string(),
			handle,
			destroy: entry.destroy,
		})))
	}
}

/// Native object handle created by a DSO module.
///
/// Must not outlive the provider guard that keeps the module loaded; the
/// destructor lives in the library's code.
struct DsoObject {
	uri: String,
	handle: *mut c_void,
	destroy: Option<TetherDestroyFn>,
}

// SAFETY: the handle is opaque to the host; the ABI requires module objects
// to tolerate use and destruction from any thread.
unsafe impl Send for DsoObject {}
unsafe impl Sync for DsoObject {}

impl BindingObject for DsoObject {
	fn feature_uri(&self) -> &str {
		&self.uri
	}
}

impl Drop for DsoObject {
	fn drop(&mut self) {
		if let Some(destroy) = self.destroy {
			destroy(self.handle);
		}
	}
}

fn load_and_verify(path: &Path) -> Result<(Library, TetherGuestV1)> {
	// SAFETY: loading a binding module runs its static initializers; that is
	// the deal providers sign up for.
	let lib = unsafe { Library::new(path) }.map_err(|error| ProviderError::Load {
		path: path.to_path_buf(),
		error,
	})?;

	let mut guest = TetherGuestV1::default();
	{
		// SAFETY: symbol type is fixed by the ABI contract.
		let entry: Symbol<TetherProviderEntryV1> = unsafe { lib.get(TETHER_PROVIDER_ENTRY_SYMBOL) }
			.map_err(|error| ProviderError::Load {
				path: path.to_path_buf(),
				error,
			})?;

		let host = host_table();
		// SAFETY: both pointers are valid for the duration of the call.
		let status = unsafe { entry(&host, &mut guest) };
		match status {
			TetherStatus::Ok => {}
			TetherStatus::Incompatible => {
				return Err(ProviderError::Incompatible {
					path: path.to_path_buf(),
					got: guest.abi_version,
					host: TETHER_CABI_VERSION,
				});
			}
			TetherStatus::Failed => {
				return Err(ProviderError::EntryFailed {
					path: path.to_path_buf(),
				});
			}
		}
	}

	if guest.abi_version != TETHER_CABI_VERSION {
		return Err(ProviderError::Incompatible {
			path: path.to_path_buf(),
			got: guest.abi_version,
			host: TETHER_CABI_VERSION,
		});
	}
	if guest.init.is_none() || guest.shutdown.is_none() {
		return Err(ProviderError::MalformedTable {
			path: path.to_path_buf(),
			reason: "missing init or shutdown",
		});
	}
	if guest.feature_count == 0 || guest.features.is_null() {
		return Err(ProviderError::EmptyFeatureTable {
			path: path.to_path_buf(),
		});
	}

	Ok((lib, guest))
}

fn copy_features(path: &Path, guest: &TetherGuestV1) -> Result<Vec<FeatureEntry>> {
	// SAFETY: checked non-null with `feature_count` entries above; strings
	// are valid while the library is loaded, which the caller guarantees.
	let table: &[TetherFeatureV1] =
		unsafe { std::slice::from_raw_parts(guest.features, guest.feature_count) };

	let mut features = Vec::with_capacity(table.len());
	for entry in table {
		if entry.construct.is_none() {
			return Err(ProviderError::MalformedTable {
				path: path.to_path_buf(),
				reason: "feature without constructor",
			});
		}
		// SAFETY: as above.
		let (uri, binding) = unsafe { (entry.uri.to_str(), entry.binding.to_str()) };
		if uri.is_empty() {
			return Err(ProviderError::MalformedTable {
				path: path.to_path_buf(),
				reason: "feature with empty uri",
			});
		}
		features.push(FeatureEntry::new(uri, binding));
	}
	Ok(features)
}
