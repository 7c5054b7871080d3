//! C-ABI surface for tether binding provider modules.
//!
//! A provider module is a shared library exporting a single versioned entry
//! symbol, [`TETHER_PROVIDER_ENTRY_SYMBOL`]. The host calls it with a
//! [`TetherHostV1`] table and an out-pointer to a [`TetherGuestV1`] table the
//! module fills in. Filling the guest table must be side-effect free: the
//! host reads the static feature table during preload and unloads the module
//! again without running `init`. `init` runs when the first consumer acquires
//! the provider, `shutdown` when the last consumer releases it.
//!
//! Every table starts with `abi_version`; a mismatch with
//! [`TETHER_CABI_VERSION`] on either side is a load failure.

use core::ffi::c_void;

/// ABI handshake version. Bump on any layout change.
pub const TETHER_CABI_VERSION: u32 = 1;

/// Name of the entry symbol a provider module must export, NUL-terminated
/// for symbol lookup.
pub const TETHER_PROVIDER_ENTRY_SYMBOL: &[u8] = b"tether_provider_entry_v1\0";

/// Status codes crossing the ABI boundary.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TetherStatus {
	/// Operation succeeded.
	Ok = 0,
	/// Operation failed.
	Failed = 1,
	/// ABI version mismatch between host and module.
	Incompatible = 2,
}

/// Borrowed UTF-8 string view. The pointee must stay alive for the duration
/// of the call (or, for feature tables, for as long as the module is loaded).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TetherStr {
	/// Pointer to the first byte, may be null for the empty string.
	pub ptr: *const u8,
	/// Length in bytes.
	pub len: usize,
}

impl TetherStr {
	/// The empty string.
	#[must_use]
	pub const fn empty() -> Self {
		Self {
			ptr: core::ptr::null(),
			len: 0,
		}
	}

	/// Borrowed view of `s`. The caller keeps `s` alive.
	#[must_use]
	pub const fn new(s: &str) -> Self {
		Self {
			ptr: s.as_ptr(),
			len: s.len(),
		}
	}

	/// Reconstructs the string slice.
	///
	/// # Safety
	/// `ptr` must point to `len` bytes of valid UTF-8 alive for `'a`, or be
	/// null with `len == 0`.
	#[must_use]
	pub unsafe fn to_str<'a>(self) -> &'a str {
		if self.ptr.is_null() {
			return "";
		}
		unsafe {
			let bytes = core::slice::from_raw_parts(self.ptr, self.len);
			core::str::from_utf8_unchecked(bytes)
		}
	}
}

/// Constructs one native object for a feature. Returns an opaque handle, or
/// null on failure.
pub type TetherConstructFn = extern "C" fn(uri: TetherStr, user_data: *mut c_void) -> *mut c_void;

/// Destroys an object previously returned by the paired [`TetherConstructFn`].
pub type TetherDestroyFn = extern "C" fn(object: *mut c_void);

/// Runs the module's real startup. Called at most once per load, after the
/// host has decided to actually use the module.
pub type TetherInitFn = extern "C" fn(host: *const TetherHostV1) -> TetherStatus;

/// Tears the module down. Called at most once per load, after the last
/// consumer released the provider.
pub type TetherShutdownFn = extern "C" fn();

/// Functions the host exposes to provider modules.
#[repr(C)]
pub struct TetherHostV1 {
	/// Must equal [`TETHER_CABI_VERSION`].
	pub abi_version: u32,
	/// Log a line through the host's logging pipeline.
	pub log: Option<extern "C" fn(msg: TetherStr)>,
}

/// One feature a module declares: the URI pages request it by, the dotted
/// binding path it attaches at (may be empty for side-effect-only features),
/// and the object constructor/destructor pair.
#[repr(C)]
pub struct TetherFeatureV1 {
	/// Feature identifier, e.g. `"device.battery"`.
	pub uri: TetherStr,
	/// Dotted attachment path on the page's root object, e.g. `"device.battery"`.
	pub binding: TetherStr,
	/// Object constructor. Required.
	pub construct: Option<TetherConstructFn>,
	/// Object destructor. Required when `construct` can return non-null.
	pub destroy: Option<TetherDestroyFn>,
	/// Opaque module data passed back to `construct`.
	pub user_data: *mut c_void,
}

/// Table a provider module fills in from its entry symbol.
///
/// `features`/`feature_count` describe a typed array owned by the module,
/// valid while the library stays loaded.
#[repr(C)]
pub struct TetherGuestV1 {
	/// Must equal [`TETHER_CABI_VERSION`].
	pub abi_version: u32,
	/// Static feature table.
	pub features: *const TetherFeatureV1,
	/// Number of entries in `features`.
	pub feature_count: usize,
	/// Module startup. Required.
	pub init: Option<TetherInitFn>,
	/// Module teardown. Required.
	pub shutdown: Option<TetherShutdownFn>,
}

impl Default for TetherGuestV1 {
	fn default() -> Self {
		Self {
			abi_version: 0,
			features: core::ptr::null(),
			feature_count: 0,
			init: None,
			shutdown: None,
		}
	}
}

/// Signature of the exported entry symbol.
pub type TetherProviderEntryV1 =
	unsafe extern "C" fn(host: *const TetherHostV1, out_guest: *mut TetherGuestV1) -> TetherStatus;
