//! Minimal example binding provider: one feature, `demo.echo`.

use std::ffi::c_void;

use tether_cabi::{
	TETHER_CABI_VERSION, TetherFeatureV1, TetherGuestV1, TetherHostV1, TetherStatus, TetherStr,
};

struct EchoObject {
	greeting: String,
}

extern "C" fn construct(uri: TetherStr, _user_data: *mut c_void) -> *mut c_void {
	// SAFETY: the host passes a valid view for the duration of the call.
	let uri = unsafe { uri.to_str() };
	let object = Box::new(EchoObject {
		greeting: format!("echo object for {uri}"),
	});
	Box::into_raw(object).cast()
}

extern "C" fn destroy(object: *mut c_void) {
	if object.is_null() {
		return;
	}
	// SAFETY: the host only passes pointers returned by `construct`.
	drop(unsafe { Box::from_raw(object.cast::<EchoObject>()) });
}

extern "C" fn init(host: *const TetherHostV1) -> TetherStatus {
	if host.is_null() {
		return TetherStatus::Failed;
	}
	// SAFETY: checked non-null; valid for the duration of the call.
	let host = unsafe { &*host };
	if let Some(log) = host.log {
		log(TetherStr::new("demo provider initialized"));
	}
	TetherStatus::Ok
}

extern "C" fn shutdown() {}

// SAFETY: written once from the entry symbol before the host reads it, and
// the host serializes all module calls.
static mut FEATURES: [TetherFeatureV1; 1] = [TetherFeatureV1 {
	uri: TetherStr::new("demo.echo"),
	binding: TetherStr::new("demo.echo"),
	construct: Some(construct),
	destroy: Some(destroy),
	user_data: std::ptr::null_mut(),
}];

#[unsafe(no_mangle)]
/// # Safety
/// `host` and `out_guest` must be non-null and live for the duration of the
/// call, and the host ABI version must match.
pub unsafe extern "C" fn tether_provider_entry_v1(
	host: *const TetherHostV1,
	out_guest: *mut TetherGuestV1,
) -> TetherStatus {
	if host.is_null() || out_guest.is_null() {
		return TetherStatus::Failed;
	}

	// SAFETY: checked non-null above.
	let host_ref = unsafe { &*host };
	if host_ref.abi_version != TETHER_CABI_VERSION {
		return TetherStatus::Incompatible;
	}

	// SAFETY: the static table is never written after this point.
	unsafe {
		*out_guest = TetherGuestV1 {
			abi_version: TETHER_CABI_VERSION,
			features: (&raw const FEATURES).cast(),
			feature_count: 1,
			init: Some(init),
			shutdown: Some(shutdown),
		};
	}
	TetherStatus::Ok
}
