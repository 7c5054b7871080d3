//! Provider search directory discovery.
//!
//! Priority order: the `TETHER_BINDING_PATH` environment variable, then (on
//! Windows, and only when the variable yielded nothing) a machine-wide
//! registry value, then a `bindings` directory next to the running
//! executable, and finally an OS default if nothing else turned up.
//! Duplicates are dropped by exact path equality; no canonicalization.

use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable naming extra provider search directories, in the
/// platform's path-list format.
pub const SEARCH_PATH_ENV: &str = "TETHER_BINDING_PATH";

/// Discovers the ordered provider search directory list for this process.
#[must_use]
pub fn discover_search_dirs() -> Vec<PathBuf> {
	discover_from(
		std::env::var_os(SEARCH_PATH_ENV),
		std::env::current_exe().ok(),
	)
}

fn discover_from(env: Option<OsString>, exe: Option<PathBuf>) -> Vec<PathBuf> {
	let mut dirs: Vec<PathBuf> = Vec::new();

	if let Some(raw) = env {
		for path in std::env::split_paths(&raw) {
			if !path.as_os_str().is_empty() {
				push_unique(&mut dirs, path);
			}
		}
	}

	#[cfg(windows)]
	if dirs.is_empty() {
		for path in registry_dirs() {
			push_unique(&mut dirs, path);
		}
	}

	if let Some(exe) = exe
		&& let Some(dir) = exe.parent()
	{
		push_unique(&mut dirs, dir.join("bindings"));
	}

	if dirs.is_empty() {
		push_unique(&mut dirs, default_system_dir());
	}

	dirs
}

fn push_unique(dirs: &mut Vec<PathBuf>, path: PathBuf) {
	if !dirs.contains(&path) {
		dirs.push(path);
	}
}

#[cfg(unix)]
fn default_system_dir() -> PathBuf {
	PathBuf::from("/usr/lib/tether/providers")
}

#[cfg(windows)]
fn default_system_dir() -> PathBuf {
	std::env::var_os("PROGRAMFILES")
		.map(PathBuf::from)
		.unwrap_or_else(|| PathBuf::from(r"C:\Program Files"))
		.join(r"Tether\providers")
}

/// Reads the machine-wide provider path list from the registry.
#[cfg(windows)]
fn registry_dirs() -> Vec<PathBuf> {
	use windows_sys::Win32::Foundation::ERROR_SUCCESS;
	use windows_sys::Win32::System::Registry::{HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ, RegGetValueW};

	fn wide(s: &str) -> Vec<u16> {
		s.encode_utf16().chain(std::iter::once(0)).collect()
	}

	let subkey = wide(r"Software\Tether");
	let value = wide("ProviderPath");

	let mut size: u32 = 0;
	// SAFETY: size query per the RegGetValueW contract; all pointers valid.
	let rc = unsafe {
		RegGetValueW(
			HKEY_LOCAL_MACHINE,
			subkey.as_ptr(),
			value.as_ptr(),
			RRF_RT_REG_SZ,
			std::ptr::null_mut(),
			std::ptr::null_mut(),
			&mut size,
		)
	};
	if rc != ERROR_SUCCESS || size == 0 {
		return Vec::new();
	}

	let mut buf = vec![0u16; (size as usize).div_ceil(2)];
	// SAFETY: buffer sized from the query above.
	let rc = unsafe {
		RegGetValueW(
			HKEY_LOCAL_MACHINE,
			subkey.as_ptr(),
			value.as_ptr(),
			RRF_RT_REG_SZ,
			std::ptr::null_mut(),
			buf.as_mut_ptr().cast(),
			&mut size,
		)
	};
	if rc != ERROR_SUCCESS {
		return Vec::new();
	}

	let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
	let joined = String::from_utf16_lossy(&buf[..len]);
	std::env::split_paths(&OsString::from(joined))
		.filter(|p| !p.as_os_str().is_empty())
		.collect()
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;

	fn env_list(paths: &[&str]) -> OsString {
		std::env::join_paths(paths.iter().map(PathBuf::from)).unwrap()
	}

	#[test]
	fn env_dirs_come_first() {
		let dirs = discover_from(
			Some(env_list(&["/opt/providers", "/home/me/providers"])),
			Some(PathBuf::from("/usr/bin/tether")),
		);
		assert_eq!(
			dirs,
			vec![
				PathBuf::from("/opt/providers"),
				PathBuf::from("/home/me/providers"),
				PathBuf::from("/usr/bin/bindings"),
			]
		);
	}

	#[test]
	fn bundled_dir_always_appended() {
		let dirs = discover_from(None, Some(PathBuf::from("/usr/bin/tether")));
		assert_eq!(dirs, vec![PathBuf::from("/usr/bin/bindings")]);
	}

	#[test]
	fn falls_back_to_system_default() {
		let dirs = discover_from(None, None);
		assert_eq!(dirs.len(), 1);
		assert!(dirs[0].is_absolute());
	}

	#[test]
	fn exact_duplicates_dropped() {
		let dirs = discover_from(
			Some(env_list(&["/opt/providers", "/opt/providers"])),
			None,
		);
		assert_eq!(dirs, vec![PathBuf::from("/opt/providers")]);
	}

	#[test]
	fn empty_entries_ignored() {
		let dirs = discover_from(Some(OsString::from(":/opt/providers:")), None);
		assert_eq!(dirs, vec![PathBuf::from("/opt/providers")]);
	}
}
