//! Control-socket path resolution.

use std::path::PathBuf;

/// Environment variable overriding the binding control socket path.
pub const SOCKET_ENV: &str = "TETHER_BINDING_SOCKET";

/// Returns the default control socket path.
///
/// Prioritizes writable directories so the binding process can bind its
/// socket even in restricted environments.
///
/// # Resolution Order
///
/// 1. `TETHER_BINDING_SOCKET` environment variable.
/// 2. System runtime directory (e.g., `$XDG_RUNTIME_DIR`).
/// 3. System temp directory (e.g., `/tmp`).
///
/// The default file name is `tether-binding.sock`.
#[must_use]
pub fn default_socket_path() -> PathBuf {
	if let Ok(path) = std::env::var(SOCKET_ENV) {
		return PathBuf::from(path);
	}

	dirs::runtime_dir()
		.filter(|dir| std::fs::create_dir_all(dir).is_ok())
		.unwrap_or_else(std::env::temp_dir)
		.join("tether-binding.sock")
}
