//! Provider registry: discovery, cache, and feature binding.
//!
//! The registry discovers provider search directories, scans them for
//! binding modules (through an injected [`ModuleLoader`]), and keeps two
//! indexes: feature URI → owning provider, and binding path → feature URI
//! for dependency resolution. A JSON cache of the scan survives across
//! processes and is revalidated against directory and module timestamps;
//! any mismatch degrades to a full rescan, never a startup failure.
//!
//! Binding a feature resolves its dotted binding path against a root script
//! object, materializing plain intermediate objects and transitively binding
//! registered dependencies along the way.

pub mod binder;
pub mod cache;
pub mod error;
pub mod registry;
pub mod scan;
pub mod search;

pub use binder::Bound;
pub use cache::{default_cache_path, validate_cache};
pub use error::{BindError, CacheError};
pub use registry::{Registry, RegistryConfig};
pub use scan::{DsoLoader, ModuleLoader};
pub use search::{SEARCH_PATH_ENV, discover_search_dirs};
