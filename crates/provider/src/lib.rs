//! Binding provider modules.
//!
//! A provider wraps one native binding module: a shared library implementing
//! the `tether-cabi` contract, or an in-process table for built-in features.
//! The registry owns providers exclusively; consumers acquire them through
//! [`Provider::acquire`], which lazily runs module startup on the first
//! acquire and shutdown on the last release.

pub mod dso;
pub mod error;
pub mod module;
pub mod provider;

pub use dso::DsoModule;
pub use error::ProviderError;
pub use module::{FeatureEntry, ProviderModule, StaticModule, strip_query};
pub use provider::{LifeState, Provider, ProviderGuard};
