//! Workspace umbrella crate.
//!
//! Exposes the feature flags that map to the individual workspace crates
//! (`core-service`, `core-sync`, `core-derivatives`). Host applications can
//! depend on `culler-workspace` and enable the documented features without
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service as service;

#[cfg(feature = "derivatives")]
pub use core_derivatives as derivatives;

#[cfg(feature = "sync-engine")]
pub use core_sync as sync;
