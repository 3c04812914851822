//! Workspace placeholder crate.
//!
//! Exposes feature flags that map onto the workspace crates so a host can
//! depend on `songsync-workspace` alone:
//!
//! - `desktop-shims` (default): `core-service` with the reqwest HTTP client
//!   and OS keyring used when the host injects nothing
//! - `secure-store`: same service, keyring-backed credentials required
//! - `engine-only`: just `core-sync`, for hosts that bring their own
//!   transport and wiring
