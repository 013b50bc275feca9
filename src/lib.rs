//! Workspace facade crate.
//!
//! Re-exports the playback engine crates behind feature flags so host
//! applications can depend on `playback-workspace` alone:
//!
//! - `engine` (default): [`core_playback`], [`core_runtime`] and
//!   [`bridge_traits`], everything needed to embed a `PlaybackEngine`.
//! - `actors`: the standalone [`core_actor`] runtime.

#[cfg(feature = "engine")]
pub use bridge_traits;
#[cfg(feature = "actors")]
pub use core_actor;
#[cfg(feature = "engine")]
pub use core_playback;
#[cfg(feature = "engine")]
pub use core_runtime;
