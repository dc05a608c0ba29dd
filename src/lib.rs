//! # Lenskit
//!
//! Camera capture for host applications: preview, frame streaming, photos
//! and video recording with pause support, driven by named commands.
//!
//! Lenskit is split into small crates. Enable only what you need:
//!
//! - `camera`: The capture engine and its backend and host interfaces.
//! - `permission`: Camera and microphone authorization.
//! - `plugin`: The command dispatch facade (enables `camera` and `permission`).
//! - `fake`: In-memory backend and host doubles for tests.
//!
//! Use the `full` feature to enable everything except `fake`.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! lenskit = { version = "0.1", features = ["plugin"] }
//! ```
//!
//! ```rust,ignore
//! use lenskit::plugin::{CameraPlugin, PluginConfig};
//!
//! let plugin = CameraPlugin::new(PluginConfig::default(), backend, permissions, channels, textures, main_thread)?;
//! plugin.orientation_changed(lenskit::camera::DeviceOrientation::LandscapeLeft);
//! ```

#[cfg(feature = "camera")]
pub use lenskit_camera as camera;

#[cfg(feature = "permission")]
pub use lenskit_permission as permission;

#[cfg(feature = "plugin")]
pub use lenskit_plugin as plugin;
