//! Host-facing camera plugin.
//!
//! [`CameraPlugin`] turns named commands from the host (`create`,
//! `initialize`, `takePicture`, `startVideoRecording`, ...) into calls on a
//! [`lenskit_camera::CaptureEngine`]. It checks camera and microphone access
//! before opening a camera, owns the engine on a single serialization queue
//! and forwards device rotation to the engine and to the host.
//!
//! # Example
//!
//! ```ignore
//! let plugin = CameraPlugin::new(
//!     PluginConfig::default(),
//!     backend,
//!     permissions,
//!     channels,
//!     textures,
//!     main_thread,
//! )?;
//! plugin
//!     .handle_method_call(MethodCall::new("availableCameras", Value::Null), reply)
//!     .await;
//! ```

#![warn(missing_docs)]

mod arguments;
mod config;
mod discovery;
mod error;
mod plugin;

pub use config::{DEVICE_CHANNEL, IMAGE_STREAM_CHANNEL, METHOD_CHANNEL, PluginConfig, camera_channel};
pub use discovery::{CameraDescription, LensFacing, available_cameras};
pub use error::PluginError;
pub use plugin::CameraPlugin;
