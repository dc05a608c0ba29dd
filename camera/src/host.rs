//! Interfaces to the embedding host: channels, textures and replies.
//!
//! These traits are transport agnostic. A host adapter implements them on
//! top of whatever messaging it uses; the engine only ever calls them through
//! the wrappers in [`crate::thread_safe`], which hop to the host's main thread.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::CameraError;
use crate::media::PixelBuffer;
use crate::streaming::ImageFrame;

/// Channel for invoking named methods on the host side.
pub trait MethodChannel: Send + Sync {
    /// Send `method` with `arguments`. Must be called on the main thread.
    fn invoke_method(&self, method: &str, arguments: Value);
}

/// Callback receiving streamed frames.
pub type EventSink = Arc<dyn Fn(ImageFrame) + Send + Sync>;

/// Reacts to the host subscribing to or cancelling an event stream.
pub trait StreamHandler: Send + Sync {
    /// The host started listening. Events go to `sink`.
    fn on_listen(&self, sink: EventSink);
    /// The host stopped listening.
    fn on_cancel(&self);
}

/// Channel carrying a stream of events to the host.
pub trait EventChannel: Send + Sync {
    /// Install or clear the stream handler. Must be called on the main thread.
    fn set_stream_handler(&self, handler: Option<Arc<dyn StreamHandler>>);
}

/// Source of preview frames for a host texture.
pub trait Texture: Send + Sync {
    /// The newest frame, if one arrived since the last call.
    fn copy_pixel_buffer(&self) -> Option<PixelBuffer>;
}

/// The host's registry of external textures. Must be called on the main thread.
pub trait TextureRegistry: Send + Sync {
    /// Register `texture` and return its id.
    fn register_texture(&self, texture: Arc<dyn Texture>) -> i64;
    /// Tell the host a new frame is ready for `texture_id`.
    fn texture_frame_available(&self, texture_id: i64);
    /// Forget `texture_id`.
    fn unregister_texture(&self, texture_id: i64);
}

/// Creates named channels on the host's messenger.
pub trait ChannelFactory: Send + Sync {
    /// A method channel called `name`.
    fn method_channel(&self, name: &str) -> Arc<dyn MethodChannel>;
    /// An event channel called `name`.
    fn event_channel(&self, name: &str) -> Arc<dyn EventChannel>;
}

/// An incoming command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodCall {
    /// Command name.
    pub method: String,
    /// Arguments, usually an object.
    pub arguments: Value,
}

impl MethodCall {
    /// Create a call.
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Error reply sent to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodError {
    /// Stable error code.
    pub code: String,
    /// Human readable description.
    pub message: Option<String>,
    /// Extra detail.
    pub details: Value,
}

impl MethodError {
    /// Create an error reply without details.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: Some(message.into()),
            details: Value::Null,
        }
    }
}

impl From<&CameraError> for MethodError {
    fn from(error: &CameraError) -> Self {
        Self {
            code: error.code(),
            message: Some(error.to_string()),
            details: error.details(),
        }
    }
}

/// Reply to a [`MethodCall`].
#[derive(Debug, Clone, PartialEq)]
pub enum MethodResponse {
    /// The command succeeded.
    Success(Value),
    /// The command failed.
    Error(MethodError),
    /// The command is unknown.
    NotImplemented,
}

/// Callback delivering the reply to the host.
pub type MethodResult = Box<dyn FnOnce(MethodResponse) + Send>;
