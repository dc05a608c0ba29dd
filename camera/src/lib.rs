//! Camera capture engine.
//!
//! This crate drives one camera through a platform capture backend: it
//! configures the session for a resolution preset, keeps the latest preview
//! frame for the host's texture, streams frames on request, takes photos and
//! records video with pause support.
//!
//! The platform is reached only through the traits in [`backend`] and the host
//! application only through the traits in [`host`], so the engine itself is
//! plain Rust. Enable the `fake` feature for in-memory implementations of both.

#![warn(missing_docs)]

pub mod backend;
mod config;
mod engine;
mod error;
mod frame_cache;
pub mod host;
pub mod media;
mod photo;
mod properties;
pub mod queue;
mod recording;
mod storage;
mod streaming;
pub mod thread_safe;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use config::{CaptureConfig, DEFAULT_MAX_PENDING_FRAMES};
pub use engine::{
    CaptureEngine, CaptureEngineBuilder, EngineDispatcher, EngineTask, FrameAvailable, InitializedEvent,
    MAX_QUEUED_VIDEO_SAMPLES, RecordingState,
};
pub use error::CameraError;
pub use frame_cache::LatestFrameCache;
pub use photo::{PhotoCompletion, SavePhotoDelegate};
pub use properties::{DeviceOrientation, ExposureMode, FlashMode, FocusMode, ImageFormatGroup, ResolutionPreset};
pub use recording::{RecordingFault, RecordingSession, TrackClock};
pub use storage::MediaStorage;
pub use streaming::{FrameMetadata, ImageFrame, ImagePlane, ImageStreamHandler, StreamingState};
