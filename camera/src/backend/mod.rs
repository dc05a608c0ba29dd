//! Capability interfaces over the hardware capture backend.
//!
//! The engine never talks to a platform framework directly. Every object it
//! needs, from the session and devices down to the asset writer used for
//! recording, is reached through the traits in this module and created by a
//! [`CaptureBackend`] handed to the engine at construction.
//!
//! Backend objects behave like shared platform handles: methods take `&self`
//! and implementations synchronize internally.

mod device;
mod session;
mod writer;

pub use device::{
    CaptureDevice, DeviceExposureMode, DeviceFlashMode, DeviceFocusMode, DevicePosition, DeviceType, TorchMode,
};
pub use session::{
    AudioDataOutput, CaptureConnection, CaptureInput, CaptureOutput, CaptureSession, CapturedPhoto,
    DiscoverySession, InputHandle, MediaType, OutputHandle, PhotoCaptureDelegate, PhotoOutput, PhotoSettings,
    SampleBufferDelegate, SampleSource, SessionPreset, VideoDataOutput, VideoOrientation,
};
pub use writer::{
    AssetWriter, AssetWriterInput, AudioSettings, FileType, OutputSettings, PixelBufferAdaptor, VideoSettings,
    WriterCompletion, WriterStatus,
};

use std::path::Path;
use std::sync::Arc;

use crate::media::PixelFormat;

/// Error reported by a backend object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    /// Error domain, e.g. the framework that raised it.
    pub domain: String,
    /// Numeric code within the domain.
    pub code: i64,
    /// Localized description.
    pub message: String,
}

impl BackendError {
    /// Create a backend error.
    pub fn new(domain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: message.into(),
        }
    }
}

/// Factory for every backend object the engine uses.
pub trait CaptureBackend: Send + Sync {
    /// A new, unconfigured capture session.
    fn capture_session(&self) -> Arc<dyn CaptureSession>;

    /// Find devices of the given types.
    fn discovery_session(
        &self,
        device_types: &[DeviceType],
        media_type: MediaType,
        position: Option<DevicePosition>,
    ) -> Box<dyn DiscoverySession>;

    /// Look up a device by its unique identifier.
    fn device(&self, unique_id: &str) -> Option<Arc<dyn CaptureDevice>>;

    /// The system default device for `media_type`.
    fn default_device(&self, media_type: MediaType) -> Option<Arc<dyn CaptureDevice>>;

    /// Wrap a device as a session input.
    ///
    /// # Errors
    /// Fails when the device cannot be opened, e.g. it is in use.
    fn device_input(&self, device: &Arc<dyn CaptureDevice>) -> Result<InputHandle, BackendError>;

    /// An explicit connection between the input's video port and `output`.
    fn connection(&self, input: &InputHandle, output: &OutputHandle) -> Arc<dyn CaptureConnection>;

    /// A new video data output.
    fn video_data_output(&self) -> Arc<dyn VideoDataOutput>;

    /// A new audio data output.
    fn audio_data_output(&self) -> Arc<dyn AudioDataOutput>;

    /// A new photo output.
    fn photo_output(&self) -> Arc<dyn PhotoOutput>;

    /// A writer producing a container file at `path`.
    ///
    /// # Errors
    /// Fails when the file cannot be created.
    fn asset_writer(&self, path: &Path, file_type: FileType) -> Result<Box<dyn AssetWriter>, BackendError>;

    /// A writer input for one track.
    fn asset_writer_input(&self, media_type: MediaType, settings: OutputSettings) -> Arc<dyn AssetWriterInput>;

    /// An adaptor appending pixel buffers to a video writer input.
    fn pixel_buffer_adaptor(
        &self,
        input: &Arc<dyn AssetWriterInput>,
        format: PixelFormat,
    ) -> Arc<dyn PixelBufferAdaptor>;
}
