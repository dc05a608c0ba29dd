use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, MediaType};
use crate::media::{MediaTime, PixelBuffer, SampleBuffer};

/// Container formats the writer can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// MPEG-4.
    Mp4,
}

/// Video encoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSettings {
    /// Codec identifier, e.g. `avc1`.
    pub codec: String,
    /// Encoded width.
    pub width: u32,
    /// Encoded height.
    pub height: u32,
}

/// Audio encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioSettings {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
}

impl Default for AudioSettings {
    /// AAC at 44.1 kHz, mono.
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
        }
    }
}

/// Settings for one writer input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSettings {
    /// A video track.
    Video(VideoSettings),
    /// An AAC audio track.
    Audio(AudioSettings),
}

/// Lifecycle of an asset writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriterStatus {
    /// Created, not yet writing.
    Unknown,
    /// Accepting samples.
    Writing,
    /// Finished successfully.
    Completed,
    /// Stopped by an error.
    Failed,
    /// Cancelled.
    Cancelled,
}

/// Called once the writer has finished, with its final status.
pub type WriterCompletion = Box<dyn FnOnce(WriterStatus) + Send>;

/// Muxes appended samples into a container file.
pub trait AssetWriter: Send {
    /// Current status.
    fn status(&self) -> WriterStatus;
    /// The error that moved the writer to [`WriterStatus::Failed`].
    fn error(&self) -> Option<BackendError>;
    /// Attach a track input. Only valid before writing starts.
    fn add_input(&mut self, input: Arc<dyn AssetWriterInput>);
    /// Begin accepting samples. Returns `false` on failure.
    fn start_writing(&mut self) -> bool;
    /// Anchor the output timeline at `source_time`.
    fn start_session(&mut self, source_time: MediaTime);
    /// Finalize the file.
    ///
    /// `completion` may run on any thread, and may run before this returns.
    /// The writer may be dropped as soon as this returns.
    fn finish_writing(&mut self, completion: WriterCompletion);
}

/// One track of an [`AssetWriter`].
pub trait AssetWriterInput: Send + Sync {
    /// Media written by this input.
    fn media_type(&self) -> MediaType;
    /// Tune buffering for live sources.
    fn set_expects_media_data_in_real_time(&self, real_time: bool);
    /// Whether another sample can be appended without blocking.
    fn is_ready_for_more_media_data(&self) -> bool;
    /// Append a sample. Returns `false` on failure.
    fn append(&self, sample: &SampleBuffer) -> bool;
}

/// Appends pixel buffers to a video [`AssetWriterInput`].
pub trait PixelBufferAdaptor: Send + Sync {
    /// Append `buffer` at `presentation_time`. Returns `false` on failure.
    fn append(&self, buffer: &PixelBuffer, presentation_time: MediaTime) -> bool;
}
