use std::fmt;
use std::sync::{Arc, Weak};

use crate::backend::{BackendError, CaptureDevice, DeviceFlashMode, FileType, VideoSettings};
use crate::media::{Dimensions, PixelFormat, SampleBuffer};

/// Kind of media carried by a port, input or track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Video frames.
    Video,
    /// Audio samples.
    Audio,
}

/// Session quality presets offered by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPreset {
    /// 3840x2160.
    Hd4K3840x2160,
    /// The highest quality the active format offers.
    High,
    /// 1920x1080.
    Hd1920x1080,
    /// 1280x720.
    Hd1280x720,
    /// 640x480.
    Vga640x480,
    /// 352x288.
    Cif352x288,
}

impl SessionPreset {
    /// Output size for fixed presets, `None` for [`SessionPreset::High`].
    #[must_use]
    pub const fn dimensions(self) -> Option<Dimensions> {
        match self {
            Self::Hd4K3840x2160 => Some(Dimensions::new(3840, 2160)),
            Self::High => None,
            Self::Hd1920x1080 => Some(Dimensions::new(1920, 1080)),
            Self::Hd1280x720 => Some(Dimensions::new(1280, 720)),
            Self::Vga640x480 => Some(Dimensions::new(640, 480)),
            Self::Cif352x288 => Some(Dimensions::new(352, 288)),
        }
    }
}

/// Orientation applied to a connection's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoOrientation {
    /// Upright.
    Portrait,
    /// Upside down.
    PortraitUpsideDown,
    /// Rotated with the top to the right.
    LandscapeRight,
    /// Rotated with the top to the left.
    LandscapeLeft,
}

/// A device wrapped for use in a session.
pub trait CaptureInput: Send + Sync {
    /// Identifier of the wrapped device.
    fn device_id(&self) -> String;
    /// Media produced by the input.
    fn media_type(&self) -> MediaType;
}

/// Shared handle to a session input.
pub type InputHandle = Arc<dyn CaptureInput>;

/// A link from an input port to an output.
pub trait CaptureConnection: Send + Sync {
    /// Mirror the video horizontally.
    fn set_video_mirrored(&self, mirrored: bool);
    /// Whether the video is mirrored.
    fn is_video_mirrored(&self) -> bool;
    /// Whether [`set_video_orientation`](CaptureConnection::set_video_orientation) has any effect.
    fn is_video_orientation_supported(&self) -> bool;
    /// Rotate the output.
    fn set_video_orientation(&self, orientation: VideoOrientation);
}

/// Behaviour shared by all outputs.
pub trait CaptureOutput: Send + Sync {
    /// The connection feeding this output with `media_type`, once wired.
    fn connection(&self, media_type: MediaType) -> Option<Arc<dyn CaptureConnection>>;
}

/// Which output produced a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleSource {
    /// The video data output.
    Video,
    /// The audio data output.
    Audio,
}

/// Receiver for samples produced by data outputs.
pub trait SampleBufferDelegate: Send + Sync {
    /// Called for every sample the output produces.
    fn did_output(&self, source: SampleSource, sample: SampleBuffer);
}

/// Output delivering raw video frames.
pub trait VideoDataOutput: CaptureOutput {
    /// Request frames in `format`.
    fn set_pixel_format(&self, format: PixelFormat);
    /// Drop frames that arrive while the delegate is still busy.
    fn set_always_discards_late_video_frames(&self, discard: bool);
    /// Install or clear the sample receiver.
    fn set_sample_buffer_delegate(&self, delegate: Option<Arc<dyn SampleBufferDelegate>>);
    /// Encoder settings suited to the output's current format.
    fn recommended_video_settings(&self, file_type: FileType) -> VideoSettings;
}

/// Output delivering raw audio samples.
pub trait AudioDataOutput: CaptureOutput {
    /// Install or clear the sample receiver.
    fn set_sample_buffer_delegate(&self, delegate: Option<Arc<dyn SampleBufferDelegate>>);
}

/// Parameters of a single still capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoSettings {
    /// Identifier unique within the process.
    pub unique_id: i64,
    /// Flash behaviour for this capture.
    pub flash_mode: DeviceFlashMode,
    /// Capture at the active format's high still resolution.
    pub high_resolution_photo_enabled: bool,
}

/// A processed still.
pub trait CapturedPhoto: Send {
    /// Encoded file bytes, `None` when the photo cannot be encoded.
    fn file_data_representation(&self) -> Option<Vec<u8>>;
}

/// Receiver for still capture results.
pub trait PhotoCaptureDelegate: Send + Sync {
    /// Called once per capture with the processed photo or the error.
    fn did_finish_processing_photo(&self, result: Result<Box<dyn CapturedPhoto>, BackendError>);
}

/// Output producing still photos.
pub trait PhotoOutput: CaptureOutput {
    /// Allow captures at the active format's high still resolution.
    fn set_high_resolution_capture_enabled(&self, enabled: bool);
    /// Flash modes usable with the current configuration.
    fn supported_flash_modes(&self) -> Vec<DeviceFlashMode>;
    /// Start a capture.
    ///
    /// The output only holds the delegate weakly. It is the caller's job to
    /// keep the delegate alive until the result arrives.
    fn capture_photo(&self, settings: PhotoSettings, delegate: Weak<dyn PhotoCaptureDelegate>);
}

/// Shared handle to any session output.
#[derive(Clone)]
pub enum OutputHandle {
    /// A video data output.
    Video(Arc<dyn VideoDataOutput>),
    /// An audio data output.
    Audio(Arc<dyn AudioDataOutput>),
    /// A photo output.
    Photo(Arc<dyn PhotoOutput>),
}

impl OutputHandle {
    /// The connection feeding this output with `media_type`.
    #[must_use]
    pub fn connection(&self, media_type: MediaType) -> Option<Arc<dyn CaptureConnection>> {
        match self {
            Self::Video(output) => output.connection(media_type),
            Self::Audio(output) => output.connection(media_type),
            Self::Photo(output) => output.connection(media_type),
        }
    }

    /// Whether both handles refer to the same output object.
    #[must_use]
    pub fn same_output(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Video(a), Self::Video(b)) => Arc::ptr_eq(a, b),
            (Self::Audio(a), Self::Audio(b)) => Arc::ptr_eq(a, b),
            (Self::Photo(a), Self::Photo(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Video(_) => "Video",
            Self::Audio(_) => "Audio",
            Self::Photo(_) => "Photo",
        };
        f.debug_tuple("OutputHandle").field(&kind).finish()
    }
}

/// Coordinates data flow from inputs to outputs.
pub trait CaptureSession: Send + Sync {
    /// Whether `preset` can be applied with the current inputs.
    fn can_set_session_preset(&self, preset: SessionPreset) -> bool;
    /// Apply `preset`.
    fn set_session_preset(&self, preset: SessionPreset);
    /// The applied preset.
    fn session_preset(&self) -> Option<SessionPreset>;

    /// Whether `input` can be added.
    fn can_add_input(&self, input: &InputHandle) -> bool;
    /// Add `input` and wire its ports automatically.
    fn add_input(&self, input: InputHandle);
    /// Add `input` without forming connections.
    fn add_input_with_no_connections(&self, input: InputHandle);
    /// Remove `input`.
    fn remove_input(&self, input: &InputHandle);
    /// Current inputs.
    fn inputs(&self) -> Vec<InputHandle>;

    /// Whether `output` can be added.
    fn can_add_output(&self, output: &OutputHandle) -> bool;
    /// Add `output` and wire it automatically.
    fn add_output(&self, output: OutputHandle);
    /// Add `output` without forming connections.
    fn add_output_with_no_connections(&self, output: OutputHandle);
    /// Remove `output`.
    fn remove_output(&self, output: &OutputHandle);
    /// Current outputs.
    fn outputs(&self) -> Vec<OutputHandle>;

    /// Add an explicit connection.
    fn add_connection(&self, connection: Arc<dyn CaptureConnection>);

    /// Start the flow of data.
    fn start_running(&self);
    /// Stop the flow of data.
    fn stop_running(&self);
    /// Whether data is flowing.
    fn is_running(&self) -> bool;
}

/// Result of a device search.
pub trait DiscoverySession: Send + Sync {
    /// Devices matching the search, in backend order.
    fn devices(&self) -> Vec<Arc<dyn CaptureDevice>>;
}
