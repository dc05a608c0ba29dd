//! In-memory capture backend and host doubles.
//!
//! Every fake records what was done to it and exposes knobs to script the
//! hardware: which presets the session accepts, whether a device has a
//! torch, what the photo output answers, whether the writer fails.

mod device;
mod dispatch;
mod host;
mod session;
mod writer;

pub use device::{DeviceState, FakeDevice};
pub use dispatch::ManualDispatcher;
pub use host::{FakeChannelFactory, FakeTextureRegistry, RecordingEventChannel, RecordingMethodChannel};
pub use session::{
    FakeAudioOutput, FakeConnection, FakeDiscovery, FakeInput, FakePhotoOutput, FakeSession, FakeVideoOutput,
    PhotoResponse,
};
pub use writer::WriterLog;

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::backend::{
    AssetWriter, AssetWriterInput, AudioDataOutput, BackendError, CaptureBackend, CaptureConnection, CaptureDevice,
    CaptureSession, DevicePosition, DeviceType, DiscoverySession, FileType, InputHandle, MediaType, OutputHandle,
    OutputSettings, PhotoOutput, PixelBufferAdaptor, VideoDataOutput,
};
use crate::media::PixelFormat;

/// Identifier of the back camera created by [`FakeBackend::with_cameras`].
pub const BACK_CAMERA: &str = "com.apple.avfoundation.avcapturedevice.built-in_video:0";
/// Identifier of the front camera created by [`FakeBackend::with_cameras`].
pub const FRONT_CAMERA: &str = "com.apple.avfoundation.avcapturedevice.built-in_video:1";

#[derive(Default)]
struct Created {
    sessions: Vec<Arc<FakeSession>>,
    video_outputs: Vec<Arc<FakeVideoOutput>>,
    audio_outputs: Vec<Arc<FakeAudioOutput>>,
    photo_outputs: Vec<Arc<FakePhotoOutput>>,
    writers: Vec<Arc<WriterLog>>,
}

#[derive(Default)]
struct Script {
    photo_response: Option<PhotoResponse>,
    input_error: Option<BackendError>,
    writer_error: Option<BackendError>,
}

/// A [`CaptureBackend`] made of fakes.
pub struct FakeBackend {
    devices: Mutex<Vec<Arc<FakeDevice>>>,
    microphone: Mutex<Option<Arc<FakeDevice>>>,
    created: Mutex<Created>,
    script: Mutex<Script>,
}

impl FakeBackend {
    /// A backend with a microphone and no cameras.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            devices: Mutex::new(Vec::new()),
            microphone: Mutex::new(Some(FakeDevice::microphone())),
            created: Mutex::new(Created::default()),
            script: Mutex::new(Script::default()),
        })
    }

    /// A backend with a back camera (flash and torch) and a front camera (neither).
    #[must_use]
    pub fn with_cameras() -> Arc<Self> {
        let backend = Self::new();
        backend.add_device(FakeDevice::new(BACK_CAMERA, DevicePosition::Back));
        let front = FakeDevice::new(FRONT_CAMERA, DevicePosition::Front);
        front.update(|state| {
            state.has_flash = false;
            state.has_torch = false;
            state.torch_available = false;
        });
        backend.add_device(front);
        backend
    }

    /// Make `device` discoverable.
    pub fn add_device(&self, device: Arc<FakeDevice>) {
        self.devices.lock().expect("poisoned fake devices mutex").push(device);
    }

    /// The camera called `unique_id`.
    #[must_use]
    pub fn camera(&self, unique_id: &str) -> Option<Arc<FakeDevice>> {
        self.devices
            .lock()
            .expect("poisoned fake devices mutex")
            .iter()
            .find(|device| device.unique_id() == unique_id)
            .cloned()
    }

    /// Replace or remove the default microphone.
    pub fn set_microphone(&self, microphone: Option<Arc<FakeDevice>>) {
        *self.microphone.lock().expect("poisoned fake microphone mutex") = microphone;
    }

    /// Answer every later photo capture with `response`, asynchronously.
    pub fn respond_to_photos(&self, response: PhotoResponse) {
        self.script().photo_response = Some(response);
    }

    /// Fail every later `device_input` call.
    pub fn fail_device_input(&self, error: BackendError) {
        self.script().input_error = Some(error);
    }

    /// Fail every later `asset_writer` call.
    pub fn fail_asset_writer(&self, error: BackendError) {
        self.script().writer_error = Some(error);
    }

    /// The most recently created session.
    #[must_use]
    pub fn last_session(&self) -> Option<Arc<FakeSession>> {
        self.created().sessions.last().cloned()
    }

    /// The most recently created video output.
    #[must_use]
    pub fn last_video_output(&self) -> Option<Arc<FakeVideoOutput>> {
        self.created().video_outputs.last().cloned()
    }

    /// The most recently created audio output.
    #[must_use]
    pub fn last_audio_output(&self) -> Option<Arc<FakeAudioOutput>> {
        self.created().audio_outputs.last().cloned()
    }

    /// The most recently created photo output.
    #[must_use]
    pub fn last_photo_output(&self) -> Option<Arc<FakePhotoOutput>> {
        self.created().photo_outputs.last().cloned()
    }

    /// The log of the most recently created writer.
    #[must_use]
    pub fn last_writer(&self) -> Option<Arc<WriterLog>> {
        self.created().writers.last().cloned()
    }

    fn created(&self) -> std::sync::MutexGuard<'_, Created> {
        self.created.lock().expect("poisoned fake backend mutex")
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("poisoned fake backend mutex")
    }
}

impl fmt::Debug for FakeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeBackend").finish_non_exhaustive()
    }
}

impl CaptureBackend for FakeBackend {
    fn capture_session(&self) -> Arc<dyn CaptureSession> {
        let session = FakeSession::new();
        self.created().sessions.push(Arc::clone(&session));
        session
    }

    fn discovery_session(
        &self,
        device_types: &[DeviceType],
        media_type: MediaType,
        position: Option<DevicePosition>,
    ) -> Box<dyn DiscoverySession> {
        let devices = if media_type == MediaType::Video && !device_types.is_empty() {
            self.devices
                .lock()
                .expect("poisoned fake devices mutex")
                .iter()
                .filter(|device| position.is_none_or(|position| device.position() == position))
                .map(|device| Arc::clone(device) as Arc<dyn CaptureDevice>)
                .collect()
        } else {
            Vec::new()
        };
        Box::new(FakeDiscovery::new(devices))
    }

    fn device(&self, unique_id: &str) -> Option<Arc<dyn CaptureDevice>> {
        self.camera(unique_id).map(|device| device as Arc<dyn CaptureDevice>)
    }

    fn default_device(&self, media_type: MediaType) -> Option<Arc<dyn CaptureDevice>> {
        match media_type {
            MediaType::Audio => self
                .microphone
                .lock()
                .expect("poisoned fake microphone mutex")
                .clone()
                .map(|device| device as Arc<dyn CaptureDevice>),
            MediaType::Video => self
                .devices
                .lock()
                .expect("poisoned fake devices mutex")
                .first()
                .cloned()
                .map(|device| device as Arc<dyn CaptureDevice>),
        }
    }

    fn device_input(&self, device: &Arc<dyn CaptureDevice>) -> Result<InputHandle, BackendError> {
        if let Some(error) = self.script().input_error.clone() {
            return Err(error);
        }
        let media_type = if device.unique_id() == device::MICROPHONE {
            MediaType::Audio
        } else {
            MediaType::Video
        };
        Ok(Arc::new(FakeInput::new(device.unique_id(), media_type)))
    }

    fn connection(&self, _input: &InputHandle, output: &OutputHandle) -> Arc<dyn CaptureConnection> {
        output
            .connection(MediaType::Video)
            .unwrap_or_else(|| Arc::new(FakeConnection::default()))
    }

    fn video_data_output(&self) -> Arc<dyn VideoDataOutput> {
        let output = Arc::new(FakeVideoOutput::default());
        self.created().video_outputs.push(Arc::clone(&output));
        output
    }

    fn audio_data_output(&self) -> Arc<dyn AudioDataOutput> {
        let output = Arc::new(FakeAudioOutput::default());
        self.created().audio_outputs.push(Arc::clone(&output));
        output
    }

    fn photo_output(&self) -> Arc<dyn PhotoOutput> {
        let output = Arc::new(FakePhotoOutput::default());
        if let Some(response) = self.script().photo_response.clone() {
            output.respond_with(response);
        }
        self.created().photo_outputs.push(Arc::clone(&output));
        output
    }

    fn asset_writer(&self, path: &Path, _file_type: FileType) -> Result<Box<dyn AssetWriter>, BackendError> {
        if let Some(error) = self.script().writer_error.clone() {
            return Err(error);
        }
        let log = Arc::new(WriterLog::new(path.to_path_buf()));
        self.created().writers.push(Arc::clone(&log));
        Ok(Box::new(writer::FakeAssetWriter::new(log)))
    }

    fn asset_writer_input(&self, media_type: MediaType, _settings: OutputSettings) -> Arc<dyn AssetWriterInput> {
        let log = self
            .last_writer()
            .unwrap_or_else(|| Arc::new(WriterLog::new(Default::default())));
        Arc::new(writer::FakeWriterInput::new(media_type, log))
    }

    fn pixel_buffer_adaptor(
        &self,
        _input: &Arc<dyn AssetWriterInput>,
        _format: PixelFormat,
    ) -> Arc<dyn PixelBufferAdaptor> {
        let log = self
            .last_writer()
            .unwrap_or_else(|| Arc::new(WriterLog::new(Default::default())));
        Arc::new(writer::FakeAdaptor::new(log))
    }
}
