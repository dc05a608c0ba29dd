use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;

use crate::backend::{
    AudioDataOutput, BackendError, CaptureConnection, CaptureDevice, CaptureInput, CaptureOutput, CaptureSession,
    CapturedPhoto, DeviceFlashMode, DiscoverySession, FileType, InputHandle, MediaType, OutputHandle,
    PhotoCaptureDelegate, PhotoOutput, PhotoSettings, SampleBufferDelegate, SampleSource, SessionPreset,
    VideoDataOutput, VideoOrientation, VideoSettings,
};
use crate::media::{PixelFormat, SampleBuffer};

const ALL_PRESETS: [SessionPreset; 6] = [
    SessionPreset::Hd4K3840x2160,
    SessionPreset::High,
    SessionPreset::Hd1920x1080,
    SessionPreset::Hd1280x720,
    SessionPreset::Vga640x480,
    SessionPreset::Cif352x288,
];

#[derive(Default)]
struct SessionState {
    presets: Vec<SessionPreset>,
    preset: Option<SessionPreset>,
    inputs: Vec<InputHandle>,
    outputs: Vec<OutputHandle>,
    connections: usize,
    running: bool,
    refuse_inputs: bool,
    refuse_outputs: bool,
}

/// A [`CaptureSession`] that records its wiring.
pub struct FakeSession {
    state: Mutex<SessionState>,
}

impl FakeSession {
    /// A session accepting every preset.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_presets(&ALL_PRESETS)
    }

    /// A session accepting only `presets`.
    #[must_use]
    pub fn with_presets(presets: &[SessionPreset]) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SessionState {
                presets: presets.to_vec(),
                ..SessionState::default()
            }),
        })
    }

    /// Refuse inputs added with `can_add_input` checks.
    pub fn refuse_inputs(&self, refuse: bool) {
        self.lock().refuse_inputs = refuse;
    }

    /// Refuse outputs added with `can_add_output` checks.
    pub fn refuse_outputs(&self, refuse: bool) {
        self.lock().refuse_outputs = refuse;
    }

    /// Number of attached inputs.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.lock().inputs.len()
    }

    /// Number of attached outputs.
    #[must_use]
    pub fn output_count(&self) -> usize {
        self.lock().outputs.len()
    }

    /// Number of explicit connections added.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.lock().connections
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("poisoned fake session mutex")
    }
}

impl fmt::Debug for FakeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("FakeSession")
            .field("preset", &state.preset)
            .field("inputs", &state.inputs.len())
            .field("outputs", &state.outputs.len())
            .field("running", &state.running)
            .finish_non_exhaustive()
    }
}

impl CaptureSession for FakeSession {
    fn can_set_session_preset(&self, preset: SessionPreset) -> bool {
        self.lock().presets.contains(&preset)
    }

    fn set_session_preset(&self, preset: SessionPreset) {
        self.lock().preset = Some(preset);
    }

    fn session_preset(&self) -> Option<SessionPreset> {
        self.lock().preset
    }

    fn can_add_input(&self, _input: &InputHandle) -> bool {
        !self.lock().refuse_inputs
    }

    fn add_input(&self, input: InputHandle) {
        self.lock().inputs.push(input);
    }

    fn add_input_with_no_connections(&self, input: InputHandle) {
        self.lock().inputs.push(input);
    }

    fn remove_input(&self, input: &InputHandle) {
        self.lock().inputs.retain(|existing| !Arc::ptr_eq(existing, input));
    }

    fn inputs(&self) -> Vec<InputHandle> {
        self.lock().inputs.clone()
    }

    fn can_add_output(&self, _output: &OutputHandle) -> bool {
        !self.lock().refuse_outputs
    }

    fn add_output(&self, output: OutputHandle) {
        self.lock().outputs.push(output);
    }

    fn add_output_with_no_connections(&self, output: OutputHandle) {
        self.lock().outputs.push(output);
    }

    fn remove_output(&self, output: &OutputHandle) {
        self.lock().outputs.retain(|existing| !existing.same_output(output));
    }

    fn outputs(&self) -> Vec<OutputHandle> {
        self.lock().outputs.clone()
    }

    fn add_connection(&self, _connection: Arc<dyn CaptureConnection>) {
        self.lock().connections += 1;
    }

    fn start_running(&self) {
        self.lock().running = true;
    }

    fn stop_running(&self) {
        self.lock().running = false;
    }

    fn is_running(&self) -> bool {
        self.lock().running
    }
}

/// A [`CaptureInput`] naming its device.
#[derive(Debug)]
pub struct FakeInput {
    device_id: String,
    media_type: MediaType,
}

impl FakeInput {
    /// Create an input.
    #[must_use]
    pub const fn new(device_id: String, media_type: MediaType) -> Self {
        Self { device_id, media_type }
    }
}

impl CaptureInput for FakeInput {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn media_type(&self) -> MediaType {
        self.media_type
    }
}

/// A [`CaptureConnection`] remembering its mirroring and orientation.
#[derive(Debug)]
pub struct FakeConnection {
    mirrored: AtomicBool,
    orientation_supported: AtomicBool,
    orientation: Mutex<Option<VideoOrientation>>,
}

impl Default for FakeConnection {
    fn default() -> Self {
        Self {
            mirrored: AtomicBool::new(false),
            orientation_supported: AtomicBool::new(true),
            orientation: Mutex::new(None),
        }
    }
}

impl FakeConnection {
    /// Last orientation applied.
    #[must_use]
    pub fn orientation(&self) -> Option<VideoOrientation> {
        *self.orientation.lock().expect("poisoned fake connection mutex")
    }

    /// Toggle orientation support.
    pub fn set_orientation_supported(&self, supported: bool) {
        self.orientation_supported.store(supported, Ordering::SeqCst);
    }
}

impl CaptureConnection for FakeConnection {
    fn set_video_mirrored(&self, mirrored: bool) {
        self.mirrored.store(mirrored, Ordering::SeqCst);
    }

    fn is_video_mirrored(&self) -> bool {
        self.mirrored.load(Ordering::SeqCst)
    }

    fn is_video_orientation_supported(&self) -> bool {
        self.orientation_supported.load(Ordering::SeqCst)
    }

    fn set_video_orientation(&self, orientation: VideoOrientation) {
        *self.orientation.lock().expect("poisoned fake connection mutex") = Some(orientation);
    }
}

type DelegateSlot = Mutex<Option<Arc<dyn SampleBufferDelegate>>>;

fn deliver(slot: &DelegateSlot, source: SampleSource, sample: SampleBuffer) -> bool {
    let delegate = slot.lock().expect("poisoned fake delegate mutex").clone();
    delegate.is_some_and(|delegate| {
        delegate.did_output(source, sample);
        true
    })
}

/// A [`VideoDataOutput`] whose frames are pushed by the test.
#[derive(Default)]
pub struct FakeVideoOutput {
    connection: Arc<FakeConnection>,
    pixel_format: Mutex<Option<PixelFormat>>,
    discards_late_frames: AtomicBool,
    delegate: DelegateSlot,
}

impl FakeVideoOutput {
    /// Push a frame to the installed delegate. Returns whether one was installed.
    pub fn emit(&self, sample: SampleBuffer) -> bool {
        deliver(&self.delegate, SampleSource::Video, sample)
    }

    /// Whether a delegate is installed.
    #[must_use]
    pub fn has_delegate(&self) -> bool {
        self.delegate.lock().expect("poisoned fake delegate mutex").is_some()
    }

    /// The requested pixel format.
    #[must_use]
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        *self.pixel_format.lock().expect("poisoned fake output mutex")
    }

    /// Whether late frames are discarded.
    #[must_use]
    pub fn discards_late_frames(&self) -> bool {
        self.discards_late_frames.load(Ordering::SeqCst)
    }

    /// The output's video connection.
    #[must_use]
    pub fn video_connection(&self) -> Arc<FakeConnection> {
        Arc::clone(&self.connection)
    }
}

impl fmt::Debug for FakeVideoOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeVideoOutput")
            .field("pixel_format", &self.pixel_format())
            .finish_non_exhaustive()
    }
}

impl CaptureOutput for FakeVideoOutput {
    fn connection(&self, media_type: MediaType) -> Option<Arc<dyn CaptureConnection>> {
        (media_type == MediaType::Video).then(|| Arc::clone(&self.connection) as Arc<dyn CaptureConnection>)
    }
}

impl VideoDataOutput for FakeVideoOutput {
    fn set_pixel_format(&self, format: PixelFormat) {
        *self.pixel_format.lock().expect("poisoned fake output mutex") = Some(format);
    }

    fn set_always_discards_late_video_frames(&self, discard: bool) {
        self.discards_late_frames.store(discard, Ordering::SeqCst);
    }

    fn set_sample_buffer_delegate(&self, delegate: Option<Arc<dyn SampleBufferDelegate>>) {
        *self.delegate.lock().expect("poisoned fake delegate mutex") = delegate;
    }

    fn recommended_video_settings(&self, _file_type: FileType) -> VideoSettings {
        VideoSettings {
            codec: "avc1".to_owned(),
            width: 1280,
            height: 720,
        }
    }
}

/// An [`AudioDataOutput`] whose samples are pushed by the test.
#[derive(Default)]
pub struct FakeAudioOutput {
    delegate: DelegateSlot,
}

impl FakeAudioOutput {
    /// Push a sample to the installed delegate. Returns whether one was installed.
    pub fn emit(&self, sample: SampleBuffer) -> bool {
        deliver(&self.delegate, SampleSource::Audio, sample)
    }

    /// Whether a delegate is installed.
    #[must_use]
    pub fn has_delegate(&self) -> bool {
        self.delegate.lock().expect("poisoned fake delegate mutex").is_some()
    }
}

impl fmt::Debug for FakeAudioOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeAudioOutput").finish_non_exhaustive()
    }
}

impl CaptureOutput for FakeAudioOutput {
    fn connection(&self, _media_type: MediaType) -> Option<Arc<dyn CaptureConnection>> {
        None
    }
}

impl AudioDataOutput for FakeAudioOutput {
    fn set_sample_buffer_delegate(&self, delegate: Option<Arc<dyn SampleBufferDelegate>>) {
        *self.delegate.lock().expect("poisoned fake delegate mutex") = delegate;
    }
}

/// How a [`FakePhotoOutput`] answers a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoResponse {
    /// A photo encoding to these bytes.
    Data(Vec<u8>),
    /// A photo that cannot be encoded.
    NoData,
    /// A capture error.
    Error(BackendError),
}

struct FakePhoto(Option<Vec<u8>>);

impl CapturedPhoto for FakePhoto {
    fn file_data_representation(&self) -> Option<Vec<u8>> {
        self.0.clone()
    }
}

fn answer(delegate: &Weak<dyn PhotoCaptureDelegate>, response: PhotoResponse) -> bool {
    let Some(delegate) = delegate.upgrade() else {
        return false;
    };
    let result: Result<Box<dyn CapturedPhoto>, BackendError> = match response {
        PhotoResponse::Data(bytes) => Ok(Box::new(FakePhoto(Some(bytes)))),
        PhotoResponse::NoData => Ok(Box::new(FakePhoto(None))),
        PhotoResponse::Error(error) => Err(error),
    };
    delegate.did_finish_processing_photo(result);
    true
}

/// A [`PhotoOutput`] that answers captures on demand or automatically.
pub struct FakePhotoOutput {
    connection: Arc<FakeConnection>,
    high_resolution: AtomicBool,
    flash_modes: Mutex<Vec<DeviceFlashMode>>,
    settings: Mutex<Vec<PhotoSettings>>,
    pending: Mutex<VecDeque<Weak<dyn PhotoCaptureDelegate>>>,
    response: Mutex<Option<PhotoResponse>>,
}

impl Default for FakePhotoOutput {
    fn default() -> Self {
        Self {
            connection: Arc::default(),
            high_resolution: AtomicBool::new(false),
            flash_modes: Mutex::new(vec![DeviceFlashMode::Off, DeviceFlashMode::On, DeviceFlashMode::Auto]),
            settings: Mutex::new(Vec::new()),
            pending: Mutex::new(VecDeque::new()),
            response: Mutex::new(None),
        }
    }
}

impl FakePhotoOutput {
    /// Answer later captures with `response` from a background thread.
    pub fn respond_with(&self, response: PhotoResponse) {
        *self.response.lock().expect("poisoned fake photo mutex") = Some(response);
    }

    /// Answer the oldest unanswered capture on the calling thread.
    ///
    /// Returns `false` when there was none or its delegate is gone.
    pub fn complete_next(&self, response: PhotoResponse) -> bool {
        let next = self.pending.lock().expect("poisoned fake photo mutex").pop_front();
        next.is_some_and(|delegate| answer(&delegate, response))
    }

    /// Whether the oldest unanswered capture still has a live delegate.
    #[must_use]
    pub fn next_delegate_alive(&self) -> bool {
        self.pending
            .lock()
            .expect("poisoned fake photo mutex")
            .front()
            .is_some_and(|delegate| delegate.strong_count() > 0)
    }

    /// Settings of every capture so far.
    #[must_use]
    pub fn captured_settings(&self) -> Vec<PhotoSettings> {
        self.settings.lock().expect("poisoned fake photo mutex").clone()
    }

    /// Restrict the supported flash modes.
    pub fn set_supported_flash_modes(&self, modes: Vec<DeviceFlashMode>) {
        *self.flash_modes.lock().expect("poisoned fake photo mutex") = modes;
    }

    /// Whether high resolution capture was enabled.
    #[must_use]
    pub fn high_resolution_enabled(&self) -> bool {
        self.high_resolution.load(Ordering::SeqCst)
    }

    /// The output's video connection.
    #[must_use]
    pub fn video_connection(&self) -> Arc<FakeConnection> {
        Arc::clone(&self.connection)
    }
}

impl fmt::Debug for FakePhotoOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakePhotoOutput").finish_non_exhaustive()
    }
}

impl CaptureOutput for FakePhotoOutput {
    fn connection(&self, media_type: MediaType) -> Option<Arc<dyn CaptureConnection>> {
        (media_type == MediaType::Video).then(|| Arc::clone(&self.connection) as Arc<dyn CaptureConnection>)
    }
}

impl PhotoOutput for FakePhotoOutput {
    fn set_high_resolution_capture_enabled(&self, enabled: bool) {
        self.high_resolution.store(enabled, Ordering::SeqCst);
    }

    fn supported_flash_modes(&self) -> Vec<DeviceFlashMode> {
        self.flash_modes.lock().expect("poisoned fake photo mutex").clone()
    }

    fn capture_photo(&self, settings: PhotoSettings, delegate: Weak<dyn PhotoCaptureDelegate>) {
        self.settings.lock().expect("poisoned fake photo mutex").push(settings);
        let response = self.response.lock().expect("poisoned fake photo mutex").clone();
        match response {
            Some(response) => {
                thread::spawn(move || answer(&delegate, response));
            }
            None => self.pending.lock().expect("poisoned fake photo mutex").push_back(delegate),
        }
    }
}

/// A [`DiscoverySession`] over a fixed list.
pub struct FakeDiscovery {
    devices: Vec<Arc<dyn CaptureDevice>>,
}

impl FakeDiscovery {
    /// Wrap `devices`.
    #[must_use]
    pub fn new(devices: Vec<Arc<dyn CaptureDevice>>) -> Self {
        Self { devices }
    }
}

impl fmt::Debug for FakeDiscovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeDiscovery")
            .field("devices", &self.devices.len())
            .finish()
    }
}

impl DiscoverySession for FakeDiscovery {
    fn devices(&self) -> Vec<Arc<dyn CaptureDevice>> {
        self.devices.clone()
    }
}
