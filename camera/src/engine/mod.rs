//! The capture engine.
//!
//! A [`CaptureEngine`] owns one configured capture session and everything
//! hanging off it: the device, the video and photo outputs, the latest preview
//! frame, the image stream and the active recording. All of its methods take
//! `&mut self` and are meant to run on a single serialization queue. Work that
//! finishes elsewhere (backend callbacks, photo writes, stream subscription)
//! comes back through the [`EngineDispatcher`] the engine was built with.

mod capture;
mod controls;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, trace, warn};
use serde::Serialize;
use serde_json::Value;

use crate::CameraError;
use crate::backend::{
    AudioDataOutput, CaptureBackend, CaptureDevice, CaptureSession, DevicePosition, OutputHandle,
    PhotoOutput, SampleBufferDelegate, SampleSource, SessionPreset, VideoDataOutput,
};
use crate::config::CaptureConfig;
use crate::frame_cache::LatestFrameCache;
use crate::media::{Dimensions, PixelFormat, SampleBuffer};
use crate::photo::SavePhotoDelegate;
use crate::properties::{DeviceOrientation, ExposureMode, FlashMode, FocusMode, ResolutionPreset};
use crate::queue::DispatchQueue;
use crate::recording::RecordingSession;
use crate::storage::MediaStorage;
use crate::streaming::StreamingState;
use crate::thread_safe::{MainThread, ThreadSafeEventChannel, ThreadSafeMethodChannel};

/// Work scheduled onto the engine's serialization queue.
pub type EngineTask = Box<dyn FnOnce(&mut CaptureEngine) + Send>;

/// Posts [`EngineTask`]s to whatever owns the engine.
///
/// The owner decides how tasks reach the engine. A task posted after the
/// engine is gone is simply dropped.
#[derive(Clone)]
pub struct EngineDispatcher(Arc<dyn Fn(EngineTask) + Send + Sync>);

impl EngineDispatcher {
    /// Create a dispatcher from a posting function.
    pub fn new<F>(post: F) -> Self
    where
        F: Fn(EngineTask) + Send + Sync + 'static,
    {
        Self(Arc::new(post))
    }

    /// Run `task` on the engine later.
    pub fn dispatch<F>(&self, task: F)
    where
        F: FnOnce(&mut CaptureEngine) + Send + 'static,
    {
        (self.0)(Box::new(task));
    }
}

impl fmt::Debug for EngineDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineDispatcher").finish_non_exhaustive()
    }
}

/// Video samples allowed to wait for the serialization queue.
///
/// Further frames are discarded until the engine catches up, so a slow
/// consumer costs frames rather than memory.
pub const MAX_QUEUED_VIDEO_SAMPLES: usize = 2;

/// One reserved place in the video backlog, released when the task runs or is dropped.
struct BacklogSlot(Arc<AtomicUsize>);

impl BacklogSlot {
    fn reserve(queued: &Arc<AtomicUsize>) -> Option<Self> {
        queued
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                (count < MAX_QUEUED_VIDEO_SAMPLES).then_some(count + 1)
            })
            .ok()
            .map(|_| Self(Arc::clone(queued)))
    }
}

impl Drop for BacklogSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Forwards backend samples onto the serialization queue.
struct QueuedSampleDelegate {
    dispatcher: EngineDispatcher,
    queued_video: Arc<AtomicUsize>,
}

impl SampleBufferDelegate for QueuedSampleDelegate {
    fn did_output(&self, source: SampleSource, sample: SampleBuffer) {
        // Audio is never discarded, a hole in the track is audible.
        let slot = match source {
            SampleSource::Video => match BacklogSlot::reserve(&self.queued_video) {
                Some(slot) => Some(slot),
                None => {
                    trace!("queue busy, discarding late video sample at {:?}", sample.presentation_time());
                    return;
                }
            },
            SampleSource::Audio => None,
        };
        self.dispatcher.dispatch(move |engine| {
            engine.capture_output(source, &sample);
            drop(slot);
        });
    }
}

/// Where the engine is in the recording lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingState {
    /// Not recording.
    Idle,
    /// Writing samples.
    Recording,
    /// Recording, but dropping samples.
    Paused,
}

/// Payload of the `initialized` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializedEvent {
    /// Preview width in pixels.
    pub preview_width: f64,
    /// Preview height in pixels.
    pub preview_height: f64,
    /// Current exposure mode.
    pub exposure_mode: ExposureMode,
    /// Current focus mode.
    pub focus_mode: FocusMode,
    /// Whether the device accepts an exposure point.
    pub exposure_point_supported: bool,
    /// Whether the device accepts a focus point.
    pub focus_point_supported: bool,
}

/// Session presets to try for a requested quality, best first.
const fn preset_candidates(preset: ResolutionPreset) -> &'static [SessionPreset] {
    use SessionPreset::{Cif352x288, Hd1280x720, Hd1920x1080, Hd4K3840x2160, High, Vga640x480};
    match preset {
        ResolutionPreset::Max | ResolutionPreset::UltraHigh => {
            &[Hd4K3840x2160, High, Hd1920x1080, Hd1280x720, Vga640x480, Cif352x288]
        }
        ResolutionPreset::VeryHigh => &[Hd1920x1080, Hd1280x720, Vga640x480, Cif352x288],
        ResolutionPreset::High => &[Hd1280x720, Vga640x480, Cif352x288],
        ResolutionPreset::Medium => &[Vga640x480, Cif352x288],
        ResolutionPreset::Low | ResolutionPreset::VeryLow => &[Cif352x288],
    }
}

/// Apply the best session preset for `preset` and return it with the preview size.
fn apply_resolution_preset(
    session: &dyn CaptureSession,
    device: &dyn CaptureDevice,
    preset: ResolutionPreset,
) -> Result<(SessionPreset, Dimensions), CameraError> {
    let chosen = preset_candidates(preset)
        .iter()
        .copied()
        .find(|candidate| session.can_set_session_preset(*candidate))
        .ok_or_else(|| CameraError::Configuration("No capture session available for current capture session.".into()))?;

    session.set_session_preset(chosen);
    let size = chosen
        .dimensions()
        .unwrap_or_else(|| device.high_resolution_still_image_dimensions());
    Ok((chosen, size))
}

/// Builder for a [`CaptureEngine`].
pub struct CaptureEngineBuilder {
    camera_name: String,
    backend: Arc<dyn CaptureBackend>,
    session: Arc<dyn CaptureSession>,
    resolution_preset: ResolutionPreset,
    enable_audio: bool,
    orientation: DeviceOrientation,
    config: CaptureConfig,
}

impl CaptureEngineBuilder {
    /// Requested capture quality.
    #[must_use]
    pub const fn resolution_preset(mut self, preset: ResolutionPreset) -> Self {
        self.resolution_preset = preset;
        self
    }

    /// Record an audio track with videos.
    #[must_use]
    pub const fn enable_audio(mut self, enable: bool) -> Self {
        self.enable_audio = enable;
        self
    }

    /// Device orientation at creation time.
    #[must_use]
    pub const fn orientation(mut self, orientation: DeviceOrientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Engine tunables.
    #[must_use]
    pub fn config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    /// Wire the session and create the engine.
    ///
    /// Nothing stays attached to the session when this fails.
    ///
    /// # Errors
    /// - [`CameraError::DeviceNotFound`] when no device has the camera's name.
    /// - [`CameraError::InputCreation`] when the device cannot be opened.
    /// - [`CameraError::Configuration`] when no session preset fits.
    /// - [`CameraError::Io`] when the photo I/O queue cannot be started.
    pub fn build(
        self,
        dispatcher: EngineDispatcher,
        main_thread: Arc<dyn MainThread>,
    ) -> Result<CaptureEngine, CameraError> {
        let Self {
            camera_name,
            backend,
            session,
            resolution_preset,
            enable_audio,
            orientation,
            config,
        } = self;

        let photo_io_queue = DispatchQueue::new("lenskit.camera.photoIOQueue", ())?;
        let device = backend
            .device(&camera_name)
            .ok_or_else(|| CameraError::DeviceNotFound(camera_name.clone()))?;
        let video_input = backend.device_input(&device).map_err(CameraError::InputCreation)?;

        let video_output = backend.video_data_output();
        video_output.set_pixel_format(PixelFormat::Bgra8888);
        video_output.set_always_discards_late_video_frames(true);
        let video_handle = OutputHandle::Video(Arc::clone(&video_output));

        let connection = backend.connection(&video_input, &video_handle);
        if device.position() == DevicePosition::Front {
            connection.set_video_mirrored(true);
        }

        session.add_input_with_no_connections(Arc::clone(&video_input));
        session.add_output_with_no_connections(video_handle.clone());
        session.add_connection(connection);

        let photo_output = backend.photo_output();
        photo_output.set_high_resolution_capture_enabled(true);
        let photo_handle = OutputHandle::Photo(Arc::clone(&photo_output));
        session.add_output(photo_handle.clone());

        let (session_preset, preview_size) =
            match apply_resolution_preset(&*session, &*device, resolution_preset) {
                Ok(resolved) => resolved,
                Err(error) => {
                    warn!("no session preset fits {resolution_preset} on {camera_name}");
                    session.remove_input(&video_input);
                    session.remove_output(&video_handle);
                    session.remove_output(&photo_handle);
                    return Err(error);
                }
            };
        debug!(
            "configured {camera_name} at {session_preset:?} ({}x{})",
            preview_size.width, preview_size.height
        );

        let flash_mode = if device.has_flash() { FlashMode::Auto } else { FlashMode::Off };
        let engine = CaptureEngine {
            camera_name,
            storage: config.storage(),
            image_stream: StreamingState::new(config.max_pending_frames),
            config,
            backend,
            session,
            device,
            video_output,
            photo_output,
            audio_output: None,
            dispatcher,
            main_thread,
            photo_io_queue,
            resolution_preset,
            session_preset,
            preview_size,
            enable_audio,
            flash_mode,
            exposure_mode: ExposureMode::Auto,
            focus_mode: FocusMode::Auto,
            video_format: PixelFormat::Bgra8888,
            device_orientation: orientation,
            locked_orientation: None,
            frame_cache: Arc::new(LatestFrameCache::new()),
            queued_video_samples: Arc::new(AtomicUsize::new(0)),
            preview_paused: false,
            on_frame_available: None,
            method_channel: None,
            stream_channel: None,
            recording: None,
            pending_photos: HashMap::new(),
        };
        engine.update_orientation();
        engine.video_output.set_sample_buffer_delegate(Some(engine.sample_delegate()));
        Ok(engine)
    }
}

impl fmt::Debug for CaptureEngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureEngineBuilder")
            .field("camera_name", &self.camera_name)
            .field("resolution_preset", &self.resolution_preset)
            .field("enable_audio", &self.enable_audio)
            .finish_non_exhaustive()
    }
}

/// Callback telling the preview surface a frame is ready.
pub type FrameAvailable = Arc<dyn Fn() + Send + Sync>;

/// One live camera.
pub struct CaptureEngine {
    camera_name: String,
    backend: Arc<dyn CaptureBackend>,
    session: Arc<dyn CaptureSession>,
    device: Arc<dyn CaptureDevice>,
    video_output: Arc<dyn VideoDataOutput>,
    photo_output: Arc<dyn PhotoOutput>,
    audio_output: Option<Arc<dyn AudioDataOutput>>,
    dispatcher: EngineDispatcher,
    main_thread: Arc<dyn MainThread>,
    photo_io_queue: DispatchQueue,
    config: CaptureConfig,
    storage: MediaStorage,
    resolution_preset: ResolutionPreset,
    session_preset: SessionPreset,
    preview_size: Dimensions,
    enable_audio: bool,
    flash_mode: FlashMode,
    exposure_mode: ExposureMode,
    focus_mode: FocusMode,
    video_format: PixelFormat,
    device_orientation: DeviceOrientation,
    locked_orientation: Option<DeviceOrientation>,
    frame_cache: Arc<LatestFrameCache>,
    queued_video_samples: Arc<AtomicUsize>,
    preview_paused: bool,
    on_frame_available: Option<FrameAvailable>,
    method_channel: Option<ThreadSafeMethodChannel>,
    stream_channel: Option<ThreadSafeEventChannel>,
    recording: Option<RecordingSession>,
    image_stream: StreamingState,
    pending_photos: HashMap<i64, Arc<SavePhotoDelegate>>,
}

impl CaptureEngine {
    /// Start building an engine for the camera called `camera_name`.
    pub fn builder(
        camera_name: impl Into<String>,
        backend: Arc<dyn CaptureBackend>,
        session: Arc<dyn CaptureSession>,
    ) -> CaptureEngineBuilder {
        CaptureEngineBuilder {
            camera_name: camera_name.into(),
            backend,
            session,
            resolution_preset: ResolutionPreset::default(),
            enable_audio: false,
            orientation: DeviceOrientation::default(),
            config: CaptureConfig::default(),
        }
    }

    /// Handle one sample from the video or audio output.
    ///
    /// Refreshes the preview, feeds the image stream and appends to the
    /// recording, in that order.
    pub fn capture_output(&mut self, source: SampleSource, sample: &SampleBuffer) {
        if source == SampleSource::Video {
            self.frame_cache.replace(sample.image_buffer().cloned());
            if let Some(on_frame_available) = self.on_frame_available.as_ref().filter(|_| !self.preview_paused) {
                on_frame_available();
            }
        }

        if !sample.is_data_ready() {
            self.report_error("sample buffer is not ready. Skipping sample");
            return;
        }

        if source == SampleSource::Video {
            self.stream_frame(sample);
        }

        let Some(recording) = self.recording.as_mut() else {
            return;
        };
        trace!("appending {source:?} sample at {:?}", sample.presentation_time());
        if let Err(fault) = recording.append(source, sample) {
            warn!("recording {} dropped a sample: {fault}", recording.path().display());
            self.report_error(&fault.to_string());
        }
    }

    /// Publish a runtime error on the camera's method channel.
    pub fn report_error(&self, message: &str) {
        error!("{}: {message}", self.camera_name);
        match &self.method_channel {
            Some(channel) => channel.invoke_method("error", Value::String(message.to_owned())),
            None => warn!("no method channel to report error on {}", self.camera_name),
        }
    }

    /// Unique identifier of the capture device.
    #[must_use]
    pub fn camera_name(&self) -> &str {
        &self.camera_name
    }

    /// The capture device.
    #[must_use]
    pub fn device(&self) -> &Arc<dyn CaptureDevice> {
        &self.device
    }

    /// Requested capture quality.
    #[must_use]
    pub const fn resolution_preset(&self) -> ResolutionPreset {
        self.resolution_preset
    }

    /// The session preset actually applied.
    #[must_use]
    pub const fn session_preset(&self) -> SessionPreset {
        self.session_preset
    }

    /// Preview size matching the session preset.
    #[must_use]
    pub const fn preview_size(&self) -> Dimensions {
        self.preview_size
    }

    /// Current flash mode.
    #[must_use]
    pub const fn flash_mode(&self) -> FlashMode {
        self.flash_mode
    }

    /// Current exposure mode.
    #[must_use]
    pub const fn exposure_mode(&self) -> ExposureMode {
        self.exposure_mode
    }

    /// Current focus mode.
    #[must_use]
    pub const fn focus_mode(&self) -> FocusMode {
        self.focus_mode
    }

    /// Pixel format of preview and streamed frames.
    #[must_use]
    pub const fn video_format(&self) -> PixelFormat {
        self.video_format
    }

    /// Last known device orientation.
    #[must_use]
    pub const fn device_orientation(&self) -> DeviceOrientation {
        self.device_orientation
    }

    /// Orientation captures are locked to, if any.
    #[must_use]
    pub const fn locked_orientation(&self) -> Option<DeviceOrientation> {
        self.locked_orientation
    }

    /// Whether an audio track is recorded with videos.
    #[must_use]
    pub const fn is_audio_enabled(&self) -> bool {
        self.enable_audio
    }

    /// Whether audio capture has been added to the session.
    #[must_use]
    pub const fn is_audio_set_up(&self) -> bool {
        self.audio_output.is_some()
    }

    /// Whether frame-available notifications are suppressed.
    #[must_use]
    pub const fn is_preview_paused(&self) -> bool {
        self.preview_paused
    }

    /// Recording lifecycle state.
    #[must_use]
    pub fn recording_state(&self) -> RecordingState {
        match &self.recording {
            None => RecordingState::Idle,
            Some(recording) if recording.is_paused() => RecordingState::Paused,
            Some(_) => RecordingState::Recording,
        }
    }

    /// The active recording.
    #[must_use]
    pub const fn recording(&self) -> Option<&RecordingSession> {
        self.recording.as_ref()
    }

    /// Image stream bookkeeping.
    #[must_use]
    pub const fn image_stream(&self) -> &StreamingState {
        &self.image_stream
    }

    /// Image stream bookkeeping, for the stream handler.
    pub const fn image_stream_mut(&mut self) -> &mut StreamingState {
        &mut self.image_stream
    }

    /// The single-slot cache backing the preview texture.
    #[must_use]
    pub fn frame_cache(&self) -> Arc<LatestFrameCache> {
        Arc::clone(&self.frame_cache)
    }

    /// Number of photo captures still waiting for their result.
    #[must_use]
    pub fn pending_photo_captures(&self) -> usize {
        self.pending_photos.len()
    }

    /// Payload announcing the configured camera.
    #[must_use]
    pub fn initialized_event(&self) -> InitializedEvent {
        InitializedEvent {
            preview_width: f64::from(self.preview_size.width),
            preview_height: f64::from(self.preview_size.height),
            exposure_mode: self.exposure_mode,
            focus_mode: self.focus_mode,
            exposure_point_supported: self.device.is_exposure_point_of_interest_supported(),
            focus_point_supported: self.device.is_focus_point_of_interest_supported(),
        }
    }

    /// Start the flow of frames.
    pub fn start(&self) {
        debug!("starting session for {}", self.camera_name);
        self.session.start_running();
    }

    /// Stop the flow of frames.
    pub fn stop(&self) {
        debug!("stopping session for {}", self.camera_name);
        self.session.stop_running();
    }

    /// Stop the session and detach everything from it.
    ///
    /// Samples still in flight are ignored once their outputs lose the delegate.
    pub fn close(&mut self) {
        self.stop();
        self.video_output.set_sample_buffer_delegate(None);
        if let Some(output) = &self.audio_output {
            output.set_sample_buffer_delegate(None);
        }
        for input in self.session.inputs() {
            self.session.remove_input(&input);
        }
        for output in self.session.outputs() {
            self.session.remove_output(&output);
        }
        self.audio_output = None;
        self.on_frame_available = None;
        self.image_stream.end();
        if let Some(channel) = self.stream_channel.take() {
            channel.set_stream_handler(None, || {});
        }
        if self.recording.take().is_some() {
            warn!("{} closed while recording, the file is left unfinished", self.camera_name);
        }
        debug!("closed {}", self.camera_name);
    }

    /// Deliver preview and streamed frames in `format`.
    pub fn set_video_format(&mut self, format: PixelFormat) {
        self.video_format = format;
        self.video_output.set_pixel_format(format);
    }

    /// Install the preview frame notification.
    pub fn set_on_frame_available(&mut self, callback: FrameAvailable) {
        self.on_frame_available = Some(callback);
    }

    /// Install the channel runtime errors are reported on.
    pub fn set_method_channel(&mut self, channel: ThreadSafeMethodChannel) {
        self.method_channel = Some(channel);
    }

    /// Stop notifying the preview surface. Frames are still cached.
    pub const fn pause_preview(&mut self) {
        self.preview_paused = true;
    }

    /// Resume preview notifications.
    pub const fn resume_preview(&mut self) {
        self.preview_paused = false;
    }

    fn sample_delegate(&self) -> Arc<dyn SampleBufferDelegate> {
        Arc::new(QueuedSampleDelegate {
            dispatcher: self.dispatcher.clone(),
            queued_video: Arc::clone(&self.queued_video_samples),
        })
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        if !self.pending_photos.is_empty() {
            warn!(
                "{} dropped with {} photo captures in flight",
                self.camera_name,
                self.pending_photos.len()
            );
        }
    }
}

impl fmt::Debug for CaptureEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureEngine")
            .field("camera_name", &self.camera_name)
            .field("session_preset", &self.session_preset)
            .field("preview_size", &self.preview_size)
            .field("flash_mode", &self.flash_mode)
            .field("exposure_mode", &self.exposure_mode)
            .field("focus_mode", &self.focus_mode)
            .field("recording", &self.recording_state())
            .field("image_stream", &self.image_stream)
            .field("pending_photos", &self.pending_photos.len())
            .finish_non_exhaustive()
    }
}
