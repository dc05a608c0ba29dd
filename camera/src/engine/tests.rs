use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::backend::{
    BackendError, CaptureConnection, DeviceExposureMode, DeviceFlashMode, DeviceFocusMode, MediaType, TorchMode,
    VideoOrientation,
};
use crate::fake::{
    BACK_CAMERA, FRONT_CAMERA, FakeBackend, FakeSession, ManualDispatcher, PhotoResponse, RecordingEventChannel,
    RecordingMethodChannel,
};
use crate::host::EventSink;
use crate::media::{MediaTime, PixelBuffer, Point};
use crate::thread_safe::CurrentThread;

const TIMEOUT: Duration = Duration::from_secs(2);

fn ms(value: i64) -> MediaTime {
    MediaTime::from_millis(value)
}

fn frame(at: i64) -> SampleBuffer {
    SampleBuffer::video(PixelBuffer::packed(2, 2, PixelFormat::Bgra8888, 8, vec![7; 16]), ms(at))
}

fn build_engine(
    backend: &Arc<FakeBackend>,
    session: &Arc<FakeSession>,
    camera: &str,
    preset: ResolutionPreset,
    queue: &ManualDispatcher,
    storage: &TempDir,
) -> Result<CaptureEngine, CameraError> {
    CaptureEngine::builder(camera, backend.clone(), session.clone())
        .resolution_preset(preset)
        .config(CaptureConfig::new().with_storage_root(storage.path()))
        .build(queue.dispatcher(), Arc::new(CurrentThread))
}

struct Rig {
    backend: Arc<FakeBackend>,
    session: Arc<FakeSession>,
    queue: ManualDispatcher,
    channel: Arc<RecordingMethodChannel>,
    engine: CaptureEngine,
    storage: TempDir,
}

impl Rig {
    fn new(camera: &str) -> Self {
        Self::with_audio(camera, false)
    }

    fn with_audio(camera: &str, enable_audio: bool) -> Self {
        let backend = FakeBackend::with_cameras();
        let session = FakeSession::new();
        let queue = ManualDispatcher::default();
        let storage = tempfile::tempdir().unwrap();
        let mut engine = CaptureEngine::builder(camera, backend.clone(), session.clone())
            .resolution_preset(ResolutionPreset::Medium)
            .enable_audio(enable_audio)
            .config(CaptureConfig::new().with_storage_root(storage.path()))
            .build(queue.dispatcher(), Arc::new(CurrentThread))
            .unwrap();
        let channel = Arc::new(RecordingMethodChannel::new("flutter.io/cameraPlugin/camera1"));
        engine.set_method_channel(ThreadSafeMethodChannel::new(channel.clone(), Arc::new(CurrentThread)));
        Self {
            backend,
            session,
            queue,
            channel,
            engine,
            storage,
        }
    }

    fn run(&mut self) -> usize {
        self.queue.run_pending(&mut self.engine)
    }

    fn emit(&mut self, sample: SampleBuffer) {
        assert!(self.backend.last_video_output().unwrap().emit(sample));
        self.run();
    }

    fn errors(&self) -> Vec<serde_json::Value> {
        self.channel.calls_named("error")
    }
}

fn counting_sink() -> (EventSink, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let sink: EventSink = Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (sink, count)
}

#[test]
fn build_wires_outputs_without_automatic_connections() {
    let rig = Rig::new(BACK_CAMERA);
    let video = rig.backend.last_video_output().unwrap();
    let photo = rig.backend.last_photo_output().unwrap();

    assert_eq!(rig.session.input_count(), 1);
    assert_eq!(rig.session.output_count(), 2);
    assert_eq!(rig.session.connection_count(), 1);
    assert_eq!(video.pixel_format(), Some(PixelFormat::Bgra8888));
    assert!(video.discards_late_frames());
    assert!(video.has_delegate());
    assert!(photo.high_resolution_enabled());
    assert_eq!(rig.engine.session_preset(), SessionPreset::Vga640x480);
    assert_eq!(rig.engine.preview_size(), Dimensions::new(640, 480));
}

#[test]
fn max_preset_falls_back_to_high_with_still_size() {
    let backend = FakeBackend::with_cameras();
    let session = FakeSession::with_presets(&[SessionPreset::High, SessionPreset::Vga640x480]);
    let storage = tempfile::tempdir().unwrap();
    let queue = ManualDispatcher::default();

    let engine = build_engine(&backend, &session, BACK_CAMERA, ResolutionPreset::Max, &queue, &storage).unwrap();

    assert_eq!(engine.session_preset(), SessionPreset::High);
    assert_eq!(engine.preview_size(), Dimensions::new(4032, 3024));
}

#[test]
fn preview_size_matches_resolved_preset_for_every_quality() {
    let backend = FakeBackend::with_cameras();
    let storage = tempfile::tempdir().unwrap();
    let queue = ManualDispatcher::default();
    let presets = [
        ResolutionPreset::VeryLow,
        ResolutionPreset::Low,
        ResolutionPreset::Medium,
        ResolutionPreset::High,
        ResolutionPreset::VeryHigh,
        ResolutionPreset::UltraHigh,
        ResolutionPreset::Max,
    ];

    for preset in presets {
        let session = FakeSession::with_presets(&[SessionPreset::Hd1280x720, SessionPreset::Cif352x288]);
        match build_engine(&backend, &session, BACK_CAMERA, preset, &queue, &storage) {
            Ok(mut engine) => {
                let expected = engine.session_preset().dimensions().unwrap();
                assert_eq!(engine.preview_size(), expected, "{preset}");
                assert_eq!(session.session_preset(), Some(engine.session_preset()));
                engine.close();
            }
            Err(error) => panic!("{preset} failed: {error}"),
        }
    }
}

#[test]
fn unsupported_preset_leaves_session_empty() {
    let backend = FakeBackend::with_cameras();
    let session = FakeSession::with_presets(&[SessionPreset::Hd1920x1080]);
    let storage = tempfile::tempdir().unwrap();
    let queue = ManualDispatcher::default();

    let error = build_engine(&backend, &session, BACK_CAMERA, ResolutionPreset::Low, &queue, &storage).unwrap_err();

    assert_eq!(error.code(), "CameraConfigurationError");
    assert_eq!(error.to_string(), "No capture session available for current capture session.");
    assert_eq!(session.input_count(), 0);
    assert_eq!(session.output_count(), 0);
}

#[test]
fn unknown_camera_is_rejected() {
    let backend = FakeBackend::with_cameras();
    let session = FakeSession::new();
    let storage = tempfile::tempdir().unwrap();
    let queue = ManualDispatcher::default();

    let error = build_engine(&backend, &session, "missing", ResolutionPreset::Low, &queue, &storage).unwrap_err();

    assert!(matches!(error, CameraError::DeviceNotFound(name) if name == "missing"));
    assert_eq!(session.input_count(), 0);
}

#[test]
fn input_failure_is_typed() {
    let backend = FakeBackend::with_cameras();
    backend.fail_device_input(BackendError::new("AVFoundationErrorDomain", -11_814, "in use"));
    let session = FakeSession::new();
    let storage = tempfile::tempdir().unwrap();
    let queue = ManualDispatcher::default();

    let error = build_engine(&backend, &session, BACK_CAMERA, ResolutionPreset::Low, &queue, &storage).unwrap_err();

    assert_eq!(error.code(), "CameraInputError");
}

#[test]
fn front_camera_is_mirrored() {
    let front = Rig::new(FRONT_CAMERA);
    let back = Rig::new(BACK_CAMERA);

    assert!(front.backend.last_video_output().unwrap().video_connection().is_video_mirrored());
    assert!(!back.backend.last_video_output().unwrap().video_connection().is_video_mirrored());
}

#[test]
fn default_flash_follows_hardware() {
    assert_eq!(Rig::new(BACK_CAMERA).engine.flash_mode(), FlashMode::Auto);
    assert_eq!(Rig::new(FRONT_CAMERA).engine.flash_mode(), FlashMode::Off);
}

#[test]
fn video_frames_refresh_preview_unless_paused() {
    let mut rig = Rig::new(BACK_CAMERA);
    let notified = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&notified);
    rig.engine.set_on_frame_available(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    rig.emit(frame(0));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(rig.engine.frame_cache().take().is_some());

    rig.engine.pause_preview();
    rig.emit(frame(33));
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(rig.engine.frame_cache().take().is_some());

    rig.engine.resume_preview();
    rig.emit(frame(66));
    assert_eq!(notified.load(Ordering::SeqCst), 2);
}

#[test]
fn sample_not_ready_reports_error_and_stops() {
    let mut rig = Rig::new(BACK_CAMERA);
    let events = Arc::new(RecordingEventChannel::default());
    rig.engine
        .start_image_stream(ThreadSafeEventChannel::new(events.clone(), Arc::new(CurrentThread)));
    rig.run();
    let (sink, count) = counting_sink();
    events.listen(sink);
    rig.run();

    rig.emit(frame(0).not_ready());

    assert_eq!(rig.errors(), vec![json!("sample buffer is not ready. Skipping sample")]);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn streaming_caps_frames_in_flight() {
    let mut rig = Rig::new(BACK_CAMERA);
    let events = Arc::new(RecordingEventChannel::default());
    rig.engine
        .start_image_stream(ThreadSafeEventChannel::new(events.clone(), Arc::new(CurrentThread)));
    rig.run();
    assert!(rig.engine.image_stream().is_streaming());

    let (sink, count) = counting_sink();
    assert!(events.listen(sink));
    rig.run();

    for index in 0..10 {
        rig.emit(frame(index * 33));
    }
    assert_eq!(count.load(Ordering::SeqCst), 4);
    assert_eq!(rig.engine.image_stream().pending_frames(), 4);

    rig.engine.received_image_stream_data();
    rig.emit(frame(400));
    rig.emit(frame(433));
    assert_eq!(count.load(Ordering::SeqCst), 5);
}

#[test]
fn stalled_queue_discards_late_video_frames() {
    let mut rig = Rig::new(BACK_CAMERA);
    let video = rig.backend.last_video_output().unwrap();

    for index in 0..50 {
        assert!(video.emit(frame(index * 33)));
    }
    assert_eq!(rig.queue.pending(), MAX_QUEUED_VIDEO_SAMPLES);

    assert_eq!(rig.run(), MAX_QUEUED_VIDEO_SAMPLES);
    assert!(video.emit(frame(2_000)));
    assert_eq!(rig.queue.pending(), 1);
    rig.run();
    assert_eq!(rig.queue.pending(), 0);
}

#[test]
fn stalled_queue_keeps_every_audio_sample() {
    let mut rig = Rig::with_audio(BACK_CAMERA, true);
    rig.engine.start_video_recording().unwrap();
    let audio = rig.backend.last_audio_output().unwrap();
    let video = rig.backend.last_video_output().unwrap();

    for index in 0..10 {
        assert!(video.emit(frame(index * 20)));
        assert!(audio.emit(SampleBuffer::audio(vec![0; 4], ms(index * 20), ms(20))));
    }

    assert_eq!(rig.queue.pending(), 10 + MAX_QUEUED_VIDEO_SAMPLES);
}

#[test]
fn streaming_twice_or_stopping_idle_reports_errors() {
    let mut rig = Rig::new(BACK_CAMERA);
    let events = Arc::new(RecordingEventChannel::default());
    let main = Arc::new(CurrentThread);

    rig.engine
        .start_image_stream(ThreadSafeEventChannel::new(events.clone(), main.clone()));
    rig.engine
        .start_image_stream(ThreadSafeEventChannel::new(events.clone(), main));
    rig.run();
    rig.engine.stop_image_stream();
    rig.engine.stop_image_stream();

    assert!(!events.has_handler());
    assert!(!rig.engine.image_stream().is_streaming());
    assert_eq!(
        rig.errors(),
        vec![
            json!("Images from camera are already streaming!"),
            json!("Images from camera are not streaming!"),
        ]
    );
}

#[test]
fn photo_is_saved_and_capture_released() {
    let mut rig = Rig::new(BACK_CAMERA);
    let photo = rig.backend.last_photo_output().unwrap();
    photo.respond_with(PhotoResponse::Data(vec![0xFF, 0xD8, 0xFF]));
    let (tx, rx) = mpsc::channel();

    rig.engine.capture_to_file(Box::new(move |result| tx.send(result).unwrap()));
    assert_eq!(rig.engine.pending_photo_captures(), 1);

    let path = rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert!(path.starts_with(rig.storage.path().join("pictures")));
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("CAP_"));
    assert_eq!(fs::read(&path).unwrap(), vec![0xFF, 0xD8, 0xFF]);

    rig.run();
    assert_eq!(rig.engine.pending_photo_captures(), 0);

    let settings = photo.captured_settings();
    assert_eq!(settings.len(), 1);
    assert_eq!(settings[0].flash_mode, DeviceFlashMode::Auto);
    assert!(!settings[0].high_resolution_photo_enabled);
}

#[test]
fn photo_error_is_reported_and_capture_released() {
    let mut rig = Rig::new(BACK_CAMERA);
    let photo = rig.backend.last_photo_output().unwrap();
    let (tx, rx) = mpsc::channel();

    rig.engine.capture_to_file(Box::new(move |result| tx.send(result).unwrap()));
    assert!(photo.next_delegate_alive());

    let error = BackendError::new("AVFoundationErrorDomain", -11_800, "capture failed");
    assert!(photo.complete_next(PhotoResponse::Error(error)));

    let result = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(result.unwrap_err().code(), "Error -11800");
    rig.run();
    assert_eq!(rig.engine.pending_photo_captures(), 0);
    assert_eq!(fs::read_dir(rig.storage.path().join("pictures")).unwrap().count(), 0);
}

#[test]
fn paused_frames_are_left_out_of_the_file() {
    let mut rig = Rig::new(BACK_CAMERA);
    rig.engine.start_video_recording().unwrap();
    assert_eq!(rig.engine.recording_state(), RecordingState::Recording);

    rig.emit(frame(0));
    rig.emit(frame(33));
    rig.engine.pause_video_recording().unwrap();
    assert_eq!(rig.engine.recording_state(), RecordingState::Paused);
    rig.emit(frame(66));
    rig.emit(frame(99));
    rig.engine.resume_video_recording().unwrap();
    rig.emit(frame(500));
    rig.emit(frame(533));

    let log = rig.backend.last_writer().unwrap();
    assert_eq!(log.video_times(), vec![ms(0), ms(33), ms(66)]);

    let (tx, rx) = mpsc::channel();
    rig.engine.stop_video_recording(move |result| tx.send(result).unwrap());
    assert_eq!(rig.engine.recording_state(), RecordingState::Idle);

    let path = rx.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert!(path.starts_with(rig.storage.path().join("videos")));
    assert!(path.exists());
    assert!(rx.try_recv().is_err());
}

#[test]
fn recording_state_errors() {
    let mut rig = Rig::new(BACK_CAMERA);

    assert!(matches!(rig.engine.pause_video_recording(), Err(CameraError::NotRecording)));
    assert!(matches!(rig.engine.resume_video_recording(), Err(CameraError::NotRecording)));
    let (tx, rx) = mpsc::channel();
    rig.engine.stop_video_recording(move |result| tx.send(result).unwrap());
    assert_eq!(rx.recv().unwrap().unwrap_err().to_string(), "Video is not recording!");

    rig.engine.start_video_recording().unwrap();
    let error = rig.engine.start_video_recording().unwrap_err();
    assert_eq!(error.to_string(), "Video is already recording");
    assert_eq!(error.code(), "Error");
}

#[test]
fn stop_before_any_sample_still_goes_idle() {
    let mut rig = Rig::new(BACK_CAMERA);
    rig.engine.start_video_recording().unwrap();

    let (tx, rx) = mpsc::channel();
    rig.engine.stop_video_recording(move |result| tx.send(result).unwrap());

    assert_eq!(rig.engine.recording_state(), RecordingState::Idle);
    let error = rx.recv_timeout(TIMEOUT).unwrap().unwrap_err();
    assert_eq!(error.code(), "IOError");
    assert_eq!(error.to_string(), "AVAssetWriter could not finish writing!");
}

#[test]
fn writer_failure_is_reported_as_event() {
    let mut rig = Rig::new(BACK_CAMERA);
    rig.engine.start_video_recording().unwrap();
    rig.emit(frame(0));

    rig.backend.last_writer().unwrap().fail("disk full");
    rig.emit(frame(33));

    assert_eq!(rig.errors(), vec![json!("disk full")]);
    assert_eq!(rig.engine.recording_state(), RecordingState::Recording);
}

#[test]
fn writer_creation_failure_is_reported() {
    let mut rig = Rig::new(BACK_CAMERA);
    rig.backend
        .fail_asset_writer(BackendError::new("AVFoundationErrorDomain", -11_823, "cannot save"));

    let error = rig.engine.start_video_recording().unwrap_err();

    assert_eq!(error.code(), "IOError");
    assert_eq!(rig.errors(), vec![json!("cannot save")]);
    assert_eq!(rig.engine.recording_state(), RecordingState::Idle);
}

#[test]
fn recording_with_audio_sets_up_microphone_once() {
    let mut rig = Rig::with_audio(BACK_CAMERA, true);
    assert!(!rig.engine.is_audio_set_up());

    rig.engine.start_video_recording().unwrap();
    assert!(rig.engine.is_audio_set_up());
    assert_eq!(rig.session.input_count(), 2);
    let audio = rig.backend.last_audio_output().unwrap();
    assert!(audio.has_delegate());

    let log = rig.backend.last_writer().unwrap();
    assert_eq!(log.input_types(), vec![MediaType::Audio, MediaType::Video]);

    assert!(audio.emit(SampleBuffer::audio(vec![0; 4], ms(0), ms(20))));
    rig.run();
    assert_eq!(log.audio_times(), vec![ms(0)]);

    rig.engine.set_up_capture_session_for_audio().unwrap();
    assert_eq!(rig.session.input_count(), 2);
}

#[test]
fn missing_microphone_fails_recording() {
    let mut rig = Rig::with_audio(BACK_CAMERA, true);
    rig.backend.set_microphone(None);

    let error = rig.engine.start_video_recording().unwrap_err();

    assert_eq!(error.code(), "CameraNotFound");
    assert_eq!(rig.engine.recording_state(), RecordingState::Idle);
}

#[test]
fn torch_flash_lights_torch_when_recording() {
    let mut rig = Rig::new(BACK_CAMERA);
    let device = rig.backend.camera(BACK_CAMERA).unwrap();
    rig.engine.set_flash_mode(FlashMode::Torch).unwrap();
    device.update(|state| state.torch_mode = TorchMode::Off);

    rig.engine.start_video_recording().unwrap();

    assert_eq!(device.state().torch_mode, TorchMode::On);
}

#[test]
fn orientation_is_frozen_while_recording() {
    let mut rig = Rig::new(BACK_CAMERA);
    let video = rig.backend.last_video_output().unwrap().video_connection();
    let photo = rig.backend.last_photo_output().unwrap().video_connection();
    assert_eq!(video.orientation(), Some(VideoOrientation::Portrait));

    rig.engine.lock_capture_orientation(DeviceOrientation::LandscapeLeft);
    assert_eq!(video.orientation(), Some(VideoOrientation::LandscapeRight));
    assert_eq!(photo.orientation(), Some(VideoOrientation::LandscapeRight));

    rig.engine.start_video_recording().unwrap();
    rig.engine.unlock_capture_orientation();
    rig.engine.set_device_orientation(DeviceOrientation::PortraitUpsideDown);
    assert_eq!(video.orientation(), Some(VideoOrientation::LandscapeRight));

    rig.engine.stop_video_recording(|_| {});
    assert_eq!(video.orientation(), Some(VideoOrientation::PortraitUpsideDown));
}

#[test]
fn zoom_outside_range_leaves_device_untouched() {
    let mut rig = Rig::new(BACK_CAMERA);
    let device = rig.backend.camera(BACK_CAMERA).unwrap();

    let error = rig.engine.set_zoom_level(20.0).unwrap_err();
    assert_eq!(error.code(), "ZOOM_ERROR");
    assert!(matches!(error, CameraError::ZoomOutOfRange { min, max, .. } if min < max));
    assert!((device.state().zoom - 1.0).abs() < f64::EPSILON);

    rig.engine.set_zoom_level(4.0).unwrap();
    assert!((device.state().zoom - 4.0).abs() < f64::EPSILON);
    assert!((rig.engine.min_zoom_level() - 1.0).abs() < f64::EPSILON);
    assert!((rig.engine.max_zoom_level() - 16.0).abs() < f64::EPSILON);
    assert_eq!(device.state().unlocked_writes, 0);
}

#[test]
fn busy_device_surfaces_backend_error() {
    let mut rig = Rig::new(BACK_CAMERA);
    let device = rig.backend.camera(BACK_CAMERA).unwrap();
    device.update(|state| state.lock_error = Some(BackendError::new("AVFoundationErrorDomain", -11_852, "busy")));

    let error = rig.engine.set_zoom_level(2.0).unwrap_err();

    assert_eq!(error.code(), "Error -11852");
}

#[test]
fn flash_requires_hardware() {
    let mut front = Rig::new(FRONT_CAMERA);
    let torch = front.engine.set_flash_mode(FlashMode::Torch).unwrap_err();
    assert_eq!(torch.code(), "setFlashModeFailed");
    assert_eq!(torch.to_string(), "Device does not support torch mode");
    let flash = front.engine.set_flash_mode(FlashMode::Always).unwrap_err();
    assert_eq!(flash.to_string(), "Device does not have flash capabilities");
    assert_eq!(front.engine.flash_mode(), FlashMode::Off);

    let mut back = Rig::new(BACK_CAMERA);
    let device = back.backend.camera(BACK_CAMERA).unwrap();
    device.update(|state| state.torch_available = false);
    let busy = back.engine.set_flash_mode(FlashMode::Torch).unwrap_err();
    assert_eq!(busy.to_string(), "Torch mode is currently not available");

    back.backend
        .last_photo_output()
        .unwrap()
        .set_supported_flash_modes(vec![DeviceFlashMode::Off]);
    let unsupported = back.engine.set_flash_mode(FlashMode::Always).unwrap_err();
    assert_eq!(unsupported.to_string(), "Device does not support this specific flash mode");
}

#[test]
fn switching_away_from_torch_turns_it_off() {
    let mut rig = Rig::new(BACK_CAMERA);
    let device = rig.backend.camera(BACK_CAMERA).unwrap();

    rig.engine.set_flash_mode(FlashMode::Torch).unwrap();
    assert_eq!(device.state().torch_mode, TorchMode::On);

    rig.engine.set_flash_mode(FlashMode::Off).unwrap();
    assert_eq!(device.state().torch_mode, TorchMode::Off);
    assert_eq!(rig.engine.flash_mode(), FlashMode::Off);
}

#[test]
fn auto_exposure_falls_back_to_one_shot() {
    let mut rig = Rig::new(BACK_CAMERA);
    let device = rig.backend.camera(BACK_CAMERA).unwrap();
    device.update(|state| state.exposure_modes = vec![DeviceExposureMode::Locked, DeviceExposureMode::AutoExpose]);

    rig.engine.set_exposure_mode(ExposureMode::Locked).unwrap();
    assert_eq!(device.state().exposure_mode, DeviceExposureMode::Locked);

    rig.engine.set_exposure_mode(ExposureMode::Auto).unwrap();
    assert_eq!(device.state().exposure_mode, DeviceExposureMode::AutoExpose);
}

#[test]
fn focus_point_is_remapped_and_mode_reapplied() {
    let mut rig = Rig::new(BACK_CAMERA);
    let device = rig.backend.camera(BACK_CAMERA).unwrap();
    device.update(|state| state.focus_mode = DeviceFocusMode::AutoFocus);

    rig.engine.set_focus_point(Point::new(0.25, 0.5)).unwrap();

    let state = device.state();
    assert_eq!(state.focus_point, Some(Point::new(0.5, 0.75)));
    assert_eq!(state.focus_mode, DeviceFocusMode::ContinuousAutoFocus);

    rig.engine.set_device_orientation(DeviceOrientation::LandscapeRight);
    rig.engine.set_exposure_point(Point::new(0.25, 0.5)).unwrap();
    assert_eq!(device.state().exposure_point, Some(Point::new(0.75, 0.5)));
}

#[test]
fn unsupported_points_are_rejected() {
    let mut rig = Rig::new(BACK_CAMERA);
    let device = rig.backend.camera(BACK_CAMERA).unwrap();
    device.update(|state| {
        state.focus_point_supported = false;
        state.exposure_point_supported = false;
    });

    let focus = rig.engine.set_focus_point(Point::CENTER).unwrap_err();
    let exposure = rig.engine.set_exposure_point(Point::CENTER).unwrap_err();

    assert_eq!(focus.code(), "setFocusPointFailed");
    assert_eq!(exposure.code(), "setExposurePointFailed");
    assert_eq!(device.state().focus_point, None);
}

#[test]
fn exposure_offset_is_applied_and_echoed() {
    let mut rig = Rig::new(BACK_CAMERA);
    let device = rig.backend.camera(BACK_CAMERA).unwrap();

    let applied = rig.engine.set_exposure_offset(1.5).unwrap();

    assert!((applied - 1.5).abs() < f64::EPSILON);
    assert!((device.state().bias - 1.5).abs() < f32::EPSILON);
    assert!((rig.engine.min_exposure_offset() + 8.0).abs() < f32::EPSILON);
    assert!((rig.engine.max_exposure_offset() - 8.0).abs() < f32::EPSILON);
    assert!(CaptureEngine::EXPOSURE_OFFSET_STEP_SIZE.abs() < f64::EPSILON);
}

#[test]
fn initialized_event_uses_wire_names() {
    let rig = Rig::new(BACK_CAMERA);

    let event = serde_json::to_value(rig.engine.initialized_event()).unwrap();

    assert_eq!(
        event,
        json!({
            "previewWidth": 640.0,
            "previewHeight": 480.0,
            "exposureMode": "auto",
            "focusMode": "auto",
            "exposurePointSupported": true,
            "focusPointSupported": true,
        })
    );
}

#[test]
fn close_detaches_everything() {
    let mut rig = Rig::with_audio(BACK_CAMERA, true);
    rig.engine.start();
    rig.engine.set_up_capture_session_for_audio().unwrap();
    assert!(rig.session.is_running());

    rig.engine.close();

    assert!(!rig.session.is_running());
    assert_eq!(rig.session.input_count(), 0);
    assert_eq!(rig.session.output_count(), 0);
    assert!(!rig.backend.last_video_output().unwrap().has_delegate());
    assert!(!rig.backend.last_video_output().unwrap().emit(frame(0)));
    assert_eq!(rig.run(), 0);
}

#[test]
fn video_format_reaches_output() {
    let mut rig = Rig::new(BACK_CAMERA);

    rig.engine.set_video_format(PixelFormat::Yuv420BiPlanar);

    assert_eq!(rig.engine.video_format(), PixelFormat::Yuv420BiPlanar);
    assert_eq!(
        rig.backend.last_video_output().unwrap().pixel_format(),
        Some(PixelFormat::Yuv420BiPlanar)
    );
}
