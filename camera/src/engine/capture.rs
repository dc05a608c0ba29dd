use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use log::debug;

use super::CaptureEngine;
use crate::CameraError;
use crate::backend::{
    DeviceFlashMode, FileType, MediaType, OutputHandle, OutputSettings, PhotoCaptureDelegate, PhotoSettings,
    TorchMode,
};
use crate::host::StreamHandler;
use crate::media::SampleBuffer;
use crate::photo::{PhotoCompletion, SavePhotoDelegate};
use crate::properties::{FlashMode, ResolutionPreset};
use crate::recording::RecordingSession;
use crate::storage::MediaStorage;
use crate::streaming::{FrameMetadata, ImageFrame, ImageStreamHandler};
use crate::thread_safe::ThreadSafeEventChannel;

static NEXT_PHOTO_ID: AtomicI64 = AtomicI64::new(1);

impl CaptureEngine {
    /// Take a still and save it as a JPEG under the pictures folder.
    ///
    /// `completion` receives the file path, or the capture or write error.
    /// The capture stays registered until its result arrives.
    pub fn capture_to_file(&mut self, completion: PhotoCompletion) {
        let settings = PhotoSettings {
            unique_id: NEXT_PHOTO_ID.fetch_add(1, Ordering::Relaxed),
            flash_mode: self.flash_mode.device_flash_mode().unwrap_or(DeviceFlashMode::Off),
            high_resolution_photo_enabled: self.resolution_preset == ResolutionPreset::Max,
        };

        let path = match self.storage.unique_file_path(MediaStorage::PICTURES, "CAP_", "jpg") {
            Ok(path) => path,
            Err(error) => {
                completion(Err(error.into()));
                return;
            }
        };

        let unique_id = settings.unique_id;
        let dispatcher = self.dispatcher.clone();
        let delegate = Arc::new(SavePhotoDelegate::new(
            path,
            self.photo_io_queue.clone(),
            Box::new(move |result| {
                dispatcher.dispatch(move |engine| {
                    engine.pending_photos.remove(&unique_id);
                });
                completion(result);
            }),
        ));

        let weak = Arc::downgrade(&delegate);
        let weak: Weak<dyn PhotoCaptureDelegate> = weak;
        debug!("capturing photo {unique_id} to {}", delegate.path().display());
        self.pending_photos.insert(unique_id, delegate);
        self.photo_output.capture_photo(settings, weak);
    }

    /// Add the microphone and an audio output to the session.
    ///
    /// Does nothing when audio is already set up.
    ///
    /// # Errors
    /// - [`CameraError::DeviceNotFound`] when there is no microphone.
    /// - [`CameraError::InputCreation`] when the microphone cannot be opened.
    /// - [`CameraError::Configuration`] when the session refuses the input or output.
    pub fn set_up_capture_session_for_audio(&mut self) -> Result<(), CameraError> {
        if self.audio_output.is_some() {
            return Ok(());
        }
        let microphone = self
            .backend
            .default_device(MediaType::Audio)
            .ok_or_else(|| CameraError::DeviceNotFound("audio".into()))?;
        let input = self
            .backend
            .device_input(&microphone)
            .map_err(CameraError::InputCreation)?;
        let output = self.backend.audio_data_output();
        let output_handle = OutputHandle::Audio(Arc::clone(&output));

        if !self.session.can_add_input(&input) {
            return Err(CameraError::Configuration(
                "Unable to add Audio input/output to session capture".into(),
            ));
        }
        self.session.add_input(Arc::clone(&input));
        if !self.session.can_add_output(&output_handle) {
            self.session.remove_input(&input);
            return Err(CameraError::Configuration(
                "Unable to add Audio input/output to session capture".into(),
            ));
        }
        self.session.add_output(output_handle);

        debug!("audio capture added for {}", self.camera_name);
        self.audio_output = Some(output);
        Ok(())
    }

    /// Start recording a video under the videos folder.
    ///
    /// The writer only starts once the first sample arrives.
    ///
    /// # Errors
    /// - [`CameraError::AlreadyRecording`] unless idle.
    /// - Audio setup errors when audio is enabled.
    /// - [`CameraError::Recording`] when the writer cannot be created.
    pub fn start_video_recording(&mut self) -> Result<(), CameraError> {
        if self.recording.is_some() {
            return Err(CameraError::AlreadyRecording);
        }
        let path = self.storage.unique_file_path(MediaStorage::VIDEOS, "REC_", "mp4")?;
        if self.enable_audio {
            self.set_up_capture_session_for_audio()?;
        }

        let mut writer = match self.backend.asset_writer(&path, FileType::Mp4) {
            Ok(writer) => writer,
            Err(error) => {
                self.report_error(&error.message);
                return Err(CameraError::Recording("Setup writer failed".into()));
            }
        };

        let video_settings = self.video_output.recommended_video_settings(FileType::Mp4);
        let video_input = self
            .backend
            .asset_writer_input(MediaType::Video, OutputSettings::Video(video_settings));
        let video_adaptor = self.backend.pixel_buffer_adaptor(&video_input, self.video_format);
        video_input.set_expects_media_data_in_real_time(true);

        let audio_input = match (&self.audio_output, self.enable_audio) {
            (Some(audio_output), true) => {
                let input = self
                    .backend
                    .asset_writer_input(MediaType::Audio, OutputSettings::Audio(self.config.audio));
                input.set_expects_media_data_in_real_time(true);
                writer.add_input(Arc::clone(&input));
                audio_output.set_sample_buffer_delegate(Some(self.sample_delegate()));
                Some(input)
            }
            _ => None,
        };

        if self.flash_mode == FlashMode::Torch {
            self.configure(|device| device.set_torch_mode(TorchMode::On))?;
        }

        writer.add_input(Arc::clone(&video_input));
        self.video_output.set_sample_buffer_delegate(Some(self.sample_delegate()));

        debug!("recording {} to {}", self.camera_name, path.display());
        self.recording = Some(RecordingSession::new(path, writer, video_input, video_adaptor, audio_input));
        Ok(())
    }

    /// Stop writing samples until [`resume_video_recording`](Self::resume_video_recording).
    ///
    /// # Errors
    /// [`CameraError::NotRecording`] when idle.
    pub fn pause_video_recording(&mut self) -> Result<(), CameraError> {
        let recording = self.recording.as_mut().ok_or(CameraError::NotRecording)?;
        recording.pause();
        debug!("paused recording {}", recording.path().display());
        Ok(())
    }

    /// Continue a paused recording.
    ///
    /// # Errors
    /// [`CameraError::NotRecording`] when idle.
    pub fn resume_video_recording(&mut self) -> Result<(), CameraError> {
        let recording = self.recording.as_mut().ok_or(CameraError::NotRecording)?;
        recording.resume();
        debug!("resumed recording {}", recording.path().display());
        Ok(())
    }

    /// Finish the recording and report the file through `completion`.
    ///
    /// The engine is idle when this returns, even if finalizing fails later.
    /// Output orientation follows the device again.
    pub fn stop_video_recording<F>(&mut self, completion: F)
    where
        F: FnOnce(Result<PathBuf, CameraError>) + Send + 'static,
    {
        let Some(recording) = self.recording.take() else {
            completion(Err(CameraError::NotRecording));
            return;
        };
        self.update_orientation();
        recording.finish(completion);
    }

    /// Publish frames on `channel`.
    ///
    /// Frames only flow once the host subscribes. A second start is reported
    /// as a runtime error.
    pub fn start_image_stream(&mut self, channel: ThreadSafeEventChannel) {
        if self.stream_channel.is_some() {
            self.report_error(&CameraError::AlreadyStreaming.to_string());
            return;
        }
        let handler: Arc<dyn StreamHandler> = Arc::new(ImageStreamHandler::new(self.dispatcher.clone()));
        let dispatcher = self.dispatcher.clone();
        channel.set_stream_handler(Some(handler), move || {
            dispatcher.dispatch(|engine| {
                debug!("image stream started for {}", engine.camera_name);
                engine.image_stream.begin();
            });
        });
        self.stream_channel = Some(channel);
    }

    /// Stop publishing frames.
    ///
    /// Stopping an idle stream is reported as a runtime error.
    pub fn stop_image_stream(&mut self) {
        let Some(channel) = self.stream_channel.take() else {
            self.report_error(&CameraError::NotStreaming.to_string());
            return;
        };
        self.image_stream.end();
        channel.set_stream_handler(None, || {});
        debug!("image stream stopped for {}", self.camera_name);
    }

    /// The host finished with one streamed frame.
    pub const fn received_image_stream_data(&mut self) {
        self.image_stream.frame_consumed();
    }

    /// Send `sample` to the stream subscriber if a slot is free.
    pub(super) fn stream_frame(&mut self, sample: &SampleBuffer) {
        let Some(image) = sample.image_buffer() else {
            return;
        };
        let Some(sink) = self.image_stream.reserve() else {
            return;
        };
        let metadata = FrameMetadata {
            lens_aperture: self.device.lens_aperture(),
            exposure_duration: self.device.exposure_duration(),
            iso: self.device.iso(),
        };
        let frame = ImageFrame::from_pixel_buffer(image, self.video_format, metadata);
        self.main_thread.post(Box::new(move || sink(frame)));
    }
}
