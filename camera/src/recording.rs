//! Video recording with pause support.
//!
//! Pausing leaves a hole in the source timeline. Each track keeps the sum of
//! those holes as an offset and subtracts it from every later sample, so the
//! written file plays back without gaps.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error};

use crate::CameraError;
use crate::backend::{AssetWriter, AssetWriterInput, PixelBufferAdaptor, SampleSource, WriterStatus};
use crate::media::{MediaTime, SampleBuffer};

/// Timeline bookkeeping for one track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackClock {
    last_sample_time: Option<MediaTime>,
    offset: MediaTime,
    disconnected: bool,
}

impl TrackClock {
    /// A clock with no samples seen.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_sample_time: None,
            offset: MediaTime::ZERO,
            disconnected: false,
        }
    }

    /// Mark a break in the timeline. The next sample closes the gap.
    pub const fn disconnect(&mut self) {
        self.disconnected = true;
    }

    /// Whether the next sample will be used to close a gap.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Total time removed from the timeline so far.
    #[must_use]
    pub const fn offset(&self) -> MediaTime {
        self.offset
    }

    /// Feed the source time of a sample.
    ///
    /// Returns the output time, or `None` when the sample only served to
    /// measure a gap and must be dropped.
    pub fn reconcile(&mut self, time: MediaTime) -> Option<MediaTime> {
        if self.disconnected {
            self.disconnected = false;
            if let Some(last) = self.last_sample_time {
                self.offset += time - last;
                return None;
            }
        }
        self.last_sample_time = Some(time);
        Some(time - self.offset)
    }
}

/// A sample that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordingFault {
    /// The writer moved to the failed state.
    #[error("{0}")]
    WriterFailed(String),
    /// The video input rejected a frame.
    #[error("Unable to write to video input")]
    VideoAppendFailed,
    /// The audio input rejected a sample.
    #[error("Unable to write to audio input")]
    AudioAppendFailed,
}

/// An active recording.
pub struct RecordingSession {
    path: PathBuf,
    writer: Box<dyn AssetWriter>,
    video_input: Arc<dyn AssetWriterInput>,
    video_adaptor: Arc<dyn PixelBufferAdaptor>,
    audio_input: Option<Arc<dyn AssetWriterInput>>,
    video_clock: TrackClock,
    audio_clock: TrackClock,
    paused: bool,
}

impl RecordingSession {
    /// Wrap a configured writer. Inputs must already be attached to it.
    pub fn new(
        path: PathBuf,
        writer: Box<dyn AssetWriter>,
        video_input: Arc<dyn AssetWriterInput>,
        video_adaptor: Arc<dyn PixelBufferAdaptor>,
        audio_input: Option<Arc<dyn AssetWriterInput>>,
    ) -> Self {
        Self {
            path,
            writer,
            video_input,
            video_adaptor,
            audio_input,
            video_clock: TrackClock::new(),
            audio_clock: TrackClock::new(),
            paused: false,
        }
    }

    /// Destination file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether samples are currently being discarded.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Video track timeline.
    #[must_use]
    pub const fn video_clock(&self) -> &TrackClock {
        &self.video_clock
    }

    /// Audio track timeline.
    #[must_use]
    pub const fn audio_clock(&self) -> &TrackClock {
        &self.audio_clock
    }

    /// Stop writing samples until [`resume`](Self::resume).
    pub const fn pause(&mut self) {
        self.paused = true;
        self.video_clock.disconnect();
        self.audio_clock.disconnect();
    }

    /// Start writing samples again.
    pub const fn resume(&mut self) {
        self.paused = false;
    }

    /// Write one sample.
    ///
    /// The writer starts lazily, anchored at the first sample's time.
    ///
    /// # Errors
    /// Returns a [`RecordingFault`] when the writer has failed or an input
    /// rejects the sample.
    pub fn append(&mut self, source: SampleSource, sample: &SampleBuffer) -> Result<(), RecordingFault> {
        if self.paused {
            return Ok(());
        }
        if self.writer.status() == WriterStatus::Failed {
            return Err(self.writer_failure());
        }

        let time = sample.presentation_time();
        if self.writer.status() != WriterStatus::Writing {
            debug!("starting writer for {}", self.path.display());
            self.writer.start_writing();
            self.writer.start_session(time);
        }

        match source {
            SampleSource::Video => self.append_video(sample, time),
            SampleSource::Audio => self.append_audio(sample, time),
        }
    }

    fn append_video(&mut self, sample: &SampleBuffer, time: MediaTime) -> Result<(), RecordingFault> {
        let Some(output_time) = self.video_clock.reconcile(time) else {
            return Ok(());
        };
        let Some(image) = sample.image_buffer() else {
            return Ok(());
        };
        if !self.writer_is_writing()? || !self.video_input.is_ready_for_more_media_data() {
            return Ok(());
        }
        if self.video_adaptor.append(image, output_time) {
            Ok(())
        } else {
            Err(RecordingFault::VideoAppendFailed)
        }
    }

    fn append_audio(&mut self, sample: &SampleBuffer, time: MediaTime) -> Result<(), RecordingFault> {
        let Some(audio_input) = self.audio_input.clone() else {
            return Ok(());
        };
        let mut end_time = time;
        if sample.duration() > MediaTime::ZERO {
            end_time += sample.duration();
        }
        if self.audio_clock.reconcile(end_time).is_none() {
            return Ok(());
        }

        let offset = self.audio_clock.offset();
        let shifted;
        let sample = if offset.is_zero() {
            sample
        } else {
            shifted = sample.with_time_offset(offset);
            &shifted
        };

        if !self.writer_is_writing()? || !audio_input.is_ready_for_more_media_data() {
            return Ok(());
        }
        if audio_input.append(sample) {
            Ok(())
        } else {
            Err(RecordingFault::AudioAppendFailed)
        }
    }

    fn writer_is_writing(&self) -> Result<bool, RecordingFault> {
        match self.writer.status() {
            WriterStatus::Writing => Ok(true),
            WriterStatus::Failed => Err(self.writer_failure()),
            _ => Ok(false),
        }
    }

    fn writer_failure(&self) -> RecordingFault {
        RecordingFault::WriterFailed(
            self.writer
                .error()
                .map_or_else(|| "asset writer failed".to_owned(), |error| error.message),
        )
    }

    /// Finalize the file and report its path through `completion`.
    pub fn finish<F>(mut self, completion: F)
    where
        F: FnOnce(Result<PathBuf, CameraError>) + Send + 'static,
    {
        let path = self.path.clone();
        if self.writer.status() == WriterStatus::Unknown {
            error!("recording {} stopped before any sample arrived", path.display());
            completion(Err(CameraError::Recording(
                "AVAssetWriter could not finish writing!".to_owned(),
            )));
            return;
        }

        self.writer.finish_writing(Box::new(move |status| {
            if status == WriterStatus::Completed {
                debug!("recording saved to {}", path.display());
                completion(Ok(path));
            } else {
                error!("recording {} finished with {status:?}", path.display());
                completion(Err(CameraError::Recording(
                    "AVAssetWriter could not finish writing!".to_owned(),
                )));
            }
        }));
    }
}

impl fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingSession")
            .field("path", &self.path)
            .field("paused", &self.paused)
            .field("video_clock", &self.video_clock)
            .field("audio_clock", &self.audio_clock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CaptureBackend, FileType, MediaType, OutputSettings, VideoSettings};
    use crate::fake::{FakeBackend, WriterLog};
    use crate::media::{PixelBuffer, PixelFormat};

    fn ms(value: i64) -> MediaTime {
        MediaTime::from_millis(value)
    }

    fn frame(at: i64) -> SampleBuffer {
        SampleBuffer::video(PixelBuffer::packed(2, 2, PixelFormat::Bgra8888, 8, vec![0; 16]), ms(at))
    }

    fn session(with_audio: bool) -> (RecordingSession, Arc<WriterLog>) {
        let backend = FakeBackend::new();
        let path = PathBuf::from("REC_test.mp4");
        let mut writer = backend.asset_writer(&path, FileType::Mp4).unwrap();
        let video = backend.asset_writer_input(
            MediaType::Video,
            OutputSettings::Video(VideoSettings {
                codec: "avc1".into(),
                width: 2,
                height: 2,
            }),
        );
        let adaptor = backend.pixel_buffer_adaptor(&video, PixelFormat::Bgra8888);
        writer.add_input(Arc::clone(&video));
        let audio = with_audio.then(|| {
            let input = backend.asset_writer_input(MediaType::Audio, OutputSettings::Audio(Default::default()));
            writer.add_input(Arc::clone(&input));
            input
        });
        let log = backend.last_writer().unwrap();
        (RecordingSession::new(path, writer, video, adaptor, audio), log)
    }

    #[test]
    fn clock_passes_through_without_gaps() {
        let mut clock = TrackClock::new();
        assert_eq!(clock.reconcile(ms(10)), Some(ms(10)));
        assert_eq!(clock.reconcile(ms(20)), Some(ms(20)));
        assert_eq!(clock.offset(), MediaTime::ZERO);
    }

    #[test]
    fn clock_accumulates_every_gap() {
        let mut clock = TrackClock::new();
        clock.reconcile(ms(100));

        clock.disconnect();
        assert_eq!(clock.reconcile(ms(400)), None);
        assert_eq!(clock.offset(), ms(300));
        assert_eq!(clock.reconcile(ms(433)), Some(ms(133)));

        clock.disconnect();
        assert_eq!(clock.reconcile(ms(1_000)), None);
        assert_eq!(clock.offset(), ms(300 + 567));
        assert_eq!(clock.reconcile(ms(1_033)), Some(ms(166)));
    }

    #[test]
    fn disconnect_before_first_sample_adds_nothing() {
        let mut clock = TrackClock::new();
        clock.disconnect();
        assert_eq!(clock.reconcile(ms(50)), Some(ms(50)));
        assert_eq!(clock.offset(), MediaTime::ZERO);
    }

    #[test]
    fn writer_starts_at_first_sample() {
        let (mut recording, log) = session(false);
        recording.append(SampleSource::Video, &frame(40)).unwrap();

        assert_eq!(log.session_start(), Some(ms(40)));
        assert_eq!(log.video_times(), vec![ms(40)]);
    }

    #[test]
    fn paused_samples_are_not_written() {
        let (mut recording, log) = session(false);
        recording.append(SampleSource::Video, &frame(0)).unwrap();
        recording.append(SampleSource::Video, &frame(33)).unwrap();

        recording.pause();
        recording.append(SampleSource::Video, &frame(66)).unwrap();
        recording.append(SampleSource::Video, &frame(99)).unwrap();
        recording.resume();

        recording.append(SampleSource::Video, &frame(500)).unwrap();
        recording.append(SampleSource::Video, &frame(533)).unwrap();

        assert_eq!(log.video_times(), vec![ms(0), ms(33), ms(66)]);
        assert_eq!(recording.video_clock().offset(), ms(500 - 33));
    }

    #[test]
    fn audio_offset_includes_sample_duration() {
        let (mut recording, log) = session(true);
        let audio = |at: i64| SampleBuffer::audio(vec![0; 4], ms(at), ms(20));

        recording.append(SampleSource::Audio, &audio(0)).unwrap();
        recording.pause();
        recording.resume();
        recording.append(SampleSource::Audio, &audio(1_000)).unwrap();
        recording.append(SampleSource::Audio, &audio(1_020)).unwrap();

        assert_eq!(recording.audio_clock().offset(), ms(1_000));
        assert_eq!(log.audio_times(), vec![ms(0), ms(20)]);
    }

    #[test]
    fn failed_writer_is_reported() {
        let (mut recording, log) = session(false);
        recording.append(SampleSource::Video, &frame(0)).unwrap();
        log.fail("disk full");

        assert_eq!(
            recording.append(SampleSource::Video, &frame(33)),
            Err(RecordingFault::WriterFailed("disk full".into()))
        );
    }

    #[test]
    fn rejected_frame_is_reported() {
        let (mut recording, log) = session(false);
        log.reject_appends(true);

        assert_eq!(
            recording.append(SampleSource::Video, &frame(0)),
            Err(RecordingFault::VideoAppendFailed)
        );
    }

    #[test]
    fn finish_without_samples_fails() {
        let (recording, _) = session(false);
        let (tx, rx) = std::sync::mpsc::channel();
        recording.finish(move |result| tx.send(result).unwrap());

        assert_eq!(rx.recv().unwrap().unwrap_err().code(), "IOError");
    }

    #[test]
    fn finish_reports_path() {
        let (mut recording, log) = session(false);
        recording.append(SampleSource::Video, &frame(0)).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        recording.finish(move |result| tx.send(result).unwrap());

        assert_eq!(rx.recv().unwrap().unwrap(), PathBuf::from("REC_test.mp4"));
        assert!(log.is_finished());
    }
}
