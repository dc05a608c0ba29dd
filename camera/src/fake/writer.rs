use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{AssetWriter, AssetWriterInput, BackendError, MediaType, PixelBufferAdaptor, WriterCompletion, WriterStatus};
use crate::media::{MediaTime, PixelBuffer, SampleBuffer};

struct LogState {
    status: WriterStatus,
    error: Option<BackendError>,
    reject_appends: bool,
    fail_on_finish: bool,
    session_start: Option<MediaTime>,
    appended: Vec<(MediaType, MediaTime)>,
    input_types: Vec<MediaType>,
    finished: bool,
}

/// Shared record of what one fake writer received.
pub struct WriterLog {
    path: PathBuf,
    state: Mutex<LogState>,
}

impl WriterLog {
    /// A log for a writer targeting `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(LogState {
                status: WriterStatus::Unknown,
                error: None,
                reject_appends: false,
                fail_on_finish: false,
                session_start: None,
                appended: Vec::new(),
                input_types: Vec::new(),
                finished: false,
            }),
        }
    }

    /// Destination file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current writer status.
    #[must_use]
    pub fn status(&self) -> WriterStatus {
        self.lock().status
    }

    /// Move the writer to the failed state with `message`.
    pub fn fail(&self, message: &str) {
        let mut state = self.lock();
        state.status = WriterStatus::Failed;
        state.error = Some(BackendError::new("AVFoundationErrorDomain", -11_800, message));
    }

    /// Make every input reject appended samples.
    pub fn reject_appends(&self, reject: bool) {
        self.lock().reject_appends = reject;
    }

    /// Make `finish_writing` end in the failed state.
    pub fn fail_on_finish(&self, fail: bool) {
        self.lock().fail_on_finish = fail;
    }

    /// Source time the session was anchored at.
    #[must_use]
    pub fn session_start(&self) -> Option<MediaTime> {
        self.lock().session_start
    }

    /// Output times of every written video frame.
    #[must_use]
    pub fn video_times(&self) -> Vec<MediaTime> {
        self.times(MediaType::Video)
    }

    /// Presentation times of every written audio sample.
    #[must_use]
    pub fn audio_times(&self) -> Vec<MediaTime> {
        self.times(MediaType::Audio)
    }

    /// Media types of the attached inputs, in order.
    #[must_use]
    pub fn input_types(&self) -> Vec<MediaType> {
        self.lock().input_types.clone()
    }

    /// Whether `finish_writing` was called.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    fn times(&self, media_type: MediaType) -> Vec<MediaTime> {
        self.lock()
            .appended
            .iter()
            .filter(|(kind, _)| *kind == media_type)
            .map(|(_, time)| *time)
            .collect()
    }

    fn record(&self, media_type: MediaType, time: MediaTime) -> bool {
        let mut state = self.lock();
        if state.reject_appends {
            return false;
        }
        state.appended.push((media_type, time));
        true
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().expect("poisoned writer log mutex")
    }
}

impl fmt::Debug for WriterLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterLog")
            .field("path", &self.path)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

pub(super) struct FakeAssetWriter {
    log: Arc<WriterLog>,
}

impl FakeAssetWriter {
    pub(super) const fn new(log: Arc<WriterLog>) -> Self {
        Self { log }
    }
}

impl AssetWriter for FakeAssetWriter {
    fn status(&self) -> WriterStatus {
        self.log.status()
    }

    fn error(&self) -> Option<BackendError> {
        self.log.lock().error.clone()
    }

    fn add_input(&mut self, input: Arc<dyn AssetWriterInput>) {
        self.log.lock().input_types.push(input.media_type());
    }

    fn start_writing(&mut self) -> bool {
        let mut state = self.log.lock();
        if state.status == WriterStatus::Unknown {
            state.status = WriterStatus::Writing;
        }
        state.status == WriterStatus::Writing
    }

    fn start_session(&mut self, source_time: MediaTime) {
        self.log.lock().session_start = Some(source_time);
    }

    fn finish_writing(&mut self, completion: WriterCompletion) {
        let status = {
            let mut state = self.log.lock();
            state.finished = true;
            state.status = if state.fail_on_finish || state.status == WriterStatus::Failed {
                WriterStatus::Failed
            } else {
                WriterStatus::Completed
            };
            state.status
        };
        if status == WriterStatus::Completed && self.log.path.parent().is_some_and(Path::is_dir) {
            let _ = fs::write(&self.log.path, []);
        }
        completion(status);
    }
}

pub(super) struct FakeWriterInput {
    media_type: MediaType,
    log: Arc<WriterLog>,
}

impl FakeWriterInput {
    pub(super) const fn new(media_type: MediaType, log: Arc<WriterLog>) -> Self {
        Self { media_type, log }
    }
}

impl AssetWriterInput for FakeWriterInput {
    fn media_type(&self) -> MediaType {
        self.media_type
    }

    fn set_expects_media_data_in_real_time(&self, _real_time: bool) {}

    fn is_ready_for_more_media_data(&self) -> bool {
        true
    }

    fn append(&self, sample: &SampleBuffer) -> bool {
        self.log.record(self.media_type, sample.presentation_time())
    }
}

pub(super) struct FakeAdaptor {
    log: Arc<WriterLog>,
}

impl FakeAdaptor {
    pub(super) const fn new(log: Arc<WriterLog>) -> Self {
        Self { log }
    }
}

impl PixelBufferAdaptor for FakeAdaptor {
    fn append(&self, _buffer: &PixelBuffer, presentation_time: MediaTime) -> bool {
        self.log.record(MediaType::Video, presentation_time)
    }
}
