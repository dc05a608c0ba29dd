//! Saving captured stills to disk.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, warn};

use crate::CameraError;
use crate::backend::{BackendError, CapturedPhoto, PhotoCaptureDelegate};
use crate::queue::DispatchQueue;

/// Called once with the saved file's path or the failure.
pub type PhotoCompletion = Box<dyn FnOnce(Result<PathBuf, CameraError>) + Send>;

/// Receives one capture result and writes it to `path` on an I/O queue.
///
/// The completion runs exactly once. Backend errors are reported at once,
/// everything else after the write finished.
pub struct SavePhotoDelegate {
    path: PathBuf,
    io_queue: DispatchQueue,
    completion: Mutex<Option<PhotoCompletion>>,
}

impl SavePhotoDelegate {
    /// Create a delegate saving to `path`.
    pub fn new(path: PathBuf, io_queue: DispatchQueue, completion: PhotoCompletion) -> Self {
        Self {
            path,
            io_queue,
            completion: Mutex::new(Some(completion)),
        }
    }

    /// Destination of the photo.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handle a capture result.
    ///
    /// On success `data` is evaluated on the I/O queue, so encoding never
    /// blocks the caller.
    pub fn handle_photo_capture_result<F>(&self, error: Option<BackendError>, data: F)
    where
        F: FnOnce() -> Option<Vec<u8>> + Send + 'static,
    {
        let Some(completion) = self.take_completion() else {
            return;
        };

        if let Some(error) = error {
            completion(Err(error.into()));
            return;
        }

        let path = self.path.clone();
        self.io_queue.run(move || {
            let Some(bytes) = data() else {
                completion(Err(io::Error::new(io::ErrorKind::InvalidData, "photo data is unavailable").into()));
                return;
            };
            match write_atomically(&path, &bytes) {
                Ok(()) => {
                    debug!("saved photo to {}", path.display());
                    completion(Ok(path));
                }
                Err(error) => completion(Err(error.into())),
            }
        });
    }

    fn take_completion(&self) -> Option<PhotoCompletion> {
        let completion = self.completion.lock().expect("poisoned photo completion mutex").take();
        if completion.is_none() {
            warn!("photo result for {} delivered more than once", self.path.display());
        }
        completion
    }
}

impl PhotoCaptureDelegate for SavePhotoDelegate {
    fn did_finish_processing_photo(&self, result: Result<Box<dyn CapturedPhoto>, BackendError>) {
        match result {
            Ok(photo) => self.handle_photo_capture_result(None, move || photo.file_data_representation()),
            Err(error) => self.handle_photo_capture_result(Some(error), || None),
        }
    }
}

impl fmt::Debug for SavePhotoDelegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SavePhotoDelegate")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Write through a sibling temporary file so readers never see a partial photo.
fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".part");
    let staging = PathBuf::from(staging);
    fs::write(&staging, bytes)?;
    fs::rename(&staging, path)
}
