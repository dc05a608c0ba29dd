use std::sync::Mutex;

use crate::host::Texture;
use crate::media::PixelBuffer;

/// Holds the most recent preview frame until the host texture consumes it.
///
/// Written from the capture queue, read from the host's render thread.
#[derive(Debug, Default)]
pub struct LatestFrameCache {
    latest: Mutex<Option<PixelBuffer>>,
}

impl LatestFrameCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, returning whatever it replaced.
    pub fn replace(&self, frame: Option<PixelBuffer>) -> Option<PixelBuffer> {
        std::mem::replace(&mut *self.latest.lock().expect("poisoned frame cache mutex"), frame)
    }

    /// Take the stored frame, leaving the cache empty.
    pub fn take(&self) -> Option<PixelBuffer> {
        self.latest.lock().expect("poisoned frame cache mutex").take()
    }
}

impl Texture for LatestFrameCache {
    fn copy_pixel_buffer(&self) -> Option<PixelBuffer> {
        self.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PixelFormat;

    fn frame() -> PixelBuffer {
        PixelBuffer::packed(4, 4, PixelFormat::Bgra8888, 16, vec![0; 64])
    }

    #[test]
    fn copy_consumes_the_frame() {
        let cache = LatestFrameCache::new();
        let first = frame();
        cache.replace(Some(first.clone()));

        let copied = cache.copy_pixel_buffer().unwrap();
        assert!(copied.ptr_eq(&first));
        assert!(cache.copy_pixel_buffer().is_none());
    }

    #[test]
    fn newer_frame_replaces_unread_one() {
        let cache = LatestFrameCache::new();
        let first = frame();
        let second = frame();
        cache.replace(Some(first.clone()));

        let replaced = cache.replace(Some(second.clone())).unwrap();

        assert!(replaced.ptr_eq(&first));
        assert!(cache.take().unwrap().ptr_eq(&second));
    }
}
