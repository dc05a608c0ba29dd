//! Live frame streaming with back-pressure.
//!
//! Frames are only sent while fewer than the configured maximum are waiting
//! for the host to acknowledge them. Everything past that is dropped, so a
//! slow consumer sees gaps instead of an ever growing backlog.

use std::fmt;

use serde::Serialize;

use crate::engine::EngineDispatcher;
use crate::host::{EventSink, StreamHandler};
use crate::media::{MediaTime, PixelBuffer, PixelFormat};

/// One plane of a streamed frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePlane {
    /// Row stride in bytes.
    pub bytes_per_row: usize,
    /// Width in samples.
    pub width: usize,
    /// Height in rows.
    pub height: usize,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

/// Sensor readings attached to a streamed frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameMetadata {
    /// Lens aperture as an f-number.
    pub lens_aperture: f32,
    /// Exposure duration.
    pub exposure_duration: MediaTime,
    /// ISO.
    pub iso: f32,
}

/// A frame as delivered to the stream subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFrame {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Four character code of the pixel format.
    pub format: u32,
    /// Image planes. Packed formats have one.
    pub planes: Vec<ImagePlane>,
    /// Lens aperture as an f-number.
    pub lens_aperture: f32,
    /// Exposure duration in nanoseconds.
    pub sensor_exposure_time: f64,
    /// ISO.
    pub sensor_sensitivity: f32,
}

impl ImageFrame {
    /// Copy `buffer` into a frame tagged with `format`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_pixel_buffer(buffer: &PixelBuffer, format: PixelFormat, metadata: FrameMetadata) -> Self {
        let planes = buffer
            .planes()
            .iter()
            .map(|plane| {
                let len = (plane.bytes_per_row() * plane.height()).min(plane.data().len());
                ImagePlane {
                    bytes_per_row: plane.bytes_per_row(),
                    width: plane.width(),
                    height: plane.height(),
                    bytes: plane.data()[..len].to_vec(),
                }
            })
            .collect();

        Self {
            width: buffer.width(),
            height: buffer.height(),
            format: format.four_cc(),
            planes,
            lens_aperture: metadata.lens_aperture,
            sensor_exposure_time: metadata.exposure_duration.as_nanos() as f64,
            sensor_sensitivity: metadata.iso,
        }
    }
}

/// Stream bookkeeping, owned by the engine on the capture queue.
pub struct StreamingState {
    streaming: bool,
    pending_frames: usize,
    max_pending_frames: usize,
    sink: Option<EventSink>,
}

impl StreamingState {
    /// Idle state allowing `max_pending_frames` in flight once started.
    #[must_use]
    pub const fn new(max_pending_frames: usize) -> Self {
        Self {
            streaming: false,
            pending_frames: 0,
            max_pending_frames,
            sink: None,
        }
    }

    /// Whether streaming is on.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Frames sent but not yet acknowledged.
    #[must_use]
    pub const fn pending_frames(&self) -> usize {
        self.pending_frames
    }

    /// Whether a subscriber is attached.
    #[must_use]
    pub const fn has_subscriber(&self) -> bool {
        self.sink.is_some()
    }

    /// Turn streaming on with an empty pipeline.
    pub const fn begin(&mut self) {
        self.streaming = true;
        self.pending_frames = 0;
    }

    /// Turn streaming off and detach the subscriber.
    pub fn end(&mut self) {
        self.streaming = false;
        self.pending_frames = 0;
        self.sink = None;
    }

    /// Attach a subscriber.
    pub fn subscribe(&mut self, sink: EventSink) {
        self.sink = Some(sink);
        self.pending_frames = 0;
    }

    /// Detach the subscriber.
    pub fn unsubscribe(&mut self) {
        self.sink = None;
    }

    /// The host acknowledged one frame.
    pub const fn frame_consumed(&mut self) {
        self.pending_frames = self.pending_frames.saturating_sub(1);
    }

    /// Claim a slot for one more frame, returning where to send it.
    ///
    /// `None` when not streaming, nobody listens, or the pipeline is full.
    pub fn reserve(&mut self) -> Option<EventSink> {
        if !self.streaming || self.pending_frames >= self.max_pending_frames {
            return None;
        }
        let sink = self.sink.clone()?;
        self.pending_frames += 1;
        Some(sink)
    }
}

impl fmt::Debug for StreamingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingState")
            .field("streaming", &self.streaming)
            .field("pending_frames", &self.pending_frames)
            .field("max_pending_frames", &self.max_pending_frames)
            .field("subscribed", &self.sink.is_some())
            .finish()
    }
}

/// Forwards stream subscription changes to the engine's queue.
#[derive(Debug)]
pub struct ImageStreamHandler {
    dispatcher: EngineDispatcher,
}

impl ImageStreamHandler {
    /// Create a handler posting to `dispatcher`.
    #[must_use]
    pub const fn new(dispatcher: EngineDispatcher) -> Self {
        Self { dispatcher }
    }
}

impl StreamHandler for ImageStreamHandler {
    fn on_listen(&self, sink: EventSink) {
        self.dispatcher.dispatch(move |engine| engine.image_stream_mut().subscribe(sink));
    }

    fn on_cancel(&self) {
        self.dispatcher.dispatch(|engine| engine.image_stream_mut().unsubscribe());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::media::Plane;

    fn counting_sink() -> (EventSink, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let sink: EventSink = Arc::new(move |_frame| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (sink, count)
    }

    #[test]
    fn caps_frames_in_flight() {
        let mut state = StreamingState::new(4);
        let (sink, _) = counting_sink();
        state.begin();
        state.subscribe(sink);

        let sent = (0..10).filter(|_| state.reserve().is_some()).count();
        assert_eq!(sent, 4);

        state.frame_consumed();
        let sent = (0..10).filter(|_| state.reserve().is_some()).count();
        assert_eq!(sent, 1);
    }

    #[test]
    fn nothing_is_sent_without_subscriber() {
        let mut state = StreamingState::new(4);
        state.begin();
        assert!(state.reserve().is_none());
        assert_eq!(state.pending_frames(), 0);
    }

    #[test]
    fn end_detaches_subscriber() {
        let mut state = StreamingState::new(4);
        let (sink, _) = counting_sink();
        state.begin();
        state.subscribe(sink);
        state.end();

        assert!(!state.has_subscriber());
        state.begin();
        assert!(state.reserve().is_none());
    }

    #[test]
    fn acknowledgements_never_underflow() {
        let mut state = StreamingState::new(4);
        state.frame_consumed();
        assert_eq!(state.pending_frames(), 0);
    }

    #[test]
    fn planar_frames_keep_every_plane() {
        let luma = Plane::new(8, 8, 2, vec![1; 16]);
        let chroma = Plane::new(8, 4, 1, vec![2; 8]);
        let buffer = PixelBuffer::planar(8, 2, PixelFormat::Yuv420BiPlanar, vec![luma, chroma]);
        let metadata = FrameMetadata {
            lens_aperture: 1.8,
            exposure_duration: MediaTime::from_millis(10),
            iso: 100.0,
        };

        let frame = ImageFrame::from_pixel_buffer(&buffer, PixelFormat::Yuv420BiPlanar, metadata);

        assert_eq!(frame.format, PixelFormat::Yuv420BiPlanar.four_cc());
        assert_eq!(frame.planes.len(), 2);
        assert_eq!(frame.planes[1].bytes, vec![2; 8]);
        assert!((frame.sensor_exposure_time - 10_000_000.0).abs() < f64::EPSILON);

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["planes"][0]["bytesPerRow"], 8);
        assert_eq!(json["sensorSensitivity"], 100.0);
    }
}
