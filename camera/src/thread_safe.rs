//! Wrappers that make host calls safe from any thread.
//!
//! Host channels, texture registries and reply callbacks may only be touched
//! on the host's main thread. Each wrapper here checks where it is called
//! from and either runs inline or posts to the main thread.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::CameraError;
use crate::host::{EventChannel, MethodChannel, MethodError, MethodResponse, MethodResult, StreamHandler, Texture, TextureRegistry};
use crate::queue::DispatchQueue;

/// The host's main (UI) thread.
pub trait MainThread: Send + Sync {
    /// Whether the caller is on the main thread.
    fn is_current(&self) -> bool;
    /// Run `task` on the main thread later.
    fn post(&self, task: Box<dyn FnOnce() + Send>);
}

impl MainThread for DispatchQueue {
    fn is_current(&self) -> bool {
        Self::is_current(self)
    }

    fn post(&self, task: Box<dyn FnOnce() + Send>) {
        self.run(task);
    }
}

/// A main thread stand-in that runs everything inline.
///
/// For hosts whose channel implementations are already thread safe.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentThread;

impl MainThread for CurrentThread {
    fn is_current(&self) -> bool {
        true
    }

    fn post(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

/// Run `task` now if on the main thread, otherwise post it there.
pub fn ensure_on_main<F>(main_thread: &dyn MainThread, task: F)
where
    F: FnOnce() + Send + 'static,
{
    if main_thread.is_current() {
        task();
    } else {
        main_thread.post(Box::new(task));
    }
}

/// A reply callback that is delivered on the main thread, exactly once.
///
/// Every `send_*` method consumes the result.
pub struct ThreadSafeResult {
    result: MethodResult,
    main_thread: Arc<dyn MainThread>,
}

impl ThreadSafeResult {
    /// Wrap a host reply callback.
    pub fn new(result: MethodResult, main_thread: Arc<dyn MainThread>) -> Self {
        Self { result, main_thread }
    }

    /// Reply with success and no data.
    pub fn send_success(self) {
        self.send(MethodResponse::Success(Value::Null));
    }

    /// Reply with success and `data`.
    pub fn send_success_with(self, data: Value) {
        self.send(MethodResponse::Success(data));
    }

    /// Reply with an error.
    pub fn send_error(self, error: MethodError) {
        self.send(MethodResponse::Error(error));
    }

    /// Reply with an error derived from a camera error.
    pub fn send_camera_error(self, error: &CameraError) {
        self.send_error(MethodError::from(error));
    }

    /// Reply that the command is unknown.
    pub fn send_not_implemented(self) {
        self.send(MethodResponse::NotImplemented);
    }

    /// Deliver `response`.
    pub fn send(self, response: MethodResponse) {
        let result = self.result;
        ensure_on_main(&*self.main_thread, move || result(response));
    }
}

impl fmt::Debug for ThreadSafeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSafeResult").finish_non_exhaustive()
    }
}

/// A method channel callable from any thread.
#[derive(Clone)]
pub struct ThreadSafeMethodChannel {
    channel: Arc<dyn MethodChannel>,
    main_thread: Arc<dyn MainThread>,
}

impl ThreadSafeMethodChannel {
    /// Wrap `channel`.
    pub fn new(channel: Arc<dyn MethodChannel>, main_thread: Arc<dyn MainThread>) -> Self {
        Self { channel, main_thread }
    }

    /// Invoke `method` on the main thread.
    pub fn invoke_method(&self, method: &str, arguments: Value) {
        let channel = Arc::clone(&self.channel);
        let method = method.to_owned();
        ensure_on_main(&*self.main_thread, move || channel.invoke_method(&method, arguments));
    }
}

impl fmt::Debug for ThreadSafeMethodChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSafeMethodChannel").finish_non_exhaustive()
    }
}

/// An event channel callable from any thread.
#[derive(Clone)]
pub struct ThreadSafeEventChannel {
    channel: Arc<dyn EventChannel>,
    main_thread: Arc<dyn MainThread>,
}

impl ThreadSafeEventChannel {
    /// Wrap `channel`.
    pub fn new(channel: Arc<dyn EventChannel>, main_thread: Arc<dyn MainThread>) -> Self {
        Self { channel, main_thread }
    }

    /// Install `handler` on the main thread, then call `completion` there.
    pub fn set_stream_handler<F>(&self, handler: Option<Arc<dyn StreamHandler>>, completion: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let channel = Arc::clone(&self.channel);
        ensure_on_main(&*self.main_thread, move || {
            channel.set_stream_handler(handler);
            completion();
        });
    }
}

impl fmt::Debug for ThreadSafeEventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSafeEventChannel").finish_non_exhaustive()
    }
}

/// A texture registry callable from any thread.
#[derive(Clone)]
pub struct ThreadSafeTextureRegistry {
    registry: Arc<dyn TextureRegistry>,
    main_thread: Arc<dyn MainThread>,
}

impl ThreadSafeTextureRegistry {
    /// Wrap `registry`.
    pub fn new(registry: Arc<dyn TextureRegistry>, main_thread: Arc<dyn MainThread>) -> Self {
        Self { registry, main_thread }
    }

    /// Register `texture` on the main thread and pass its id to `completion` there.
    pub fn register_texture<F>(&self, texture: Arc<dyn Texture>, completion: F)
    where
        F: FnOnce(i64) + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        ensure_on_main(&*self.main_thread, move || completion(registry.register_texture(texture)));
    }

    /// Signal a new frame for `texture_id`.
    pub fn texture_frame_available(&self, texture_id: i64) {
        let registry = Arc::clone(&self.registry);
        ensure_on_main(&*self.main_thread, move || registry.texture_frame_available(texture_id));
    }

    /// Unregister `texture_id`.
    pub fn unregister_texture(&self, texture_id: i64) {
        let registry = Arc::clone(&self.registry);
        ensure_on_main(&*self.main_thread, move || registry.unregister_texture(texture_id));
    }
}

impl fmt::Debug for ThreadSafeTextureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSafeTextureRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::fake::{FakeTextureRegistry, RecordingMethodChannel};

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn main_queue() -> Arc<DispatchQueue> {
        Arc::new(DispatchQueue::new("test.main", ()).unwrap())
    }

    #[test]
    fn result_is_delivered_on_main_thread() {
        let main = main_queue();
        let (tx, rx) = mpsc::channel();
        let probe = Arc::clone(&main);
        let result = ThreadSafeResult::new(
            Box::new(move |response| {
                tx.send((probe.is_current(), response)).unwrap();
            }),
            main,
        );

        result.send_success_with(json!({"cameraId": 3}));

        let (on_main, response) = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(on_main);
        assert_eq!(response, MethodResponse::Success(json!({"cameraId": 3})));
    }

    #[test]
    fn camera_errors_keep_code_and_message() {
        let (tx, rx) = mpsc::channel();
        let result = ThreadSafeResult::new(Box::new(move |response| tx.send(response).unwrap()), Arc::new(CurrentThread));

        result.send_camera_error(&CameraError::NotRecording);

        assert_eq!(
            rx.recv_timeout(TIMEOUT).unwrap(),
            MethodResponse::Error(MethodError::new("Error", "Video is not recording!"))
        );
    }

    #[test]
    fn method_channel_invokes_on_main_thread() {
        let main = main_queue();
        let channel = Arc::new(RecordingMethodChannel::new("test"));
        let wrapped = ThreadSafeMethodChannel::new(channel.clone(), main.clone());

        wrapped.invoke_method("error", json!("boom"));
        main.dispatch_sync(|_: &mut ()| ()).unwrap();

        assert_eq!(channel.calls(), vec![("error".to_owned(), json!("boom"))]);
    }

    #[test]
    fn texture_registration_reports_id() {
        let registry = Arc::new(FakeTextureRegistry::default());
        let wrapped = ThreadSafeTextureRegistry::new(registry.clone(), Arc::new(CurrentThread));
        let texture = Arc::new(crate::LatestFrameCache::default());
        let (tx, rx) = mpsc::channel();

        wrapped.register_texture(texture, move |id| tx.send(id).unwrap());
        let id = rx.recv_timeout(TIMEOUT).unwrap();
        wrapped.texture_frame_available(id);
        wrapped.unregister_texture(id);

        assert_eq!(registry.frames_available(), vec![id]);
        assert_eq!(registry.unregistered(), vec![id]);
    }
}
