use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::host::{ChannelFactory, EventChannel, EventSink, MethodChannel, StreamHandler, Texture, TextureRegistry};

/// A [`MethodChannel`] that keeps every invocation.
#[derive(Debug)]
pub struct RecordingMethodChannel {
    name: String,
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingMethodChannel {
    /// A channel called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every `(method, arguments)` pair, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().expect("poisoned method channel mutex").clone()
    }

    /// Arguments of every invocation of `method`.
    #[must_use]
    pub fn calls_named(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == method)
            .map(|(_, arguments)| arguments)
            .collect()
    }
}

impl MethodChannel for RecordingMethodChannel {
    fn invoke_method(&self, method: &str, arguments: Value) {
        self.calls
            .lock()
            .expect("poisoned method channel mutex")
            .push((method.to_owned(), arguments));
    }
}

/// An [`EventChannel`] the test can listen on.
#[derive(Default)]
pub struct RecordingEventChannel {
    handler: Mutex<Option<Arc<dyn StreamHandler>>>,
}

impl RecordingEventChannel {
    /// Subscribe `sink` through the installed handler. Returns whether one was installed.
    pub fn listen(&self, sink: EventSink) -> bool {
        self.handler().is_some_and(|handler| {
            handler.on_listen(sink);
            true
        })
    }

    /// Cancel the subscription through the installed handler.
    pub fn cancel(&self) -> bool {
        self.handler().is_some_and(|handler| {
            handler.on_cancel();
            true
        })
    }

    /// Whether a handler is installed.
    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.handler().is_some()
    }

    fn handler(&self) -> Option<Arc<dyn StreamHandler>> {
        self.handler.lock().expect("poisoned event channel mutex").clone()
    }
}

impl fmt::Debug for RecordingEventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingEventChannel")
            .field("has_handler", &self.has_handler())
            .finish()
    }
}

impl EventChannel for RecordingEventChannel {
    fn set_stream_handler(&self, handler: Option<Arc<dyn StreamHandler>>) {
        *self.handler.lock().expect("poisoned event channel mutex") = handler;
    }
}

#[derive(Default)]
struct Registry {
    textures: HashMap<i64, Arc<dyn Texture>>,
    frames_available: Vec<i64>,
    unregistered: Vec<i64>,
}

/// A [`TextureRegistry`] recording notifications.
#[derive(Default)]
pub struct FakeTextureRegistry {
    next_id: AtomicI64,
    registry: Mutex<Registry>,
}

impl FakeTextureRegistry {
    /// Ids passed to `texture_frame_available`, oldest first.
    #[must_use]
    pub fn frames_available(&self) -> Vec<i64> {
        self.lock().frames_available.clone()
    }

    /// Ids passed to `unregister_texture`, oldest first.
    #[must_use]
    pub fn unregistered(&self) -> Vec<i64> {
        self.lock().unregistered.clone()
    }

    /// The texture registered under `texture_id`.
    #[must_use]
    pub fn texture(&self, texture_id: i64) -> Option<Arc<dyn Texture>> {
        self.lock().textures.get(&texture_id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().expect("poisoned texture registry mutex")
    }
}

impl fmt::Debug for FakeTextureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeTextureRegistry")
            .field("textures", &self.lock().textures.len())
            .finish_non_exhaustive()
    }
}

impl TextureRegistry for FakeTextureRegistry {
    fn register_texture(&self, texture: Arc<dyn Texture>) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().textures.insert(id, texture);
        id
    }

    fn texture_frame_available(&self, texture_id: i64) {
        self.lock().frames_available.push(texture_id);
    }

    fn unregister_texture(&self, texture_id: i64) {
        let mut registry = self.lock();
        registry.textures.remove(&texture_id);
        registry.unregistered.push(texture_id);
    }
}

#[derive(Default)]
struct Channels {
    method: HashMap<String, Arc<RecordingMethodChannel>>,
    event: HashMap<String, Arc<RecordingEventChannel>>,
}

/// A [`ChannelFactory`] handing out recording channels, one per name.
#[derive(Default)]
pub struct FakeChannelFactory {
    channels: Mutex<Channels>,
}

impl FakeChannelFactory {
    /// The method channel called `name`, created on first use.
    pub fn recorded_method_channel(&self, name: &str) -> Arc<RecordingMethodChannel> {
        let mut channels = self.lock();
        Arc::clone(
            channels
                .method
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(RecordingMethodChannel::new(name))),
        )
    }

    /// The event channel called `name`, created on first use.
    pub fn recorded_event_channel(&self, name: &str) -> Arc<RecordingEventChannel> {
        let mut channels = self.lock();
        Arc::clone(channels.event.entry(name.to_owned()).or_default())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Channels> {
        self.channels.lock().expect("poisoned channel factory mutex")
    }
}

impl fmt::Debug for FakeChannelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeChannelFactory").finish_non_exhaustive()
    }
}

impl ChannelFactory for FakeChannelFactory {
    fn method_channel(&self, name: &str) -> Arc<dyn MethodChannel> {
        self.recorded_method_channel(name)
    }

    fn event_channel(&self, name: &str) -> Arc<dyn EventChannel> {
        self.recorded_event_channel(name)
    }
}
