use std::fmt;
use std::path::Path;
use std::sync::Arc;

use lenskit_camera::backend::CaptureBackend;
use lenskit_camera::host::{ChannelFactory, MethodCall, MethodError, MethodResult, Texture, TextureRegistry};
use lenskit_camera::queue::SerialQueue;
use lenskit_camera::thread_safe::{
    MainThread, ThreadSafeEventChannel, ThreadSafeMethodChannel, ThreadSafeResult, ThreadSafeTextureRegistry,
};
use lenskit_camera::{CameraError, CaptureEngine, DeviceOrientation, EngineDispatcher};
use lenskit_permission::{Permission, PermissionService, authorize};
use log::{debug, warn};
use serde_json::{Value, json};

use crate::arguments::{
    CameraIdArgs, CreateArgs, InitializeArgs, ModeArgs, OffsetArgs, OrientationArgs, PointArgs, ZoomArgs, parse,
};
use crate::config::{DEVICE_CHANNEL, IMAGE_STREAM_CHANNEL, camera_channel};
use crate::discovery::available_cameras;
use crate::{PluginConfig, PluginError};

/// The open camera and its host-side plumbing.
struct ActiveCamera {
    generation: u64,
    texture_id: Option<i64>,
    channel: Option<ThreadSafeMethodChannel>,
    engine: CaptureEngine,
}

impl ActiveCamera {
    fn close(mut self, registry: &ThreadSafeTextureRegistry) {
        debug!("closing camera {}", self.engine.camera_name());
        self.engine.close();
        if let Some(texture_id) = self.texture_id {
            registry.unregister_texture(texture_id);
        }
    }
}

/// Everything owned by the serialization queue.
struct PluginState {
    camera: Option<ActiveCamera>,
    generation: u64,
    device_orientation: DeviceOrientation,
}

impl PluginState {
    const fn new() -> Self {
        Self {
            camera: None,
            generation: 0,
            device_orientation: DeviceOrientation::Portrait,
        }
    }

    fn camera(&mut self) -> Result<&mut ActiveCamera, PluginError> {
        self.camera.as_mut().ok_or(PluginError::NoCamera)
    }

    fn engine(&mut self) -> Result<&mut CaptureEngine, PluginError> {
        self.camera().map(|camera| &mut camera.engine)
    }
}

/// Handles shared between the plugin and the jobs it queues.
#[derive(Clone)]
struct Services {
    queue: SerialQueue<PluginState>,
    backend: Arc<dyn CaptureBackend>,
    channels: Arc<dyn ChannelFactory>,
    registry: ThreadSafeTextureRegistry,
    device_channel: ThreadSafeMethodChannel,
    main_thread: Arc<dyn MainThread>,
    config: Arc<PluginConfig>,
}

impl Services {
    /// A dispatcher reaching the engine only while `generation` is the open camera.
    fn engine_dispatcher(&self, generation: u64) -> EngineDispatcher {
        let queue = self.queue.clone();
        EngineDispatcher::new(move |task| {
            queue.dispatch(move |state: &mut PluginState| match state.camera.as_mut() {
                Some(camera) if camera.generation == generation => task(&mut camera.engine),
                _ => debug!("dropping task for closed camera {generation}"),
            });
        })
    }
}

/// The host-facing camera plugin.
///
/// Commands arrive through [`handle_method_call`](Self::handle_method_call)
/// and run in order on one serialization queue, which also owns the open
/// camera. Replies and events are delivered on the host's main thread.
pub struct CameraPlugin {
    services: Services,
    permissions: Arc<dyn PermissionService>,
}

impl CameraPlugin {
    /// Create the plugin and start its serialization queue.
    ///
    /// # Errors
    /// Returns the OS error if the queue thread cannot be spawned.
    pub fn new(
        config: PluginConfig,
        backend: Arc<dyn CaptureBackend>,
        permissions: Arc<dyn PermissionService>,
        channels: Arc<dyn ChannelFactory>,
        textures: Arc<dyn TextureRegistry>,
        main_thread: Arc<dyn MainThread>,
    ) -> std::io::Result<Self> {
        let queue = SerialQueue::new(config.queue_label.clone(), PluginState::new())?;
        let device_channel =
            ThreadSafeMethodChannel::new(channels.method_channel(DEVICE_CHANNEL), Arc::clone(&main_thread));
        let services = Services {
            queue,
            backend,
            registry: ThreadSafeTextureRegistry::new(textures, Arc::clone(&main_thread)),
            channels,
            device_channel,
            main_thread,
            config: Arc::new(config),
        };
        Ok(Self { services, permissions })
    }

    /// Handle one command and answer it through `result`.
    ///
    /// The returned future only waits on permission prompts; every other
    /// command is queued and the future resolves right away.
    pub async fn handle_method_call(&self, call: MethodCall, result: MethodResult) {
        let result = ThreadSafeResult::new(result, Arc::clone(&self.services.main_thread));
        let MethodCall { method, arguments } = call;

        if method == "create" {
            self.create(arguments, result).await;
            return;
        }

        let services = self.services.clone();
        self.services.queue.dispatch(move |state| {
            handle_queued(state, &services, &method, arguments, result);
        });
    }

    /// [`handle_method_call`](Self::handle_method_call) for hosts without an executor.
    pub fn handle_method_call_blocking(&self, call: MethodCall, result: MethodResult) {
        futures::executor::block_on(self.handle_method_call(call, result));
    }

    /// The device was rotated.
    ///
    /// Flat orientations are ignored. Others re-orient the open camera and are
    /// forwarded to the host as `orientation_changed`.
    pub fn orientation_changed(&self, orientation: DeviceOrientation) {
        if orientation.is_flat() {
            return;
        }
        let services = self.services.clone();
        self.services.queue.dispatch(move |state| {
            state.device_orientation = orientation;
            if let Some(camera) = state.camera.as_mut() {
                camera.engine.set_device_orientation(orientation);
            }
            send_device_orientation(&services, orientation);
        });
    }

    /// Block until every command queued so far has run.
    pub fn flush(&self) {
        if self.services.queue.dispatch_sync(|_| ()).is_none() {
            warn!("queue {} is gone", self.services.queue.label());
        }
    }

    async fn create(&self, arguments: Value, result: ThreadSafeResult) {
        let args: CreateArgs = match parse("create", arguments) {
            Ok(args) => args,
            Err(error) => return reply_error(result, &error),
        };
        if let Err(error) = self.authorize(args.enable_audio).await {
            return reply_error(result, &error);
        }

        let services = self.services.clone();
        self.services.queue.dispatch(move |state| {
            if let Err(error) = create_camera(state, &services, &args, result) {
                warn!("failed to create camera {}: {error}", args.camera_name);
            }
        });
    }

    async fn authorize(&self, enable_audio: bool) -> Result<(), PluginError> {
        authorize(&*self.permissions, Permission::Camera).await?;
        if enable_audio {
            authorize(&*self.permissions, Permission::Microphone).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for CameraPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraPlugin")
            .field("queue", &self.services.queue.label())
            .finish_non_exhaustive()
    }
}

impl Drop for CameraPlugin {
    /// The open engine holds a handle to the queue that owns it, so it has to
    /// be torn down on the queue before the worker can exit.
    fn drop(&mut self) {
        let registry = self.services.registry.clone();
        self.services.queue.dispatch(move |state| {
            if let Some(camera) = state.camera.take() {
                camera.close(&registry);
            }
        });
    }
}

fn reply_error(result: ThreadSafeResult, error: &PluginError) {
    result.send_error(MethodError::from(error));
}

fn reply<T: Into<Value>>(result: ThreadSafeResult, outcome: Result<T, PluginError>) {
    match outcome {
        Ok(value) => result.send_success_with(value.into()),
        Err(error) => reply_error(result, &error),
    }
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

fn send_device_orientation(services: &Services, orientation: DeviceOrientation) {
    services
        .device_channel
        .invoke_method("orientation_changed", json!({ "orientation": orientation.wire_name() }));
}

/// Build the engine for `args`, replace the open camera with it, then register its texture.
fn create_camera(
    state: &mut PluginState,
    services: &Services,
    args: &CreateArgs,
    result: ThreadSafeResult,
) -> Result<(), PluginError> {
    let preset = match args.resolution_preset() {
        Ok(preset) => preset,
        Err(error) => {
            let error = PluginError::from(error);
            reply_error(result, &error);
            return Err(error);
        }
    };

    state.generation += 1;
    let generation = state.generation;

    let built = CaptureEngine::builder(&args.camera_name, Arc::clone(&services.backend), services.backend.capture_session())
        .resolution_preset(preset)
        .enable_audio(args.enable_audio)
        .orientation(state.device_orientation)
        .config(services.config.capture.clone())
        .build(services.engine_dispatcher(generation), Arc::clone(&services.main_thread));
    let engine = match built {
        Ok(engine) => engine,
        Err(error) => {
            let error = PluginError::from(error);
            reply_error(result, &error);
            return Err(error);
        }
    };

    // The open camera survives a failed build.
    if let Some(previous) = state.camera.take() {
        previous.close(&services.registry);
    }
    debug!("created camera {} as generation {generation}", args.camera_name);
    let texture: Arc<dyn Texture> = engine.frame_cache();
    state.camera = Some(ActiveCamera {
        generation,
        texture_id: None,
        channel: None,
        engine,
    });

    let attach = services.clone();
    services.registry.register_texture(texture, move |texture_id| {
        let services = attach.clone();
        attach.queue.dispatch(move |state| {
            attach_texture(state, &services, generation, texture_id, result);
        });
    });
    Ok(())
}

/// Wire the registered texture and the per-camera channel, then answer `create`.
fn attach_texture(
    state: &mut PluginState,
    services: &Services,
    generation: u64,
    texture_id: i64,
    result: ThreadSafeResult,
) {
    let Some(camera) = state.camera.as_mut().filter(|camera| camera.generation == generation) else {
        services.registry.unregister_texture(texture_id);
        return reply_error(result, &PluginError::Disposed);
    };

    let registry = services.registry.clone();
    camera
        .engine
        .set_on_frame_available(Arc::new(move || registry.texture_frame_available(texture_id)));
    let channel = ThreadSafeMethodChannel::new(
        services.channels.method_channel(&camera_channel(texture_id)),
        Arc::clone(&services.main_thread),
    );
    camera.engine.set_method_channel(channel.clone());
    camera.channel = Some(channel);
    camera.texture_id = Some(texture_id);
    result.send_success_with(json!({ "cameraId": texture_id }));
}

/// Commands answered by the open camera's engine.
const ENGINE_COMMANDS: &[&str] = &[
    "takePicture",
    "prepareForVideoRecording",
    "startVideoRecording",
    "stopVideoRecording",
    "pauseVideoRecording",
    "resumeVideoRecording",
    "getMinZoomLevel",
    "getMaxZoomLevel",
    "setZoomLevel",
    "setFlashMode",
    "setExposureMode",
    "setFocusMode",
    "setExposurePoint",
    "setFocusPoint",
    "getMinExposureOffset",
    "getMaxExposureOffset",
    "getExposureOffsetStepSize",
    "setExposureOffset",
    "lockCaptureOrientation",
    "unlockCaptureOrientation",
    "pausePreview",
    "resumePreview",
    "startImageStream",
    "stopImageStream",
    "receivedImageStreamData",
];

fn handle_queued(state: &mut PluginState, services: &Services, method: &str, arguments: Value, result: ThreadSafeResult) {
    match method {
        "availableCameras" => {
            let cameras = available_cameras(&*services.backend, services.config.sensor_orientation);
            match serde_json::to_value(cameras) {
                Ok(cameras) => result.send_success_with(cameras),
                Err(error) => result.send_error(MethodError::new("Error", error.to_string())),
            }
        }
        "initialize" => reply(result, initialize(state, services, arguments).map(|()| Value::Null)),
        "dispose" => {
            reply(
                result,
                parse::<CameraIdArgs>(method, arguments).map(|args| {
                    if let Some(camera) = state.camera.take() {
                        debug!("disposing camera {}", args.camera_id);
                        camera.close(&services.registry);
                    }
                    Value::Null
                }),
            );
        }
        _ if !ENGINE_COMMANDS.contains(&method) => {
            debug!("unknown camera command {method}");
            result.send_not_implemented();
        }
        _ => match state.engine() {
            Ok(engine) => handle_engine_command(engine, services, method, arguments, result),
            Err(error) => reply_error(result, &error),
        },
    }
}

fn initialize(state: &mut PluginState, services: &Services, arguments: Value) -> Result<(), PluginError> {
    let args: InitializeArgs = parse("initialize", arguments)?;
    let format = args.image_format_group()?;
    let device_orientation = state.device_orientation;
    let camera = state.camera()?;

    if let Some(format) = format {
        camera.engine.set_video_format(format.pixel_format());
    }
    let event = serde_json::to_value(camera.engine.initialized_event())
        .map_err(|error| CameraError::Configuration(error.to_string()))?;
    match &camera.channel {
        Some(channel) => channel.invoke_method("initialized", event),
        None => warn!("camera {} initialized before its texture was registered", args.camera_id),
    }
    send_device_orientation(services, device_orientation);
    camera.engine.start();
    Ok(())
}

fn handle_engine_command(
    engine: &mut CaptureEngine,
    services: &Services,
    method: &str,
    arguments: Value,
    result: ThreadSafeResult,
) {
    match method {
        "takePicture" => engine.capture_to_file(Box::new(move |outcome| match outcome {
            Ok(path) => result.send_success_with(path_value(&path)),
            Err(error) => result.send_camera_error(&error),
        })),
        "prepareForVideoRecording" => reply(
            result,
            engine.set_up_capture_session_for_audio().map(|()| Value::Null).map_err(PluginError::from),
        ),
        "startVideoRecording" => reply(
            result,
            engine.start_video_recording().map(|()| Value::Null).map_err(PluginError::from),
        ),
        "stopVideoRecording" => engine.stop_video_recording(move |outcome| match outcome {
            Ok(path) => result.send_success_with(path_value(&path)),
            Err(error) => result.send_camera_error(&error),
        }),
        "pauseVideoRecording" => reply(
            result,
            engine.pause_video_recording().map(|()| Value::Null).map_err(PluginError::from),
        ),
        "resumeVideoRecording" => reply(
            result,
            engine.resume_video_recording().map(|()| Value::Null).map_err(PluginError::from),
        ),
        "getMinZoomLevel" => result.send_success_with(json!(engine.min_zoom_level())),
        "getMaxZoomLevel" => result.send_success_with(json!(engine.max_zoom_level())),
        "setZoomLevel" => reply(
            result,
            parse::<ZoomArgs>(method, arguments)
                .and_then(|args| engine.set_zoom_level(args.zoom).map_err(PluginError::from))
                .map(|()| Value::Null),
        ),
        "setFlashMode" => reply(
            result,
            parse::<ModeArgs>(method, arguments)
                .and_then(|args| Ok(engine.set_flash_mode(args.flash()?)?))
                .map(|()| Value::Null),
        ),
        "setExposureMode" => reply(
            result,
            parse::<ModeArgs>(method, arguments)
                .and_then(|args| Ok(engine.set_exposure_mode(args.exposure()?)?))
                .map(|()| Value::Null),
        ),
        "setFocusMode" => reply(
            result,
            parse::<ModeArgs>(method, arguments)
                .and_then(|args| Ok(engine.set_focus_mode(args.focus()?)?))
                .map(|()| Value::Null),
        ),
        "setExposurePoint" => reply(
            result,
            parse::<PointArgs>(method, arguments)
                .and_then(|args| Ok(engine.set_exposure_point(args.point())?))
                .map(|()| Value::Null),
        ),
        "setFocusPoint" => reply(
            result,
            parse::<PointArgs>(method, arguments)
                .and_then(|args| Ok(engine.set_focus_point(args.point())?))
                .map(|()| Value::Null),
        ),
        "getMinExposureOffset" => result.send_success_with(json!(engine.min_exposure_offset())),
        "getMaxExposureOffset" => result.send_success_with(json!(engine.max_exposure_offset())),
        "getExposureOffsetStepSize" => result.send_success_with(json!(CaptureEngine::EXPOSURE_OFFSET_STEP_SIZE)),
        "setExposureOffset" => reply(
            result,
            parse::<OffsetArgs>(method, arguments)
                .and_then(|args| Ok(engine.set_exposure_offset(args.offset)?)),
        ),
        "lockCaptureOrientation" => reply(
            result,
            parse::<OrientationArgs>(method, arguments).and_then(|args| {
                engine.lock_capture_orientation(args.orientation()?);
                Ok(Value::Null)
            }),
        ),
        "unlockCaptureOrientation" => {
            engine.unlock_capture_orientation();
            result.send_success();
        }
        "pausePreview" => {
            engine.pause_preview();
            result.send_success();
        }
        "resumePreview" => {
            engine.resume_preview();
            result.send_success();
        }
        "startImageStream" => {
            let channel = ThreadSafeEventChannel::new(
                services.channels.event_channel(IMAGE_STREAM_CHANNEL),
                Arc::clone(&services.main_thread),
            );
            engine.start_image_stream(channel);
            result.send_success();
        }
        "stopImageStream" => {
            engine.stop_image_stream();
            result.send_success();
        }
        "receivedImageStreamData" => {
            engine.received_image_stream_data();
            result.send_success();
        }
        _ => result.send_not_implemented(),
    }
}
