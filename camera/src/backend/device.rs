use crate::backend::BackendError;
use crate::media::{Dimensions, MediaTime, Point};

/// Where a device sits on the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevicePosition {
    /// Facing the user.
    Front,
    /// Facing away from the user.
    Back,
    /// External or unknown.
    Unspecified,
}

/// Physical camera module kinds searched during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Standard wide angle lens.
    BuiltInWideAngle,
    /// Telephoto lens.
    BuiltInTelephoto,
    /// Ultra wide lens.
    BuiltInUltraWide,
    /// Built in microphone.
    BuiltInMicrophone,
}

/// Still-capture flash modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFlashMode {
    /// Never fire.
    Off,
    /// Always fire.
    On,
    /// Fire when needed.
    Auto,
}

/// Torch states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TorchMode {
    /// Torch off.
    Off,
    /// Torch on.
    On,
    /// Torch driven by the device.
    Auto,
}

/// Focus modes a device can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFocusMode {
    /// Focus fixed at its current position.
    Locked,
    /// Focus once, then lock.
    AutoFocus,
    /// Refocus whenever needed.
    ContinuousAutoFocus,
}

/// Exposure modes a device can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceExposureMode {
    /// Exposure fixed at its current value.
    Locked,
    /// Expose once, then lock.
    AutoExpose,
    /// Adjust exposure whenever needed.
    ContinuousAutoExposure,
}

/// A physical capture device.
///
/// Setters are only valid between [`lock_for_configuration`] and
/// [`unlock_for_configuration`].
///
/// [`lock_for_configuration`]: CaptureDevice::lock_for_configuration
/// [`unlock_for_configuration`]: CaptureDevice::unlock_for_configuration
pub trait CaptureDevice: Send + Sync {
    /// Stable identifier, also used as the camera name on the wire.
    fn unique_id(&self) -> String;
    /// Hardware position.
    fn position(&self) -> DevicePosition;

    /// Acquire exclusive configuration access.
    ///
    /// # Errors
    /// Fails when another client holds the device.
    fn lock_for_configuration(&self) -> Result<(), BackendError>;
    /// Release configuration access.
    fn unlock_for_configuration(&self);

    /// Whether the device has a still flash.
    fn has_flash(&self) -> bool;
    /// Whether the device has a torch.
    fn has_torch(&self) -> bool;
    /// Whether the torch can be used right now, e.g. it is not overheated.
    fn is_torch_available(&self) -> bool;
    /// Current torch state.
    fn torch_mode(&self) -> TorchMode;
    /// Change the torch state.
    fn set_torch_mode(&self, mode: TorchMode);

    /// Whether `mode` is supported.
    fn is_focus_mode_supported(&self, mode: DeviceFocusMode) -> bool;
    /// Current focus mode.
    fn focus_mode(&self) -> DeviceFocusMode;
    /// Change the focus mode.
    fn set_focus_mode(&self, mode: DeviceFocusMode);
    /// Whether a focus point of interest can be set.
    fn is_focus_point_of_interest_supported(&self) -> bool;
    /// Set the focus point of interest in sensor coordinates.
    fn set_focus_point_of_interest(&self, point: Point);

    /// Whether `mode` is supported.
    fn is_exposure_mode_supported(&self, mode: DeviceExposureMode) -> bool;
    /// Current exposure mode.
    fn exposure_mode(&self) -> DeviceExposureMode;
    /// Change the exposure mode.
    fn set_exposure_mode(&self, mode: DeviceExposureMode);
    /// Whether an exposure point of interest can be set.
    fn is_exposure_point_of_interest_supported(&self) -> bool;
    /// Set the exposure point of interest in sensor coordinates.
    fn set_exposure_point_of_interest(&self, point: Point);

    /// Smallest exposure target bias in EV.
    fn min_exposure_target_bias(&self) -> f32;
    /// Largest exposure target bias in EV.
    fn max_exposure_target_bias(&self) -> f32;
    /// Set the exposure target bias in EV.
    fn set_exposure_target_bias(&self, bias: f32);

    /// Smallest available zoom factor.
    fn min_available_video_zoom_factor(&self) -> f64;
    /// Largest available zoom factor.
    fn max_available_video_zoom_factor(&self) -> f64;
    /// Current zoom factor.
    fn video_zoom_factor(&self) -> f64;
    /// Change the zoom factor.
    fn set_video_zoom_factor(&self, factor: f64);

    /// Lens aperture as an f-number.
    fn lens_aperture(&self) -> f32;
    /// Current exposure duration.
    fn exposure_duration(&self) -> MediaTime;
    /// Current ISO.
    fn iso(&self) -> f32;
    /// Size of high resolution stills for the active format.
    fn high_resolution_still_image_dimensions(&self) -> Dimensions;
}
