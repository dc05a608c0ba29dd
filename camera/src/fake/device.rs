use std::fmt;
use std::sync::{Arc, Mutex};

use crate::backend::{
    BackendError, CaptureDevice, DeviceExposureMode, DeviceFocusMode, DevicePosition, TorchMode,
};
use crate::media::{Dimensions, MediaTime, Point};

pub(super) const MICROPHONE: &str = "com.apple.avfoundation.avcapturedevice.built-in_audio:0";

/// Everything a [`FakeDevice`] reports and records.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    /// Hardware position.
    pub position: DevicePosition,
    /// Still flash present.
    pub has_flash: bool,
    /// Torch present.
    pub has_torch: bool,
    /// Torch usable right now.
    pub torch_available: bool,
    /// Current torch state.
    pub torch_mode: TorchMode,
    /// Supported focus modes.
    pub focus_modes: Vec<DeviceFocusMode>,
    /// Current focus mode.
    pub focus_mode: DeviceFocusMode,
    /// Focus point of interest supported.
    pub focus_point_supported: bool,
    /// Last focus point set.
    pub focus_point: Option<Point>,
    /// Supported exposure modes.
    pub exposure_modes: Vec<DeviceExposureMode>,
    /// Current exposure mode.
    pub exposure_mode: DeviceExposureMode,
    /// Exposure point of interest supported.
    pub exposure_point_supported: bool,
    /// Last exposure point set.
    pub exposure_point: Option<Point>,
    /// Smallest exposure bias.
    pub min_bias: f32,
    /// Largest exposure bias.
    pub max_bias: f32,
    /// Current exposure bias.
    pub bias: f32,
    /// Smallest zoom factor.
    pub min_zoom: f64,
    /// Largest zoom factor.
    pub max_zoom: f64,
    /// Current zoom factor.
    pub zoom: f64,
    /// Lens aperture.
    pub lens_aperture: f32,
    /// Exposure duration.
    pub exposure_duration: MediaTime,
    /// ISO.
    pub iso: f32,
    /// High resolution still size.
    pub still_dimensions: Dimensions,
    /// Configuration lock held.
    pub locked: bool,
    /// Setter calls made without the configuration lock.
    pub unlocked_writes: usize,
    /// Error returned by the next lock attempts.
    pub lock_error: Option<BackendError>,
}

impl DeviceState {
    fn new(position: DevicePosition) -> Self {
        Self {
            position,
            has_flash: true,
            has_torch: true,
            torch_available: true,
            torch_mode: TorchMode::Off,
            focus_modes: vec![
                DeviceFocusMode::Locked,
                DeviceFocusMode::AutoFocus,
                DeviceFocusMode::ContinuousAutoFocus,
            ],
            focus_mode: DeviceFocusMode::ContinuousAutoFocus,
            focus_point_supported: true,
            focus_point: None,
            exposure_modes: vec![
                DeviceExposureMode::Locked,
                DeviceExposureMode::AutoExpose,
                DeviceExposureMode::ContinuousAutoExposure,
            ],
            exposure_mode: DeviceExposureMode::ContinuousAutoExposure,
            exposure_point_supported: true,
            exposure_point: None,
            min_bias: -8.0,
            max_bias: 8.0,
            bias: 0.0,
            min_zoom: 1.0,
            max_zoom: 16.0,
            zoom: 1.0,
            lens_aperture: 1.8,
            exposure_duration: MediaTime::from_millis(10),
            iso: 100.0,
            still_dimensions: Dimensions::new(4032, 3024),
            locked: false,
            unlocked_writes: 0,
            lock_error: None,
        }
    }
}

/// A scriptable [`CaptureDevice`].
pub struct FakeDevice {
    unique_id: String,
    state: Mutex<DeviceState>,
}

impl FakeDevice {
    /// A camera with flash, torch and every focus and exposure mode.
    #[must_use]
    pub fn new(unique_id: &str, position: DevicePosition) -> Arc<Self> {
        Arc::new(Self {
            unique_id: unique_id.to_owned(),
            state: Mutex::new(DeviceState::new(position)),
        })
    }

    pub(super) fn microphone() -> Arc<Self> {
        Self::new(MICROPHONE, DevicePosition::Unspecified)
    }

    /// Change the scripted state.
    pub fn update(&self, change: impl FnOnce(&mut DeviceState)) {
        change(&mut self.lock());
    }

    /// A copy of the current state.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().expect("poisoned fake device mutex")
    }

    fn write(&self, change: impl FnOnce(&mut DeviceState)) {
        let mut state = self.lock();
        if !state.locked {
            state.unlocked_writes += 1;
        }
        change(&mut state);
    }
}

impl fmt::Debug for FakeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeDevice")
            .field("unique_id", &self.unique_id)
            .finish_non_exhaustive()
    }
}

impl CaptureDevice for FakeDevice {
    fn unique_id(&self) -> String {
        self.unique_id.clone()
    }

    fn position(&self) -> DevicePosition {
        self.lock().position
    }

    fn lock_for_configuration(&self) -> Result<(), BackendError> {
        let mut state = self.lock();
        if let Some(error) = state.lock_error.clone() {
            return Err(error);
        }
        state.locked = true;
        Ok(())
    }

    fn unlock_for_configuration(&self) {
        self.lock().locked = false;
    }

    fn has_flash(&self) -> bool {
        self.lock().has_flash
    }

    fn has_torch(&self) -> bool {
        self.lock().has_torch
    }

    fn is_torch_available(&self) -> bool {
        self.lock().torch_available
    }

    fn torch_mode(&self) -> TorchMode {
        self.lock().torch_mode
    }

    fn set_torch_mode(&self, mode: TorchMode) {
        self.write(|state| state.torch_mode = mode);
    }

    fn is_focus_mode_supported(&self, mode: DeviceFocusMode) -> bool {
        self.lock().focus_modes.contains(&mode)
    }

    fn focus_mode(&self) -> DeviceFocusMode {
        self.lock().focus_mode
    }

    fn set_focus_mode(&self, mode: DeviceFocusMode) {
        self.write(|state| state.focus_mode = mode);
    }

    fn is_focus_point_of_interest_supported(&self) -> bool {
        self.lock().focus_point_supported
    }

    fn set_focus_point_of_interest(&self, point: Point) {
        self.write(|state| state.focus_point = Some(point));
    }

    fn is_exposure_mode_supported(&self, mode: DeviceExposureMode) -> bool {
        self.lock().exposure_modes.contains(&mode)
    }

    fn exposure_mode(&self) -> DeviceExposureMode {
        self.lock().exposure_mode
    }

    fn set_exposure_mode(&self, mode: DeviceExposureMode) {
        self.write(|state| state.exposure_mode = mode);
    }

    fn is_exposure_point_of_interest_supported(&self) -> bool {
        self.lock().exposure_point_supported
    }

    fn set_exposure_point_of_interest(&self, point: Point) {
        self.write(|state| state.exposure_point = Some(point));
    }

    fn min_exposure_target_bias(&self) -> f32 {
        self.lock().min_bias
    }

    fn max_exposure_target_bias(&self) -> f32 {
        self.lock().max_bias
    }

    fn set_exposure_target_bias(&self, bias: f32) {
        self.write(|state| state.bias = bias);
    }

    fn min_available_video_zoom_factor(&self) -> f64 {
        self.lock().min_zoom
    }

    fn max_available_video_zoom_factor(&self) -> f64 {
        self.lock().max_zoom
    }

    fn video_zoom_factor(&self) -> f64 {
        self.lock().zoom
    }

    fn set_video_zoom_factor(&self, factor: f64) {
        self.write(|state| state.zoom = factor);
    }

    fn lens_aperture(&self) -> f32 {
        self.lock().lens_aperture
    }

    fn exposure_duration(&self) -> MediaTime {
        self.lock().exposure_duration
    }

    fn iso(&self) -> f32 {
        self.lock().iso
    }

    fn high_resolution_still_image_dimensions(&self) -> Dimensions {
        self.lock().still_dimensions
    }
}
