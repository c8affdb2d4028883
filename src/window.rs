use crate::enums::WindowPreset;

use ndarray::{Array2, ArrayView2, Zip};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("Window width must be at least 1, got {0}")]
pub struct InvalidWindow(pub f32);

/// Window/level pair mapping a calibrated intensity range onto 0..=255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSetting {
    center: f32,
    width: f32,
}

impl WindowSetting {
    /// # Errors
    ///
    /// Rejects widths below 1 (and NaN).
    pub fn new(center: f32, width: f32) -> Result<Self, InvalidWindow> {
        if width >= 1.0 && center.is_finite() && width.is_finite() {
            Ok(Self { center, width })
        } else {
            Err(InvalidWindow(width))
        }
    }

    pub fn center(&self) -> f32 {
        self.center
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    /// Lower and upper bound of the window.
    pub fn bounds(&self) -> (f32, f32) {
        let half = self.width / 2.0;
        (self.center - half, self.center + half)
    }

    #[inline]
    pub fn map_value(&self, value: f32) -> u8 {
        let (low, high) = self.bounds();
        let clipped = value.clamp(low, high);
        // Scaling before dividing keeps integer inputs exact.
        ((clipped - low) * 255.0 / (high - low)) as u8
    }
}

impl Default for WindowSetting {
    /// Mediastinum window, the viewer's initial setting.
    fn default() -> Self {
        WindowPreset::Mediastinum.into()
    }
}

impl From<WindowPreset> for WindowSetting {
    fn from(preset: WindowPreset) -> Self {
        let (center, width) = preset.center_width();
        Self { center, width }
    }
}

/// Clip `plane` to the window and rescale it linearly to 8 bits.
///
/// Values are truncated towards zero after scaling, so the window's upper
/// bound maps to 255 and its lower bound to 0. `width` must be positive;
/// use [`WindowSetting::new`] to validate user input.
pub fn apply_window(plane: &ArrayView2<'_, f32>, center: f32, width: f32) -> Array2<u8> {
    let window = WindowSetting { center, width };
    apply_window_setting(plane, &window)
}

pub fn apply_window_setting(plane: &ArrayView2<'_, f32>, window: &WindowSetting) -> Array2<u8> {
    Zip::from(plane).par_map_collect(|&value| window.map_value(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn mid_window_value_maps_to_middle_gray() {
        let plane = array![[40.0_f32]];
        let out = apply_window(&plane.view(), 40.0, 400.0);
        assert_eq!(out[[0, 0]], 127);
    }

    #[test]
    fn values_outside_window_are_clipped() {
        let plane = array![[-2000.0_f32, -160.0, 240.0, 3000.0]];
        let out = apply_window(&plane.view(), 40.0, 400.0);
        assert_eq!(out, array![[0_u8, 0, 255, 255]]);
    }

    #[test]
    fn windowing_is_idempotent_on_its_own_output() {
        // A window spanning exactly 0..=255 maps 8-bit output onto itself.
        let plane = array![[-1000.0_f32, -300.0, 0.0], [40.0, 120.0, 900.0]];
        let (center, width) = (127.5, 255.0);
        let once = apply_window(&plane.view(), center, width);
        let as_float = once.mapv(|v| v as f32);
        let twice = apply_window(&as_float.view(), center, width);
        assert_eq!(once, twice);
    }

    #[test]
    fn narrow_windows_are_rejected() {
        assert_eq!(WindowSetting::new(0.0, 0.5), Err(InvalidWindow(0.5)));
        assert!(WindowSetting::new(0.0, f32::NAN).is_err());
        assert!(WindowSetting::new(-600.0, 1500.0).is_ok());
    }

    #[test]
    fn presets_convert_to_settings() {
        let lung = WindowSetting::from(WindowPreset::Lung);
        assert_eq!(lung.bounds(), (-1350.0, 150.0));
        assert_eq!(WindowSetting::default().center(), 40.0);
    }
}
