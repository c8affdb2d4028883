use crate::enums::{Interpolation, Orientation, Processor};
use crate::interpolator::Interpolator;
use crate::window::{WindowSetting, apply_window_setting};

use image::GrayImage;
use ndarray::{Array2, Array3, ArrayView2, s};
use std::path::PathBuf;

/// Linear rescale taking stored pixel values to physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub slope: f64,
    pub intercept: f64,
}

/// Patient and study attributes read from a slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyInfo {
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub study_date: Option<String>,
    pub modality: Option<String>,
}

/// A stack of slices in depth order, holding calibrated intensities.
///
/// Axis order of [`Volume::data`] is (depth, row, column).
#[derive(Debug, Clone)]
pub struct Volume {
    pub data: Array3<f32>,
    /// Rescale already applied to `data`, if the series carried one.
    pub calibration: Option<Calibration>,
    /// (row spacing, column spacing) in millimetres.
    pub pixel_spacing: [f64; 2],
    pub slice_thickness: f64,
    pub series_uid: String,
    pub series_description: String,
    pub study: StudyInfo,
    /// Source file of each depth index.
    pub slice_paths: Vec<PathBuf>,
}

impl Volume {
    /// Wrap calibrated data with unit spacing and no provenance.
    pub fn new(data: Array3<f32>) -> Self {
        Self {
            data,
            calibration: None,
            pixel_spacing: [1.0, 1.0],
            slice_thickness: 1.0,
            series_uid: String::new(),
            series_description: String::new(),
            study: StudyInfo::default(),
            slice_paths: Vec::new(),
        }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Voxel spacing as (x, y, z) = (column, row, slice).
    pub fn spacing(&self) -> (f32, f32, f32) {
        (
            self.pixel_spacing[1] as f32,
            self.pixel_spacing[0] as f32,
            self.slice_thickness as f32,
        )
    }

    /// Number of planes available along `orientation`.
    pub fn slice_count(&self, orientation: Orientation) -> usize {
        let (depth, rows, columns) = self.dim();
        match orientation {
            Orientation::Axial => depth,
            Orientation::Sagittal => columns,
            Orientation::Coronal => rows,
        }
    }

    /// Index a projection starts on: the middle plane.
    pub fn center_index(&self, orientation: Orientation) -> usize {
        self.slice_count(orientation) / 2
    }

    /// Extract the plane at `index` along `orientation`.
    ///
    /// Axial planes are (rows, columns), sagittal planes (depth, rows) and
    /// coronal planes (depth, columns). An out-of-range index yields `None`,
    /// meaning there is nothing to display.
    pub fn extract(&self, orientation: Orientation, index: usize) -> Option<ArrayView2<'_, f32>> {
        if index >= self.slice_count(orientation) {
            return None;
        }
        let plane = match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
        };
        Some(plane)
    }

    /// Calibrated value under a cursor at (`row`, `column`) of a plane.
    pub fn value_at(
        &self,
        orientation: Orientation,
        index: usize,
        row: usize,
        column: usize,
    ) -> Option<f32> {
        self.extract(orientation, index)?.get((row, column)).copied()
    }

    /// Window the plane at `index` into an 8-bit grayscale image.
    ///
    /// With bilinear interpolation, sagittal and coronal planes are first
    /// resampled so that one pixel covers the same distance on both axes.
    /// Axial planes are never resampled.
    pub fn render(
        &self,
        index: usize,
        orientation: Orientation,
        window: &WindowSetting,
        interpolation: Interpolation,
    ) -> Option<GrayImage> {
        let plane = self.extract(orientation, index)?;

        let windowed = match interpolation {
            Interpolation::None => apply_window_setting(&plane, window),
            Interpolation::Bilinear(Processor::CPU) => {
                if matches!(orientation, Orientation::Axial) {
                    apply_window_setting(&plane, window)
                } else {
                    let (height, width) = self.output_dimensions(orientation);
                    let resampled = Interpolator::resample(&plane, height, width);
                    apply_window_setting(&resampled.view(), window)
                }
            }
        };

        Self::plane_to_image(&windowed)
    }

    /// (height, width) of an isotropically resampled plane.
    fn output_dimensions(&self, orientation: Orientation) -> (usize, usize) {
        let (depth, rows, columns) = Interpolator::isotropic_dimensions(self.spacing(), self.dim());
        match orientation {
            Orientation::Axial => (rows, columns),
            Orientation::Sagittal => (depth, rows),
            Orientation::Coronal => (depth, columns),
        }
    }

    fn plane_to_image(plane: &Array2<u8>) -> Option<GrayImage> {
        let (height, width) = plane.dim();
        let pixels: Vec<u8> = plane.iter().copied().collect();
        GrayImage::from_raw(width as u32, height as u32, pixels)
    }
}
