use crate::{
    attributes,
    cancel::CancelToken,
    series::Series,
    volume::{Calibration, StudyInfo, Volume},
};

use dicom::{
    object::open_file,
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_PIXEL_SPACING: [f64; 2] = [1.0, 1.0];
pub const DEFAULT_SLICE_THICKNESS: f64 = 1.0;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Series {0} is not part of the last scan")]
    UnknownSeries(String),

    #[error("No slice of series {0} could be decoded")]
    EmptySeries(String),

    #[error(
        "Inconsistent image dimensions: {path} is {found:?}, expected {expected:?}"
    )]
    InconsistentDimensions {
        path: PathBuf,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid rescale slope {slope} / intercept {intercept}")]
    InvalidCalibration { slope: f64, intercept: f64 },

    #[error("DICOM error reading {path}: {source}")]
    Dicom {
        path: PathBuf,
        #[source]
        source: dicom::object::ReadError,
    },

    #[error("Pixel data error in {path}: {source}")]
    PixelData {
        path: PathBuf,
        #[source]
        source: dicom::pixeldata::Error,
    },

    #[error("Load cancelled")]
    Cancelled,
}

impl VolumeLoaderError {
    /// Errors raised while stacking and calibrating decoded slices.
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            VolumeLoaderError::InconsistentDimensions { .. }
                | VolumeLoaderError::InvalidCalibration { .. }
        )
    }
}

/// One decoded image plane with the geometry needed to stack it.
#[derive(Debug, Clone)]
pub struct Slice {
    pub path: PathBuf,
    /// Stored pixel values, before any rescale.
    pub pixels: Array2<f32>,
    /// Image Position (Patient); the origin when absent.
    pub position: [f64; 3],
    /// (row spacing, column spacing)
    pub pixel_spacing: Option<[f64; 2]>,
    pub slice_thickness: Option<f64>,
    pub calibration: Option<Calibration>,
    pub study: StudyInfo,
}

impl Slice {
    pub fn depth(&self) -> f64 {
        self.position[2]
    }
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Decode every file of `series` and assemble them into a volume.
    ///
    /// Files are decoded in parallel; a file that fails to decode is logged
    /// and left out.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::EmptySeries`] if no slice could be decoded,
    /// a build error if the slices cannot be stacked, and
    /// [`VolumeLoaderError::Cancelled`] if `cancel` fired during decoding.
    pub fn load(series: &Series, cancel: &CancelToken) -> Result<Volume, VolumeLoaderError> {
        info!("Loading series {}", series);

        let decoded: Vec<Option<Slice>> = series
            .files
            .par_iter()
            .map(|path| {
                if cancel.is_cancelled() {
                    return None;
                }
                match Self::decode_slice(path) {
                    Ok(slice) => Some(slice),
                    Err(err) => {
                        warn!("Skipping slice: {}", err);
                        None
                    }
                }
            })
            .collect();

        if cancel.is_cancelled() {
            return Err(VolumeLoaderError::Cancelled);
        }

        let slices: Vec<Slice> = decoded.into_iter().flatten().collect();
        let volume = Self::assemble(&series.uid, &series.description, slices)?;
        info!("Loaded volume with shape {:?}", volume.dim());
        Ok(volume)
    }

    /// Load a volume from explicit file paths, treating them as one series.
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        cancel: &CancelToken,
    ) -> Result<Volume, VolumeLoaderError> {
        let mut series = Series::new(crate::series::UNKNOWN_SERIES, "");
        series.files = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        Self::load(&series, cancel)
    }

    /// Stack already decoded slices into a calibrated volume.
    ///
    /// Slices are ordered by ascending depth with a stable sort, so slices
    /// sharing a depth keep their input order. Calibration, pixel spacing
    /// and slice thickness all come from the first slice after sorting; the
    /// rescale is applied once to the whole volume even when later slices
    /// carry other coefficients.
    pub fn assemble(
        series_uid: &str,
        series_description: &str,
        mut slices: Vec<Slice>,
    ) -> Result<Volume, VolumeLoaderError> {
        if slices.is_empty() {
            return Err(VolumeLoaderError::EmptySeries(series_uid.to_string()));
        }

        Self::sort_slices(&mut slices);
        Self::validate_dimensions(&slices)?;

        let mut volume_array = Self::build_volume_array(&slices);

        let first = &slices[0];
        if let Some(calibration) = first.calibration {
            if !calibration.slope.is_finite() || !calibration.intercept.is_finite() {
                return Err(VolumeLoaderError::InvalidCalibration {
                    slope: calibration.slope,
                    intercept: calibration.intercept,
                });
            }
            let (slope, intercept) = (calibration.slope as f32, calibration.intercept as f32);
            volume_array.par_mapv_inplace(|v| v.mul_add(slope, intercept));
        }

        Ok(Volume {
            data: volume_array,
            calibration: first.calibration,
            pixel_spacing: first.pixel_spacing.unwrap_or(DEFAULT_PIXEL_SPACING),
            slice_thickness: first.slice_thickness.unwrap_or(DEFAULT_SLICE_THICKNESS),
            series_uid: series_uid.to_string(),
            series_description: series_description.to_string(),
            study: first.study.clone(),
            slice_paths: slices.iter().map(|slice| slice.path.clone()).collect(),
        })
    }

    /// Fully decode one file, pixel data included.
    pub fn decode_slice(path: &Path) -> Result<Slice, VolumeLoaderError> {
        let object = open_file(path).map_err(|source| VolumeLoaderError::Dicom {
            path: path.to_path_buf(),
            source,
        })?;

        let pixel_error = |source| VolumeLoaderError::PixelData {
            path: path.to_path_buf(),
            source,
        };
        let pixel_data = object.decode_pixel_data().map_err(pixel_error)?;
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::None)
            .with_voi_lut(VoiLutOption::Identity);
        let pixels = pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .map_err(pixel_error)?
            .slice_move(s![0, .., .., 0]);

        let position = attributes::floats(&object, tags::IMAGE_POSITION_PATIENT)
            .filter(|pos| pos.len() >= 3)
            .map(|pos| [pos[0], pos[1], pos[2]])
            .unwrap_or([0.0; 3]);

        let pixel_spacing = attributes::floats(&object, tags::PIXEL_SPACING)
            .filter(|spacing| spacing.len() >= 2)
            .map(|spacing| [spacing[0], spacing[1]]);

        let calibration = match (
            attributes::float(&object, tags::RESCALE_SLOPE),
            attributes::float(&object, tags::RESCALE_INTERCEPT),
        ) {
            (Some(slope), Some(intercept)) => Some(Calibration { slope, intercept }),
            _ => None,
        };

        Ok(Slice {
            path: path.to_path_buf(),
            pixels,
            position,
            pixel_spacing,
            slice_thickness: attributes::float(&object, tags::SLICE_THICKNESS),
            calibration,
            study: StudyInfo {
                patient_name: attributes::text(&object, tags::PATIENT_NAME),
                patient_id: attributes::text(&object, tags::PATIENT_ID),
                study_date: attributes::text(&object, tags::STUDY_DATE),
                modality: attributes::text(&object, tags::MODALITY),
            },
        })
    }

    fn sort_slices(slices: &mut [Slice]) {
        slices.sort_by(|a, b| a.depth().total_cmp(&b.depth()));
    }

    fn validate_dimensions(slices: &[Slice]) -> Result<(), VolumeLoaderError> {
        let expected = slices[0].pixels.dim();
        match slices.iter().find(|slice| slice.pixels.dim() != expected) {
            Some(slice) => Err(VolumeLoaderError::InconsistentDimensions {
                path: slice.path.clone(),
                expected,
                found: slice.pixels.dim(),
            }),
            None => Ok(()),
        }
    }

    fn build_volume_array(slices: &[Slice]) -> Array3<f32> {
        let (height, width) = slices[0].pixels.dim();
        let depth = slices.len();
        let mut volume = Array3::<f32>::zeros((depth, height, width));

        for (i, slice) in slices.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(&slice.pixels);
        }

        volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn slice(name: &str, depth: f64, fill: f32) -> Slice {
        Slice {
            path: PathBuf::from(name),
            pixels: Array2::from_elem((2, 3), fill),
            position: [0.0, 0.0, depth],
            pixel_spacing: None,
            slice_thickness: None,
            calibration: None,
            study: StudyInfo::default(),
        }
    }

    #[test]
    fn slices_are_stacked_in_ascending_depth() {
        let slices = vec![
            slice("a", 30.0, 3.0),
            slice("b", 10.0, 1.0),
            slice("c", 20.0, 2.0),
            slice("d", 0.0, 0.0),
        ];
        let volume = VolumeLoader::assemble("S1", "", slices).unwrap();

        assert_eq!(volume.dim(), (4, 2, 3));
        for depth in 0..4 {
            assert_eq!(volume.data[[depth, 1, 2]], depth as f32);
        }
        let names: Vec<_> = volume.slice_paths.iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(names, ["d", "b", "c", "a"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let slices = vec![
            slice("first", 0.0, 1.0),
            slice("second", 0.0, 2.0),
            slice("third", -5.0, 3.0),
        ];
        let volume = VolumeLoader::assemble("S1", "", slices).unwrap();
        let names: Vec<_> = volume.slice_paths.iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(names, ["third", "first", "second"]);
    }

    #[test]
    fn first_slice_calibration_applies_to_whole_volume() {
        let mut low = slice("low", 0.0, 1000.0);
        low.calibration = Some(Calibration {
            slope: 1.0,
            intercept: -1024.0,
        });
        let mut high = slice("high", 5.0, 1000.0);
        high.calibration = Some(Calibration {
            slope: 2.0,
            intercept: 0.0,
        });

        let volume = VolumeLoader::assemble("S1", "", vec![high, low]).unwrap();
        assert!(volume.data.iter().all(|&v| v == -24.0));
        assert_eq!(
            volume.calibration,
            Some(Calibration {
                slope: 1.0,
                intercept: -1024.0
            })
        );
    }

    #[test]
    fn spacing_defaults_when_absent() {
        let volume = VolumeLoader::assemble("S1", "", vec![slice("a", 0.0, 0.0)]).unwrap();
        assert_eq!(volume.pixel_spacing, DEFAULT_PIXEL_SPACING);
        assert_eq!(volume.slice_thickness, DEFAULT_SLICE_THICKNESS);

        let mut calibrated = slice("b", 0.0, 0.0);
        calibrated.pixel_spacing = Some([0.7, 0.8]);
        calibrated.slice_thickness = Some(2.5);
        let volume = VolumeLoader::assemble("S1", "", vec![calibrated]).unwrap();
        assert_eq!(volume.pixel_spacing, [0.7, 0.8]);
        assert_eq!(volume.slice_thickness, 2.5);
    }

    #[test]
    fn empty_series_fails() {
        let err = VolumeLoader::assemble("S9", "", Vec::new()).unwrap_err();
        assert!(matches!(err, VolumeLoaderError::EmptySeries(uid) if uid == "S9"));
    }

    #[test]
    fn mismatched_shapes_fail_without_truncating() {
        let mut odd = slice("odd", 1.0, 0.0);
        odd.pixels = array![[1.0, 2.0]];
        let err = VolumeLoader::assemble("S1", "", vec![slice("a", 0.0, 0.0), odd]).unwrap_err();
        assert!(err.is_build_error());
        assert!(matches!(
            err,
            VolumeLoaderError::InconsistentDimensions {
                expected: (2, 3),
                found: (1, 2),
                ..
            }
        ));
    }

    #[test]
    fn non_finite_calibration_is_rejected() {
        let mut bad = slice("a", 0.0, 0.0);
        bad.calibration = Some(Calibration {
            slope: f64::NAN,
            intercept: 0.0,
        });
        let err = VolumeLoader::assemble("S1", "", vec![bad]).unwrap_err();
        assert!(err.is_build_error());
    }
}
