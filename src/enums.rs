use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Viewing axis of a cross-section.
///
/// The volume is stored as (depth, row, column), so each orientation
/// names the axis held fixed when a plane is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Axial,
    Sagittal,
    Coronal,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Axial,
        Orientation::Sagittal,
        Orientation::Coronal,
    ];

    /// The literal key used in configuration and on the command line.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Orientation::Axial => "axial",
            Orientation::Sagittal => "sagittal",
            Orientation::Coronal => "coronal",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown orientation `{0}` (expected axial, sagittal or coronal)")]
pub struct ParseOrientationError(pub String);

impl FromStr for Orientation {
    type Err = ParseOrientationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "axial" => Ok(Orientation::Axial),
            "sagittal" => Ok(Orientation::Sagittal),
            "coronal" => Ok(Orientation::Coronal),
            other => Err(ParseOrientationError(other.to_string())),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    /// Resample sagittal and coronal planes to an isotropic pixel aspect.
    Bilinear(Processor),
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Processor {
    CPU,
}

/// Window/level presets offered for CT intensities (Hounsfield units).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPreset {
    Lung,
    Mediastinum,
    Bone,
    SoftTissue,
}

impl WindowPreset {
    pub const ALL: [WindowPreset; 4] = [
        WindowPreset::Lung,
        WindowPreset::Mediastinum,
        WindowPreset::Bone,
        WindowPreset::SoftTissue,
    ];

    /// (center, width)
    pub const fn center_width(&self) -> (f32, f32) {
        match self {
            WindowPreset::Lung => (-600.0, 1500.0),
            WindowPreset::Mediastinum => (40.0, 400.0),
            WindowPreset::Bone => (300.0, 1500.0),
            WindowPreset::SoftTissue => (40.0, 350.0),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            WindowPreset::Lung => "lung",
            WindowPreset::Mediastinum => "mediastinum",
            WindowPreset::Bone => "bone",
            WindowPreset::SoftTissue => "soft-tissue",
        }
    }
}

impl FromStr for WindowPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowPreset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown window preset `{s}`"))
    }
}
