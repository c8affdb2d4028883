//! # CT viewer core
//!
//! This crate holds the non-graphical core of a CT study viewer built on the
//! dicom-rs ecosystem.
//!
//! A directory of DICOM files is scanned and grouped into series by
//! Series Instance UID. Headers are read in parallel using rayon, stopping
//! before the pixel data. A selected series is decoded into a 3D volume:
//! slices are sorted by the z component of Image Position (Patient) and
//! the rescale slope/intercept of the first slice maps the whole volume to
//! Hounsfield units. The volume can be cut along the three medical axes:
//!  - Axial
//!  - Sagittal
//!  - Coronal
//!
//! and each plane windowed into an 8-bit image, optionally resampled to
//! preserve the aspect ratio of sagittal and coronal planes.
//!
//! Around the volume sit optional panels ("capabilities"), discovered from
//! unit files at startup, configured in a JSON file and driven by the
//! [`PanelOrchestrator`].
//!
//! # Examples
//!
//! ## Loading a series and rendering its center slice
//!
//! ```no_run
//! # use ct_viewer::{CancelToken, Orientation, Interpolation, Processor, ScanOptions, VolumeSlot, WindowPreset, WindowSetting};
//! let mut viewer = VolumeSlot::new();
//! let cancel = CancelToken::new();
//! let uid = viewer
//!     .scan("study", &ScanOptions::default(), &cancel)
//!     .expect("should have scanned the study directory")
//!     .first()
//!     .map(|series| series.uid.clone())
//!     .expect("should have found a series");
//! let volume = viewer
//!     .load_series(&uid, &cancel)
//!     .expect("should have loaded the series");
//! let index = volume.center_index(Orientation::Sagittal);
//! let image = volume
//!     .render(
//!         index,
//!         Orientation::Sagittal,
//!         &WindowSetting::from(WindowPreset::Lung),
//!         Interpolation::Bilinear(Processor::CPU),
//!     )
//!     .expect("should have rendered the center slice");
//! image.save("sagittal.png");
//! ```

mod attributes;
pub mod cancel;
pub mod capability;
pub mod config;
pub mod enums;
mod interpolator;
pub mod orchestrator;
pub mod series;
pub mod session;
pub mod sniffer;
pub mod viewer;
pub mod volume;
pub mod volume_loader;
pub mod window;

pub use cancel::CancelToken;
pub use capability::{Capability, CapabilityCatalog, CapabilityError, CapabilityRegistry};
pub use config::{ConfigError, ConfigManager};
pub use enums::{Interpolation, Orientation, Processor, WindowPreset};
pub use orchestrator::{OrchestratorError, PanelOrchestrator};
pub use series::{ScanError, ScanOptions, Series, SeriesIndexer};
pub use session::{Role, Session};
pub use sniffer::is_slice_file;
pub use viewer::{SliceRange, StudyMetadata, VolumeSlot};
pub use volume::Volume;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
pub use window::{WindowSetting, apply_window};
