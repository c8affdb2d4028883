//! State shared by the viewer's projections: the current volume and the
//! working slice range.

use crate::{
    cancel::CancelToken,
    series::{ScanError, ScanOptions, Series, SeriesIndexer},
    volume::Volume,
    volume_loader::{VolumeLoader, VolumeLoaderError},
};

use std::{path::Path, sync::Arc};
use tracing::{info, warn};

const NOT_AVAILABLE: &str = "N/A";

/// Patient/study summary of the current volume.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyMetadata {
    pub patient_name: String,
    pub patient_id: String,
    pub study_date: String,
    pub modality: String,
    pub series_description: String,
    pub num_slices: usize,
}

impl StudyMetadata {
    pub fn from_volume(volume: &Volume) -> Self {
        let or_na = |value: &Option<String>| {
            value.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())
        };
        Self {
            patient_name: or_na(&volume.study.patient_name),
            patient_id: or_na(&volume.study.patient_id),
            study_date: or_na(&volume.study.study_date),
            modality: or_na(&volume.study.modality),
            series_description: volume.series_description.clone(),
            num_slices: volume.dim().0,
        }
    }
}

/// Holder of the one volume being viewed.
///
/// A new volume only replaces the current one once it is fully built; a
/// failed load leaves the previous volume in place.
#[derive(Debug, Default)]
pub struct VolumeSlot {
    indexer: SeriesIndexer,
    current: Option<Arc<Volume>>,
}

impl VolumeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rescan `path` for series. The current volume is kept.
    pub fn scan(
        &mut self,
        path: impl AsRef<Path>,
        options: &ScanOptions,
        cancel: &CancelToken,
    ) -> Result<&[Series], ScanError> {
        self.indexer.scan(path, options, cancel)
    }

    pub fn series(&self) -> &[Series] {
        self.indexer.series()
    }

    pub fn indexer(&self) -> &SeriesIndexer {
        &self.indexer
    }

    /// Load a series from the last scan and make it current.
    pub fn load_series(
        &mut self,
        uid: &str,
        cancel: &CancelToken,
    ) -> Result<Arc<Volume>, VolumeLoaderError> {
        let series = self
            .indexer
            .get(uid)
            .cloned()
            .ok_or_else(|| VolumeLoaderError::UnknownSeries(uid.to_string()))?;
        self.load(series, cancel)
    }

    /// Load any series and make it current.
    pub fn load(
        &mut self,
        series: Series,
        cancel: &CancelToken,
    ) -> Result<Arc<Volume>, VolumeLoaderError> {
        match VolumeLoader::load(&series, cancel) {
            Ok(volume) => {
                let volume = Arc::new(volume);
                self.current = Some(Arc::clone(&volume));
                info!("Series {} is now current", series.uid);
                Ok(volume)
            }
            Err(err) => {
                warn!("Keeping previous volume, load of {} failed: {}", series.uid, err);
                Err(err)
            }
        }
    }

    pub fn current(&self) -> Option<Arc<Volume>> {
        self.current.clone()
    }

    pub fn metadata(&self) -> Option<StudyMetadata> {
        self.current.as_deref().map(StudyMetadata::from_volume)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Inclusive range of axial slices processing is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRange {
    start: usize,
    end: usize,
}

impl SliceRange {
    /// Clamp `start`/`end` into `0..depth`, pulling `end` up to `start`
    /// when they cross. Returns `None` for an empty volume.
    pub fn new(start: usize, end: usize, depth: usize) -> Option<Self> {
        let last = depth.checked_sub(1)?;
        let start = start.min(last);
        let end = end.min(last).max(start);
        Some(Self { start, end })
    }

    /// The whole depth of a volume.
    pub fn full(depth: usize) -> Option<Self> {
        Self::new(0, usize::MAX, depth)
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of slices covered; never zero.
    pub fn count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }
}
