use super::{Capability, PanelHost, Surface};
use crate::{viewer::StudyMetadata, volume::Volume};

use ndarray::Array3;
use tracing::debug;

/// Summary statistics of calibrated voxel intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeStatistics {
    pub shape: (usize, usize, usize),
    pub total_voxels: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl VolumeStatistics {
    /// `None` for an empty volume.
    pub fn compute(data: &Array3<f32>) -> Option<Self> {
        let total_voxels = data.len();
        if total_voxels == 0 {
            return None;
        }

        let (min, max, sum) = data.fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &value| {
                let value = f64::from(value);
                (min.min(value), max.max(value), sum + value)
            },
        );
        let mean = sum / total_voxels as f64;
        let variance = data.fold(0.0, |acc, &value| acc + (f64::from(value) - mean).powi(2))
            / total_voxels as f64;

        Some(Self {
            shape: data.dim(),
            total_voxels,
            min,
            max,
            mean,
            median: median(data.iter().copied().collect()),
            std: variance.sqrt(),
        })
    }
}

fn median(mut values: Vec<f32>) -> f64 {
    let len = values.len();
    let (below, upper, _) = values.select_nth_unstable_by(len / 2, f32::total_cmp);
    let upper = f64::from(*upper);
    if len % 2 == 1 {
        return upper;
    }
    let lower = below.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    (f64::from(lower) + upper) / 2.0
}

/// Removable panel showing patient details and intensity statistics.
pub struct StatisticsCapability {
    surface: Surface,
    initialized: bool,
    latest: Option<VolumeStatistics>,
}

impl StatisticsCapability {
    pub fn new(host: &PanelHost) -> Self {
        debug!("Statistics panel bound to {}", host.title);
        Self {
            surface: Surface::default(),
            initialized: false,
            latest: None,
        }
    }

    pub fn latest(&self) -> Option<&VolumeStatistics> {
        self.latest.as_ref()
    }
}

impl Capability for StatisticsCapability {
    fn initialize(&mut self) {
        self.surface = Surface::new("Statistics");
        self.surface.push_line("Load data to see statistics");
        self.initialized = true;
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn surface(&self) -> &Surface {
        &self.surface
    }

    fn on_data_loaded(&mut self, volume: &Volume) {
        let Some(stats) = VolumeStatistics::compute(volume.data()) else {
            return;
        };
        let metadata = StudyMetadata::from_volume(volume);

        self.surface.clear();
        self.surface.push_line(format!("Patient: {}", metadata.patient_name));
        self.surface.push_line(format!("Patient ID: {}", metadata.patient_id));
        self.surface.push_line(format!("Study date: {}", metadata.study_date));
        self.surface.push_line(format!("Modality: {}", metadata.modality));
        let (depth, rows, columns) = stats.shape;
        self.surface
            .push_line(format!("Dimensions: {depth} x {rows} x {columns}"));
        self.surface
            .push_line(format!("Voxels: {}", stats.total_voxels));
        self.surface.push_line(format!("Min: {:.1} HU", stats.min));
        self.surface.push_line(format!("Max: {:.1} HU", stats.max));
        self.surface.push_line(format!("Mean: {:.1} HU", stats.mean));
        self.surface.push_line(format!("Median: {:.1} HU", stats.median));
        self.surface.push_line(format!("Std: {:.1} HU", stats.std));

        self.latest = Some(stats);
    }

    fn cleanup(&mut self) {
        self.latest = None;
        self.surface.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Role, Session};
    use ndarray::array;

    #[test]
    fn statistics_of_small_volume() {
        let data = array![[[-1000.0_f32, 0.0], [40.0, 60.0]]];
        let stats = VolumeStatistics::compute(&data).unwrap();
        assert_eq!(stats.shape, (1, 2, 2));
        assert_eq!(stats.total_voxels, 4);
        assert_eq!(stats.min, -1000.0);
        assert_eq!(stats.max, 60.0);
        assert_eq!(stats.mean, -225.0);
        assert_eq!(stats.median, 20.0);
        // squared deviations from -225 sum to 802700
        assert!((stats.std - (802_700.0_f64 / 4.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn odd_count_median_is_middle_value() {
        let data = array![[[5.0_f32, 1.0, 3.0]]];
        assert_eq!(VolumeStatistics::compute(&data).unwrap().median, 3.0);
        assert!(VolumeStatistics::compute(&Array3::zeros((0, 2, 2))).is_none());
    }

    #[test]
    fn panel_renders_after_data_loaded() {
        let host = PanelHost::new("side", Session::start(Role::User));
        let mut panel = StatisticsCapability::new(&host);
        panel.initialize();
        assert_eq!(panel.surface().title(), "Statistics");

        panel.on_data_loaded(&Volume::new(array![[[1.0_f32, 3.0]]]));
        assert!(panel.surface().lines().contains(&"Mean: 2.0 HU".to_string()));
        assert!(panel.surface().lines().contains(&"Patient: N/A".to_string()));
        assert_eq!(panel.latest().unwrap().total_voxels, 2);

        panel.cleanup();
        assert!(panel.latest().is_none());
    }
}
