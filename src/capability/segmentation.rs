use super::{Capability, PanelHost, ProcessingResult, Surface};
use crate::volume::Volume;

const READY: &str = "Ready to run";

/// Lung segmentation panel. It cannot be hidden by configuration.
pub struct SegmentationCapability {
    surface: Surface,
    initialized: bool,
    loaded_shape: Option<(usize, usize, usize)>,
    status: String,
}

impl SegmentationCapability {
    pub fn new(_host: &PanelHost) -> Self {
        Self {
            surface: Surface::default(),
            initialized: false,
            loaded_shape: None,
            status: READY.to_string(),
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    fn redraw(&mut self) {
        self.surface.clear();
        self.surface
            .push_line("Automatic lung segmentation on the selected slice range");
        if let Some((depth, rows, columns)) = self.loaded_shape {
            self.surface
                .push_line(format!("Volume: {depth} x {rows} x {columns}"));
        }
        self.surface.push_line(format!("Status: {}", self.status));
    }
}

impl Capability for SegmentationCapability {
    fn initialize(&mut self) {
        self.surface = Surface::new("Lung segmentation");
        self.initialized = true;
        self.redraw();
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn surface(&self) -> &Surface {
        &self.surface
    }

    fn on_data_loaded(&mut self, volume: &Volume) {
        self.loaded_shape = Some(volume.dim());
        self.status = READY.to_string();
        self.redraw();
    }

    fn on_processing_complete(&mut self, result: &ProcessingResult) {
        self.status = if result.success {
            format!("Segmentation complete ({})", result.mode_id)
        } else {
            format!("Segmentation failed: {}", result.message)
        };
        self.redraw();
    }
}
