use super::{
    Capability, CapabilityError, PanelHost, segmentation::SegmentationCapability,
    statistics::StatisticsCapability,
};

use std::{collections::BTreeMap, fmt, sync::Arc};

/// Builds a capability instance for a host.
pub type Constructor =
    Arc<dyn Fn(&PanelHost) -> Result<Box<dyn Capability>, CapabilityError> + Send + Sync>;

pub const STATISTICS_ENTRY: &str = "statistics";
pub const SEGMENTATION_ENTRY: &str = "segmentation";

/// Table of entry points capability units may export.
///
/// A unit file can only name entry points present here; this is the
/// compiled half of discovery, the unit files being the declarative half.
#[derive(Clone, Default)]
pub struct CapabilityCatalog {
    entries: BTreeMap<String, Constructor>,
}

impl CapabilityCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the capabilities shipped in this crate.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog
            .register(STATISTICS_ENTRY, |host| {
                Ok(Box::new(StatisticsCapability::new(host)))
            })
            .register(SEGMENTATION_ENTRY, |host| {
                Ok(Box::new(SegmentationCapability::new(host)))
            });
        catalog
    }

    /// Add or replace an entry point.
    pub fn register<F>(&mut self, entry: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&PanelHost) -> Result<Box<dyn Capability>, CapabilityError> + Send + Sync + 'static,
    {
        self.entries.insert(entry.into(), Arc::new(constructor));
        self
    }

    pub fn resolve(&self, entry: &str) -> Option<Constructor> {
        self.entries.get(entry).cloned()
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for CapabilityCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}
