//! Optional viewer panels ("capabilities") discovered at startup.
//!
//! A capability is a type implementing [`Capability`]. Which capabilities
//! exist is not hard-wired: [`registry::CapabilityRegistry::discover`] reads
//! capability unit files from a directory, and each unit names the entry
//! points (see [`catalog::CapabilityCatalog`]) it exports together with the
//! metadata describing them.
//!
//! # Unit files
//!
//! Units are JSON files whose name ends in `_module.json`; files starting
//! with `_` are ignored.
//!
//! ```json
//! {
//!   "types": [
//!     {
//!       "name": "StatisticsModule",
//!       "entry": "statistics",
//!       "metadata": {
//!         "id": "statistics",
//!         "name": "Study statistics",
//!         "version": "1.0.0",
//!         "description": "Intensity statistics of the loaded volume",
//!         "removable": true
//!       }
//!     }
//!   ]
//! }
//! ```

pub mod catalog;
pub mod registry;
pub mod segmentation;
pub mod statistics;

use crate::{session::Session, volume::Volume};

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

pub use catalog::{CapabilityCatalog, Constructor};
pub use registry::CapabilityRegistry;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Capability directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid capability unit {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Capability type `{type_name}` in {path} rejected: {reason}")]
    Discovery {
        path: PathBuf,
        type_name: String,
        reason: String,
    },

    #[error("Capability `{0}` is not registered")]
    NotFound(String),

    #[error("Capability `{id}` could not be constructed: {reason}")]
    Construction { id: String, reason: String },
}

/// Metadata as written in a unit file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawMetadata {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_removable")]
    pub removable: bool,
}

fn default_removable() -> bool {
    true
}

/// Registered description of a capability.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDescriptor {
    /// Registry key: the metadata id, or the lowercased type name when it has none.
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub removable: bool,
    /// Type name inside the unit file.
    pub type_name: String,
    /// Entry point the constructor was resolved from.
    pub entry: String,
    pub source: PathBuf,
}

/// What a capability instance is bound to when constructed.
#[derive(Debug, Clone)]
pub struct PanelHost {
    pub title: String,
    pub session: Session,
}

impl PanelHost {
    pub fn new(title: impl Into<String>, session: Session) -> Self {
        Self {
            title: title.into(),
            session,
        }
    }
}

/// Text display surface a capability renders into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Surface {
    title: String,
    lines: Vec<String>,
}

impl Surface {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Outcome of a processing run, broadcast to every active capability.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    pub mode_id: String,
    pub success: bool,
    pub message: String,
}

/// Contract every panel fulfils.
///
/// `initialize` is called exactly once after construction and before any
/// notification. The notification hooks and `cleanup` default to no-ops.
pub trait Capability: Send {
    /// Build the display surface.
    fn initialize(&mut self);

    fn is_initialized(&self) -> bool;

    fn surface(&self) -> &Surface;

    fn on_data_loaded(&mut self, _volume: &Volume) {}

    fn on_processing_complete(&mut self, _result: &ProcessingResult) {}

    fn cleanup(&mut self) {}
}
