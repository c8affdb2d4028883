use super::{
    Capability, CapabilityCatalog, CapabilityDescriptor, CapabilityError, Constructor, PanelHost,
    RawMetadata,
};

use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Suffix identifying capability unit files.
pub const UNIT_SUFFIX: &str = "_module.json";

/// Units whose file name starts with this prefix are skipped.
pub const PRIVATE_PREFIX: &str = "_";

#[derive(Debug, Deserialize)]
struct CapabilityUnit {
    #[serde(default)]
    types: Vec<serde_json::Value>,
}

/// One exported type; every part of the contract is optional here so that
/// a non-conforming type is rejected on its own instead of failing the unit.
#[derive(Debug, Deserialize)]
struct TypeDefinition {
    name: String,
    entry: Option<String>,
    metadata: Option<serde_json::Value>,
}

struct Registration {
    descriptor: CapabilityDescriptor,
    constructor: Constructor,
}

/// Capabilities found by the last discovery, in discovery order.
pub struct CapabilityRegistry {
    catalog: CapabilityCatalog,
    registrations: Vec<Registration>,
}

impl CapabilityRegistry {
    pub fn new(catalog: CapabilityCatalog) -> Self {
        Self {
            catalog,
            registrations: Vec::new(),
        }
    }

    /// Rebuild the registry from the unit files in `dir`.
    ///
    /// Unreadable units and non-conforming types are logged and skipped.
    /// When two types share an id the later one wins but keeps the earlier
    /// position. Returns the number of registered capabilities.
    ///
    /// # Errors
    ///
    /// Only a missing or unreadable directory fails discovery as a whole;
    /// the registry is empty afterwards.
    pub fn discover(&mut self, dir: impl AsRef<Path>) -> Result<usize, CapabilityError> {
        self.registrations.clear();
        let dir = dir.as_ref();
        info!("Looking for capabilities in {}", dir.display());

        if !dir.is_dir() {
            return Err(CapabilityError::DirectoryNotFound(dir.to_path_buf()));
        }

        for path in Self::unit_files(dir)? {
            if let Err(err) = self.load_unit(&path) {
                warn!("Skipping capability unit: {}", err);
            }
        }

        info!("Registered {} capabilities", self.registrations.len());
        Ok(self.registrations.len())
    }

    /// Unit files directly inside `dir`, sorted by name.
    fn unit_files(dir: &Path) -> Result<Vec<PathBuf>, CapabilityError> {
        let io_error = |source| CapabilityError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(io_error)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|s| s.to_str())
                    .is_some_and(|name| {
                        name.ends_with(UNIT_SUFFIX) && !name.starts_with(PRIVATE_PREFIX)
                    })
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn load_unit(&mut self, path: &Path) -> Result<(), CapabilityError> {
        let text = fs::read_to_string(path).map_err(|source| CapabilityError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let unit: CapabilityUnit =
            serde_json::from_str(&text).map_err(|source| CapabilityError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        for value in unit.types {
            match self.check_type(path, value) {
                Ok(registration) => self.insert(registration),
                Err(err) => warn!("{}", err),
            }
        }
        Ok(())
    }

    /// Validate one exported type against the capability contract.
    fn check_type(
        &self,
        path: &Path,
        value: serde_json::Value,
    ) -> Result<Registration, CapabilityError> {
        let definition: TypeDefinition =
            serde_json::from_value(value).map_err(|err| CapabilityError::Discovery {
                path: path.to_path_buf(),
                type_name: "<unnamed>".to_string(),
                reason: err.to_string(),
            })?;

        let reject = |reason: String| CapabilityError::Discovery {
            path: path.to_path_buf(),
            type_name: definition.name.clone(),
            reason,
        };

        let metadata = definition
            .metadata
            .clone()
            .ok_or_else(|| reject("no metadata".to_string()))?;
        let metadata: RawMetadata = serde_json::from_value(metadata)
            .map_err(|err| reject(format!("malformed metadata: {err}")))?;

        let entry = definition
            .entry
            .clone()
            .ok_or_else(|| reject("no entry point".to_string()))?;
        let constructor = self
            .catalog
            .resolve(&entry)
            .ok_or_else(|| reject(format!("unknown entry point `{entry}`")))?;

        let id = metadata
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| definition.name.to_lowercase());

        Ok(Registration {
            descriptor: CapabilityDescriptor {
                name: metadata.name.unwrap_or_else(|| id.clone()),
                id,
                version: metadata.version,
                description: metadata.description,
                removable: metadata.removable,
                type_name: definition.name,
                entry,
                source: path.to_path_buf(),
            },
            constructor,
        })
    }

    fn insert(&mut self, registration: Registration) {
        debug!(
            "Registered capability {} ({})",
            registration.descriptor.id, registration.descriptor.name
        );
        match self
            .registrations
            .iter_mut()
            .find(|existing| existing.descriptor.id == registration.descriptor.id)
        {
            Some(existing) => {
                warn!(
                    "Capability id {} redefined in {}",
                    registration.descriptor.id,
                    registration.descriptor.source.display()
                );
                *existing = registration;
            }
            None => self.registrations.push(registration),
        }
    }

    /// Build a fresh instance of capability `id` bound to `host`.
    ///
    /// The instance is not yet initialized.
    pub fn instantiate(
        &self,
        id: &str,
        host: &PanelHost,
    ) -> Result<Box<dyn Capability>, CapabilityError> {
        let registration = self
            .registrations
            .iter()
            .find(|registration| registration.descriptor.id == id)
            .ok_or_else(|| CapabilityError::NotFound(id.to_string()))?;

        (registration.constructor)(host).map_err(|err| match err {
            CapabilityError::Construction { .. } => err,
            other => CapabilityError::Construction {
                id: id.to_string(),
                reason: other.to_string(),
            },
        })
    }

    pub fn get(&self, id: &str) -> Option<&CapabilityDescriptor> {
        self.descriptors().find(|descriptor| descriptor.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.registrations
            .iter()
            .map(|registration| &registration.descriptor)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}
