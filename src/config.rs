//! Persisted viewer configuration: which panels are shown and in what order,
//! the processing modes on offer and the layout of projections and toolbar.
//!
//! The configuration lives in one pretty-printed JSON file. It is created
//! with defaults on first use and written back after every change.
//!
//! ```json
//! {
//!   "processing_modes": [
//!     { "id": "mode_1", "name": "Basic lung segmentation",
//!       "parameters": { "threshold": -500, "smooth": true } }
//!   ],
//!   "modules": {
//!     "segmentation": { "visible": true, "enabled": true, "order": 1,
//!                       "name": "Segmentation", "removable": false }
//!   },
//!   "ui_layout": {
//!     "projection_order": ["axial", "sagittal", "coronal"],
//!     "toolbar_order": ["load", "save", "reset"]
//!   }
//! }
//! ```

use crate::enums::Orientation;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Order given to modules registered without one.
pub const DEFAULT_MODULE_ORDER: i64 = 999;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Module `{0}` cannot be hidden")]
    NotRemovable(String),

    #[error("Unknown module `{0}`")]
    UnknownModule(String),

    #[error("Unknown processing mode `{0}`")]
    UnknownMode(String),
}

fn yes() -> bool {
    true
}

fn default_order() -> i64 {
    DEFAULT_MODULE_ORDER
}

/// Per-capability display settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default = "default_order")]
    pub order: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "yes")]
    pub removable: bool,
}

impl ModuleConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            visible: true,
            enabled: true,
            order: DEFAULT_MODULE_ORDER,
            name: name.into(),
            removable: true,
        }
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_removable(mut self, removable: bool) -> Self {
        self.removable = removable;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiLayout {
    #[serde(default = "default_projection_order")]
    pub projection_order: Vec<Orientation>,
    #[serde(default = "default_toolbar_order")]
    pub toolbar_order: Vec<String>,
}

fn default_projection_order() -> Vec<Orientation> {
    Orientation::ALL.to_vec()
}

fn default_toolbar_order() -> Vec<String> {
    ["load", "save", "reset"].map(String::from).to_vec()
}

impl Default for UiLayout {
    fn default() -> Self {
        Self {
            projection_order: default_projection_order(),
            toolbar_order: default_toolbar_order(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub processing_modes: Vec<ProcessingMode>,
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleConfig>,
    #[serde(default)]
    pub ui_layout: UiLayout,
}

fn parameters(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut modules = BTreeMap::new();
        modules.insert(
            "segmentation".to_string(),
            ModuleConfig::new("Segmentation")
                .with_order(1)
                .with_removable(false),
        );
        modules.insert(
            "statistics".to_string(),
            ModuleConfig::new("Study statistics").with_order(2),
        );

        Self {
            processing_modes: vec![
                ProcessingMode {
                    id: "mode_1".to_string(),
                    name: "Basic lung segmentation".to_string(),
                    parameters: parameters(json!({ "threshold": -500, "smooth": true })),
                },
                ProcessingMode {
                    id: "mode_2".to_string(),
                    name: "Detailed segmentation".to_string(),
                    parameters: parameters(
                        json!({ "threshold": -600, "smooth": true, "refine": true }),
                    ),
                },
            ],
            modules,
            ui_layout: UiLayout::default(),
        }
    }
}

/// Owner of the configuration file.
#[derive(Debug)]
pub struct ConfigManager {
    path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// Open `path`, creating it with defaults if it does not exist.
    ///
    /// A file that exists but cannot be read or parsed is left untouched and
    /// the defaults are used instead.
    ///
    /// # Errors
    ///
    /// Fails only if a missing file cannot be created.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            let manager = Self {
                path,
                config: AppConfig::default(),
            };
            manager.save()?;
            info!("Created configuration file {}", manager.path.display());
            return Ok(manager);
        }

        let config = match Self::read(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!("Using default configuration: {}", err);
                AppConfig::default()
            }
        };
        Ok(Self { path, config })
    }

    fn read(path: &Path) -> Result<AppConfig, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(&self.config)?;
        fs::write(&self.path, text).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Modules
    // -------------------------------------------------------------------------

    pub fn modules(&self) -> &BTreeMap<String, ModuleConfig> {
        &self.config.modules
    }

    pub fn module(&self, id: &str) -> Option<&ModuleConfig> {
        self.config.modules.get(id)
    }

    /// Visible modules sorted by `order`, then id.
    pub fn visible_modules(&self) -> Vec<(&str, &ModuleConfig)> {
        let mut visible: Vec<_> = self
            .config
            .modules
            .iter()
            .filter(|(_, module)| module.visible)
            .map(|(id, module)| (id.as_str(), module))
            .collect();
        visible.sort_by_key(|(id, module)| (module.order, *id));
        visible
    }

    /// Show or hide a module.
    ///
    /// # Errors
    ///
    /// Hiding a module marked non-removable fails with
    /// [`ConfigError::NotRemovable`] and leaves it visible.
    pub fn set_visibility(&mut self, id: &str, visible: bool) -> Result<(), ConfigError> {
        let module = self
            .config
            .modules
            .get_mut(id)
            .ok_or_else(|| ConfigError::UnknownModule(id.to_string()))?;

        if !visible && !module.removable {
            warn!("Module {} cannot be hidden", id);
            return Err(ConfigError::NotRemovable(id.to_string()));
        }

        module.visible = visible;
        self.save()
    }

    pub fn rename_module(&mut self, id: &str, name: impl Into<String>) -> Result<(), ConfigError> {
        let module = self
            .config
            .modules
            .get_mut(id)
            .ok_or_else(|| ConfigError::UnknownModule(id.to_string()))?;
        module.name = name.into();
        self.save()
    }

    /// Add a module unless one with the same id is already configured.
    ///
    /// Returns whether the module was added.
    pub fn register_module(&mut self, id: &str, module: ModuleConfig) -> Result<bool, ConfigError> {
        if self.config.modules.contains_key(id) {
            return Ok(false);
        }
        self.config.modules.insert(id.to_string(), module);
        self.save()?;
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Processing modes
    // -------------------------------------------------------------------------

    pub fn processing_modes(&self) -> &[ProcessingMode] {
        &self.config.processing_modes
    }

    pub fn processing_mode(&self, id: &str) -> Option<&ProcessingMode> {
        self.config.processing_modes.iter().find(|mode| mode.id == id)
    }

    /// Add a mode under a generated `mode_xxxxxxxx` id and return the id.
    pub fn add_processing_mode(
        &mut self,
        name: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Result<String, ConfigError> {
        let id = self.fresh_mode_id();
        self.config.processing_modes.push(ProcessingMode {
            id: id.clone(),
            name: name.into(),
            parameters,
        });
        self.save()?;
        Ok(id)
    }

    /// Change the name and/or parameters of a mode. `None` keeps the current value.
    pub fn update_processing_mode(
        &mut self,
        id: &str,
        name: Option<String>,
        parameters: Option<Map<String, Value>>,
    ) -> Result<(), ConfigError> {
        let mode = self
            .config
            .processing_modes
            .iter_mut()
            .find(|mode| mode.id == id)
            .ok_or_else(|| ConfigError::UnknownMode(id.to_string()))?;

        if let Some(name) = name.filter(|name| !name.is_empty()) {
            mode.name = name;
        }
        if let Some(parameters) = parameters {
            mode.parameters = parameters;
        }
        self.save()
    }

    pub fn delete_processing_mode(&mut self, id: &str) -> Result<(), ConfigError> {
        let before = self.config.processing_modes.len();
        self.config.processing_modes.retain(|mode| mode.id != id);
        if self.config.processing_modes.len() == before {
            return Err(ConfigError::UnknownMode(id.to_string()));
        }
        self.save()
    }

    fn fresh_mode_id(&self) -> String {
        loop {
            let uuid = Uuid::new_v4().simple().to_string();
            let id = format!("mode_{}", &uuid[..8]);
            if self.processing_mode(&id).is_none() {
                return id;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Layout
    // -------------------------------------------------------------------------

    pub fn ui_layout(&self) -> &UiLayout {
        &self.config.ui_layout
    }

    pub fn set_projection_order(&mut self, order: Vec<Orientation>) -> Result<(), ConfigError> {
        self.config.ui_layout.projection_order = order;
        self.save()
    }

    pub fn set_toolbar_order(&mut self, order: Vec<String>) -> Result<(), ConfigError> {
        self.config.ui_layout.toolbar_order = order;
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (tempfile::TempDir, ConfigManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load_or_create(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        (dir, manager)
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let (_dir, manager) = fresh();
        assert!(manager.path().exists());
        assert_eq!(manager.config(), &AppConfig::default());

        let reopened = ConfigManager::load_or_create(manager.path()).unwrap();
        assert_eq!(reopened.config(), manager.config());
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ broken").unwrap();

        let manager = ConfigManager::load_or_create(&path).unwrap();
        assert_eq!(manager.config(), &AppConfig::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ broken");
    }

    #[test]
    fn non_removable_module_stays_visible() {
        let (_dir, mut manager) = fresh();
        let err = manager.set_visibility("segmentation", false).unwrap_err();
        assert!(matches!(err, ConfigError::NotRemovable(_)));
        assert!(manager.module("segmentation").unwrap().visible);

        manager.set_visibility("statistics", false).unwrap();
        let reopened = ConfigManager::load_or_create(manager.path()).unwrap();
        assert!(!reopened.module("statistics").unwrap().visible);
        assert!(matches!(
            manager.set_visibility("nope", true),
            Err(ConfigError::UnknownModule(_))
        ));
    }

    #[test]
    fn visible_modules_follow_order() {
        let (_dir, mut manager) = fresh();
        manager
            .register_module("annotations", ModuleConfig::new("Annotations").with_order(0))
            .unwrap();
        manager.register_module("zoom", ModuleConfig::new("Zoom")).unwrap();

        let ids: Vec<_> = manager.visible_modules().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["annotations", "segmentation", "statistics", "zoom"]);
    }

    #[test]
    fn register_does_not_overwrite() {
        let (_dir, mut manager) = fresh();
        let added = manager
            .register_module("statistics", ModuleConfig::new("Other").with_order(5))
            .unwrap();
        assert!(!added);
        assert_eq!(manager.module("statistics").unwrap().name, "Study statistics");

        manager.rename_module("statistics", "Stats").unwrap();
        assert_eq!(manager.module("statistics").unwrap().name, "Stats");
    }

    #[test]
    fn missing_module_fields_take_defaults() {
        let module: ModuleConfig = serde_json::from_str(r#"{"name": "Zoom"}"#).unwrap();
        assert_eq!(module, ModuleConfig::new("Zoom"));
    }

    #[test]
    fn processing_mode_crud() {
        let (_dir, mut manager) = fresh();
        let id = manager
            .add_processing_mode("Custom", parameters(json!({ "threshold": -450 })))
            .unwrap();
        assert!(id.starts_with("mode_"));
        assert_eq!(id.len(), "mode_".len() + 8);

        manager
            .update_processing_mode(&id, Some("Renamed".to_string()), None)
            .unwrap();
        let mode = manager.processing_mode(&id).unwrap();
        assert_eq!(mode.name, "Renamed");
        assert_eq!(mode.parameters["threshold"], json!(-450));

        manager.delete_processing_mode(&id).unwrap();
        assert!(manager.processing_mode(&id).is_none());
        assert!(matches!(
            manager.delete_processing_mode(&id),
            Err(ConfigError::UnknownMode(_))
        ));
    }

    #[test]
    fn new_mode_ids_are_distinct_hex() {
        let (_dir, mut manager) = fresh();
        let ids: Vec<_> = (0..16)
            .map(|i| {
                manager
                    .add_processing_mode(format!("Mode {i}"), Map::new())
                    .unwrap()
            })
            .collect();

        for id in &ids {
            let suffix = id.strip_prefix("mode_").unwrap();
            assert_eq!(suffix.len(), 8);
            assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
        }
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(manager.processing_modes().len(), 2 + ids.len());
    }

    #[test]
    fn layout_orders_persist() {
        let (_dir, mut manager) = fresh();
        manager
            .set_projection_order(vec![Orientation::Coronal, Orientation::Axial])
            .unwrap();
        manager
            .set_toolbar_order(vec!["save".to_string(), "load".to_string()])
            .unwrap();

        let reopened = ConfigManager::load_or_create(manager.path()).unwrap();
        assert_eq!(
            reopened.ui_layout().projection_order,
            [Orientation::Coronal, Orientation::Axial]
        );
        assert_eq!(reopened.ui_layout().toolbar_order, ["save", "load"]);
    }
}
