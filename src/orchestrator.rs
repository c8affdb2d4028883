//! Owns the active capability panels and dispatches viewer events to them.

use crate::{
    capability::{Capability, CapabilityError, CapabilityRegistry, PanelHost, ProcessingResult},
    config::{ConfigError, ConfigManager, ModuleConfig},
    session::Session,
    volume::Volume,
};

use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error("Changing `{0}` requires an administrator session")]
    PermissionDenied(String),
}

struct ActivePanel {
    id: String,
    instance: Box<dyn Capability>,
}

/// Active panels in instantiation order.
///
/// Notifications are delivered to every panel, one after the other, in the
/// order the panels were instantiated.
pub struct PanelOrchestrator {
    registry: CapabilityRegistry,
    config: ConfigManager,
    session: Session,
    active: Vec<ActivePanel>,
}

impl PanelOrchestrator {
    pub fn new(registry: CapabilityRegistry, config: ConfigManager, session: Session) -> Self {
        Self {
            registry,
            config,
            session,
            active: Vec::new(),
        }
    }

    /// Discover capabilities in `dir`, register them into the configuration
    /// and activate the visible ones.
    pub fn start(&mut self, dir: impl AsRef<Path>) -> Result<usize, OrchestratorError> {
        self.registry.discover(dir)?;
        self.register_discovered()?;
        Ok(self.activate_visible())
    }

    /// Add a configuration entry for every discovered capability that has none.
    ///
    /// Returns the number of entries added.
    pub fn register_discovered(&mut self) -> Result<usize, OrchestratorError> {
        let mut added = 0;
        for descriptor in self.registry.descriptors() {
            let module = ModuleConfig::new(descriptor.name.clone())
                .with_removable(descriptor.removable);
            if self.config.register_module(&descriptor.id, module)? {
                info!("Added module {} to configuration", descriptor.id);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Instantiate every visible and enabled module in configured order.
    ///
    /// Modules already active are left alone. A module that fails to
    /// instantiate is logged and skipped. Returns the number of active panels.
    pub fn activate_visible(&mut self) -> usize {
        let ids: Vec<String> = self
            .config
            .visible_modules()
            .into_iter()
            .filter(|(_, module)| module.enabled)
            .map(|(id, _)| id.to_string())
            .collect();

        for id in ids {
            if self.is_active(&id) {
                continue;
            }
            if let Err(err) = self.activate(&id) {
                warn!("Panel {} not shown: {}", id, err);
            }
        }
        self.active.len()
    }

    fn activate(&mut self, id: &str) -> Result<(), CapabilityError> {
        let title = self
            .config
            .module(id)
            .map(|module| module.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| id.to_string());
        let host = PanelHost::new(title, self.session.clone());

        let mut instance = self.registry.instantiate(id, &host)?;
        instance.initialize();
        debug!("Activated panel {}", id);
        self.active.push(ActivePanel {
            id: id.to_string(),
            instance,
        });
        Ok(())
    }

    pub fn notify_data_loaded(&mut self, volume: &Volume) {
        for panel in &mut self.active {
            panel.instance.on_data_loaded(volume);
        }
    }

    pub fn notify_processing_complete(&mut self, result: &ProcessingResult) {
        for panel in &mut self.active {
            panel.instance.on_processing_complete(result);
        }
    }

    /// Show or hide a module. Requires an administrator session.
    ///
    /// Hiding cleans up and drops the active panel; showing instantiates it
    /// at the end of the dispatch order. A module is only recorded as visible
    /// once its panel could be instantiated.
    pub fn set_visibility(&mut self, id: &str, visible: bool) -> Result<(), OrchestratorError> {
        if !self.session.is_admin() {
            return Err(OrchestratorError::PermissionDenied(id.to_string()));
        }
        if !visible {
            self.config.set_visibility(id, false)?;
            self.deactivate(id);
            return Ok(());
        }

        let module = self
            .config
            .module(id)
            .ok_or_else(|| ConfigError::UnknownModule(id.to_string()))?;
        let activated = module.enabled && !self.is_active(id);
        if activated {
            self.activate(id)?;
        }
        if let Err(err) = self.config.set_visibility(id, true) {
            if activated {
                self.deactivate(id);
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn deactivate(&mut self, id: &str) {
        if let Some(position) = self.active.iter().position(|panel| panel.id == id) {
            let mut panel = self.active.remove(position);
            panel.instance.cleanup();
            debug!("Deactivated panel {}", id);
        }
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.iter().any(|panel| panel.id == id)
    }

    pub fn active_ids(&self) -> impl Iterator<Item = &str> {
        self.active.iter().map(|panel| panel.id.as_str())
    }

    /// Active panels as `(id, instance)` pairs in dispatch order.
    pub fn panels(&self) -> impl Iterator<Item = (&str, &dyn Capability)> {
        self.active
            .iter()
            .map(|panel| (panel.id.as_str(), panel.instance.as_ref()))
    }

    /// Clean up and drop every active panel.
    pub fn shutdown(&mut self) {
        for mut panel in self.active.drain(..) {
            panel.instance.cleanup();
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Switch to a new session, typically after login or logout.
    ///
    /// Panels keep the session they were built with until re-activated.
    pub fn replace_session(&mut self, session: Session) {
        info!("Session {} ({})", session.id(), session.role());
        self.session = session;
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigManager {
        &mut self.config
    }
}

impl Drop for PanelOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
