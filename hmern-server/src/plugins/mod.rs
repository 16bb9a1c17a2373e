//! Plugin registry.
//!
//! A plugin is a bundle of routes mounted under its own base path. The
//! registry collects plugins, nests the enabled ones into the app router,
//! and serves `GET /api/plugins` listing every registered plugin.

pub mod firewall;
pub mod licensing;

use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

pub use firewall::FirewallPlugin;
pub use licensing::LicensingPlugin;

/// Path of the plugin listing route.
pub const PLUGINS_PATH: &str = "/api/plugins";

/// Static description of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Unique plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// One-line description.
    pub description: String,
    /// Where the plugin's routes are nested.
    pub base_path: String,
    /// Whether the plugin's routes sit behind the license gate.
    pub requires_license: bool,
}

/// Manifest plus registry state, as listed by `GET /api/plugins`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSummary {
    /// The plugin's manifest.
    #[serde(flatten)]
    pub manifest: PluginManifest,
    /// Whether the plugin's routes are mounted.
    pub enabled: bool,
}

/// A bundle of backend routes.
pub trait Plugin: Send + Sync {
    /// Describes the plugin.
    fn manifest(&self) -> PluginManifest;

    /// Disabled plugins are listed but not mounted.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Routes, relative to the base path.
    fn router(&self) -> Router;
}

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two plugins share a name.
    #[error("plugin already registered: {0}")]
    DuplicateName(String),

    /// Two plugins share a base path.
    #[error("base path {path} already used by plugin {owner}")]
    DuplicateBasePath {
        /// The contested path.
        path: String,
        /// Plugin that registered it first.
        owner: String,
    },

    /// Base path is empty, relative, the root, reserved or has route parameters.
    #[error("invalid base path for plugin {plugin}: {path:?}")]
    InvalidBasePath {
        /// Plugin name.
        plugin: String,
        /// Offending path.
        path: String,
    },
}

/// Collects plugins and mounts them.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin.
    ///
    /// # Errors
    ///
    /// Fails if the name or base path is taken, or the base path is invalid.
    pub fn register(&mut self, plugin: impl Plugin + 'static) -> Result<(), RegistryError> {
        let manifest = plugin.manifest();
        let base_path = normalize_base_path(&manifest.base_path).ok_or_else(|| {
            RegistryError::InvalidBasePath {
                plugin: manifest.name.clone(),
                path: manifest.base_path.clone(),
            }
        })?;

        for existing in &self.plugins {
            let other = existing.manifest();
            if other.name == manifest.name {
                return Err(RegistryError::DuplicateName(manifest.name));
            }
            if normalize_base_path(&other.base_path).as_deref() == Some(base_path) {
                return Err(RegistryError::DuplicateBasePath {
                    path: base_path.to_string(),
                    owner: other.name,
                });
            }
        }

        self.plugins.push(Box::new(plugin));
        Ok(())
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Every registered plugin with its enabled flag, in registration order.
    #[must_use]
    pub fn summaries(&self) -> Vec<PluginSummary> {
        self.plugins
            .iter()
            .map(|plugin| PluginSummary {
                manifest: plugin.manifest(),
                enabled: plugin.is_enabled(),
            })
            .collect()
    }

    /// Builds the router: enabled plugins nested at their base paths,
    /// plus the listing route.
    pub fn into_router(self) -> Router {
        let summaries = Arc::new(self.summaries());
        let mut router = Router::new();
        let mut mounted = HashSet::new();

        for plugin in &self.plugins {
            let manifest = plugin.manifest();
            if !plugin.is_enabled() {
                info!(plugin = %manifest.name, "Plugin disabled, routes not mounted");
                continue;
            }
            // register() already validated the path.
            let Some(base_path) = normalize_base_path(&manifest.base_path) else {
                continue;
            };
            if !mounted.insert(base_path.to_string()) {
                continue;
            }
            info!(
                plugin = %manifest.name,
                version = %manifest.version,
                base_path = %base_path,
                "Plugin mounted"
            );
            router = router.nest(base_path, plugin.router());
        }

        router.route(
            PLUGINS_PATH,
            get(move || {
                let summaries = Arc::clone(&summaries);
                async move {
                    Json(json!({
                        "success": true,
                        "plugins": *summaries,
                    }))
                }
            }),
        )
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.summaries())
            .finish()
    }
}

/// Trims a trailing slash and rejects paths axum cannot nest.
fn normalize_base_path(path: &str) -> Option<&str> {
    let path = path.trim().trim_end_matches('/');
    let valid = path.starts_with('/')
        && path != PLUGINS_PATH
        && !path.contains(['{', '}', '*', '?', '#'])
        && !path.contains("//");
    valid.then_some(path)
}
