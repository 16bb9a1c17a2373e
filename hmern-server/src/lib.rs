//! HTTP side of the hMERN plugin host.
//!
//! Wires the license gate from `hmern-license` into axum, and mounts the
//! licensing and firewall plugins through the plugin registry.

pub mod config;
pub mod middleware;
pub mod plugins;
pub mod response;

use axum::middleware::from_fn_with_state;
use axum::Router;
use hmern_license::LicenseValidator;
use std::sync::Arc;

pub use config::ServerConfig;
pub use middleware::require_license;
pub use plugins::firewall::{firewall_guard, Firewall, FirewallConfig};
pub use plugins::{
    FirewallPlugin, LicensingPlugin, Plugin, PluginManifest, PluginRegistry, RegistryError,
};
pub use response::LicenseErrorResponse;

/// Mount points and firewall settings for [`build_router`].
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Where the licensing plugin is nested.
    pub licensing_base_path: String,
    /// Where the firewall plugin is nested.
    pub firewall_base_path: String,
    /// Firewall settings; `enabled: false` skips both guard and routes.
    pub firewall: FirewallConfig,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            licensing_base_path: plugins::licensing::DEFAULT_BASE_PATH.to_string(),
            firewall_base_path: plugins::firewall::DEFAULT_BASE_PATH.to_string(),
            firewall: FirewallConfig::default(),
        }
    }
}

/// Builds the application router around a shared validator.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// the firewall can see client addresses.
///
/// # Errors
///
/// Fails if the configured plugin base paths are invalid or collide.
pub fn build_router(
    validator: Arc<LicenseValidator>,
    options: RouterOptions,
) -> Result<Router, RegistryError> {
    let firewall_enabled = options.firewall.enabled;
    let firewall = Arc::new(Firewall::new(options.firewall));

    let mut registry = PluginRegistry::new();
    registry.register(LicensingPlugin::new(
        Arc::clone(&validator),
        options.licensing_base_path,
    ))?;
    registry.register(FirewallPlugin::new(
        Arc::clone(&firewall),
        validator,
        options.firewall_base_path,
    ))?;

    let router = registry.into_router();
    if firewall_enabled {
        Ok(router.layer(from_fn_with_state(firewall, firewall_guard)))
    } else {
        Ok(router)
    }
}
