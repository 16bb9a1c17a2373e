//! Command-line and environment configuration.

use crate::plugins::{firewall, licensing};
use crate::{FirewallConfig, RouterOptions};
use clap::{value_parser, ArgAction, Parser};
use hmern_license::{domain_from_url, LicenseConfig, DEFAULT_SERVER_URL};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// hMERN server settings. Every flag can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(name = "hmern-server")]
#[command(about = "hMERN plugin host with license-gated plugins")]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// HTTP port
    #[arg(short, long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Runtime environment; `production` disables the localhost license bypass
    #[arg(long, env = "APP_ENV", default_value = "development")]
    pub environment: String,

    /// License server base URL
    #[arg(long, env = "LICENSE_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub license_server_url: String,

    /// License key for this deployment
    #[arg(long, env = "LICENSE_KEY", hide_env_values = true)]
    pub license_key: Option<String>,

    /// Public frontend URL; the license domain is derived from it
    #[arg(long, env = "FRONTEND_URL")]
    pub frontend_url: Option<String>,

    /// License domain, overriding the one derived from the frontend URL
    #[arg(long, env = "LICENSE_DOMAIN")]
    pub license_domain: Option<String>,

    /// Seconds a license verdict stays cached
    #[arg(long, env = "LICENSE_CACHE_DURATION", default_value_t = 3600)]
    pub license_cache_secs: u64,

    /// Timeout in seconds for the license server call
    #[arg(
        long,
        env = "LICENSE_REQUEST_TIMEOUT",
        value_parser = value_parser!(u64).range(1..),
        default_value_t = 10
    )]
    pub license_timeout_secs: u64,

    /// Mount point of the licensing plugin
    #[arg(long, env = "LICENSING_BASE_PATH", default_value = licensing::DEFAULT_BASE_PATH)]
    pub licensing_base_path: String,

    /// Enable the firewall guard and its admin routes
    #[arg(long, env = "FIREWALL_ENABLED", value_parser = value_parser!(bool), action = ArgAction::Set, default_value_t = true)]
    pub firewall_enabled: bool,

    /// Mount point of the firewall plugin
    #[arg(long, env = "FIREWALL_BASE_PATH", default_value = firewall::DEFAULT_BASE_PATH)]
    pub firewall_base_path: String,

    /// Requests per client per window (0 disables rate limiting)
    #[arg(long, env = "FIREWALL_RATE_LIMIT", default_value_t = 100)]
    pub rate_limit: u32,

    /// Rate-limit window in seconds
    #[arg(long, env = "FIREWALL_RATE_WINDOW", default_value_t = 60)]
    pub rate_window_secs: u64,

    /// Comma-separated IPs blocked at startup
    #[arg(long, env = "FIREWALL_BLOCKED_IPS", value_delimiter = ',')]
    pub blocked_ips: Vec<IpAddr>,

    /// Use the first X-Forwarded-For address as the client IP
    #[arg(long, env = "TRUST_PROXY", value_parser = value_parser!(bool), action = ArgAction::Set, default_value_t = false)]
    pub trust_proxy: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerConfig {
    /// Returns true when running in production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case("production")
    }

    /// Socket address to listen on.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// License validation settings.
    ///
    /// An explicit license domain wins over the frontend URL; both are
    /// reduced to host[:port].
    #[must_use]
    pub fn license_config(&self) -> LicenseConfig {
        let domain = self
            .license_domain
            .as_deref()
            .and_then(domain_from_url)
            .or_else(|| self.frontend_url.as_deref().and_then(domain_from_url));

        LicenseConfig {
            server_url: self.license_server_url.clone(),
            license_key: self.license_key.clone(),
            domain,
            cache_duration: Duration::from_secs(self.license_cache_secs),
            request_timeout: Duration::from_secs(self.license_timeout_secs),
            production: self.is_production(),
        }
    }

    /// Plugin mount points and firewall settings.
    #[must_use]
    pub fn router_options(&self) -> RouterOptions {
        RouterOptions {
            licensing_base_path: self.licensing_base_path.clone(),
            firewall_base_path: self.firewall_base_path.clone(),
            firewall: FirewallConfig {
                enabled: self.firewall_enabled,
                rate_limit: self.rate_limit,
                window: Duration::from_secs(self.rate_window_secs),
                blocked_ips: self.blocked_ips.clone(),
                trust_proxy: self.trust_proxy,
            },
        }
    }
}
