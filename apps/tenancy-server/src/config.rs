use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tenant_gateway::TenancyConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    /// Load the demo tenants and users at startup.
    pub seed_demo: bool,
    /// Period of the platform statistics job; `0` disables it.
    pub stats_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8087)),
            log_format: LogFormat::Text,
            seed_demo: true,
            stats_interval_secs: 300,
        }
    }
}

/// Whole application config: a `server` and a `tenancy` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub tenancy: TenancyConfig,
}

impl AppConfig {
    /// Read the optional YAML file, then `SERVER__*` and `TENANCY__*` env vars.
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let doc = file.map_or_else(Figment::new, |f| Figment::from(Yaml::file(f)));

        let server: ServerConfig = Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(doc.focus("server"))
            .merge(Env::prefixed("SERVER__").split("__"))
            .extract()
            .context("invalid server config")?;
        let tenancy = TenancyConfig::from_figment(doc.focus("tenancy"))?;

        Ok(Self { server, tenancy })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        figment::Jail::expect_with(|_| {
            let cfg = AppConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(cfg, AppConfig::default());
            Ok(())
        });
    }

    #[test]
    fn sections_and_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "server.yaml",
                r"
server:
  bind_addr: 0.0.0.0:9000
  log_format: json
tenancy:
  header_name: x-tenant-id
",
            )?;
            jail.set_env("SERVER__SEED_DEMO", "false");
            jail.set_env("TENANCY__ENABLED", "false");

            let cfg = AppConfig::load(Some(Path::new("server.yaml"))).map_err(|e| e.to_string())?;
            assert_eq!(cfg.server.bind_addr.port(), 9000);
            assert_eq!(cfg.server.log_format, LogFormat::Json);
            assert!(!cfg.server.seed_demo);
            assert_eq!(cfg.tenancy.header_name, "x-tenant-id");
            assert!(!cfg.tenancy.enabled);
            Ok(())
        });
    }

    #[test]
    fn unknown_server_key_fails() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("bad.yaml", "server:\n  port: 1\n")?;
            assert!(AppConfig::load(Some(Path::new("bad.yaml"))).is_err());
            Ok(())
        });
    }
}
