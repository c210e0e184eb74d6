use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use helpdesk_core::models::{Identity, Role};
use helpdesk_core::CoreConfig;
use serde::Deserialize;

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Session identity used when no flags override it
    #[serde(default)]
    pub identity: Option<Identity>,

    /// Engine config file; the core's default location when unset
    #[serde(default)]
    pub core_config_path: Option<PathBuf>,

    /// Inline engine config, takes precedence over `core_config_path`
    #[serde(default)]
    pub core: Option<CoreConfig>,
}

/// Identity fields given on the command line.
#[derive(Debug, Clone, Default)]
pub struct IdentityOverrides {
    pub org_id: Option<String>,
    pub user_id: Option<String>,
    pub role: Option<Role>,
    pub name: Option<String>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Engine config with `HELPDESK_*` environment overrides applied.
    pub fn core_config(&self) -> Result<CoreConfig> {
        let config = match (&self.core, &self.core_config_path) {
            (Some(inline), _) => inline.clone(),
            (None, Some(path)) => CoreConfig::load(path)
                .with_context(|| format!("Failed to load engine config: {}", path.display()))?,
            (None, None) => CoreConfig::load_or_default().context("Failed to load engine config")?,
        };
        Ok(config.with_env_overrides())
    }

    /// Merge command-line identity flags over the configured identity.
    pub fn resolve_identity(&self, overrides: IdentityOverrides) -> Result<Identity> {
        let base = self.identity.as_ref();
        let org_id = overrides
            .org_id
            .or_else(|| base.map(|i| i.org_id.clone()))
            .context("No organization id: pass --org or set identity.orgId")?;
        let user_id = overrides
            .user_id
            .or_else(|| base.map(|i| i.user_id.clone()))
            .context("No user id: pass --user or set identity.userId")?;
        let role = overrides
            .role
            .or_else(|| base.map(|i| i.role))
            .unwrap_or_default();
        let name = overrides
            .name
            .or_else(|| base.map(|i| i.name.clone()).filter(|n| !n.is_empty()))
            .unwrap_or_else(|| user_id.clone());
        Ok(Identity::new(org_id, user_id, role, name))
    }
}
