use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tally_sync::{PlaidCredentials, PlaidEnvironment, SyncOptions, DEFAULT_PAGE_SIZE};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defaults to `tally.db` in the platform data directory.
    pub database_path: Option<PathBuf>,
    pub sync: SyncOptions,
    pub provider: ProviderSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub environment: PlaidEnvironment,
    pub client_id: Option<String>,
    pub secret: Option<String>,
    pub page_size: usize,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            environment: PlaidEnvironment::default(),
            client_id: None,
            secret: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ProviderSection {
    pub fn credentials(&self) -> PlaidCredentials {
        PlaidCredentials {
            client_id: self.client_id.clone(),
            secret: self.secret.clone(),
        }
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "tally", "Tally").context("no home directory")
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

impl Config {
    /// Reads `path`, or the default config file when none is given. Only an
    /// explicitly named file has to exist. Environment overrides apply last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::read(p)?,
            None => {
                let p = default_config_path()?;
                if p.exists() {
                    Self::read(&p)?
                } else {
                    Config::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(id) = lookup("PLAID_CLIENT_ID") {
            self.provider.client_id = Some(id);
        }
        if let Some(secret) = lookup("PLAID_SECRET") {
            self.provider.secret = Some(secret);
        }
        if let Some(env) = lookup("PLAID_ENV") {
            self.provider.environment = env
                .parse()
                .map_err(anyhow::Error::msg)
                .context("PLAID_ENV")?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(p) => Ok(p.clone()),
            None => Ok(project_dirs()?.data_dir().join("tally.db")),
        }
    }
}
