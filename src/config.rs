use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the roster backend, e.g. `http://localhost:5000`.
    pub server_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config at {}", path.display()))?;
                let config: Config = toml::from_str(&contents)
                    .with_context(|| "Failed to parse config.toml")?;
                return Ok(config);
            }
        }

        let server_url = std::env::var("ROSTER_URL")
            .with_context(|| "ROSTER_URL not set. Create a config file or set the env var.")?;

        Ok(Self { server_url })
    }

    pub fn generate_default() -> Result<PathBuf> {
        let path = Self::config_path()
            .with_context(|| "Could not determine config directory")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let default = Config {
            server_url: "http://localhost:5000".into(),
        };

        let toml_str = toml::to_string_pretty(&default)?;
        std::fs::write(&path, toml_str)?;
        Ok(path)
    }

    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("roster-tui").join("config.toml"))
    }
}
