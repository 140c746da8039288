use crate::error::{Result, ReuneError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Relative paths are resolved against `.reune/`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reune.redb")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    pub organization: OrganizationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            version: 1,
            organization: OrganizationConfig {
                name: organization.into(),
            },
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(ReuneError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        paths::database_path(root, &self.database.path)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.server.bind.parse::<IpAddr>().is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "server.bind '{}' is not an IP address",
                    self.server.bind
                ),
            });
        }

        if self.server.port == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "server.port is 0: the OS will pick a port on every start".to_string(),
            });
        }

        if self.organization.name.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "organization.name is empty".to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new("acme");
        cfg.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.organization.name, "acme");
        assert_eq!(loaded.server.port, 8000);
        assert_eq!(loaded.database.path, PathBuf::from("reune.redb"));
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(ReuneError::NotInitialized)
        ));
    }

    #[test]
    fn sections_default_when_omitted() {
        let cfg: Config = serde_yaml::from_str("version: 1\norganization:\n  name: acme\n").unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.server.port, 8000);
    }

    #[test]
    fn database_path_resolves_under_reune_dir() {
        let cfg = Config::new("acme");
        let path = cfg.database_path(Path::new("/srv/acme"));
        assert_eq!(path, PathBuf::from("/srv/acme/.reune/reune.redb"));
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(Config::new("acme").validate().is_empty());
    }

    #[test]
    fn bad_bind_is_an_error() {
        let mut cfg = Config::new("acme");
        cfg.server.bind = "localhost".to_string();
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Error);
    }

    #[test]
    fn port_zero_is_a_warning() {
        let mut cfg = Config::new("acme");
        cfg.server.port = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
    }
}
