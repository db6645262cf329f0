use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;

const DEFAULT_SSH_PORT: u16 = 22;

/// Where and as whom to log in on the cluster.
/// Serializable to YAML so it can live next to the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// Private key used for authentication. A leading `~` is expanded to the home
    /// directory.
    pub key_path: PathBuf,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::from(""),
            port: DEFAULT_SSH_PORT,
            username: String::from(""),
            key_path: PathBuf::from("~/.ssh/id_rsa"),
        }
    }
}

impl ConnectionConfig {
    /// Read the connection configuration from a YAML file
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Check that the fields needed to open a session are filled in
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField(String::from("host")));
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::MissingField(String::from("username")));
        }
        Ok(())
    }

    /// The key path with `~` expanded
    pub fn resolved_key_path(&self) -> PathBuf {
        expand_home(&self.key_path)
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_defaults() {
        let config: ConnectionConfig = serde_yaml::from_str(
            "host: cluster.example.edu\nusername: fermi\nkey_path: /keys/id_ed25519\n",
        )
        .unwrap();
        assert_eq!(config.port, 22);
        assert!(config.validate().is_ok());
        assert_eq!(config.resolved_key_path(), PathBuf::from("/keys/id_ed25519"));
    }

    #[test]
    fn test_validate() {
        let config = ConnectionConfig::default();
        match config.validate() {
            Err(ConfigError::MissingField(field)) => assert_eq!(field, "host"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_home_expansion() {
        let config = ConnectionConfig::default();
        let resolved = config.resolved_key_path();
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(resolved, PathBuf::from(home).join(".ssh/id_rsa"));
        }
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connection.yaml");
        let config = ConnectionConfig {
            host: String::from("cluster.example.edu"),
            port: 2222,
            username: String::from("fermi"),
            key_path: PathBuf::from("~/.ssh/cluster"),
        };
        config.write_config_file(&path).unwrap();
        assert_eq!(ConnectionConfig::read_config_file(&path).unwrap(), config);
    }
}
