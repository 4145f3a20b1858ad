use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    /// Members of this team may view every archive and manage restricted
    /// processors.
    pub admin_team: String,
    /// Name given to a PPA when the creator does not supply one.
    pub default_ppa_name: String,
    /// Leading segment of every issued archive token.
    pub token_prefix: String,
}

impl EngineConfig {
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("archivist.db")
    }

    /// Reads a TOML config file. A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.admin_team.trim().is_empty() {
            return Err(Error::Config("admin_team cannot be empty".to_string()));
        }
        if self.default_ppa_name.trim().is_empty() {
            return Err(Error::Config("default_ppa_name cannot be empty".to_string()));
        }
        if self.token_prefix.is_empty() || self.token_prefix.contains(['_', ':']) {
            return Err(Error::Config(
                "token_prefix must be non-empty and cannot contain '_' or ':'".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            admin_team: "admins".to_string(),
            default_ppa_name: "ppa".to_string(),
            token_prefix: "archivist".to_string(),
        }
    }
}
