use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DB_FILE_NAME: &str = "jiralert.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite file, or `:memory:`.
    pub sqlite_path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from(DB_FILE_NAME),
            max_connections: default_max_connections(),
        }
    }
}

impl StoreConfig {
    /// Cache file inside `data_dir`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            sqlite_path: data_dir.join(DB_FILE_NAME),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self {
            sqlite_path: PathBuf::from(":memory:"),
            max_connections: 1,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sqlite_path.as_os_str().is_empty() {
            return Err("SQLite path is required for the lookup cache".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_dir_uses_db_file_name() {
        let config = StoreConfig::in_dir(Path::new("/var/lib/jiralert"));
        assert_eq!(config.sqlite_path, PathBuf::from("/var/lib/jiralert/jiralert.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let config = StoreConfig {
            sqlite_path: PathBuf::new(),
            max_connections: 1,
        };
        assert!(config.validate().is_err());
    }
}
