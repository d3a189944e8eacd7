use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{template::TemplateEngine, Error, Result};

/// JIRA API access.
#[derive(Clone)]
pub struct ApiConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<secret>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration for one Alertmanager receiver: required issue fields
/// (project, issue type, summary, reopen state) and optional ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiverConfig {
    pub name: String,

    // Required issue fields
    pub project: String,
    pub issue_type: String,
    pub summary: String,
    pub reopen_state: String,

    // Optional issue fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wont_fix_resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,

    // Label copy settings
    #[serde(default)]
    pub add_group_labels: bool,
}

impl ReceiverConfig {
    fn validate(&self) -> std::result::Result<(), String> {
        let required = [
            ("project", &self.project),
            ("issue_type", &self.issue_type),
            ("summary", &self.summary),
            ("reopen_state", &self.reopen_state),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("missing {} in receiver {:?}", field, self.name));
            }
        }
        match &self.fields {
            None | Some(serde_yaml::Value::Mapping(_)) => Ok(()),
            Some(_) => Err(format!("fields in receiver {:?} must be a mapping", self.name)),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub receivers: Vec<ReceiverConfig>,

    /// Glob of shared Tera templates available to receiver templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl Config {
    pub fn from_yaml(input: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from {}", path.display());
        let input = std::fs::read_to_string(path).map_err(|e| {
            warn!("Failed to read configuration file {}: {}", path.display(), e);
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&input)
    }

    pub fn validate(&self) -> Result<()> {
        if self.receivers.is_empty() {
            warn!("No receivers configured, every notification will be rejected");
        }
        let mut names = HashSet::new();
        for receiver in &self.receivers {
            if receiver.name.trim().is_empty() {
                return Err(Error::Config("receiver with empty name".into()));
            }
            if !names.insert(receiver.name.as_str()) {
                return Err(Error::Config(format!("duplicate receiver name {:?}", receiver.name)));
            }
            receiver.validate().map_err(Error::Config)?;
        }
        Ok(())
    }

    /// First receiver with that name.
    pub fn receiver_by_name(&self, name: &str) -> Option<&ReceiverConfig> {
        self.receivers.iter().find(|r| r.name == name)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Configuration plus the templates it references, never mutated once built.
pub struct Snapshot {
    pub config: Config,
    pub templates: TemplateEngine,
}

impl Snapshot {
    pub fn new(config: Config) -> Result<Self> {
        let templates = TemplateEngine::load(config.template.as_deref())?;
        Ok(Self { config, templates })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::new(Config::load(path)?)
    }
}

/// Publishes the current [`Snapshot`]. Readers hold an `Arc` for the whole
/// request; a reload swaps in a fresh snapshot only if it loads cleanly.
pub struct SnapshotHandle {
    path: Option<PathBuf>,
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotHandle {
    pub fn new(path: Option<PathBuf>, snapshot: Snapshot) -> Self {
        Self {
            path,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn open(path: PathBuf) -> Result<Self> {
        let snapshot = Snapshot::load(&path)?;
        Ok(Self::new(Some(path), snapshot))
    }

    pub async fn current(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Re-read the configuration file. On error the previous snapshot stays.
    pub async fn reload(&self) -> Result<Arc<Snapshot>> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| Error::Config("configuration was not loaded from a file".into()))?;
        info!("Reloading configuration from {}", path.display());
        let snapshot = Arc::new(Snapshot::load(path)?);
        *self.current.write().await = snapshot.clone();
        Ok(snapshot)
    }
}
