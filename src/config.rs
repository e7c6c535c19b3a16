use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
}

/// Probability cut-offs applied to the classifier score.
///
/// `to_label_min` may sit below `flag`: comments just under the flag
/// threshold are still allowed but get queued for human labeling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub block: f64,
    pub flag: f64,
    pub to_label_min: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub model_path: PathBuf,
    pub audit_log: PathBuf,
    pub retraining_queue: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_address: SocketAddr,
    pub classifier_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            block: 0.8,
            flag: 0.5,
            to_label_min: 0.45,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/toxic_model.json"),
            audit_log: PathBuf::from("logs/moderation_log.csv"),
            retraining_queue: PathBuf::from("logs/to_label.csv"),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            classifier_timeout_ms: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds: ThresholdConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            logging: Some(LoggingConfig {
                level: "info".to_string(),
            }),
        }
    }
}

impl ThresholdConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("block", self.block),
            ("flag", self.flag),
            ("to_label_min", self.to_label_min),
        ] {
            ensure!(
                value.is_finite() && (0.0..=1.0).contains(&value),
                "threshold {name} must be a probability in [0, 1], got {value}"
            );
        }
        ensure!(
            self.to_label_min <= self.flag,
            "to_label_min ({}) must not exceed flag ({})",
            self.to_label_min,
            self.flag
        );
        ensure!(
            self.flag <= self.block,
            "flag ({}) must not exceed block ({})",
            self.flag,
            self.block
        );
        Ok(())
    }

    /// Whether a score belongs in the retraining queue: `[to_label_min, block)`.
    pub fn in_borderline_band(&self, score: f64) -> bool {
        self.to_label_min <= score && score < self.block
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.thresholds
            .validate()
            .context("Invalid thresholds section")?;
        ensure!(
            self.server.classifier_timeout_ms > 0,
            "server.classifier_timeout_ms must be positive"
        );
        Ok(())
    }
}
