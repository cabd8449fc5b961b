use crate::core::errors::{FaninError, Result};
use serde::{Deserialize, Serialize};

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Label attached to every log line the coordinator emits
    pub name: String,
    /// Log completions that arrive after their run already ended
    pub log_late_signals: bool,
    /// Mailbox backlog size that triggers a warning when drained
    pub mailbox_backlog_warning: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            name: "fanin".to_string(),
            log_late_signals: true,
            mailbox_backlog_warning: 1_024,
        }
    }
}

impl CoordinatorConfig {
    /// Create a default config with the given name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FaninError::configuration_field(
                "name must not be empty",
                "name",
            ));
        }
        if self.mailbox_backlog_warning == 0 {
            return Err(FaninError::configuration_field(
                "mailbox_backlog_warning must be greater than 0",
                "mailbox_backlog_warning",
            ));
        }
        Ok(())
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }
}
