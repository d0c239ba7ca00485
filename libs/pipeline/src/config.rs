use serde::Deserialize;

use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Ack Policy
// ═══════════════════════════════════════════════════════════════

/// Когда подтверждать входное сообщение.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// После успешного publish (at-least-once). Неудачный publish
    /// оставляет сообщение неподтверждённым: брокер доставит его повторно.
    #[default]
    AfterPublish,
    /// Сразу после pull (at-most-once).
    OnPull,
}

impl std::str::FromStr for AckPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "after_publish" => Ok(AckPolicy::AfterPublish),
            "on_pull" => Ok(AckPolicy::OnPull),
            other => Err(format!("unknown ack policy '{other}' (expected after_publish or on_pull)")),
        }
    }
}

impl std::fmt::Display for AckPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AckPolicy::AfterPublish => f.write_str("after_publish"),
            AckPolicy::OnPull => f.write_str("on_pull"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Runner Config
// ═══════════════════════════════════════════════════════════════

/// Конфигурация runner'а (`[runner]` в TOML).
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Максимум записей в обработке одновременно.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub ack: AckPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            ack: AckPolicy::default(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.concurrency == 0 {
            return Err(PipelineError::Config("runner.concurrency must be greater than 0".into()));
        }
        Ok(())
    }
}

fn default_concurrency() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_section_is_empty() {
        let cfg: RunnerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.concurrency, 64);
        assert_eq!(cfg.ack, AckPolicy::AfterPublish);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_ack_policy() {
        let cfg: RunnerConfig = toml::from_str("concurrency = 8\nack = \"on_pull\"").unwrap();
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.ack, AckPolicy::OnPull);

        assert_eq!("After-Publish".parse::<AckPolicy>(), Ok(AckPolicy::AfterPublish));
        assert!("sometimes".parse::<AckPolicy>().is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let cfg = RunnerConfig { concurrency: 0, ..RunnerConfig::default() };
        assert!(matches!(cfg.validate(), Err(PipelineError::Config(_))));
    }
}
