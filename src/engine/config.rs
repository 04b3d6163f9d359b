//! Session configuration.
//!
//! All fields have safe defaults. Configuration is validated before a
//! session is opened, and again against the engine's capabilities.

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::{EngineCapabilities, Modality};
use crate::sampling::SamplerParams;

/// Per-session generation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum tokens to generate per turn.
    pub max_output_tokens: usize,
    /// Sampler used by the session's decode loop.
    #[serde(default)]
    pub sampler: SamplerParams,
    /// Input modalities this session must accept.
    #[serde(default = "default_modalities")]
    pub modalities: Vec<Modality>,
}

fn default_modalities() -> Vec<Modality> {
    vec![Modality::Text]
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 256,
            sampler: SamplerParams::default(),
            modalities: default_modalities(),
        }
    }
}

impl SessionConfig {
    /// Validate configuration values. Returns error on invalid values.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_output_tokens == 0 {
            return Err(EngineError::InvalidConfig(
                "max_output_tokens must be > 0".into(),
            ));
        }
        if self.modalities.is_empty() {
            return Err(EngineError::InvalidConfig(
                "at least one modality must be requested".into(),
            ));
        }
        self.sampler
            .validate()
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))
    }

    /// Validate against what the engine can actually do.
    pub fn validate_for(&self, capabilities: &EngineCapabilities) -> Result<(), EngineError> {
        self.validate()?;
        if let Some(missing) = self
            .modalities
            .iter()
            .find(|m| !capabilities.supports(**m))
        {
            return Err(EngineError::CapabilityNotSupported(format!(
                "modality {missing:?} is not supported by this engine"
            )));
        }
        if self.max_output_tokens > capabilities.max_num_tokens {
            return Err(EngineError::InvalidConfig(format!(
                "max_output_tokens {} exceeds the engine's max sequence length {}",
                self.max_output_tokens, capabilities.max_num_tokens
            )));
        }
        Ok(())
    }

    /// Config for deterministic, arg-max decoding.
    pub fn greedy() -> Self {
        Self {
            sampler: SamplerParams {
                top_k: 1,
                top_p: 1.0,
                temperature: 0.0,
                seed: 0,
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> EngineCapabilities {
        EngineCapabilities {
            modalities: vec![Modality::Text, Modality::Image],
            max_num_tokens: 512,
        }
    }

    #[test]
    fn default_is_valid() {
        assert!(SessionConfig::default().validate_for(&caps()).is_ok());
        assert!(SessionConfig::greedy().validate().is_ok());
    }

    #[test]
    fn rejects_zero_output_tokens() {
        let cfg = SessionConfig { max_output_tokens: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_unsupported_modality() {
        let cfg = SessionConfig {
            modalities: vec![Modality::Text, Modality::Audio],
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate_for(&caps()),
            Err(EngineError::CapabilityNotSupported(_))
        ));
    }

    #[test]
    fn rejects_output_longer_than_sequence() {
        let cfg = SessionConfig { max_output_tokens: 1024, ..Default::default() };
        assert!(cfg.validate_for(&caps()).is_err());
    }

    #[test]
    fn rejects_bad_sampler() {
        let mut cfg = SessionConfig::default();
        cfg.sampler.temperature = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: SessionConfig = serde_json::from_str(r#"{"max_output_tokens": 32}"#).unwrap();
        assert_eq!(cfg.max_output_tokens, 32);
        assert_eq!(cfg.modalities, vec![Modality::Text]);
        assert_eq!(cfg.sampler, SamplerParams::default());
    }
}
