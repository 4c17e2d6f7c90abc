use serde::Deserialize;
use thiserror::Error;

const DEFAULT_REGISTRY_CAPACITY: usize = 20;
const DEFAULT_RNG_SEED: u64 = 0x7a3c_51e9_04b2_d86f;

/// Tuning of the spellcasting system.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpellcastingConfig {
    /// Maximum number of spells alive at once.
    pub registry_capacity: usize,
    /// Seed of the random stream shared by every spell.
    pub rng_seed: u64,
}

impl SpellcastingConfig {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the registry cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

impl Default for SpellcastingConfig {
    fn default() -> Self {
        Self {
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

/// Errors raised while loading a [`SpellcastingConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML text could not be parsed.
    #[error("failed to parse spellcasting configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// The registry would not hold a single spell.
    #[error("spell registry capacity must be at least one")]
    ZeroCapacity,
}
