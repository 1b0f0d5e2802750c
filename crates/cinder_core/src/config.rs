//! # Scene Configuration
//!
//! Sizing knobs for a scene, loadable from TOML. Every field is optional in
//! the file; missing fields take their defaults.
//!
//! ```toml
//! max_entities = 4096
//! fixed_pool_ceiling = 256
//! broadcast_lifecycle = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Configuration for one scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Hard entity ceiling. `None` grows until the index space runs out.
    pub max_entities: Option<u32>,
    /// Slots created with each relocatable pool.
    pub initial_pool_size: usize,
    /// Slot ceiling of `PoolPolicy::NonRelocatable` pools.
    pub fixed_pool_ceiling: usize,
    /// Post a `SceneEvent` for every entity created or destroyed.
    pub broadcast_lifecycle: bool,
    /// Passes over the command queue after a turn before leftovers are
    /// deferred.
    pub max_command_passes: u32,
    /// Message arena words (8 bytes each) reserved per frame.
    pub message_arena_words: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            max_entities: None,
            initial_pool_size: 128,
            fixed_pool_ceiling: 1024,
            broadcast_lifecycle: false,
            max_command_passes: 8,
            message_arena_words: 256,
        }
    }
}

impl SceneConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on malformed TOML or out-of-range values.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            EcsError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!("Loaded scene config from {}", path.display());
        Ok(config)
    }

    /// Serializes to TOML.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if serialization fails.
    pub fn to_toml_string(&self) -> EcsResult<String> {
        toml::to_string(self).map_err(|e| EcsError::InvalidConfig(e.to_string()))
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first bad field.
    pub fn validate(&self) -> EcsResult<()> {
        if self.fixed_pool_ceiling == 0 {
            return Err(EcsError::InvalidConfig(
                "fixed_pool_ceiling must be greater than zero".into(),
            ));
        }
        if self.max_command_passes == 0 {
            return Err(EcsError::InvalidConfig(
                "max_command_passes must be greater than zero".into(),
            ));
        }
        if self.max_entities == Some(0) {
            return Err(EcsError::InvalidConfig(
                "max_entities must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
