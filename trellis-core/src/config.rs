//! Runtime configuration.
//!
//! Configuration is per thread, like the rest of the runtime. Install it with
//! [`Runtime::configure`](crate::reactive::Runtime::configure) before creating
//! any reactive values; values created earlier keep working under the new
//! settings since they are read at flush and reconcile time.

use serde::Deserialize;

use crate::error::{ReactiveError, Result};

/// Default bound on cascading passes inside a single flush.
pub const DEFAULT_MAX_FLUSH_PASSES: usize = 100;

/// Tunables for the scheduler and the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Maximum number of passes one flush may run before the remaining
    /// queue is dropped and reported. Guards against computations that keep
    /// re-scheduling each other.
    pub max_flush_passes: usize,

    /// Emit a warning when a render produces the same key twice.
    pub warn_duplicate_keys: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: DEFAULT_MAX_FLUSH_PASSES,
            warn_duplicate_keys: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ReactiveError::Config(e.to_string()))?;
        if config.max_flush_passes == 0 {
            return Err(ReactiveError::Config(
                "max_flush_passes must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = RuntimeConfig::from_json_str(r#"{ "max_flush_passes": 8 }"#).unwrap();
        assert_eq!(config.max_flush_passes, 8);
        assert!(config.warn_duplicate_keys);

        let config = RuntimeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn rejects_zero_passes_and_unknown_fields() {
        assert!(matches!(
            RuntimeConfig::from_json_str(r#"{ "max_flush_passes": 0 }"#),
            Err(ReactiveError::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_json_str(r#"{ "batch": true }"#),
            Err(ReactiveError::Config(_))
        ));
    }
}
