//! Configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TonicConfig {
    /// Decay factor of the QEP-S cost averages. Must lie in (0, 1].
    pub gamma: f64,

    /// Partition learned costs by the filter predicate of each base table.
    pub filter_aware: bool,
}

impl Default for TonicConfig {
    fn default() -> Self {
        Self {
            gamma: 0.8,
            filter_aware: false,
        }
    }
}

impl TonicConfig {
    pub fn validate(&self) -> Result<()> {
        if self.gamma.is_nan() || self.gamma <= 0.0 || self.gamma > 1.0 {
            return Err(Error::Config(format!(
                "gamma must lie in (0, 1], got {}",
                self.gamma
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanhintConfig {
    /// Target dialect for hint generation ("postgres" or "mysql").
    pub dialect: String,

    #[serde(default)]
    pub tonic: TonicConfig,
}

impl Default for PlanhintConfig {
    fn default() -> Self {
        Self {
            dialect: "postgres".to_string(),
            tonic: TonicConfig::default(),
        }
    }
}

impl PlanhintConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `PLANHINT_DIALECT`: target dialect
    /// - `PLANHINT_TONIC_GAMMA`: QEP-S decay factor
    /// - `PLANHINT_TONIC_FILTER_AWARE`: `true`/`false`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("PLANHINT_DIALECT") {
            if !s.trim().is_empty() {
                cfg.dialect = s.trim().to_ascii_lowercase();
            }
        }

        if let Ok(s) = std::env::var("PLANHINT_TONIC_GAMMA") {
            if let Ok(v) = s.parse::<f64>() {
                cfg.tonic.gamma = v;
            }
        }

        if let Ok(s) = std::env::var("PLANHINT_TONIC_FILTER_AWARE") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.tonic.filter_aware = v;
            }
        }

        cfg
    }

    pub fn from_json(src: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(src)?;
        cfg.tonic.validate()?;
        Ok(cfg)
    }
}
