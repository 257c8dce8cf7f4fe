//! Resolver and cache configuration.
//!
//! [`UnitConfig`] is the single input to resolver construction. It is a
//! plain serde type; loading it from disk is the caller's concern. Map
//! fields use [`IndexMap`] because order is semantic: base units define
//! exponent ordinals, and unit entries must be declared after every name
//! their expressions mention.

use std::{sync::LazyLock, time::Duration};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{UnitError, UnitResult};

pub const DEFAULT_SLIDING_EXPIRATION_SECONDS: u64 = 300;
pub const DEFAULT_HIGH_MEMORY_PRESSURE_THRESHOLD: u8 = 90;
pub const DEFAULT_HIGH_MEMORY_PRESSURE_CLEAR_PERCENTAGE: u8 = 50;

/// Configuration for a unit resolver and its expression cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnitConfig {
    /// Prefix families: family name -> (prefix -> scale factor).
    pub prefixes: IndexMap<String, IndexMap<String, f64>>,
    /// Ordered base-unit names; the order fixes exponent ordinals for the
    /// life of the resolver.
    pub base_units: Vec<String>,
    /// Unit entries: a comma-separated name list (individual names may carry
    /// `[family,...]` tags) -> the defining expression.
    pub units: IndexMap<String, String>,
    /// How long an untouched cache entry survives between expiration ticks.
    pub sliding_expiration_seconds: u64,
    /// Memory-pressure percentage at or above which the cache additionally
    /// evicts its least-recently-seen entries.
    pub high_memory_pressure_threshold: u8,
    /// Percentage of surviving entries evicted under high memory pressure.
    pub high_memory_pressure_clear_percentage: u8,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            prefixes: IndexMap::new(),
            base_units: Vec::new(),
            units: IndexMap::new(),
            sliding_expiration_seconds: DEFAULT_SLIDING_EXPIRATION_SECONDS,
            high_memory_pressure_threshold: DEFAULT_HIGH_MEMORY_PRESSURE_THRESHOLD,
            high_memory_pressure_clear_percentage: DEFAULT_HIGH_MEMORY_PRESSURE_CLEAR_PERCENTAGE,
        }
    }
}

impl UnitConfig {
    pub fn sliding_expiration(&self) -> Duration {
        Duration::from_secs(self.sliding_expiration_seconds)
    }

    /// Structural validation; expression errors surface later, during
    /// dictionary construction.
    pub(crate) fn validate(&self) -> UnitResult<()> {
        for (ordinal, name) in self.base_units.iter().enumerate() {
            let name = name.trim_matches(' ');
            if name.is_empty() {
                return Err(UnitError::invalid_config(format!("base unit {ordinal} has an empty name")));
            }
            if self.base_units[..ordinal].iter().any(|prior| prior.trim_matches(' ') == name) {
                return Err(UnitError::invalid_config(format!("duplicate base unit '{name}'")));
            }
        }
        for (family, prefixes) in &self.prefixes {
            if family.trim_matches(' ').is_empty() {
                return Err(UnitError::invalid_config("prefix family has an empty name"));
            }
            for (prefix, factor) in prefixes {
                if prefix.is_empty() {
                    return Err(UnitError::invalid_config(format!(
                        "prefix family '{family}' contains an empty prefix"
                    )));
                }
                if !factor.is_finite() || *factor == 0.0 {
                    return Err(UnitError::invalid_config(format!(
                        "prefix '{prefix}' in family '{family}' has invalid factor {factor}"
                    )));
                }
            }
        }
        for (names, expression) in &self.units {
            if expression.trim_matches(' ').is_empty() {
                return Err(UnitError::invalid_config(format!(
                    "unit entry '{names}' has an empty expression"
                )));
            }
        }
        if self.high_memory_pressure_threshold > 100 {
            return Err(UnitError::invalid_config(
                "highMemoryPressureThreshold must be in 0..=100",
            ));
        }
        if self.high_memory_pressure_clear_percentage > 100 {
            return Err(UnitError::invalid_config(
                "highMemoryPressureClearPercentage must be in 0..=100",
            ));
        }
        Ok(())
    }
}

static DEFAULT_CONFIG: LazyLock<UnitConfig> = LazyLock::new(|| {
    // The embedded catalog is part of the crate; failing to parse it is a
    // packaging bug, not a runtime condition.
    serde_json::from_str(include_str!("default_units.json")).expect("embedded default unit catalog must parse")
});

/// The built-in SI-plus-customary unit catalog the default system is
/// constructed from.
pub fn default_config() -> &'static UnitConfig {
    &DEFAULT_CONFIG
}
