//! Allocation settings parser (`shardgrid.toml`).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationSettings {
    pub disk: DiskWatermarks,
    pub balance: BalanceWeights,
    /// Max recoveries streaming onto one node at a time.
    pub node_concurrent_recoveries: u32,
    /// Max relocations in flight across the cluster before rebalancing throttles.
    pub cluster_concurrent_rebalance: u32,
    /// Failed allocations after which a shard is no longer retried.
    pub max_retries: u32,
    /// How long a shard that lost its node waits before reallocation.
    pub delayed_timeout_ms: u64,
    /// Node attributes that must match (`zone = "a"`).
    pub require: BTreeMap<String, String>,
    /// Node attributes that exclude a node.
    pub exclude: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskWatermarks {
    pub enabled: bool,
    /// New shards are not allocated to nodes above this usage ratio.
    pub low: f64,
    /// Shards move away from nodes above this usage ratio.
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceWeights {
    pub shard: f64,
    pub disk: f64,
    /// Minimum weight improvement before a rebalance is worth it.
    pub threshold: f64,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            disk: DiskWatermarks::default(),
            balance: BalanceWeights::default(),
            node_concurrent_recoveries: 2,
            cluster_concurrent_rebalance: 2,
            max_retries: 5,
            delayed_timeout_ms: 60_000,
            require: BTreeMap::new(),
            exclude: BTreeMap::new(),
        }
    }
}

impl Default for DiskWatermarks {
    fn default() -> Self {
        Self {
            enabled: true,
            low: 0.85,
            high: 0.90,
        }
    }
}

impl Default for BalanceWeights {
    fn default() -> Self {
        Self {
            shard: 0.45,
            disk: 0.55,
            threshold: 1.0,
        }
    }
}

impl AllocationSettings {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> CoreResult<Self> {
        let settings: Self = toml::from_str(s).map_err(|e| CoreError::Toml(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Toml(e.to_string()))
    }

    pub fn validate(&self) -> CoreResult<()> {
        let DiskWatermarks { low, high, .. } = self.disk;
        if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) {
            return Err(CoreError::InvalidSettings(
                "disk watermarks must be within 0.0..=1.0".to_string(),
            ));
        }
        if low > high {
            return Err(CoreError::InvalidSettings(format!(
                "low watermark {low} is above high watermark {high}"
            )));
        }
        let BalanceWeights {
            shard,
            disk,
            threshold,
        } = self.balance;
        if !shard.is_finite() || !disk.is_finite() || !threshold.is_finite() {
            return Err(CoreError::InvalidSettings(
                "balance weights and threshold must be finite numbers".to_string(),
            ));
        }
        if threshold < 0.0 {
            return Err(CoreError::InvalidSettings(format!(
                "balance threshold {threshold} must not be negative"
            )));
        }
        if shard < 0.0 || disk < 0.0 {
            return Err(CoreError::InvalidSettings(
                "balance weights must not be negative".to_string(),
            ));
        }
        if shard + disk == 0.0 {
            return Err(CoreError::InvalidSettings(
                "at least one balance weight must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let settings = AllocationSettings::default();
        let toml_str = settings.to_toml_string().unwrap();
        assert!(toml_str.contains("node_concurrent_recoveries"));
        let back = AllocationSettings::from_toml_str(&toml_str).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_parse_partial() {
        let toml_str = r#"
max_retries = 1

[disk]
low = 0.5

[require]
zone = "a"
"#;
        let settings = AllocationSettings::from_toml_str(toml_str).unwrap();
        assert_eq!(settings.max_retries, 1);
        assert_eq!(settings.disk.low, 0.5);
        assert_eq!(settings.disk.high, 0.90);
        assert_eq!(settings.node_concurrent_recoveries, 2);
        assert_eq!(settings.require.get("zone").map(String::as_str), Some("a"));
    }

    #[test]
    fn test_rejects_inverted_watermarks() {
        let err = AllocationSettings::from_toml_str("[disk]\nlow = 0.95\nhigh = 0.9\n").unwrap_err();
        assert!(matches!(err, CoreError::InvalidSettings(_)));
    }

    #[test]
    fn test_rejects_zero_weights() {
        let err =
            AllocationSettings::from_toml_str("[balance]\nshard = 0.0\ndisk = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("balance weight"));
    }

    #[test]
    fn test_rejects_non_finite_weights() {
        for body in [
            "[balance]\nshard = nan\n",
            "[balance]\ndisk = inf\n",
            "[balance]\nthreshold = nan\n",
        ] {
            let err = AllocationSettings::from_toml_str(body).unwrap_err();
            assert!(err.to_string().contains("finite"), "{body}: {err}");
        }
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let err = AllocationSettings::from_toml_str("[balance]\nthreshold = -1.0\n").unwrap_err();
        assert!(err.to_string().contains("threshold"));
    }

    #[test]
    fn test_rejects_nan_watermark() {
        let err = AllocationSettings::from_toml_str("[disk]\nlow = nan\n").unwrap_err();
        assert!(err.to_string().contains("watermarks"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shardgrid.toml");
        std::fs::write(&path, "delayed_timeout_ms = 10\n").unwrap();
        let settings = AllocationSettings::from_file(&path).unwrap();
        assert_eq!(settings.delayed_timeout_ms, 10);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = AllocationSettings::from_file(Path::new("/nonexistent/shardgrid.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/shardgrid.toml"));
    }
}
