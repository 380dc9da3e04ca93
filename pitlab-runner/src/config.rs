//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid config. The
//! fingerprint is a BLAKE3 hash of the canonical JSON form and is recorded in
//! every run report: two runs with equal fingerprints computed the same
//! columns the same way.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use pitlab_core::align::{AlignOptions, SortPolicy};
use pitlab_core::features::candles::CandleParams;
use pitlab_core::features::FeatureConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Rolling windows (rows) for SMA and rolling high/low.
    pub windows: Vec<usize>,
    pub performance_periods: Vec<usize>,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub swing_length: usize,
    pub poc_window: usize,
    pub candles: CandleParams,

    pub sort_policy: SortPolicy,
    /// Drop as-of matches older than this many days. Unset means no bound.
    pub max_staleness_days: Option<u32>,

    /// Columns the output must contain; unknown names are reported.
    pub expected_columns: Vec<String>,

    /// Worker threads; 0 lets rayon decide.
    pub threads: usize,
    /// Field delimiter for input and output tables.
    pub delimiter: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let features = FeatureConfig::default();
        Self {
            windows: features.windows,
            performance_periods: features.performance_periods,
            rsi_period: features.rsi_period,
            atr_period: features.atr_period,
            swing_length: features.swing_length,
            poc_window: features.poc_window,
            candles: features.candles,
            sort_policy: SortPolicy::default(),
            max_staleness_days: None,
            expected_columns: Vec::new(),
            threads: 0,
            delimiter: ';',
        }
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.windows.is_empty() {
            return Err(ConfigError::Invalid("windows must not be empty".into()));
        }
        if self.windows.contains(&0) {
            return Err(ConfigError::Invalid("windows must be >= 1".into()));
        }
        if self.performance_periods.contains(&0) {
            return Err(ConfigError::Invalid("performance_periods must be >= 1".into()));
        }
        for (name, value) in [
            ("rsi_period", self.rsi_period),
            ("atr_period", self.atr_period),
            ("swing_length", self.swing_length),
            ("poc_window", self.poc_window),
            ("candles.trend_period", self.candles.trend_period),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be >= 1")));
            }
        }
        let ratios = [
            ("candles.doji_body_ratio", self.candles.doji_body_ratio),
            ("candles.marubozu_body_ratio", self.candles.marubozu_body_ratio),
        ];
        for (name, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1]")));
            }
        }
        if !self.candles.shadow_ratio.is_finite() || self.candles.shadow_ratio <= 0.0 {
            return Err(ConfigError::Invalid("candles.shadow_ratio must be > 0".into()));
        }
        if !self.delimiter.is_ascii() || self.delimiter == '"' || self.delimiter == '\n' {
            return Err(ConfigError::Invalid(format!(
                "delimiter {:?} must be a single ASCII character other than quote or newline",
                self.delimiter
            )));
        }
        Ok(())
    }

    pub fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            windows: self.windows.clone(),
            performance_periods: self.performance_periods.clone(),
            rsi_period: self.rsi_period,
            atr_period: self.atr_period,
            swing_length: self.swing_length,
            poc_window: self.poc_window,
            candles: self.candles,
        }
    }

    pub fn align_options(&self) -> AlignOptions {
        AlignOptions {
            sort_policy: self.sort_policy,
            max_staleness_days: self.max_staleness_days,
        }
    }

    pub fn delimiter_byte(&self) -> u8 {
        // validate() guarantees ASCII.
        self.delimiter as u8
    }

    /// BLAKE3 hex digest of the canonical JSON form.
    pub fn fingerprint(&self) -> String {
        // Plain structs, maps and numbers: JSON serialization cannot fail.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.feature_config(), FeatureConfig::default());
        assert_eq!(config.delimiter, ';');
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = PipelineConfig::from_toml(
            r#"
windows = [5, 10]
sort_policy = "fail_fast"
max_staleness_days = 120
delimiter = ","

[candles]
trend_period = 3
"#,
        )
        .unwrap();
        assert_eq!(config.windows, vec![5, 10]);
        assert_eq!(config.sort_policy, SortPolicy::FailFast);
        assert_eq!(config.align_options().max_staleness_days, Some(120));
        assert_eq!(config.delimiter_byte(), b',');
        assert_eq!(config.candles.trend_period, 3);
        assert_eq!(config.candles.shadow_ratio, 2.0);
    }

    #[test]
    fn rejects_zero_window_and_unknown_keys() {
        assert!(matches!(
            PipelineConfig::from_toml("windows = [20, 0]"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("windows = []"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("rsi_period = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("window = [20]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = PipelineConfig::default();
        let mut b = PipelineConfig::default();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.rsi_period = 21;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }
}
