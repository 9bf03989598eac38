//! Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::outlier::{DEFAULT_CEILING, DEFAULT_IQR_FACTOR, DEFAULT_MIN_POINTS, OutlierFence};

/// Bucket size used when reducing streamed history.
pub const HISTORY_BUCKET_SIZE: usize = 100;

/// Parameters of one [`ReductionPipeline`](crate::pipeline::ReductionPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bucket_size: usize,
    pub filter_outliers: bool,
    pub iqr_factor: f64,
    pub outlier_ceiling: f64,
    pub min_outlier_points: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::history()
    }
}

impl PipelineConfig {
    /// Historical chunks: heavy downsampling with the outlier fence on.
    pub fn history() -> Self {
        Self {
            bucket_size: HISTORY_BUCKET_SIZE,
            filter_outliers: true,
            iqr_factor: DEFAULT_IQR_FACTOR,
            outlier_ceiling: DEFAULT_CEILING,
            min_outlier_points: DEFAULT_MIN_POINTS,
        }
    }

    /// Live snapshot view: every sample is a point, nothing filtered.
    pub fn live() -> Self {
        Self {
            bucket_size: 1,
            filter_outliers: false,
            ..Self::history()
        }
    }

    pub fn with_bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    pub fn fence(&self) -> OutlierFence {
        OutlierFence {
            factor: self.iqr_factor,
            ceiling: self.outlier_ceiling,
            min_points: self.min_outlier_points,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_size == 0 {
            return Err(ConfigError::ZeroBucketSize);
        }
        for (field, value) in [
            ("iqr_factor", self.iqr_factor),
            ("outlier_ceiling", self.outlier_ceiling),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidFactor { field, value });
            }
        }
        Ok(())
    }

    /// Load and validate a JSON config file. Missing fields take the
    /// history defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let history = PipelineConfig::history();
        assert_eq!(history.bucket_size, 100);
        assert!(history.filter_outliers);
        assert_eq!(history.fence(), OutlierFence::default());

        let live = PipelineConfig::live();
        assert_eq!(live.bucket_size, 1);
        assert!(!live.filter_outliers);
        assert!(live.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let zero = PipelineConfig::history().with_bucket_size(0);
        assert!(matches!(zero.validate(), Err(ConfigError::ZeroBucketSize)));

        let nan = PipelineConfig {
            iqr_factor: f64::NAN,
            ..PipelineConfig::history()
        };
        assert!(matches!(
            nan.validate(),
            Err(ConfigError::InvalidFactor { field: "iqr_factor", .. })
        ));

        let negative = PipelineConfig {
            outlier_ceiling: -1.0,
            ..PipelineConfig::history()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"bucket_size": 10, "outlier_ceiling": 250.0}"#).unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.bucket_size, 10);
        assert_eq!(config.outlier_ceiling, 250.0);
        assert!(config.filter_outliers);
        assert_eq!(config.iqr_factor, DEFAULT_IQR_FACTOR);
    }

    #[test]
    fn load_reports_io_and_validation_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = PipelineConfig::load(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let path = dir.path().join("zero.json");
        std::fs::write(&path, r#"{"bucket_size": 0}"#).unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(ConfigError::ZeroBucketSize)
        ));
    }
}
