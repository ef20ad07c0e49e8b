// ============================================================================
// redacto-core/src/config/builder.rs
// ============================================================================
//
// CONFIGURATION BUILDER: Builder Pattern for CoreConfig
//
// Fluent construction of CoreConfig. Every setter has a default taken from
// CoreConfig::default(), so callers only name what they change. Validation
// stays in CoreConfig::validate so configs built by hand are checked the
// same way.

use std::path::PathBuf;
use std::time::Duration;

use super::{CoreConfig, DetectionFailurePolicy, OutputCodec};
use crate::detection::TargetClasses;

/// Builder for creating CoreConfig instances.
///
/// # Examples
///
/// ```rust
/// use redacto_core::config::{CoreConfigBuilder, DetectionFailurePolicy};
/// use std::time::Duration;
///
/// let config = CoreConfigBuilder::new()
///     .kernel_size(51)
///     .sigma(15.0)
///     .detection_failure_policy(DetectionFailurePolicy::PassThrough)
///     .detection_timeout(Duration::from_secs(5))
///     .build();
/// assert_eq!(config.kernel_size, 51);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Creates a new CoreConfigBuilder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the detector labels to redact, replacing the default `person`.
    #[must_use]
    pub fn target_classes<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.target_classes = TargetClasses::new(labels);
        self
    }

    /// Sets the minimum confidence a box needs to be redacted.
    #[must_use]
    pub fn min_confidence(mut self, confidence: f32) -> Self {
        self.config.min_confidence = confidence;
        self
    }

    /// Sets the blur kernel edge length.
    #[must_use]
    pub fn kernel_size(mut self, size: u32) -> Self {
        self.config.kernel_size = size;
        self
    }

    /// Sets the Gaussian standard deviation.
    #[must_use]
    pub fn sigma(mut self, sigma: f64) -> Self {
        self.config.sigma = sigma;
        self
    }

    #[must_use]
    pub fn codec(mut self, codec: OutputCodec) -> Self {
        self.config.codec = codec;
        self
    }

    #[must_use]
    pub fn detection_failure_policy(mut self, policy: DetectionFailurePolicy) -> Self {
        self.config.detection_failure_policy = policy;
        self
    }

    /// Sets the per-frame deadline for process-backed detectors.
    #[must_use]
    pub fn detection_timeout(mut self, timeout: Duration) -> Self {
        self.config.detection_timeout = Some(timeout);
        self
    }

    /// Sets the base directory for scratch files.
    #[must_use]
    pub fn temp_dir(mut self, path: PathBuf) -> Self {
        self.config.temp_dir = Some(path);
        self
    }

    /// Keeps scratch files after the run instead of deleting them.
    #[must_use]
    pub fn keep_temp(mut self, keep: bool) -> Self {
        self.config.keep_temp = keep;
        self
    }

    /// Builds the CoreConfig instance.
    #[must_use]
    pub fn build(self) -> CoreConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_config_defaults() {
        let built = CoreConfigBuilder::new().build();
        let default = CoreConfig::default();
        assert_eq!(built.target_classes, default.target_classes);
        assert_eq!(built.kernel_size, default.kernel_size);
        assert_eq!(built.codec, default.codec);
        assert!(!built.keep_temp);
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = CoreConfigBuilder::new()
            .target_classes(["Face"])
            .min_confidence(0.25)
            .codec(OutputCodec::H264)
            .temp_dir(PathBuf::from("/tmp/redacto"))
            .keep_temp(true)
            .build();
        assert!(config.target_classes.contains("face"));
        assert!(!config.target_classes.contains("person"));
        assert_eq!(config.min_confidence, 0.25);
        assert_eq!(config.codec, OutputCodec::H264);
        assert_eq!(config.temp_dir, Some(PathBuf::from("/tmp/redacto")));
        assert!(config.keep_temp);
    }
}
