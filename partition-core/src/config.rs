//! Tuning constants for the partitioner, exposed as recognized configuration
//! options rather than baked-in literals.

use serde::Deserialize;

/// Recognized tuning knobs for [`crate::coordinate_partition`].
///
/// Defaults reproduce the calibrated heuristics of the original
/// coordinate partitioner: 512 bins per axis, five refinement iterations,
/// a 4x bin-count imbalance tolerance before refinement stops early, and
/// a minimum of 100 local samples per rank in the sample-sort splitter
/// selection.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// `log2` of the number of bins per coordinate axis. Must be >= 1.
    pub nbits: u32,
    /// Maximum number of histogram-refinement iterations. Must be >= 1.
    pub refine_iters: u32,
    /// Bin-count imbalance tolerance (`max(gcounts) / mean(gcounts)`)
    /// below which refinement stops early. Must be >= 1.0.
    pub balance_tolerance: f64,
    /// Floor on the number of local splitter samples `PseudoSampleSort`
    /// will fall back to before the `gnvtxs`-based rescue kicks in. Must
    /// be >= 1.
    pub min_samples: usize,
}

impl PartitionConfig {
    /// Number of bins per axis, `2^nbits`.
    pub fn nbins(&self) -> usize {
        1usize << self.nbits
    }

    /// Validate the configuration, panicking with a descriptive message
    /// on violation. Called once at the top of [`crate::coordinate_partition`]
    /// since a malformed config is a programmer error, not a runtime
    /// condition any rank can recover from mid-collective.
    pub fn validate(&self) {
        assert!(self.nbits >= 1, "PartitionConfig::nbits must be >= 1, got {}", self.nbits);
        assert!(
            self.refine_iters >= 1,
            "PartitionConfig::refine_iters must be >= 1, got {}",
            self.refine_iters
        );
        assert!(
            self.balance_tolerance >= 1.0,
            "PartitionConfig::balance_tolerance must be >= 1.0, got {}",
            self.balance_tolerance
        );
        assert!(
            self.min_samples >= 1,
            "PartitionConfig::min_samples must be >= 1, got {}",
            self.min_samples
        );
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        PartitionConfig {
            nbits: 9,
            refine_iters: 5,
            balance_tolerance: 4.0,
            min_samples: 100,
        }
    }
}
