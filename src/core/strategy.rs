//! Retrieval strategy selection.
//!
//! [`select_strategy`] is a pure function of the probed size, the caller's
//! overrides and an immutable [`StrategyConfig`]:
//!
//! | Size | Strategy | Chunk size | Parallelism |
//! |------|----------|------------|-------------|
//! | 0 (unknown) | `UnknownSizeFallback` | whole file | 1 |
//! | up to 20MB | `SingleShot` | whole file | 1 |
//! | up to 50MB | `MediumParallel` | 8MB, 4MB above 40MB | 10 |
//! | above 50MB | `SafeParallel` | 2MB | 3 |
//!
//! Overrides only apply to the two chunked strategies. A chunk size override
//! is raised to `min_chunk_size`, and no plan may exceed `max_chunk_count`
//! tasks.

/// One mebibyte.
pub const MB: u64 = 1024 * 1024;

/// One kibibyte.
pub const KB: u64 = 1024;

/// Size thresholds and chunking defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    /// Largest size fetched in one request
    pub single_shot_max_bytes: u64,
    /// Largest size handled by the medium strategy
    pub medium_max_bytes: u64,
    pub medium_chunk_size: u64,
    /// Above this size the medium strategy uses `medium_large_chunk_size`
    pub medium_large_threshold_bytes: u64,
    pub medium_large_chunk_size: u64,
    pub medium_parallelism: usize,
    pub safe_chunk_size: u64,
    pub safe_parallelism: usize,
    /// Floor applied to caller chunk size overrides
    pub min_chunk_size: u64,
    /// Most range requests a single job may plan
    pub max_chunk_count: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            single_shot_max_bytes: 20 * MB,
            medium_max_bytes: 50 * MB,
            medium_chunk_size: 8 * MB,
            medium_large_threshold_bytes: 40 * MB,
            medium_large_chunk_size: 4 * MB,
            medium_parallelism: 10,
            safe_chunk_size: 2 * MB,
            safe_parallelism: 3,
            min_chunk_size: 256 * KB,
            max_chunk_count: 10_000,
        }
    }
}

impl StrategyConfig {
    /// Check threshold ordering and positivity.
    pub fn validate(&self) -> Result<(), String> {
        if self.single_shot_max_bytes == 0 {
            return Err("single_shot_max_bytes must be positive".to_string());
        }
        if self.medium_max_bytes < self.single_shot_max_bytes {
            return Err(format!(
                "medium_max_bytes ({}) must be >= single_shot_max_bytes ({})",
                self.medium_max_bytes, self.single_shot_max_bytes
            ));
        }
        for (name, value) in [
            ("medium_chunk_size", self.medium_chunk_size),
            ("medium_large_chunk_size", self.medium_large_chunk_size),
            ("safe_chunk_size", self.safe_chunk_size),
        ] {
            if value == 0 {
                return Err(format!("{name} must be positive"));
            }
        }
        if self.medium_parallelism == 0 || self.safe_parallelism == 0 {
            return Err("parallelism must be at least 1".to_string());
        }
        if self.min_chunk_size == 0 {
            return Err("min_chunk_size must be positive".to_string());
        }
        if self.max_chunk_count == 0 {
            return Err("max_chunk_count must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Caller-supplied overrides; `None` keeps the computed default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrategyOverrides {
    pub chunk_size: Option<u64>,
    pub parallelism: Option<usize>,
}

impl StrategyOverrides {
    /// Build overrides, discarding non-positive values.
    pub fn new(chunk_size: Option<u64>, parallelism: Option<usize>) -> Self {
        Self {
            chunk_size: chunk_size.filter(|v| *v > 0),
            parallelism: parallelism.filter(|v| *v > 0),
        }
    }
}

/// How a job retrieves its bytes. Chosen once per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    SingleShot,
    UnknownSizeFallback,
    MediumParallel { chunk_size: u64, max_parallel: usize },
    SafeParallel { chunk_size: u64, max_parallel: usize },
}

impl RetrievalStrategy {
    /// Stable snake_case name reported in job metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SingleShot => "single_shot",
            Self::UnknownSizeFallback => "unknown_size_fallback",
            Self::MediumParallel { .. } => "medium_parallel",
            Self::SafeParallel { .. } => "safe_parallel",
        }
    }

    /// Whether the whole resource is fetched in one request.
    pub fn is_whole_file(&self) -> bool {
        matches!(self, Self::SingleShot | Self::UnknownSizeFallback)
    }

    /// `(chunk_size, max_parallel)` for the chunked strategies.
    pub fn chunking(&self) -> Option<(u64, usize)> {
        match *self {
            Self::MediumParallel {
                chunk_size,
                max_parallel,
            }
            | Self::SafeParallel {
                chunk_size,
                max_parallel,
            } => Some((chunk_size, max_parallel)),
            _ => None,
        }
    }
}

impl std::fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Pick the retrieval strategy for a resource of `total_size` bytes.
pub fn select_strategy(
    total_size: u64,
    overrides: StrategyOverrides,
    config: &StrategyConfig,
) -> RetrievalStrategy {
    if total_size == 0 {
        return RetrievalStrategy::UnknownSizeFallback;
    }
    if total_size <= config.single_shot_max_bytes {
        return RetrievalStrategy::SingleShot;
    }

    let chunk_override = overrides
        .chunk_size
        .map(|size| size.max(config.min_chunk_size));

    if total_size <= config.medium_max_bytes {
        let default_chunk = if total_size > config.medium_large_threshold_bytes {
            config.medium_large_chunk_size
        } else {
            config.medium_chunk_size
        };
        return RetrievalStrategy::MediumParallel {
            chunk_size: chunk_override.unwrap_or(default_chunk),
            max_parallel: overrides.parallelism.unwrap_or(config.medium_parallelism),
        };
    }

    RetrievalStrategy::SafeParallel {
        chunk_size: chunk_override.unwrap_or(config.safe_chunk_size),
        max_parallel: overrides.parallelism.unwrap_or(config.safe_parallelism),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(total: u64) -> RetrievalStrategy {
        select_strategy(total, StrategyOverrides::default(), &StrategyConfig::default())
    }

    #[test]
    fn test_size_thresholds() {
        assert_eq!(select(0), RetrievalStrategy::UnknownSizeFallback);
        assert_eq!(select(10_000_000), RetrievalStrategy::SingleShot);
        assert_eq!(select(20 * MB), RetrievalStrategy::SingleShot);
        assert_eq!(
            select(30_000_000),
            RetrievalStrategy::MediumParallel {
                chunk_size: 8 * MB,
                max_parallel: 10
            }
        );
        assert_eq!(
            select(45_000_000),
            RetrievalStrategy::MediumParallel {
                chunk_size: 4 * MB,
                max_parallel: 10
            }
        );
        assert_eq!(
            select(100_000_000),
            RetrievalStrategy::SafeParallel {
                chunk_size: 2 * MB,
                max_parallel: 3
            }
        );
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert!(matches!(
            select(20 * MB + 1),
            RetrievalStrategy::MediumParallel { .. }
        ));
        assert!(matches!(
            select(40 * MB),
            RetrievalStrategy::MediumParallel {
                chunk_size,
                ..
            } if chunk_size == 8 * MB
        ));
        assert!(matches!(
            select(50 * MB),
            RetrievalStrategy::MediumParallel { .. }
        ));
        assert!(matches!(
            select(50 * MB + 1),
            RetrievalStrategy::SafeParallel { .. }
        ));
    }

    #[test]
    fn test_overrides_apply_to_chunked_strategies_only() {
        let overrides = StrategyOverrides::new(Some(1_000_000), Some(2));
        let config = StrategyConfig::default();

        assert_eq!(
            select_strategy(10_000_000, overrides, &config),
            RetrievalStrategy::SingleShot
        );
        assert_eq!(
            select_strategy(0, overrides, &config),
            RetrievalStrategy::UnknownSizeFallback
        );
        assert_eq!(
            select_strategy(30_000_000, overrides, &config),
            RetrievalStrategy::MediumParallel {
                chunk_size: 1_000_000,
                max_parallel: 2
            }
        );
        assert_eq!(
            select_strategy(100_000_000, overrides, &config),
            RetrievalStrategy::SafeParallel {
                chunk_size: 1_000_000,
                max_parallel: 2
            }
        );
    }

    #[test]
    fn test_non_positive_overrides_ignored() {
        let overrides = StrategyOverrides::new(Some(0), Some(0));
        assert_eq!(overrides, StrategyOverrides::default());
        assert_eq!(
            select_strategy(100_000_000, overrides, &StrategyConfig::default()),
            select(100_000_000)
        );
    }

    #[test]
    fn test_tiny_chunk_override_raised_to_floor() {
        let overrides = StrategyOverrides::new(Some(1), None);
        assert_eq!(
            select_strategy(100_000_000, overrides, &StrategyConfig::default()),
            RetrievalStrategy::SafeParallel {
                chunk_size: 256 * KB,
                max_parallel: 3
            }
        );
    }

    #[test]
    fn test_selection_is_pure() {
        let config = StrategyConfig::default();
        for size in [0, 1, 5 * MB, 25 * MB, 45 * MB, 500 * MB] {
            assert_eq!(
                select_strategy(size, StrategyOverrides::default(), &config),
                select_strategy(size, StrategyOverrides::default(), &config)
            );
        }
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(select(0).name(), "unknown_size_fallback");
        assert_eq!(select(1).to_string(), "single_shot");
        assert_eq!(select(30_000_000).chunking(), Some((8 * MB, 10)));
        assert!(select(1).is_whole_file());
        assert!(select(1).chunking().is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(StrategyConfig::default().validate().is_ok());

        let config = StrategyConfig {
            medium_max_bytes: MB,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig {
            safe_parallelism: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig {
            max_chunk_count: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StrategyConfig {
            min_chunk_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
