//! Runtime configuration for the statistics update.

/// Default number of points per parallel block.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Environment variable overriding the CPU block size.
pub const BLOCK_SIZE_ENV: &str = "SPLAT_STATS_BLOCK_SIZE";

/// Environment variable that turns on timing output (any value).
pub const TIMING_ENV: &str = "SPLAT_STATS_TIMING";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsConfig {
    /// Points per rayon task. Never zero.
    pub block_size: usize,

    /// Log wall-clock time of each update.
    pub enable_timing: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            enable_timing: false,
        }
    }
}

impl StatsConfig {
    /// Build a config from `SPLAT_STATS_BLOCK_SIZE` and `SPLAT_STATS_TIMING`.
    ///
    /// Unparseable block sizes fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let block_size = match lookup(BLOCK_SIZE_ENV) {
            Some(s) => s.trim().parse().unwrap_or_else(|_| {
                log::warn!("ignoring invalid {BLOCK_SIZE_ENV}={s:?}");
                DEFAULT_BLOCK_SIZE
            }),
            None => DEFAULT_BLOCK_SIZE,
        };

        Self {
            block_size: block_size.max(1),
            enable_timing: lookup(TIMING_ENV).is_some(),
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_timing(mut self, enable_timing: bool) -> Self {
        self.enable_timing = enable_timing;
        self
    }
}
