//! Engine configuration.

/// Default acceptance threshold.
///
/// With the weights in [`crate::plugin::weight`] an extension match plus a
/// single structural check scores 35, so a plugin needs at least two
/// independent structural checks to be accepted.
pub const DEFAULT_MIN_SCORE: u8 = 40;

/// Ceilings applied by the hard-mode validator while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest directory entry count accepted before parsing aborts.
    pub max_files: u64,
    /// Longest stored file name accepted, in bytes.
    pub max_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_files: 500_000,
            max_name_len: 256,
        }
    }
}

/// Configuration for the [`crate::Engine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum score (0-100) a plugin needs to be accepted.
    pub min_score: u8,
    /// Score every registered plugin instead of only those declaring the
    /// candidate's extension.
    pub scan_all: bool,
    /// When the winning plugin fails to parse, try the next accepted one.
    pub retry_next: bool,
    /// Score plugins concurrently on the rayon pool.
    pub parallel: bool,
    /// Validation ceilings.
    pub limits: Limits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            scan_all: false,
            retry_next: false,
            parallel: true,
            limits: Limits::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the acceptance threshold (clamped to 100)
    pub fn min_score(mut self, score: u8) -> Self {
        self.min_score = score.min(100);
        self
    }

    /// Enables or disables scanning with every plugin
    pub fn scan_all(mut self, yes: bool) -> Self {
        self.scan_all = yes;
        self
    }

    /// Enables or disables falling through to the next candidate on parse failure
    pub fn retry_next(mut self, yes: bool) -> Self {
        self.retry_next = yes;
        self
    }

    /// Enables or disables parallel scoring
    pub fn parallel(mut self, yes: bool) -> Self {
        self.parallel = yes;
        self
    }

    /// Sets the maximum directory entry count
    pub fn max_files(mut self, max: u64) -> Self {
        self.limits.max_files = max;
        self
    }

    /// Sets the maximum stored name length
    pub fn max_name_len(mut self, max: usize) -> Self {
        self.limits.max_name_len = max;
        self
    }
}
