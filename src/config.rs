use std::{env, path::PathBuf, time::Duration};

use tracing::warn;

// --- Feature Name Conventions ---
// One-hot columns are named `<base><sep><category>`, the way pandas/sklearn name them.
pub const DEFAULT_SEPARATOR: char = '_';

// --- One-Hot Split Detection ---
// A one-hot column only takes the values 0 and 1, so a tree trained on it splits at 0.5.
pub const ONE_HOT_THRESHOLD: f64 = 0.5;
pub const ONE_HOT_TOLERANCE: f64 = 1e-5;

// --- Graphviz Backend ---
pub const DEFAULT_DOT_BIN: &str = "dot";
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DOT_BIN_ENV: &str = "DTREE_DOT_BIN";
pub const RENDER_TIMEOUT_ENV: &str = "DTREE_RENDER_TIMEOUT_SECS";
/// Interval between checks on a running `dot` process.
pub const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(10);

// --- Dataset Limits ---
pub const MIN_ROWS: usize = 20;
pub const MIN_COLUMNS: usize = 2;
pub const MIN_SAMPLES_PER_CLASS: usize = 2;
pub const MAX_CLASSES: usize = 20;
pub const ID_UNIQUE_RATIO: f64 = 0.8; // Columns this unique look like identifiers
pub const ID_MAX_UNIQUE: usize = 1000;
pub const MISSING_CATEGORY: &str = "nan"; // Category assigned to empty categorical cells

/// Options that change how feature names are interpreted while rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Separator between the base feature name and the one-hot category.
    pub separator: char,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { separator: DEFAULT_SEPARATOR }
    }
}

/// Where to find Graphviz and how long to wait for it.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphvizConfig {
    pub executable: PathBuf,
    pub timeout: Duration,
}

impl Default for GraphvizConfig {
    fn default() -> Self {
        GraphvizConfig {
            executable: PathBuf::from(DEFAULT_DOT_BIN),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }
}

impl GraphvizConfig {
    /// Defaults overridden by `DTREE_DOT_BIN` and `DTREE_RENDER_TIMEOUT_SECS`.
    ///
    /// An unparsable timeout is ignored with a warning rather than failing startup.
    pub fn from_env() -> Self {
        let mut config = GraphvizConfig::default();
        if let Some(bin) = env::var_os(DOT_BIN_ENV).filter(|v| !v.is_empty()) {
            config.executable = PathBuf::from(bin);
        }
        if let Ok(raw) = env::var(RENDER_TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!(value = %raw, "ignoring invalid {}", RENDER_TIMEOUT_ENV),
            }
        }
        config
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
