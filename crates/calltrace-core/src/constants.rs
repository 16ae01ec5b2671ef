//! Shared constants for the calltrace engine.

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Project-level config file name, looked up at the project root.
pub const PROJECT_CONFIG_FILE: &str = "calltrace.toml";

/// User-level config directory under `$HOME`.
pub const USER_CONFIG_DIR: &str = ".calltrace";

/// Environment variable holding the tracing filter directives.
pub const LOG_ENV_VAR: &str = "CALLTRACE_LOG";

/// Prefix for environment overrides (`CALLTRACE_MAX_DEPTH`, ...).
pub const ENV_PREFIX: &str = "CALLTRACE_";

// ---- Resolution ----

/// Per-language resolution rate below which a warning is raised.
pub const DEFAULT_LOW_RATE_THRESHOLD: f64 = 0.30;

/// Allowed drop in a language's resolution rate between two builds.
pub const DEFAULT_REGRESSION_TOLERANCE: f64 = 0.10;

/// Languages with fewer call sites than this are not checked for regressions.
pub const MIN_CALL_SITES_FOR_REGRESSION: usize = 20;

/// Maximum re-export hops followed by import-based resolution.
pub const MAX_REEXPORT_DEPTH: usize = 8;

/// Maximum ancestor chain walked by method resolution.
pub const MAX_ANCESTOR_DEPTH: usize = 32;

// ---- Query ----

/// Default maximum traversal depth for reachability queries.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Default query cache capacity (entries).
pub const DEFAULT_CACHE_CAPACITY: u64 = 1024;

/// Default query cache TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

/// Function count above which traversal queries go to storage.
pub const DEFAULT_IN_MEMORY_THRESHOLD: usize = 500_000;

/// Default page size for paginated queries.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Hard cap on page size.
pub const MAX_PAGE_SIZE: usize = 1000;

// ---- Storage ----

/// Batch writer rows per chunk.
pub const BATCH_WRITE_SIZE: usize = 500;

/// Batch writer channel capacity.
pub const BATCH_CHANNEL_CAPACITY: usize = 1024;

/// Batch writer recv timeout in milliseconds.
pub const BATCH_RECV_TIMEOUT_MS: u64 = 100;

// ---- Entry points ----

/// Default directory globs for the controller convention.
pub const DEFAULT_CONTROLLER_GLOBS: [&str; 5] = [
    "**/controllers/**",
    "**/controller/**",
    "**/handlers/**",
    "**/routes/**",
    "**/api/**",
];
