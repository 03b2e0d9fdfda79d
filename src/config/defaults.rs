//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Validation
// ============================================================================

/// Maximum location length (Unicode code points).
pub const MAX_LOCATION_CHARS: usize = 200;

/// Maximum description length (Unicode code points).
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

// ============================================================================
// Submission Admission
// ============================================================================

/// Submissions allowed per subject per window.
pub const ADMISSION_LIMIT: u32 = 5;

/// Admission window length (ms). 3 600 000 = 1 hour.
pub const ADMISSION_WINDOW_MS: u64 = 3_600_000;

/// Windows older than this many window lengths are evicted by the sweeper.
pub const ADMISSION_EVICTION_MULTIPLIER: u32 = 2;

/// How often the stale-window sweeper runs (seconds).
pub const ADMISSION_SWEEP_INTERVAL_SECS: u64 = 300;

// ============================================================================
// Refresh Scheduler
// ============================================================================

/// Lowest refresh interval the scheduler accepts (ms).
pub const MIN_REFRESH_INTERVAL_MS: u64 = 5_000;

/// Refresh interval used when none is configured (ms).
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30_000;

// ============================================================================
// Query Pipeline
// ============================================================================

/// Search history capacity (most recent first, de-duplicated).
pub const SEARCH_HISTORY_CAP: usize = 10;

// ============================================================================
// Geocoder
// ============================================================================

/// Public Nominatim endpoint.
pub const GEOCODER_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// OSM tile server.
pub const TILE_BASE_URL: &str = "https://tile.openstreetmap.org";

/// HTTP timeout for geocoder calls (seconds).
pub const GEOCODER_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Server / Storage
// ============================================================================

pub const SERVER_ADDR: &str = "0.0.0.0:8080";

pub const DATA_DIR: &str = "./data/roadwatch";
