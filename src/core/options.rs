//! Options for extraction operations

use std::sync::Arc;
use std::time::Duration;

/// Progress callback function type, receives (completed_regions, total_regions)
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Default max area of one sub-region query: 50km x 50km, in square meters
pub const DEFAULT_MAX_QUERY_AREA_SIZE: f64 = 50.0 * 1000.0 * 50.0 * 1000.0;

/// Options for Overpass queries and graph construction
#[derive(Clone)]
pub struct QueryOptions {
    /// Timeout in seconds, sent to Overpass and used for each HTTP request
    pub timeout: u64,

    /// Server memory allocation in bytes; server default when `None`
    pub memory: Option<u64>,

    /// Max area of any sub-region, in square meters of the local UTM zone
    pub max_query_area_size: f64,

    /// Fixed wait before the first retry of an overloaded server; later
    /// retries, or all of them when `None`, ask the status endpoint
    pub error_pause: Option<Duration>,

    /// Emit a single edge per segment when true, both directions when false
    pub directed: bool,

    /// Optional progress callback
    pub progress: Option<ProgressCallback>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            timeout: 180,
            memory: None,
            max_query_area_size: DEFAULT_MAX_QUERY_AREA_SIZE,
            error_pause: None,
            directed: true,
            progress: None,
        }
    }
}

impl std::fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("timeout", &self.timeout)
            .field("memory", &self.memory)
            .field("max_query_area_size", &self.max_query_area_size)
            .field("error_pause", &self.error_pause)
            .field("directed", &self.directed)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
