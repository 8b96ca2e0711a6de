/// Reference name prefix of marker files.
pub const DEFAULT_MARKER_PREFIX: &str = "res_timestamp-";

pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    /// Size of the buffer used to stream each asset into the destination.
    pub buffer_size: usize,
    /// Marker files are recognised by this name prefix.
    pub marker_prefix: String,
    /// Remove directories left empty by a purge.
    pub prune_empty_dirs: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            marker_prefix: DEFAULT_MARKER_PREFIX.to_string(),
            prune_empty_dirs: true,
        }
    }
}
