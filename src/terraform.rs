mod state;

pub use state::{StateResource, flatten_into, load_state, parse_state};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerraformError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed state file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported state layout: expected \"modules\" or \"resources\"")]
    UnsupportedLayout,
}
