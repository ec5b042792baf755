use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("page {page} is outside the document ({count} pages)")]
    OutOfRange { page: usize, count: usize },

    #[error("failed to decode page {page} from {}: {source}", .path.display())]
    Decode {
        page: usize,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to spawn loader worker: {0}")]
    Spawn(#[source] std::io::Error),
}
