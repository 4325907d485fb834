pub mod fever;
pub mod greader;

pub use fever::FeverClient;
pub use greader::GReaderClient;

use crate::traits::FeedReader;
use crate::types::{ReaderConfig, RelayError, Result};
use std::sync::Arc;

/// Build the reader client named by `READER_API`.
pub fn build_reader(kind: &str, config: ReaderConfig) -> Result<Arc<dyn FeedReader>> {
    match kind.trim().to_ascii_lowercase().as_str() {
        "greader" | "google" => Ok(Arc::new(GReaderClient::new(config)?)),
        "fever" => Ok(Arc::new(FeverClient::new(config)?)),
        other => Err(RelayError::Config(format!("unknown reader API: {}", other))),
    }
}
