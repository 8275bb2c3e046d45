use std::path::Path;

use async_trait::async_trait;

use crate::error::IngestError;

mod importer;
pub use importer::{DeduplicatingImporter, FileImporter, read_rows};

mod result;
pub use result::{DateRange, ImportResult};

/// Runs one file through import. The queue only knows files by this seam.
#[async_trait]
pub trait FileProcessor: Send + Sync {
    async fn process(&self, path: &Path) -> Result<ImportResult, IngestError>;
}
