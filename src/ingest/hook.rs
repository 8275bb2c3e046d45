use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

use super::queue::{FileOutcome, SettledHook};

/// Post-processing for a settled batch: reports every file and archives the
/// ones that imported cleanly.
pub struct BatchFinisher {
    watch_dir: PathBuf,
    processed_dir: PathBuf,
    archive: bool,
}

impl BatchFinisher {
    pub fn new(watch_dir: PathBuf, processed_dir: PathBuf, archive: bool) -> Self {
        Self {
            watch_dir,
            processed_dir,
            archive,
        }
    }

    /// Moves `path` under the processed directory, keeping its place relative
    /// to the watched directory.
    pub async fn archive(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let relative = match path.strip_prefix(&self.watch_dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => PathBuf::from(path.file_name().context("archived path has no file name")?),
        };
        let target = self.processed_dir.join(relative);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("error creating archive directory")?;
        }

        tokio::fs::rename(path, &target)
            .await
            .context("error moving file to archive")?;

        Ok(target)
    }
}

#[async_trait]
impl SettledHook for BatchFinisher {
    #[tracing::instrument(skip_all, fields(files = batch.len()))]
    async fn on_settled(&self, batch: Vec<FileOutcome>) {
        let mut inserted_ids: Vec<&str> = Vec::new();

        for outcome in &batch {
            let result = match &outcome.result {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!("{} was not imported: {err}", outcome.path.display());
                    continue;
                }
            };

            tracing::info!("{result}");
            inserted_ids.extend(result.inserted_ids.iter().map(String::as_str));

            if !result.is_success() {
                tracing::warn!(
                    "leaving {} in place, {} invalid rows",
                    outcome.path.display(),
                    result.invalid
                );
                continue;
            }

            if !self.archive {
                continue;
            }

            match self.archive(&outcome.path).await {
                Ok(target) => tracing::info!(
                    "moved {} to {}",
                    outcome.path.display(),
                    target.display()
                ),
                Err(err) => tracing::error!("{} not archived: {err:#}", outcome.path.display()),
            }
        }

        if !inserted_ids.is_empty() {
            tracing::info!("{} new transactions ready for tagging", inserted_ids.len());
            tracing::debug!("new transaction ids: {:?}", inserted_ids);
        }
    }
}
