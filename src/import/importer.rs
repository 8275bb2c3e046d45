use std::{future::Future, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use csv_async::{AsyncReaderBuilder, ErrorKind};
use futures::StreamExt;
use serde_json::json;
use tokio::fs::File;

use super::{FileProcessor, ImportResult};
use crate::{
    data::{IdentityKey, InsertTx, RawRow, Requirement, TransactionStore},
    error::{IngestError, RowError, StoreError},
    statement_parsing::{BankFormatParser, LineContext, ParserRegistry},
};

/// Persists parsed rows, inserting each identity at most once.
pub struct DeduplicatingImporter {
    store: Arc<dyn TransactionStore>,
    store_timeout: Duration,
}

impl DeduplicatingImporter {
    pub fn new(store: Arc<dyn TransactionStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Classify one row and apply it to the store. Only an unusable store is
    /// an error; everything else is counted in `result`.
    pub async fn import_row(
        &self,
        parser: &dyn BankFormatParser,
        ctx: &LineContext,
        line: usize,
        row: Result<&RawRow, RowError>,
        result: &mut ImportResult,
    ) -> Result<(), IngestError> {
        result.lines += 1;

        let record = match row.and_then(|row| parser.process_line(row, ctx)) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            Err(err) => {
                invalid(result, line, &err);
                return Ok(());
            }
        };

        let requirements = Requirement::parse_all(parser.must_exist_before_saving());
        if let Err(err) = record.validate(&requirements) {
            invalid(result, line, &err);
            return Ok(());
        }

        let Some(datetime) = record.datetime else {
            invalid(result, line, &RowError::MissingField("datetime".to_owned()));
            return Ok(());
        };
        let date = datetime.with_timezone(&Utc);
        result.set_min_max_date("in_file", date);

        let id = record.identity(parser.unique_columns());
        let key = IdentityKey {
            id: id.to_owned(),
            account: record.account.to_owned(),
            datetime,
        };

        let exists = self
            .call_store(self.store.exists(&key))
            .await
            .map_err(IngestError::StoreUnavailable)?;

        if exists {
            tracing::debug!("line {line}: already imported {id}");
            result.skipped += 1;
            result.set_min_max_date("skipped", date);
            return Ok(());
        }

        let tx = InsertTx {
            id,
            datetime,
            account: record.account.to_owned(),
            description: record.description.to_owned(),
            debit: record.debit,
            credit: record.credit,
            balance: record.balance,
            tx_type: record.tx_type.to_owned(),
            jsondata: json!({
                "file": ctx.file_name,
                "row": record.raw,
            }),
            source_file: ctx.file_name.to_owned(),
            parser: parser.identifier().to_owned(),
            import_run: result.run_id.to_owned(),
            inserted_at: Utc::now(),
        };

        match self.call_store(self.store.insert(&tx)).await {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return Err(IngestError::StoreUnavailable(err)),
            Err(err) => {
                tracing::warn!("line {line}: {err}");
                result.invalid += 1;
                return Ok(());
            }
        }

        tracing::info!("INSERTED {record}");
        result.insert(&tx.id);
        result.set_min_max_date("inserted", date);
        if let Some(account) = &tx.account {
            result.set_min_max_date(account, date);
        }

        Ok(())
    }

    async fn call_store<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Unavailable(format!(
                "no answer within {}ms",
                self.store_timeout.as_millis()
            ))),
        }
    }
}

fn invalid(result: &mut ImportResult, line: usize, err: &RowError) {
    tracing::warn!("line {line}: {err}");
    result.invalid += 1;
}

/// Selects a parser for a file, reads it and runs every row through the
/// importer in order.
pub struct FileImporter {
    registry: Arc<ParserRegistry>,
    importer: DeduplicatingImporter,
}

impl FileImporter {
    pub fn new(registry: Arc<ParserRegistry>, importer: DeduplicatingImporter) -> Self {
        Self { registry, importer }
    }

    #[tracing::instrument(skip(self))]
    pub async fn import_file(&self, path: &Path) -> Result<ImportResult, IngestError> {
        let selection = self.registry.select(path).await?;
        let parser = selection.parser.as_ref();

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let ctx = LineContext {
            file_name: file_name.to_owned(),
            account: selection.account.to_owned(),
        };
        let mut result =
            ImportResult::new(&file_name, parser.identifier(), selection.account.as_deref());

        let mut rows = read_rows(path, parser.headers()).await?;
        if parser.reverse_rows() {
            rows.reverse();
        }

        for (index, row) in rows.into_iter().enumerate() {
            let imported = self
                .importer
                .import_row(parser, &ctx, index + 1, row.as_ref().map_err(Clone::clone), &mut result)
                .await;

            if let Err(err) = imported {
                tracing::error!(
                    "stopped {file_name} at line {}: {err} ({} inserted so far)",
                    index + 1,
                    result.inserted
                );
                return Err(err);
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl FileProcessor for FileImporter {
    async fn process(&self, path: &Path) -> Result<ImportResult, IngestError> {
        self.import_file(path).await
    }
}

/// Every data row of a csv as column name to value. Rows that cannot be
/// decoded come back as errors so they count against the file, not stop it.
pub async fn read_rows(
    path: &Path,
    headers: Option<&[&str]>,
) -> Result<Vec<Result<RawRow, RowError>>, IngestError> {
    let file = File::open(path).await?;

    let mut reader = AsyncReaderBuilder::new()
        .has_headers(headers.is_none())
        .flexible(true)
        .create_reader(file);

    let names: Vec<String> = match headers {
        Some(headers) => headers.iter().map(|h| h.to_string()).collect(),
        None => reader
            .headers()
            .await?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_owned())
            .collect(),
    };

    let mut rows = Vec::new();
    let mut records = reader.records();

    while let Some(record) = records.next().await {
        match record {
            Ok(record) => rows.push(Ok(names
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_owned))
                .collect())),
            Err(err) if matches!(err.kind(), ErrorKind::Io(_)) => return Err(err.into()),
            Err(err) => rows.push(Err(RowError::Malformed(err.to_string()))),
        }
    }

    Ok(rows)
}
