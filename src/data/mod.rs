use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

mod record;
pub use record::*;

mod postgres;
pub use postgres::Postgres;

mod memory;
pub use memory::MemoryStore;

/// Where a stored transaction with a given identity would be. `account` and
/// `datetime` bound the lookup, `id` decides it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityKey {
    pub id: String,
    pub account: Option<String>,
    pub datetime: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsertTx {
    pub id: String,
    pub datetime: DateTime<FixedOffset>,
    pub account: Option<String>,
    pub description: Option<String>,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub tx_type: Option<String>,
    pub jsondata: Value,
    pub source_file: String,
    pub parser: String,
    pub import_run: String,
    pub inserted_at: DateTime<Utc>,
}

impl InsertTx {
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            id: self.id.to_owned(),
            account: self.account.to_owned(),
            datetime: self.datetime,
        }
    }
}

/// Append-only transaction storage with identity lookup.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn exists(&self, key: &IdentityKey) -> Result<bool, StoreError>;

    async fn insert(&self, tx: &InsertTx) -> Result<(), StoreError>;
}
