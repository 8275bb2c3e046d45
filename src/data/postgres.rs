use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, query, query_scalar};

use super::{IdentityKey, InsertTx, TransactionStore};
use crate::error::StoreError;

type Pool = PgPool;

#[derive(Clone)]
pub struct Postgres {
    pool: Pool,
}

impl Postgres {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url)
            .await
            .context("error connecting to postgres")?;

        return Ok(Self { pool });
    }

    #[tracing::instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        query(
            r#"
            create table if not exists imported_transactions (
                id text primary key,
                datetime timestamptz not null,
                account text,
                description text,
                debit numeric,
                credit numeric,
                balance numeric,
                type text,
                jsondata jsonb,
                source_file text not null,
                parser text not null,
                import_run text not null,
                inserted_at timestamptz not null
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("error creating imported_transactions")?;

        query(
            r#"
            create index if not exists imported_transactions_account_datetime
            on imported_transactions (account, datetime)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("error creating imported_transactions index")?;

        Ok(())
    }
}

#[async_trait]
impl TransactionStore for Postgres {
    async fn exists(&self, key: &IdentityKey) -> Result<bool, StoreError> {
        let found = query_scalar::<_, bool>(
            r#"
            select exists (
                select 1 from imported_transactions
                where account is not distinct from $1
                  and datetime = $2
                  and id = $3
            )
            "#,
        )
        .bind(&key.account)
        .bind(key.datetime)
        .bind(&key.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }

    async fn insert(&self, tx: &InsertTx) -> Result<(), StoreError> {
        query(
            r#"
            insert into imported_transactions (
                id,
                datetime,
                account,
                description,
                debit,
                credit,
                balance,
                type,
                jsondata,
                source_file,
                parser,
                import_run,
                inserted_at
            )
            values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&tx.id) // $1
        .bind(tx.datetime) // $2
        .bind(&tx.account) // $3
        .bind(&tx.description) // $4
        .bind(tx.debit) // $5
        .bind(tx.credit) // $6
        .bind(tx.balance) // $7
        .bind(&tx.tx_type) // $8
        .bind(&tx.jsondata) // $9
        .bind(&tx.source_file) // $10
        .bind(&tx.parser) // $11
        .bind(&tx.import_run) // $12
        .bind(tx.inserted_at) // $13
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
