use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::model::{PerformanceRecord, Rules};
use crate::util::{ensure_directory, now_utc_string};


pub const DB_SCHEMA_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadEntry {
    pub upload_id: String,
    pub source_name: String,
    pub sha256: String,
    pub row_count: usize,
    pub warning_count: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<String>,
    pub updated_at: String,
}

pub struct Store {
    connection: Connection,
    opened_schema_version: Option<String>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        configure_connection(&connection)?;
        Self::with_connection(connection)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory().context("failed to open in-memory db")?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self> {
        let opened_schema_version = read_schema_version(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self {
            connection,
            opened_schema_version,
        })
    }

    /// Version recorded before this open refreshed it; `None` for a new database.
    pub fn opened_schema_version(&self) -> Option<&str> {
        self.opened_schema_version.as_deref()
    }

    pub fn schema_version(&self) -> Result<Option<String>> {
        self.connection
            .query_row(
                "SELECT value FROM metadata WHERE key = 'db_schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("failed to read schema version")
    }

    pub fn replace_records(
        &mut self,
        account_id: &str,
        upload: &UploadEntry,
        records: &[PerformanceRecord],
    ) -> Result<usize> {
        let tx = self
            .connection
            .transaction()
            .context("failed to begin record replacement")?;

        let removed = tx
            .execute(
                "DELETE FROM ad_records WHERE account_id = ?1",
                params![account_id],
            )
            .context("failed to clear previous records")?;

        tx.execute(
            "
            INSERT INTO uploads(upload_id, account_id, source_name, sha256, row_count, warning_count, created_at)
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                upload.upload_id,
                account_id,
                upload.source_name,
                upload.sha256,
                to_sql_count(upload.row_count as u64)?,
                to_sql_count(upload.warning_count as u64)?,
                upload.created_at,
            ],
        )
        .with_context(|| format!("failed to record upload {}", upload.upload_id))?;

        {
            let mut statement = tx.prepare(
                "
                INSERT INTO ad_records(
                  account_id, upload_id, seq, period_start, period_end,
                  campaign_name, ad_set_name, ad_name,
                  impressions, clicks, spend, purchases, revenue
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ",
            )?;
            for (seq, record) in records.iter().enumerate() {
                insert_record(
                    &mut statement,
                    account_id,
                    Some(upload.upload_id.as_str()),
                    seq as i64,
                    record,
                )?;
            }
        }

        tx.commit().context("failed to commit record replacement")?;
        debug!(
            account = account_id,
            removed,
            inserted = records.len(),
            "replaced account records"
        );

        Ok(records.len())
    }

    pub fn append_record(&mut self, account_id: &str, record: &PerformanceRecord) -> Result<()> {
        let next_seq: i64 = self.connection.query_row(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM ad_records WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;

        let mut statement = self.connection.prepare(
            "
            INSERT INTO ad_records(
              account_id, upload_id, seq, period_start, period_end,
              campaign_name, ad_set_name, ad_name,
              impressions, clicks, spend, purchases, revenue
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
        )?;
        insert_record(&mut statement, account_id, None, next_seq, record)
    }

    /// Newest reporting periods first; rows of one period keep insertion order.
    pub fn load_records(&self, account_id: &str) -> Result<Vec<PerformanceRecord>> {
        let mut statement = self.connection.prepare(
            "
            SELECT
              period_start, period_end, campaign_name, ad_set_name, ad_name,
              impressions, clicks, spend, purchases, revenue
            FROM ad_records
            WHERE account_id = ?1
            ORDER BY period_start DESC, seq ASC
            ",
        )?;

        let mut rows = statement.query(params![account_id])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            let spend: String = row.get(7)?;
            let revenue: String = row.get(9)?;
            records.push(PerformanceRecord {
                period_start: row.get::<_, NaiveDate>(0)?,
                period_end: row.get::<_, NaiveDate>(1)?,
                campaign_name: row.get(2)?,
                ad_set_name: row.get(3)?,
                ad_name: row.get(4)?,
                impressions: from_sql_count(row.get(5)?)?,
                clicks: from_sql_count(row.get(6)?)?,
                spend: parse_stored_decimal(&spend, "spend")?,
                purchases: from_sql_count(row.get(8)?)?,
                revenue: parse_stored_decimal(&revenue, "revenue")?,
            });
        }

        Ok(records)
    }

    pub fn count_records(&self, account_id: &str) -> Result<i64> {
        let count = self.connection.query_row(
            "SELECT COUNT(*) FROM ad_records WHERE account_id = ?1",
            params![account_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn latest_upload(&self, account_id: &str) -> Result<Option<UploadEntry>> {
        let row = self
            .connection
            .query_row(
                "
                SELECT upload_id, source_name, sha256, row_count, warning_count, created_at
                FROM uploads
                WHERE account_id = ?1
                ORDER BY created_at DESC, rowid DESC
                LIMIT 1
                ",
                params![account_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((upload_id, source_name, sha256, row_count, warning_count, created_at)) = row
        else {
            return Ok(None);
        };

        Ok(Some(UploadEntry {
            upload_id,
            source_name,
            sha256,
            row_count: from_sql_count(row_count)? as usize,
            warning_count: from_sql_count(warning_count)? as usize,
            created_at,
        }))
    }

    pub fn load_rules(&self, account_id: &str) -> Result<Option<Rules>> {
        let row = self
            .connection
            .query_row(
                "SELECT scale_roas, min_roas, learning_spend FROM rules WHERE account_id = ?1",
                params![account_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((scale_roas, min_roas, learning_spend)) = row else {
            return Ok(None);
        };

        Ok(Some(Rules {
            scale_roas: parse_stored_decimal(&scale_roas, "scale_roas")?,
            min_roas: parse_stored_decimal(&min_roas, "min_roas")?,
            learning_spend: parse_stored_decimal(&learning_spend, "learning_spend")?,
        }))
    }

    pub fn effective_rules(&self, account_id: &str) -> Result<Rules> {
        let rules = self.load_rules(account_id)?.unwrap_or_default();
        rules
            .validate()
            .with_context(|| format!("stored rules for account {account_id} are invalid"))?;
        Ok(rules)
    }

    pub fn save_rules(&self, account_id: &str, rules: &Rules) -> Result<()> {
        self.connection
            .execute(
                "
                INSERT INTO rules(account_id, scale_roas, min_roas, learning_spend, updated_at)
                VALUES(?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(account_id) DO UPDATE SET
                  scale_roas=excluded.scale_roas,
                  min_roas=excluded.min_roas,
                  learning_spend=excluded.learning_spend,
                  updated_at=excluded.updated_at
                ",
                params![
                    account_id,
                    rules.scale_roas.to_string(),
                    rules.min_roas.to_string(),
                    rules.learning_spend.to_string(),
                    now_utc_string(),
                ],
            )
            .with_context(|| format!("failed to save rules for account {account_id}"))?;
        Ok(())
    }

    pub fn delete_rules(&self, account_id: &str) -> Result<bool> {
        let removed = self
            .connection
            .execute("DELETE FROM rules WHERE account_id = ?1", params![account_id])
            .with_context(|| format!("failed to reset rules for account {account_id}"))?;
        Ok(removed > 0)
    }

    pub fn load_subscription(&self, account_id: &str) -> Result<Option<Subscription>> {
        let subscription = self
            .connection
            .query_row(
                "
                SELECT plan, status, current_period_end, updated_at
                FROM subscriptions
                WHERE account_id = ?1
                ",
                params![account_id],
                |row| {
                    Ok(Subscription {
                        plan: row.get(0)?,
                        status: row.get(1)?,
                        current_period_end: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(subscription)
    }

    pub fn save_subscription(&self, account_id: &str, subscription: &Subscription) -> Result<()> {
        self.connection
            .execute(
                "
                INSERT INTO subscriptions(account_id, plan, status, current_period_end, updated_at)
                VALUES(?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(account_id) DO UPDATE SET
                  plan=excluded.plan,
                  status=excluded.status,
                  current_period_end=excluded.current_period_end,
                  updated_at=excluded.updated_at
                ",
                params![
                    account_id,
                    subscription.plan,
                    subscription.status,
                    subscription.current_period_end,
                    subscription.updated_at,
                ],
            )
            .with_context(|| format!("failed to save subscription for account {account_id}"))?;
        Ok(())
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn read_schema_version(connection: &Connection) -> Result<Option<String>> {
    let has_metadata: bool = connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'metadata')",
            [],
            |row| row.get(0),
        )
        .context("failed to inspect existing schema")?;
    if !has_metadata {
        return Ok(None);
    }

    connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("failed to read existing schema version")
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS uploads (
              upload_id TEXT PRIMARY KEY,
              account_id TEXT NOT NULL,
              source_name TEXT NOT NULL,
              sha256 TEXT NOT NULL,
              row_count INTEGER NOT NULL,
              warning_count INTEGER NOT NULL DEFAULT 0,
              created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ad_records (
              account_id TEXT NOT NULL,
              upload_id TEXT,
              seq INTEGER NOT NULL,
              period_start TEXT NOT NULL,
              period_end TEXT NOT NULL,
              campaign_name TEXT NOT NULL,
              ad_set_name TEXT NOT NULL,
              ad_name TEXT NOT NULL,
              impressions INTEGER NOT NULL DEFAULT 0,
              clicks INTEGER NOT NULL DEFAULT 0,
              spend TEXT NOT NULL DEFAULT '0',
              purchases INTEGER NOT NULL DEFAULT 0,
              revenue TEXT NOT NULL DEFAULT '0',
              FOREIGN KEY(upload_id) REFERENCES uploads(upload_id)
            );

            CREATE INDEX IF NOT EXISTS idx_ad_records_account_period
              ON ad_records(account_id, period_start DESC, seq);

            CREATE TABLE IF NOT EXISTS rules (
              account_id TEXT PRIMARY KEY,
              scale_roas TEXT NOT NULL,
              min_roas TEXT NOT NULL,
              learning_spend TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS subscriptions (
              account_id TEXT PRIMARY KEY,
              plan TEXT NOT NULL,
              status TEXT NOT NULL,
              current_period_end TEXT,
              updated_at TEXT NOT NULL
            );
            ",
        )
        .context("failed to create schema")?;

    connection
        .execute(
            "
            INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            ",
            params![DB_SCHEMA_VERSION],
        )
        .context("failed to record schema version")?;

    Ok(())
}

fn insert_record(
    statement: &mut rusqlite::Statement<'_>,
    account_id: &str,
    upload_id: Option<&str>,
    seq: i64,
    record: &PerformanceRecord,
) -> Result<()> {
    statement
        .execute(params![
            account_id,
            upload_id,
            seq,
            record.period_start,
            record.period_end,
            record.campaign_name,
            record.ad_set_name,
            record.ad_name,
            to_sql_count(record.impressions)?,
            to_sql_count(record.clicks)?,
            record.spend.to_string(),
            to_sql_count(record.purchases)?,
            record.revenue.to_string(),
        ])
        .with_context(|| {
            format!(
                "failed to insert record {} / {} / {}",
                record.campaign_name, record.ad_set_name, record.ad_name
            )
        })?;
    Ok(())
}

fn to_sql_count(value: u64) -> Result<i64> {
    i64::try_from(value).with_context(|| format!("count {value} exceeds sqlite integer range"))
}

fn from_sql_count(value: i64) -> Result<u64> {
    u64::try_from(value).with_context(|| format!("stored count {value} is negative"))
}

fn parse_stored_decimal(raw: &str, column: &str) -> Result<Decimal> {
    Decimal::from_str(raw).with_context(|| format!("stored {column} is not a decimal: {raw:?}"))
}
