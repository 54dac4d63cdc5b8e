//! PostgreSQL implementation of the primary transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

use steadfast_types::models::config::PrimaryConfig;
use steadfast_types::{
    AuditAction, AuditEntry, Fields, Query, TransportError, VersionedRecord,
};

use super::{CasOutcome, ConditionalUpdate, Operation, OperationOutput, Transport};

const QUERY_CANCELED: &str = "57014";

/// PostgreSQL-backed primary transport.
pub struct PostgresTransport {
    /// Database connection pool.
    pool: PgPool,
    /// Connection target without credentials, for error messages.
    endpoint: String,
}

impl PostgresTransport {
    /// Create transport with existing pool.
    pub fn new(pool: PgPool, endpoint: impl Into<String>) -> Self {
        Self { pool, endpoint: endpoint.into() }
    }

    /// Build the pool without connecting, so startup succeeds while the database is down.
    pub fn connect_lazy(config: &PrimaryConfig) -> Result<Self, TransportError> {
        let url = config.database_url.as_deref().ok_or_else(|| TransportError::Rejected {
            message: "primary.database_url is not configured".to_string(),
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(300))
            .connect_lazy(url)
            .map_err(|err| TransportError::Rejected { message: err.to_string() })?;
        Ok(Self::new(pool, redact_credentials(url)))
    }

    /// Get reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<(), TransportError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| TransportError::Unavailable { message: err.to_string() })
    }

    fn map_err(&self, err: sqlx::Error) -> TransportError {
        map_sqlx_err(&self.endpoint, err)
    }

    async fn query(&self, record_type: &str, query: &Query) -> Result<Vec<VersionedRecord>, TransportError> {
        let filters = Value::Object(query.filters.clone().into_iter().collect());
        let limit = query.limit.map(|limit| limit as i64);

        let rows = sqlx::query(
            r#"SELECT record_type, id, version, fields, updated_at FROM records
               WHERE record_type = $1 AND fields @> $2 ORDER BY id LIMIT $3"#,
        )
        .bind(record_type)
        .bind(filters)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| self.map_err(err))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn fetch(&self, record_type: String, record_id: String) -> Result<VersionedRecord, TransportError> {
        let row = sqlx::query(
            "SELECT record_type, id, version, fields, updated_at FROM records WHERE record_type = $1 AND id = $2",
        )
        .bind(&record_type)
        .bind(&record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| self.map_err(err))?
        .ok_or(TransportError::NotFound { record_type, record_id })?;

        row_to_record(&row)
    }

    async fn insert(
        &self,
        record_type: String,
        record_id: String,
        fields: Fields,
    ) -> Result<VersionedRecord, TransportError> {
        let row = sqlx::query(
            r#"INSERT INTO records (record_type, id, version, fields) VALUES ($1, $2, 1, $3)
               RETURNING record_type, id, version, fields, updated_at"#,
        )
        .bind(&record_type)
        .bind(&record_id)
        .bind(Value::Object(fields))
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                TransportError::Duplicate { record_type: record_type.clone(), record_id: record_id.clone() }
            },
            other => self.map_err(other),
        })?;

        row_to_record(&row)
    }

    /// Compare-and-set inside one transaction, together with the audit insert.
    async fn conditional_update(&self, update: ConditionalUpdate) -> Result<CasOutcome, TransportError> {
        let expected = update.expected_version as i64;
        let mut tx = self.pool.begin().await.map_err(|err| self.map_err(err))?;

        let row = sqlx::query(
            "SELECT fields FROM records WHERE record_type = $1 AND id = $2 AND version = $3 FOR UPDATE",
        )
        .bind(&update.record_type)
        .bind(&update.record_id)
        .bind(expected)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| self.map_err(err))?;

        let Some(row) = row else {
            tx.rollback().await.map_err(|err| self.map_err(err))?;
            return Ok(CasOutcome::NoMatch);
        };
        let before = decode_fields(&row)?;
        let mut after = before.clone();
        for (key, value) in &update.changes {
            after.insert(key.clone(), value.clone());
        }

        let updated = sqlx::query(
            r#"UPDATE records SET fields = $4, version = version + 1, updated_at = NOW()
               WHERE record_type = $1 AND id = $2 AND version = $3
               RETURNING record_type, id, version, fields, updated_at"#,
        )
        .bind(&update.record_type)
        .bind(&update.record_id)
        .bind(expected)
        .bind(Value::Object(after))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| self.map_err(err))?;

        let Some(updated) = updated else {
            tx.rollback().await.map_err(|err| self.map_err(err))?;
            return Ok(CasOutcome::NoMatch);
        };
        let record = row_to_record(&updated)?;

        let audit = match &update.audit {
            Some(draft) => {
                let entry =
                    draft.materialize(&update.record_type, &update.record_id, &before, &update.changes);
                insert_audit(&mut tx, &entry).await.map_err(|err| self.map_err(err))?;
                Some(entry)
            },
            None => None,
        };

        tx.commit().await.map_err(|err| self.map_err(err))?;
        Ok(CasOutcome::Applied { record, audit })
    }

    async fn audit_trail(&self, record_type: &str, record_id: &str) -> Result<Vec<AuditEntry>, TransportError> {
        let rows = sqlx::query(
            r#"SELECT id, record_type, record_id, actor_id, action, justification, old_value, new_value, created_at
               FROM audit_log WHERE record_type = $1 AND record_id = $2 ORDER BY created_at"#,
        )
        .bind(record_type)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| self.map_err(err))?;

        rows.iter().map(row_to_audit).collect()
    }
}

#[async_trait]
impl Transport for PostgresTransport {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn execute(&self, operation: Operation) -> Result<OperationOutput, TransportError> {
        match operation {
            Operation::Ping => {
                sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|err| self.map_err(err))?;
                Ok(OperationOutput::Pong)
            },
            Operation::Query { record_type, query } => {
                self.query(&record_type, &query).await.map(OperationOutput::Records)
            },
            Operation::Fetch { record_type, record_id } => {
                self.fetch(record_type, record_id).await.map(OperationOutput::Record)
            },
            Operation::Insert { record_type, record_id, fields } => {
                self.insert(record_type, record_id, fields).await.map(OperationOutput::Record)
            },
            Operation::ConditionalUpdate(update) => {
                self.conditional_update(update).await.map(OperationOutput::Update)
            },
            Operation::AuditTrail { record_type, record_id } => self
                .audit_trail(&record_type, &record_id)
                .await
                .map(OperationOutput::AuditEntries),
        }
    }
}

async fn insert_audit(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: &AuditEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO audit_log (id, record_type, record_id, actor_id, action, justification, old_value, new_value, created_at)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
    )
    .bind(entry.id)
    .bind(&entry.record_type)
    .bind(&entry.record_id)
    .bind(&entry.actor_id)
    .bind(entry.action.as_str())
    .bind(&entry.justification)
    .bind(&entry.old_value)
    .bind(&entry.new_value)
    .bind(entry.timestamp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn decode_err(err: sqlx::Error) -> TransportError {
    TransportError::Malformed { message: err.to_string() }
}

fn decode_fields(row: &PgRow) -> Result<Fields, TransportError> {
    match row.try_get::<Value, _>("fields").map_err(decode_err)? {
        Value::Object(fields) => Ok(fields),
        other => Err(TransportError::Malformed { message: format!("fields is not an object: {}", other) }),
    }
}

fn row_to_record(row: &PgRow) -> Result<VersionedRecord, TransportError> {
    let version: i64 = row.try_get("version").map_err(decode_err)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode_err)?;
    Ok(VersionedRecord {
        record_type: row.try_get("record_type").map_err(decode_err)?,
        id: row.try_get("id").map_err(decode_err)?,
        version: version as u64,
        fields: decode_fields(row)?,
        updated_at,
    })
}

fn row_to_audit(row: &PgRow) -> Result<AuditEntry, TransportError> {
    let action: String = row.try_get("action").map_err(decode_err)?;
    let id: Uuid = row.try_get("id").map_err(decode_err)?;
    Ok(AuditEntry {
        id,
        actor_id: row.try_get("actor_id").map_err(decode_err)?,
        record_type: row.try_get("record_type").map_err(decode_err)?,
        record_id: row.try_get("record_id").map_err(decode_err)?,
        action: AuditAction::parse(&action).ok_or_else(|| TransportError::Malformed {
            message: format!("unknown audit action {}", action),
        })?,
        justification: row.try_get("justification").map_err(decode_err)?,
        old_value: row.try_get("old_value").map_err(decode_err)?,
        new_value: row.try_get("new_value").map_err(decode_err)?,
        timestamp: row.try_get("created_at").map_err(decode_err)?,
    })
}

/// Classify a sqlx failure. Infrastructure problems demote the primary; answers from the
/// database itself do not.
pub(crate) fn map_sqlx_err(endpoint: &str, err: sqlx::Error) -> TransportError {
    match err {
        sqlx::Error::PoolTimedOut => TransportError::Timeout { duration_ms: 0 },
        sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
            TransportError::ConnectionRefused { endpoint: endpoint.to_string() }
        },
        sqlx::Error::Io(io) => TransportError::Unavailable { message: io.to_string() },
        sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
            TransportError::Timeout { duration_ms: 0 }
        },
        sqlx::Error::Database(db) => TransportError::Rejected { message: db.to_string() },
        err @ (sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. }) => decode_err(err),
        other => TransportError::Unavailable { message: other.to_string() },
    }
}

/// Strip `user:password@` from a connection URL for logs and display.
pub fn redact_credentials(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}{}", &url[..scheme_end + 3], &url[at + 1..])
        },
        _ => url.to_string(),
    }
}
