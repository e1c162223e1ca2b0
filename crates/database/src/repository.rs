use crate::error::DbError;
use chrono::Utc;
use core_types::{InfoRecord, OperationOutcome, RecordFilter};
use futures::stream::{BoxStream, StreamExt};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Row};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The streaming read. Both predicates collapse to `TRUE` when their
/// parameter is absent, so an empty filter scans the whole table.
const SELECT_RECORDS: &str = r#"
SELECT info_id, first_name, birth_date, encrypted_key
FROM info_records
WHERE ($1::BIGINT IS NULL OR info_id = $1)
  AND ($2::TEXT IS NULL OR first_name LIKE $2)
ORDER BY info_id ASC
"#;

const BEGIN_READ_COMMITTED: &str = "BEGIN ISOLATION LEVEL READ COMMITTED";

const INSERT_RECORD: &str =
    "INSERT INTO info_records (first_name, birth_date, encrypted_key) VALUES ($1, $2, $3)";
const UPDATE_RECORDS: &str = "UPDATE info_records SET birth_date = $1 WHERE first_name = $2";
const DELETE_RECORDS: &str = "DELETE FROM info_records WHERE first_name LIKE $1";

/// Name written by the insert statement and matched by the update statement.
/// There is no uniqueness constraint on it: repeated invocations leave
/// multiple rows behind, and each update touches all of them.
const SEED_NAME: &str = "rowstream-seed";

/// Pattern for the trailing purge statement. It participates in the
/// transaction as a third write and normally matches nothing.
const PURGE_PATTERN: &str = "%stale%";

/// The `DbRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Streams `info_records` rows matching `filter`, ordered by `info_id`
    /// ascending.
    ///
    /// The returned stream is lazy and single-pass: it holds one pooled
    /// connection and one server-side cursor for exactly as long as the
    /// consumer keeps pulling, and never more than the current row in
    /// memory. Dropping the stream releases the connection; calling again
    /// issues a fresh query.
    pub fn stream_records(
        &self,
        filter: RecordFilter,
    ) -> BoxStream<'_, Result<InfoRecord, DbError>> {
        let filter = filter.normalized();
        let name_pattern = filter.first_name.as_deref().map(like_pattern);

        sqlx::query(SELECT_RECORDS)
            .bind(filter.info_id)
            .bind(name_pattern)
            .fetch(&self.pool)
            .map(|item| item.map_err(DbError::Statement).and_then(decode_record))
            .boxed()
    }

    /// Runs the fixed insert → delay → update → delete sequence as a single
    /// read-committed transaction and reports the affected row counts.
    ///
    /// The cancellation token is observed cooperatively at every statement
    /// boundary and during the artificial delay. Any failure or cancellation
    /// after `BEGIN` rolls the whole sequence back before the original error
    /// is returned; a cancellation arriving after `COMMIT` has no effect.
    /// The connection goes back to the pool on every exit path.
    pub async fn atomic_operation(
        &self,
        write_delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<OperationOutcome, DbError> {
        let mut conn = self.pool.acquire().await.map_err(DbError::Connection)?;

        ensure_active(cancel)?;
        // Transaction control goes through the simple query protocol.
        sqlx::raw_sql(BEGIN_READ_COMMITTED)
            .execute(&mut *conn)
            .await
            .map_err(DbError::Statement)?;

        let mut outcome = OperationOutcome::default();
        let run = run_statements(&mut conn, write_delay, cancel, &mut outcome).await;

        match run {
            Ok(()) => match sqlx::raw_sql("COMMIT").execute(&mut *conn).await {
                Ok(_) => {
                    outcome.success = true;
                    outcome.message = "all statements committed".to_string();
                    tracing::info!(
                        inserted = outcome.inserted_rows,
                        updated = outcome.updated_rows,
                        deleted = outcome.deleted_rows,
                        "atomic operation committed"
                    );
                    Ok(outcome)
                }
                Err(source) => {
                    roll_back(&mut conn, cancel).await;
                    Err(DbError::Statement(source))
                }
            },
            Err(error) => {
                tracing::warn!(
                    %error,
                    inserted = outcome.inserted_rows,
                    updated = outcome.updated_rows,
                    "atomic operation aborted, rolling back"
                );
                roll_back(&mut conn, cancel).await;
                Err(error)
            }
        }
    }
}

/// The write sequence proper. Row counts are accumulated into `outcome` as
/// each statement completes so an aborted run can still report how far it
/// got in the logs.
async fn run_statements(
    conn: &mut PgConnection,
    write_delay: Duration,
    cancel: &CancellationToken,
    outcome: &mut OperationOutcome,
) -> Result<(), DbError> {
    ensure_active(cancel)?;
    let inserted = sqlx::query(INSERT_RECORD)
        .bind(SEED_NAME)
        .bind(Utc::now())
        .bind(Option::<Vec<u8>>::None)
        .execute(&mut *conn)
        .await
        .map_err(DbError::Statement)?;
    outcome.inserted_rows = inserted.rows_affected() as i64;

    delay_checkpoint(write_delay, cancel).await?;

    let updated = sqlx::query(UPDATE_RECORDS)
        .bind(Utc::now())
        .bind(SEED_NAME)
        .execute(&mut *conn)
        .await
        .map_err(DbError::Statement)?;
    outcome.updated_rows = updated.rows_affected() as i64;

    ensure_active(cancel)?;
    let deleted = sqlx::query(DELETE_RECORDS)
        .bind(PURGE_PATTERN)
        .execute(&mut *conn)
        .await
        .map_err(DbError::Statement)?;
    outcome.deleted_rows = deleted.rows_affected() as i64;

    ensure_active(cancel)?;
    Ok(())
}

/// Two-tier rollback.
///
/// The graceful attempt honors the caller's cancellation signal: it is
/// skipped outright when the signal is already raised. If it is skipped or
/// fails, an unconditional rollback runs with the signal ignored so the
/// transaction can never be left open. Failures here are logged and
/// suppressed; the caller always receives the error that started the
/// rollback, not one from the cleanup.
async fn roll_back(conn: &mut PgConnection, cancel: &CancellationToken) {
    let graceful: Result<(), DbError> = if cancel.is_cancelled() {
        Err(DbError::Cancelled)
    } else {
        sqlx::raw_sql("ROLLBACK")
            .execute(&mut *conn)
            .await
            .map(drop)
            .map_err(DbError::Rollback)
    };

    if let Err(reason) = graceful {
        tracing::warn!(%reason, "graceful rollback did not complete, forcing an unconditional one");
        if let Err(error) = sqlx::raw_sql("ROLLBACK").execute(&mut *conn).await {
            tracing::error!(%error, "forced rollback failed; discarding the connection");
        }
    }
}

/// Statement-boundary cancellation check. Cooperative only: an in-flight
/// statement is never interrupted.
fn ensure_active(cancel: &CancellationToken) -> Result<(), DbError> {
    if cancel.is_cancelled() {
        Err(DbError::Cancelled)
    } else {
        Ok(())
    }
}

/// The artificial pause between the insert and the update. Unlike the
/// statements around it, the pause itself races the token so a caller abort
/// is observed without waiting out the remaining delay.
async fn delay_checkpoint(delay: Duration, cancel: &CancellationToken) -> Result<(), DbError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(DbError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

fn like_pattern(needle: &str) -> String {
    format!("%{needle}%")
}

fn decode_record(row: PgRow) -> Result<InfoRecord, DbError> {
    Ok(InfoRecord {
        info_id: row.try_get("info_id").map_err(DbError::Statement)?,
        first_name: row.try_get("first_name").map_err(DbError::Statement)?,
        birth_date: row.try_get("birth_date").map_err(DbError::Statement)?,
        encrypted_key: row.try_get("encrypted_key").map_err(DbError::Statement)?,
    })
}

#[allow(dead_code)]
async fn _probe(conn: &mut PgConnection) -> Result<(), DbError> {
    sqlx::raw_sql("SELECT 1")
        .execute(&mut *conn)
        .await
        .map_err(DbError::Statement)?;
    Ok(())
}

fn _is_send<F: Send>(_: F) {}

#[allow(dead_code)]
fn _assert_acquire(pool: sqlx::PgPool) {
    _is_send(async move {
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("SELECT 1").execute(&mut *conn).await.unwrap();
    });
}

#[allow(dead_code)]
fn _assert_begin(pool: sqlx::PgPool) {
    _is_send(async move {
        let mut tx = pool.begin().await.unwrap();
        sqlx::query("SELECT 1").execute(&mut *tx).await.unwrap();
        tx.commit().await.unwrap();
    });
}

#[allow(dead_code)]
fn _assert_atomic_future_send(repo: DbRepository) {
    fn is_send<F: Send>(_: F) {}
    is_send(async move {
        let cancel = CancellationToken::new();
        repo.atomic_operation(Duration::from_secs(0), &cancel).await
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_check_passes_until_the_token_fires() {
        let cancel = CancellationToken::new();
        assert!(ensure_active(&cancel).is_ok());

        cancel.cancel();
        assert!(matches!(ensure_active(&cancel), Err(DbError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_elapses_when_nobody_cancels() {
        let cancel = CancellationToken::new();
        let result = delay_checkpoint(Duration::from_secs(2), &cancel).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn delay_aborts_as_soon_as_the_token_fires() {
        let cancel = CancellationToken::new();
        let watchdog = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            watchdog.cancel();
        });

        // The delay is far longer than the watchdog; reaching the error
        // branch proves the sleep was abandoned early.
        let result = delay_checkpoint(Duration::from_secs(3600), &cancel).await;
        assert!(matches!(result, Err(DbError::Cancelled)));
    }

    #[tokio::test]
    async fn delay_is_skipped_entirely_when_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = delay_checkpoint(Duration::from_secs(3600), &cancel).await;
        assert!(matches!(result, Err(DbError::Cancelled)));
    }

    #[test]
    fn name_filter_becomes_a_substring_pattern() {
        assert_eq!(like_pattern("An"), "%An%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn select_filters_are_null_tolerant_and_ordered() {
        assert!(SELECT_RECORDS.contains("$1::BIGINT IS NULL OR info_id = $1"));
        assert!(SELECT_RECORDS.contains("$2::TEXT IS NULL OR first_name LIKE $2"));
        assert!(SELECT_RECORDS.contains("ORDER BY info_id ASC"));
    }
}
