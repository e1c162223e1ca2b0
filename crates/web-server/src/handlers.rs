use crate::error::AppError;
use crate::pool::Resettable;
use crate::stream::JsonArrayBody;
use crate::AppState;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use core_types::{InfoRecord, RecordFilter};
use database::DbError;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessParams {
    pub query_filter: Option<String>,
}

/// The pooled `/process` response record.
///
/// Lives in the response pool between requests; every field is cleared by
/// `reset` before the record is handed to a new caller.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReply {
    pub message: String,
    pub query_filter: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Resettable for ProcessReply {
    fn reset(&mut self) {
        self.message.clear();
        self.query_filter = None;
        self.processed_at = None;
    }
}

/// # GET /process
///
/// Echoes the request through a pooled response record. The guard returns
/// the record to the pool on the way out, on the error path too.
pub async fn process(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProcessParams>,
) -> Result<Json<Value>, AppError> {
    let mut reply = state.response_pool.acquire();
    reply.message.push_str("processed");
    reply.query_filter = params.query_filter;
    reply.processed_at = Some(Utc::now());

    let body = serde_json::to_value(&*reply).map_err(DbError::Json)?;
    Ok(Json(body))
}

/// # GET /sql-stream
///
/// Streams matching rows as one chunked JSON array. Rows go on the wire as
/// the database cursor yields them, so the memory footprint stays flat no
/// matter how many rows match. A mid-stream failure aborts the transfer.
pub async fn sql_stream(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RecordFilter>,
) -> Response {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Result<InfoRecord, DbError>>(1);

    // The producer task owns the repository stream, so its single pooled
    // connection lives exactly as long as rows are being consumed.
    tokio::spawn(async move {
        let mut rows = state.db_repo.stream_records(filter);
        while let Some(item) = rows.next().await {
            let failed = item.is_err();
            if tx.send(item).await.is_err() {
                // Consumer hung up; drop the cursor without draining it.
                tracing::debug!("sql-stream consumer disconnected mid-stream");
                break;
            }
            if failed {
                break;
            }
        }
    });

    let rows = futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx));
    let body = Body::from_stream(JsonArrayBody::new(rows));
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// # POST /atomic-operation
///
/// Runs the fixed write sequence as one transaction. A watchdog raises the
/// cancellation token when the configured budget elapses, which sends the
/// repository down its rollback path and this handler to the 408 mapping.
pub async fn atomic_operation(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let cancel = CancellationToken::new();

    let watchdog = tokio::spawn({
        let cancel = cancel.clone();
        let budget = state.atomic.operation_timeout();
        async move {
            tokio::time::sleep(budget).await;
            cancel.cancel();
        }
    });

    let result = state
        .db_repo
        .atomic_operation(state.atomic.write_delay(), &cancel)
        .await;
    watchdog.abort();

    let outcome = result?;
    Ok(Json(json!({
        "success": true,
        "message": "Atomic operation committed",
        "data": outcome,
    })))
}
