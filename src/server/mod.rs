use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::index::{Deflector, IndexCatalog};
use crate::ingest::{MessagePurger, MessageWriter, Record};
use crate::retention::{RetentionReport, RetentionSweep};
use crate::stats::ClusterReport;
use crate::store::IndexStats;

#[derive(Clone)]
pub struct AdminState {
    pub writer: Arc<MessageWriter>,
    pub purger: Arc<MessagePurger>,
    pub deflector: Arc<Deflector>,
    pub sweep: Arc<RetentionSweep>,
    pub catalog: IndexCatalog,
}

#[derive(Serialize)]
pub struct WriteResponse {
    pub success: bool,
    pub count: usize,
}

#[derive(Serialize)]
pub struct CycleResponse {
    pub target: String,
}

/// `created_at <= to` 的消息会被删除（unix 秒）
#[derive(Deserialize)]
pub struct PurgeRequest {
    pub to: i64,
}

#[derive(Serialize)]
pub struct PurgeResponse {
    pub deleted: u64,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub index: String,
    pub count: u64,
}

pub struct ApiError(IndexerError);

impl From<IndexerError> for ApiError {
    fn from(err: IndexerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IndexerError::IndexNotFound(_) | IndexerError::NodeNotFound(_) => StatusCode::NOT_FOUND,
            IndexerError::IndexAlreadyExists(_) | IndexerError::NoCurrentTarget(_) => {
                StatusCode::CONFLICT
            }
            IndexerError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// HTTP 管理接口：写入、轮转、retention 与只读元数据
pub struct AdminServer {
    state: AdminState,
}

impl AdminServer {
    pub fn new(state: AdminState) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/messages", post(write_handler))
            .route("/cycle", post(cycle_handler))
            .route("/retention", post(retention_handler))
            .route("/purge", post(purge_handler))
            .route("/indices", get(indices_handler))
            .route("/indices/:name/count", get(count_handler))
            .route("/status", get(status_handler))
            .with_state(self.state.clone())
    }

    pub async fn run(self, port: u16) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        self.serve(listener).await
    }

    pub async fn serve(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        tracing::info!("Admin server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn write_handler(
    State(state): State<AdminState>,
    Json(records): Json<Vec<Record>>,
) -> ApiResult<WriteResponse> {
    let success = state.writer.write_batch(&records).await?;
    Ok(Json(WriteResponse {
        success,
        count: records.len(),
    }))
}

async fn cycle_handler(State(state): State<AdminState>) -> ApiResult<CycleResponse> {
    let target = state.deflector.cycle().await?;
    Ok(Json(CycleResponse { target }))
}

async fn retention_handler(State(state): State<AdminState>) -> ApiResult<RetentionReport> {
    Ok(Json(state.sweep.run().await?))
}

async fn purge_handler(
    State(state): State<AdminState>,
    Json(req): Json<PurgeRequest>,
) -> ApiResult<PurgeResponse> {
    let deleted = state.purger.delete_messages_by_time_range(req.to).await?;
    Ok(Json(PurgeResponse { deleted }))
}

async fn indices_handler(State(state): State<AdminState>) -> ApiResult<Vec<IndexStats>> {
    let indices = state.catalog.list_indices_with_stats().await?;
    Ok(Json(indices.into_values().collect()))
}

async fn count_handler(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> ApiResult<CountResponse> {
    let count = state.catalog.document_count(&name).await?;
    Ok(Json(CountResponse { index: name, count }))
}

async fn status_handler(State(state): State<AdminState>) -> ApiResult<ClusterReport> {
    Ok(Json(
        ClusterReport::collect(&state.catalog, &state.deflector).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{MemoryActivityWriter, MemoryIndexRanges};
    use crate::config::IndexerConfig;
    use crate::store::MemoryStore;
    use serde_json::json;

    async fn spawn_server() -> String {
        let store = Arc::new(MemoryStore::new());
        let config = IndexerConfig::default();
        let activity = Arc::new(MemoryActivityWriter::new());
        let deflector = Arc::new(Deflector::new(
            store.clone(),
            &config,
            json!({}),
            activity.clone(),
        ));
        deflector.setup().await.unwrap();
        deflector.ensure_recent_index().await.unwrap();

        let catalog = IndexCatalog::new(store.clone(), config.naming());
        let state = AdminState {
            writer: Arc::new(MessageWriter::new(store.clone(), &config)),
            purger: Arc::new(MessagePurger::new(store.clone(), catalog.clone())),
            sweep: Arc::new(RetentionSweep::new(
                store.clone(),
                deflector.clone(),
                Arc::new(MemoryIndexRanges::new()),
                activity,
                1,
            )),
            deflector,
            catalog,
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(AdminServer::new(state).serve(listener));
        format!("http://{}", addr)
    }

    async fn count_of(client: &reqwest::Client, base: &str, index: &str) -> serde_json::Value {
        let body: serde_json::Value = client
            .get(format!("{}/indices/{}/count", base, index))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["count"].clone()
    }

    #[tokio::test]
    async fn write_cycle_and_retention_over_http() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        let resp: serde_json::Value = client
            .post(format!("{}/messages", base))
            .json(&json!([{ "id": "abc", "body": { "msg": "x" } }]))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp, json!({ "success": true, "count": 1 }));

        let count: serde_json::Value = client
            .get(format!("{}/indices/graylog2_0/count", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(count["count"], 1);

        let cycled: serde_json::Value = client
            .post(format!("{}/cycle", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(cycled["target"], "graylog2_1");

        let report: serde_json::Value = client
            .post(format!("{}/retention", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(report["deleted"], json!(["graylog2_0"]));
    }

    #[tokio::test]
    async fn purge_over_http_spares_recent_index() {
        let base = spawn_server().await;
        let client = reqwest::Client::new();

        client
            .post(format!("{}/messages", base))
            .json(&json!([
                { "id": "old", "body": { "created_at": 5 } },
                { "id": "new", "body": { "created_at": 50 } }
            ]))
            .send()
            .await
            .unwrap();

        let purged: serde_json::Value = client
            .post(format!("{}/purge", base))
            .json(&json!({ "to": 10 }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(purged, json!({ "deleted": 1 }));

        assert_eq!(count_of(&client, &base, "graylog2_0").await, 1);
        assert_eq!(count_of(&client, &base, "graylog2_recent").await, 2);
    }

    #[tokio::test]
    async fn missing_index_maps_to_404() {
        let base = spawn_server().await;
        let resp = reqwest::get(format!("{}/indices/graylog2_99/count", base))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 404);
    }
}
