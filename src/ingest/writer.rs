use std::sync::Arc;
use std::time::Duration;

use crate::config::IndexerConfig;
use crate::error::Result;
use crate::ingest::record::Record;
use crate::store::{
    BulkRequest, BulkResponse, IndexRequest, IndexStore, ReplicationMode, WriteConsistency,
};

/// 双写路径：一批记录同时写入 deflector 别名与 recent index。
///
/// 两个 bulk 各自独立提交、独立失败，调用方只拿到聚合后的布尔结果。
/// 写一致性放宽到 `One` + 异步复制，用持久化延迟换吞吐。
pub struct MessageWriter {
    store: Arc<dyn IndexStore>,
    alias: String,
    recent_index: String,
    recent_ttl: Option<Duration>,
}

impl MessageWriter {
    pub fn new(store: Arc<dyn IndexStore>, config: &IndexerConfig) -> Self {
        let naming = config.naming();
        Self {
            store,
            alias: naming.deflector_alias(),
            recent_index: naming.recent_index().to_string(),
            recent_ttl: config.recent_index_ttl(),
        }
    }

    /// 两个 bulk 都没有失败条目时返回 true；空批次直接返回 true。
    ///
    /// 同一个 bulk 内的条目互不回滚。store 层错误（不可达等）直接上抛。
    pub async fn write_batch(&self, records: &[Record]) -> Result<bool> {
        if records.is_empty() {
            return Ok(true);
        }

        let mut main = BulkRequest::new(WriteConsistency::One, ReplicationMode::Async);
        let mut recent = BulkRequest::new(WriteConsistency::One, ReplicationMode::Async);
        for record in records {
            // 两份副本用同一个 id，之后才能对上号
            main.add(IndexRequest {
                index: self.alias.clone(),
                id: record.id.clone(),
                source: record.body.clone(),
                ttl: None,
            });
            recent.add(IndexRequest {
                index: self.recent_index.clone(),
                id: record.id.clone(),
                source: record.body.clone(),
                ttl: self.recent_ttl,
            });
        }

        let (main_resp, recent_resp) =
            tokio::join!(self.store.bulk(main), self.store.bulk(recent));
        // 一边失败时另一边可能已经落盘，先把成功的那份记下来再上抛
        match (main_resp, recent_resp) {
            (Ok(main_resp), Ok(recent_resp)) => {
                log_bulk("Deflector index", &main_resp);
                log_bulk("Recent index", &recent_resp);
                Ok(!main_resp.has_failures() && !recent_resp.has_failures())
            }
            (Err(e), Ok(recent_resp)) => {
                log_bulk("Recent index", &recent_resp);
                Err(e)
            }
            (Ok(main_resp), Err(e)) => {
                log_bulk("Deflector index", &main_resp);
                Err(e)
            }
            (Err(e), Err(_)) => Err(e),
        }
    }
}

fn log_bulk(target: &str, resp: &BulkResponse) {
    tracing::debug!(
        "{}: Bulk indexed {} messages, took {} ms, failures: {}",
        target,
        resp.items.len(),
        resp.took_ms,
        resp.has_failures()
    );
    for item in resp.failures() {
        tracing::warn!(
            "{}: document <{}> in <{}> failed: {}",
            target,
            item.id,
            item.index,
            item.failure.as_deref().unwrap_or("unknown")
        );
    }
}
