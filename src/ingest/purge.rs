use std::sync::Arc;

use crate::error::Result;
use crate::index::IndexCatalog;
use crate::store::IndexStore;

/// 文档时间戳字段（unix 秒）
pub const CREATED_AT_FIELD: &str = "created_at";

/// 按时间范围删除轮转索引里的旧文档（不删索引本身）
pub struct MessagePurger {
    store: Arc<dyn IndexStore>,
    catalog: IndexCatalog,
}

impl MessagePurger {
    pub fn new(store: Arc<dyn IndexStore>, catalog: IndexCatalog) -> Self {
        Self { store, catalog }
    }

    /// 删除 `created_at` 落在 `[0, to]` 的文档，返回删除条数
    pub async fn delete_messages_by_time_range(&self, to: i64) -> Result<u64> {
        let indices = self.catalog.deflector_index_names().await?;
        if indices.is_empty() {
            return Ok(0);
        }
        let removed = self
            .store
            .delete_by_range(&indices, CREATED_AT_FIELD, 0, to)
            .await?;
        tracing::info!(
            "Deleted {} messages with {} <= {} from {} indices",
            removed,
            CREATED_AT_FIELD,
            to,
            indices.len()
        );
        Ok(removed)
    }
}
