use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{IndexerError, Result};
use crate::index::naming::IndexNaming;
use crate::store::{IndexStats, IndexStore};

/// 节点信息查不到时的占位值（仅用于诊断展示）
pub const UNKNOWN_NODE: &str = "UNKNOWN";

/// 只读元数据访问：索引列表、文档数、集群信息。
///
/// 每次调用都重新询问 store，不缓存任何结果。
#[derive(Clone)]
pub struct IndexCatalog {
    store: Arc<dyn IndexStore>,
    naming: IndexNaming,
}

impl IndexCatalog {
    pub fn new(store: Arc<dyn IndexStore>, naming: IndexNaming) -> Self {
        Self { store, naming }
    }

    pub fn naming(&self) -> &IndexNaming {
        &self.naming
    }

    pub fn all_indices_pattern(&self) -> String {
        self.naming.all_indices_pattern()
    }

    pub fn all_indices_except_recent_pattern(&self) -> String {
        self.naming.all_indices_except_recent_pattern()
    }

    /// 本部署（prefix 匹配）全部物理索引及其统计，包括 recent index
    pub async fn list_indices_with_stats(&self) -> Result<BTreeMap<String, IndexStats>> {
        self.store.stats(&self.naming.all_indices_pattern()).await
    }

    /// 参与轮转的物理索引（排除 recent index）
    pub async fn deflector_indices(&self) -> Result<BTreeMap<String, IndexStats>> {
        let mut indices = self
            .store
            .stats(&self.naming.all_indices_except_recent_pattern())
            .await?;
        indices.retain(|name, _| self.naming.is_deflector_index(name));
        Ok(indices)
    }

    pub async fn deflector_index_names(&self) -> Result<Vec<String>> {
        Ok(self.deflector_indices().await?.into_keys().collect())
    }

    /// 单个索引 primary shard 上的文档数
    pub async fn document_count(&self, index: &str) -> Result<u64> {
        self.list_indices_with_stats()
            .await?
            .get(index)
            .map(|s| s.primary_docs)
            .ok_or_else(|| IndexerError::IndexNotFound(index.to_string()))
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool> {
        self.store.exists(index).await
    }

    pub async fn total_message_count(&self) -> Result<u64> {
        Ok(self
            .list_indices_with_stats()
            .await?
            .values()
            .map(|s| s.primary_docs)
            .sum())
    }

    pub async fn total_index_size_bytes(&self) -> Result<u64> {
        Ok(self
            .list_indices_with_stats()
            .await?
            .values()
            .map(|s| s.store_size_bytes)
            .sum())
    }

    pub async fn total_index_size_mb(&self) -> Result<u64> {
        Ok(self.total_index_size_bytes().await? / (1024 * 1024))
    }

    pub async fn recent_index_stats(&self) -> Result<Option<IndexStats>> {
        let recent = self.naming.recent_index();
        Ok(self.store.stats(recent).await?.remove(recent))
    }

    /// recent index 实际使用的 store type（`index.store.type`）
    pub async fn recent_index_store_type(&self) -> Result<Option<String>> {
        let recent = self.naming.recent_index();
        let mut state = self.store.cluster_state(recent).await?;
        let settings = state
            .remove(recent)
            .ok_or_else(|| IndexerError::IndexNotFound(recent.to_string()))?;
        Ok(settings.store_type)
    }

    pub async fn node_count(&self) -> Result<usize> {
        self.store.node_count().await
    }

    /// 空 id 返回 None；查询失败降级为 `UNKNOWN`
    pub async fn node_id_to_name(&self, node_id: &str) -> Option<String> {
        if node_id.is_empty() {
            return None;
        }
        match self.store.node_info(node_id).await {
            Ok(info) => Some(info.name),
            Err(e) => {
                tracing::error!("Could not read name of node <{}>: {}", node_id, e);
                Some(UNKNOWN_NODE.to_string())
            }
        }
    }

    pub async fn node_id_to_hostname(&self, node_id: &str) -> Option<String> {
        if node_id.is_empty() {
            return None;
        }
        match self.store.node_info(node_id).await {
            Ok(info) => Some(info.hostname),
            Err(e) => {
                tracing::error!("Could not read hostname of node <{}>: {}", node_id, e);
                Some(UNKNOWN_NODE.to_string())
            }
        }
    }
}
