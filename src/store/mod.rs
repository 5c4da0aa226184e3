pub mod memory;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use memory::MemoryStore;

/// 创建物理索引时下发的 settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
    /// 存储引擎变体（index.store.type），仅 recent index 使用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_type: Option<String>,
}

impl IndexSettings {
    pub fn new(number_of_shards: u32, number_of_replicas: u32) -> Self {
        Self {
            number_of_shards,
            number_of_replicas,
            store_type: None,
        }
    }

    pub fn with_store_type(mut self, store_type: impl Into<String>) -> Self {
        self.store_type = Some(store_type.into());
        self
    }
}

/// 单个物理索引的统计信息
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub name: String,
    /// primary shard 上的文档数
    pub primary_docs: u64,
    pub store_size_bytes: u64,
    /// 创建顺序键：越小越老（不是墙钟时间）
    pub creation_order: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AliasAction {
    Add { index: String, alias: String },
    Remove { index: String, alias: String },
}

impl AliasAction {
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }

    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }
}

/// 写一致性：至少多少副本应用后才算成功
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WriteConsistency {
    One,
    #[default]
    Quorum,
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ReplicationMode {
    #[default]
    Sync,
    Async,
}

/// bulk 中的一条写请求（op_type = index，覆盖同 id 文档）
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRequest {
    /// 物理索引名或别名
    pub index: String,
    pub id: String,
    pub source: serde_json::Value,
    pub ttl: Option<Duration>,
}

#[derive(Clone, Debug, Default)]
pub struct BulkRequest {
    pub items: Vec<IndexRequest>,
    pub consistency: WriteConsistency,
    pub replication: ReplicationMode,
}

impl BulkRequest {
    pub fn new(consistency: WriteConsistency, replication: ReplicationMode) -> Self {
        Self {
            items: Vec::new(),
            consistency,
            replication,
        }
    }

    pub fn add(&mut self, request: IndexRequest) {
        self.items.push(request);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkItemResult {
    /// 实际落到的物理索引（别名已解析）
    pub index: String,
    pub id: String,
    pub failure: Option<String>,
}

impl BulkItemResult {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct BulkResponse {
    pub items: Vec<BulkItemResult>,
    pub took_ms: u64,
}

impl BulkResponse {
    pub fn has_failures(&self) -> bool {
        self.items.iter().any(BulkItemResult::is_failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.items.iter().filter(|i| i.is_failed())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub hostname: String,
}

/// 后端搜索/存储引擎的管理能力抽象。
///
/// ## 契约
/// - `create` 对已存在的名字必须返回 `IndexAlreadyExists`。
/// - `update_aliases` 中的所有动作在一次请求内原子生效：
///   任何读者都不会观察到“别名无绑定”或“绑定两个索引”的中间态。
/// - `stats` / `cluster_state` 的 pattern 语义：逗号分隔，`*` 通配，`-` 前缀表示排除。
/// - 超时策略属于实现方的传输层；调用最终必须返回成功或失败。
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn exists(&self, index: &str) -> Result<bool>;

    /// 返回 store 是否确认（acknowledged）
    async fn create(&self, index: &str, settings: &IndexSettings) -> Result<bool>;

    async fn put_mapping(&self, index: &str, mapping: &serde_json::Value) -> Result<bool>;

    async fn delete(&self, index: &str) -> Result<()>;

    async fn stats(&self, pattern: &str) -> Result<BTreeMap<String, IndexStats>>;

    async fn cluster_state(&self, pattern: &str) -> Result<BTreeMap<String, IndexSettings>>;

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<bool>;

    /// 当前绑定到 `alias` 的物理索引
    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>>;

    async fn bulk(&self, request: BulkRequest) -> Result<BulkResponse>;

    /// 删除 `field` 落在 `[from, to]` 的文档，返回删除条数
    async fn delete_by_range(&self, indices: &[String], field: &str, from: i64, to: i64)
        -> Result<u64>;

    async fn node_info(&self, node_id: &str) -> Result<NodeInfo>;

    async fn node_count(&self) -> Result<usize>;
}
