use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Instant, SystemTime};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, RwLock};
use wildmatch::WildMatch;

use super::{
    AliasAction, BulkItemResult, BulkRequest, BulkResponse, IndexSettings, IndexStats, IndexStore,
    NodeInfo, ReplicationMode, WriteConsistency,
};
use crate::error::{IndexerError, Result};

/// 索引名模式：`graylog2_*,-graylog2_recent`
struct IndexPattern {
    include: Vec<WildMatch>,
    exclude: Vec<WildMatch>,
}

impl IndexPattern {
    fn parse(pattern: &str) -> Self {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for part in pattern.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(rest) = part.strip_prefix('-') {
                exclude.push(WildMatch::new(rest));
            } else if part == "_all" {
                include.push(WildMatch::new("*"));
            } else {
                include.push(WildMatch::new(part));
            }
        }
        Self { include, exclude }
    }

    fn matches(&self, name: &str) -> bool {
        self.include.iter().any(|w| w.matches(name))
            && !self.exclude.iter().any(|w| w.matches(name))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredDocument {
    pub source: serde_json::Value,
    pub expires_at: Option<SystemTime>,
}

impl StoredDocument {
    fn is_live(&self, now: SystemTime) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

struct MemoryIndex {
    settings: IndexSettings,
    mapping: Option<serde_json::Value>,
    creation_order: u64,
    docs: HashMap<String, StoredDocument>,
}

impl MemoryIndex {
    fn stats(&self, name: &str, now: SystemTime) -> IndexStats {
        let mut primary_docs = 0u64;
        let mut store_size_bytes = 0u64;
        for doc in self.docs.values().filter(|d| d.is_live(now)) {
            primary_docs += 1;
            store_size_bytes += doc.source.to_string().len() as u64;
        }
        IndexStats {
            name: name.to_string(),
            primary_docs,
            store_size_bytes,
            creation_order: self.creation_order,
        }
    }
}

/// alias -> 绑定的物理索引集合
type AliasTable = HashMap<String, BTreeSet<String>>;

#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    unacked_create: AtomicBool,
    unacked_mapping: AtomicBool,
    unacked_alias: AtomicBool,
    /// (请求里的 index 名, doc id)
    rejected_docs: DashSet<(String, String)>,
    failing_deletes: DashSet<String>,
    /// 请求里出现这些 index 名的 bulk 整体失败
    failing_bulks: DashSet<String>,
}

/// 只保留最近这么多次 bulk 的摘要
const BULK_TRACE_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BulkTrace {
    pub items: usize,
    pub consistency: WriteConsistency,
    pub replication: ReplicationMode,
}

/// 进程内 IndexStore：单副本、无分片，用于测试与 demo 二进制。
///
/// 别名表放在 `ArcSwap` 里，每次 `update_aliases` 产出一张完整的新表再整体替换，
/// 所以并发的 bulk 解析别名时只会看到切换前或切换后的绑定。
/// 故障注入开关（不可达、未确认、拒绝单条文档、删除失败）用于覆盖失败路径。
pub struct MemoryStore {
    indices: RwLock<BTreeMap<String, MemoryIndex>>,
    aliases: ArcSwap<AliasTable>,
    next_order: AtomicU64,
    nodes: DashMap<String, NodeInfo>,
    bulk_trace: Mutex<VecDeque<BulkTrace>>,
    faults: Faults,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(BTreeMap::new()),
            aliases: ArcSwap::from_pointee(AliasTable::new()),
            next_order: AtomicU64::new(0),
            nodes: DashMap::new(),
            bulk_trace: Mutex::new(VecDeque::with_capacity(BULK_TRACE_CAPACITY)),
            faults: Faults::default(),
        }
    }

    pub fn add_node(&self, node_id: impl Into<String>, info: NodeInfo) {
        self.nodes.insert(node_id.into(), info);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_acknowledge_creates(&self, ack: bool) {
        self.faults.unacked_create.store(!ack, Ordering::SeqCst);
    }

    pub fn set_acknowledge_mappings(&self, ack: bool) {
        self.faults.unacked_mapping.store(!ack, Ordering::SeqCst);
    }

    pub fn set_acknowledge_aliases(&self, ack: bool) {
        self.faults.unacked_alias.store(!ack, Ordering::SeqCst);
    }

    /// 让写往 `index`（按请求中的名字匹配，别名不解析）的 `id` 失败
    pub fn reject_document(&self, index: impl Into<String>, id: impl Into<String>) {
        self.faults.rejected_docs.insert((index.into(), id.into()));
    }

    pub fn fail_delete(&self, index: impl Into<String>) {
        self.faults.failing_deletes.insert(index.into());
    }

    /// 让写往 `index`（按请求中的名字匹配）的整个 bulk 以传输错误返回
    pub fn fail_bulk(&self, index: impl Into<String>) {
        self.faults.failing_bulks.insert(index.into());
    }

    /// 读取未过期的文档
    pub fn document(&self, index: &str, id: &str) -> Option<StoredDocument> {
        let now = SystemTime::now();
        self.indices
            .read()
            .get(index)
            .and_then(|idx| idx.docs.get(id))
            .filter(|d| d.is_live(now))
            .cloned()
    }

    pub fn settings(&self, index: &str) -> Option<IndexSettings> {
        self.indices.read().get(index).map(|i| i.settings.clone())
    }

    pub fn mapping(&self, index: &str) -> Option<serde_json::Value> {
        self.indices.read().get(index).and_then(|i| i.mapping.clone())
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indices.read().keys().cloned().collect()
    }

    /// 最近的 bulk 摘要，旧的在前
    pub fn bulk_trace(&self) -> Vec<BulkTrace> {
        self.bulk_trace.lock().iter().copied().collect()
    }

    fn check_available(&self) -> Result<()> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(IndexerError::StoreUnavailable(
                "memory store marked unreachable".into(),
            ));
        }
        Ok(())
    }

    fn resolve_write_target(
        aliases: &AliasTable,
        name: &str,
    ) -> std::result::Result<String, String> {
        match aliases.get(name) {
            None => Ok(name.to_string()),
            Some(bound) => {
                let mut it = bound.iter();
                match (it.next(), it.next()) {
                    (Some(only), None) => Ok(only.clone()),
                    (None, _) => Err(format!("alias <{}> has no write index", name)),
                    (Some(_), Some(_)) => {
                        Err(format!("alias <{}> points to more than one index", name))
                    }
                }
            }
        }
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn exists(&self, index: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.indices.read().contains_key(index))
    }

    async fn create(&self, index: &str, settings: &IndexSettings) -> Result<bool> {
        self.check_available()?;
        let mut indices = self.indices.write();
        if indices.contains_key(index) || self.aliases.load().contains_key(index) {
            return Err(IndexerError::IndexAlreadyExists(index.to_string()));
        }
        let creation_order = self.next_order.fetch_add(1, Ordering::SeqCst);
        indices.insert(
            index.to_string(),
            MemoryIndex {
                settings: settings.clone(),
                mapping: None,
                creation_order,
                docs: HashMap::new(),
            },
        );
        Ok(!self.faults.unacked_create.load(Ordering::SeqCst))
    }

    async fn put_mapping(&self, index: &str, mapping: &serde_json::Value) -> Result<bool> {
        self.check_available()?;
        let mut indices = self.indices.write();
        let idx = indices
            .get_mut(index)
            .ok_or_else(|| IndexerError::IndexNotFound(index.to_string()))?;
        if self.faults.unacked_mapping.load(Ordering::SeqCst) {
            return Ok(false);
        }
        idx.mapping = Some(mapping.clone());
        Ok(true)
    }

    async fn delete(&self, index: &str) -> Result<()> {
        self.check_available()?;
        if self.faults.failing_deletes.contains(index) {
            return Err(IndexerError::StoreUnavailable(format!(
                "delete of <{}> timed out",
                index
            )));
        }
        let mut indices = self.indices.write();
        if indices.remove(index).is_none() {
            return Err(IndexerError::IndexNotFound(index.to_string()));
        }
        // 删除索引时同步摘掉它身上的别名
        self.aliases.rcu(|table| {
            let mut next = AliasTable::clone(table);
            for bound in next.values_mut() {
                bound.remove(index);
            }
            next.retain(|_, bound| !bound.is_empty());
            next
        });
        Ok(())
    }

    async fn stats(&self, pattern: &str) -> Result<BTreeMap<String, IndexStats>> {
        self.check_available()?;
        let pattern = IndexPattern::parse(pattern);
        let now = SystemTime::now();
        Ok(self
            .indices
            .read()
            .iter()
            .filter(|(name, _)| pattern.matches(name))
            .map(|(name, idx)| (name.clone(), idx.stats(name, now)))
            .collect())
    }

    async fn cluster_state(&self, pattern: &str) -> Result<BTreeMap<String, IndexSettings>> {
        self.check_available()?;
        let pattern = IndexPattern::parse(pattern);
        Ok(self
            .indices
            .read()
            .iter()
            .filter(|(name, _)| pattern.matches(name))
            .map(|(name, idx)| (name.clone(), idx.settings.clone()))
            .collect())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<bool> {
        self.check_available()?;
        // 持有读锁：校验与替换之间不允许并发删除索引
        let indices = self.indices.read();
        for action in actions {
            if let AliasAction::Add { index, .. } = action {
                if !indices.contains_key(index) {
                    return Err(IndexerError::IndexNotFound(index.clone()));
                }
            }
        }
        if self.faults.unacked_alias.load(Ordering::SeqCst) {
            return Ok(false);
        }

        self.aliases.rcu(|table| {
            let mut next = AliasTable::clone(table);
            for action in actions {
                match action {
                    AliasAction::Add { index, alias } => {
                        next.entry(alias.clone()).or_default().insert(index.clone());
                    }
                    AliasAction::Remove { index, alias } => {
                        if let Some(bound) = next.get_mut(alias) {
                            bound.remove(index);
                        }
                    }
                }
            }
            next.retain(|_, bound| !bound.is_empty());
            next
        });
        drop(indices);
        Ok(true)
    }

    async fn alias_targets(&self, alias: &str) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self
            .aliases
            .load()
            .get(alias)
            .map(|bound| bound.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn bulk(&self, request: BulkRequest) -> Result<BulkResponse> {
        self.check_available()?;
        if let Some(req) = request
            .items
            .iter()
            .find(|r| self.faults.failing_bulks.contains(&r.index))
        {
            return Err(IndexerError::StoreUnavailable(format!(
                "bulk to <{}> timed out",
                req.index
            )));
        }
        let started = Instant::now();
        {
            let mut trace = self.bulk_trace.lock();
            if trace.len() == BULK_TRACE_CAPACITY {
                trace.pop_front();
            }
            trace.push_back(BulkTrace {
                items: request.items.len(),
                consistency: request.consistency,
                replication: request.replication,
            });
        }

        // 整个 bulk 使用同一份别名快照
        let aliases = self.aliases.load_full();
        let now = SystemTime::now();
        let mut indices = self.indices.write();
        let mut items = Vec::with_capacity(request.items.len());
        let mut touched = BTreeSet::new();

        for req in request.items {
            let target = match Self::resolve_write_target(&aliases, &req.index) {
                Ok(t) => t,
                Err(reason) => {
                    items.push(BulkItemResult {
                        index: req.index,
                        id: req.id,
                        failure: Some(reason),
                    });
                    continue;
                }
            };

            let failure = if self
                .faults
                .rejected_docs
                .contains(&(req.index.clone(), req.id.clone()))
            {
                Some("rejected by store".to_string())
            } else if let Some(idx) = indices.get_mut(&target) {
                touched.insert(target.clone());
                idx.docs.insert(
                    req.id.clone(),
                    StoredDocument {
                        source: req.source,
                        expires_at: req.ttl.map(|ttl| now + ttl),
                    },
                );
                None
            } else {
                Some(format!("index <{}> not found", target))
            };

            items.push(BulkItemResult {
                index: target,
                id: req.id,
                failure,
            });
        }

        // 顺带回收写入过的索引里已过期的文档
        for name in &touched {
            if let Some(idx) = indices.get_mut(name) {
                idx.docs.retain(|_, doc| doc.is_live(now));
            }
        }

        Ok(BulkResponse {
            items,
            took_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn delete_by_range(
        &self,
        indices: &[String],
        field: &str,
        from: i64,
        to: i64,
    ) -> Result<u64> {
        self.check_available()?;
        let mut all = self.indices.write();
        if let Some(missing) = indices.iter().find(|name| !all.contains_key(*name)) {
            return Err(IndexerError::IndexNotFound(missing.clone()));
        }

        let mut removed = 0u64;
        for name in indices {
            if let Some(idx) = all.get_mut(name) {
                let before = idx.docs.len();
                idx.docs.retain(|_, doc| {
                    doc.source
                        .get(field)
                        .and_then(serde_json::Value::as_i64)
                        .map_or(true, |v| v < from || v > to)
                });
                removed += (before - idx.docs.len()) as u64;
            }
        }
        Ok(removed)
    }

    async fn node_info(&self, node_id: &str) -> Result<NodeInfo> {
        self.check_available()?;
        self.nodes
            .get(node_id)
            .map(|n| n.value().clone())
            .ok_or_else(|| IndexerError::NodeNotFound(node_id.to_string()))
    }

    async fn node_count(&self) -> Result<usize> {
        self.check_available()?;
        Ok(self.nodes.len())
    }
}
