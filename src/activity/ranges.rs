use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;

/// 每个物理索引覆盖的消息时间范围（unix 秒，闭区间）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexRange {
    pub start: i64,
    pub end: i64,
}

/// 外部元数据存储：记录每个索引的日期范围。
/// 索引被 retention 删除后必须同步摘掉对应记录。
#[async_trait]
pub trait IndexRangeStore: Send + Sync {
    async fn remove_index_range(&self, index: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryIndexRanges {
    ranges: DashMap<String, IndexRange>,
}

impl MemoryIndexRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, index: impl Into<String>, range: IndexRange) {
        self.ranges.insert(index.into(), range);
    }

    pub fn get(&self, index: &str) -> Option<IndexRange> {
        self.ranges.get(index).map(|r| *r)
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[async_trait]
impl IndexRangeStore for MemoryIndexRanges {
    async fn remove_index_range(&self, index: &str) -> Result<()> {
        if self.ranges.remove(index).is_some() {
            tracing::debug!("Removed date range of index <{}>", index);
        }
        Ok(())
    }
}
