use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::activity::{Activity, ActivityWriter, IndexRangeStore};
use crate::error::Result;
use crate::index::{Deflector, IndexCatalog};
use crate::store::{IndexStats, IndexStore};

const SOURCE: &str = "retention";

/// 一次 sweep 的结果
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    pub index_count: usize,
    pub max_indices: usize,
    pub deleted: Vec<String>,
    /// 落在删除候选里但是当前写目标
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl RetentionReport {
    pub fn exceeded(&self) -> bool {
        self.index_count > self.max_indices
    }
}

/// 按数量上限淘汰最老的轮转索引。
///
/// ## 规则
/// - 年龄按 store 给出的创建顺序排序，同序按名字字典序。
/// - 当前 deflector 目标永远不删；它落在候选里时直接跳过，**不**用更新的索引补位，
///   因此本轮结束后索引数可能仍超过上限。
/// - 单个索引删除失败只记录，不影响后续候选；下一轮 sweep 会自然重试。
pub struct RetentionSweep {
    store: Arc<dyn IndexStore>,
    catalog: IndexCatalog,
    deflector: Arc<Deflector>,
    ranges: Arc<dyn IndexRangeStore>,
    activity: Arc<dyn ActivityWriter>,
    max_indices: usize,
}

impl RetentionSweep {
    pub fn new(
        store: Arc<dyn IndexStore>,
        deflector: Arc<Deflector>,
        ranges: Arc<dyn IndexRangeStore>,
        activity: Arc<dyn ActivityWriter>,
        max_indices: usize,
    ) -> Self {
        let catalog = IndexCatalog::new(store.clone(), deflector.naming().clone());
        Self {
            store,
            catalog,
            deflector,
            ranges,
            activity,
            max_indices,
        }
    }

    pub async fn run(&self) -> Result<RetentionReport> {
        // 从未 rotation 过的部署没有可保护的目标，拒绝执行
        let current = self.deflector.current_target_name().await?;
        let indices = self.catalog.deflector_indices().await?;

        let mut report = RetentionReport {
            index_count: indices.len(),
            max_indices: self.max_indices,
            ..RetentionReport::default()
        };

        if report.index_count <= self.max_indices {
            tracing::debug!(
                "Number of indices ({}) lower than limit ({}). Not performing any retention actions.",
                report.index_count,
                self.max_indices
            );
            return Ok(report);
        }

        let remove = report.index_count - self.max_indices;
        let msg = format!(
            "Number of indices ({}) higher than limit ({}). Deleting {} indices.",
            report.index_count, self.max_indices, remove
        );
        tracing::info!("{}", msg);
        self.activity.write(Activity::new(msg, SOURCE));

        for name in oldest_indices(indices.values(), remove) {
            if name == current {
                tracing::info!("Not deleting current deflector target <{}>.", name);
                report.skipped.push(name);
                continue;
            }

            let msg = format!("Retention cleaning: Deleting index <{}>", name);
            tracing::info!("{}", msg);
            self.activity.write(Activity::new(msg, SOURCE));

            if let Err(e) = self.store.delete(&name).await {
                let msg = format!("Retention cleaning: Failed to delete index <{}>: {}", name, e);
                tracing::error!("{}", msg);
                self.activity.write(Activity::new(msg, SOURCE));
                report.failed.push(name);
                continue;
            }

            if let Err(e) = self.ranges.remove_index_range(&name).await {
                tracing::error!(
                    "Index <{}> deleted but its date range could not be removed: {}",
                    name,
                    e
                );
            }
            report.deleted.push(name);
        }

        Ok(report)
    }

    /// 周期执行 sweep，直到所在任务被取消
    pub async fn run_loop(self: Arc<Self>, interval_secs: u64) {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.run().await {
                Ok(report) if report.exceeded() => tracing::info!(
                    "Retention sweep done: deleted={:?} skipped={:?} failed={:?}",
                    report.deleted,
                    report.skipped,
                    report.failed
                ),
                Ok(_) => {}
                // store 暂时不可达：等下一个 tick
                Err(e) if e.is_transient() => {
                    tracing::warn!("Retention sweep skipped, store unreachable: {}", e)
                }
                Err(e) => tracing::error!("Retention sweep failed: {}", e),
            }
        }
    }
}

/// 最老的 `n` 个索引名（按创建顺序，同序按名字）
pub fn oldest_indices<'a>(
    indices: impl IntoIterator<Item = &'a IndexStats>,
    n: usize,
) -> Vec<String> {
    let mut sorted: Vec<&IndexStats> = indices.into_iter().collect();
    sorted.sort_by(|a, b| {
        a.creation_order
            .cmp(&b.creation_order)
            .then_with(|| a.name.cmp(&b.name))
    });
    sorted.into_iter().take(n).map(|s| s.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{IndexRange, MemoryActivityWriter, MemoryIndexRanges};
    use crate::config::IndexerConfig;
    use crate::error::IndexerError;
    use crate::store::{AliasAction, BulkRequest, IndexRequest, IndexSettings, MemoryStore};
    use serde_json::json;

    struct Harness {
        store: Arc<MemoryStore>,
        ranges: Arc<MemoryIndexRanges>,
        activity: Arc<MemoryActivityWriter>,
        sweep: RetentionSweep,
    }

    fn harness(max_indices: usize) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let ranges = Arc::new(MemoryIndexRanges::new());
        let activity = Arc::new(MemoryActivityWriter::new());
        let config = IndexerConfig {
            index_prefix: "idx".into(),
            recent_index_name: "idx_recent".into(),
            ..IndexerConfig::default()
        };
        let deflector = Arc::new(Deflector::new(
            store.clone(),
            &config,
            json!({}),
            activity.clone(),
        ));
        let sweep = RetentionSweep::new(
            store.clone(),
            deflector,
            ranges.clone(),
            activity.clone(),
            max_indices,
        );
        Harness {
            store,
            ranges,
            activity,
            sweep,
        }
    }

    /// 按给定顺序创建索引（先创建的更老），写入文档并把别名指到 `target`
    async fn seed(h: &Harness, indices: &[(&str, usize)], target: &str) {
        for (name, docs) in indices {
            h.store.create(name, &IndexSettings::new(1, 0)).await.unwrap();
            h.ranges.set(*name, IndexRange { start: 0, end: 1 });
            let mut req = BulkRequest::default();
            for i in 0..*docs {
                req.add(IndexRequest {
                    index: name.to_string(),
                    id: format!("{}-{}", name, i),
                    source: json!({ "n": i }),
                    ttl: None,
                });
            }
            h.store.bulk(req).await.unwrap();
        }
        h.store
            .update_aliases(&[AliasAction::add(target, "idx_deflector")])
            .await
            .unwrap();
    }

    fn deletion_messages(h: &Harness) -> Vec<String> {
        h.activity
            .messages()
            .into_iter()
            .filter(|m| m.starts_with("Retention cleaning: Deleting"))
            .collect()
    }

    #[tokio::test]
    async fn deletes_oldest_and_spares_current_target() {
        let h = harness(1);
        seed(&h, &[("idx_1", 100), ("idx_2", 50), ("idx_3", 10)], "idx_3").await;

        let report = h.sweep.run().await.unwrap();
        assert_eq!(report.deleted, vec!["idx_1", "idx_2"]);
        assert!(report.skipped.is_empty());
        assert_eq!(h.store.index_names(), vec!["idx_3"]);
        assert_eq!(deletion_messages(&h).len(), 2);
        assert_eq!(
            h.activity.messages()[0],
            "Number of indices (3) higher than limit (1). Deleting 2 indices."
        );
        assert!(h.ranges.get("idx_1").is_none());
        assert!(h.ranges.get("idx_3").is_some());
    }

    #[tokio::test]
    async fn under_the_ceiling_deletes_nothing() {
        let h = harness(3);
        seed(&h, &[("idx_1", 1), ("idx_2", 1), ("idx_3", 1)], "idx_3").await;

        let report = h.sweep.run().await.unwrap();
        assert!(!report.exceeded());
        assert!(report.deleted.is_empty());
        assert_eq!(h.store.index_names().len(), 3);
        assert!(h.activity.messages().is_empty());
    }

    #[tokio::test]
    async fn old_current_target_is_skipped_without_substitution() {
        let h = harness(2);
        // 轮转被耽搁：当前目标恰好是最老的索引
        seed(
            &h,
            &[("idx_1", 1), ("idx_2", 1), ("idx_3", 1), ("idx_4", 1)],
            "idx_1",
        )
        .await;

        let report = h.sweep.run().await.unwrap();
        assert_eq!(report.skipped, vec!["idx_1"]);
        assert_eq!(report.deleted, vec!["idx_2"]);
        // 上限被有意超过一轮
        assert_eq!(h.store.index_names(), vec!["idx_1", "idx_3", "idx_4"]);
    }

    #[tokio::test]
    async fn recent_index_is_not_counted() {
        let h = harness(1);
        seed(&h, &[("idx_recent", 5), ("idx_1", 1), ("idx_2", 1)], "idx_2").await;

        let report = h.sweep.run().await.unwrap();
        assert_eq!(report.index_count, 2);
        assert_eq!(report.deleted, vec!["idx_1"]);
        assert!(h.store.exists("idx_recent").await.unwrap());
    }

    #[tokio::test]
    async fn age_follows_creation_order_not_name() {
        let h = harness(1);
        seed(&h, &[("idx_10", 1), ("idx_2", 1)], "idx_2").await;

        let report = h.sweep.run().await.unwrap();
        assert_eq!(report.deleted, vec!["idx_10"]);
    }

    #[tokio::test]
    async fn failed_delete_does_not_abort_the_sweep() {
        let h = harness(1);
        seed(&h, &[("idx_1", 1), ("idx_2", 1), ("idx_3", 1)], "idx_3").await;
        h.store.fail_delete("idx_1");

        let report = h.sweep.run().await.unwrap();
        assert_eq!(report.failed, vec!["idx_1"]);
        assert_eq!(report.deleted, vec!["idx_2"]);
        assert!(h.ranges.get("idx_1").is_some());
        assert!(h
            .activity
            .messages()
            .iter()
            .any(|m| m.starts_with("Retention cleaning: Failed to delete index <idx_1>")));
    }

    #[tokio::test]
    async fn zero_ceiling_keeps_only_current_target() {
        let h = harness(0);
        seed(&h, &[("idx_1", 1), ("idx_2", 1), ("idx_3", 1)], "idx_2").await;

        let report = h.sweep.run().await.unwrap();
        assert_eq!(report.deleted, vec!["idx_1", "idx_3"]);
        assert_eq!(report.skipped, vec!["idx_2"]);
        assert_eq!(h.store.index_names(), vec!["idx_2"]);
    }

    #[tokio::test]
    async fn unbound_deflector_refuses_to_run() {
        let h = harness(1);
        for name in ["idx_1", "idx_2"] {
            h.store.create(name, &IndexSettings::new(1, 0)).await.unwrap();
        }
        assert!(matches!(
            h.sweep.run().await,
            Err(IndexerError::NoCurrentTarget(_))
        ));
        assert_eq!(h.store.index_names().len(), 2);
    }

    #[test]
    fn oldest_ties_break_by_name() {
        let stats = |name: &str, order| IndexStats {
            name: name.to_string(),
            primary_docs: 0,
            store_size_bytes: 0,
            creation_order: order,
        };
        let all = [stats("b", 1), stats("a", 1), stats("c", 0)];
        assert_eq!(oldest_indices(all.iter(), 2), vec!["c", "a"]);
        assert_eq!(oldest_indices(all.iter(), 10).len(), 3);
    }
}
