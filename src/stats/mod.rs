use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::index::{Deflector, DeflectorTarget, IndexCatalog};
use crate::store::IndexStats;

/// 集群与索引概况（诊断用，字段都从 store 现查）
#[derive(Clone, Debug, Default, Serialize)]
pub struct ClusterReport {
    pub node_count: usize,
    pub deflector_alias: String,
    pub deflector_target: Option<String>,
    pub recent_index: String,
    pub recent_index_docs: Option<u64>,
    pub total_messages: u64,
    pub total_size_bytes: u64,
    /// 向下取整的 MiB，给只看整数的监控用
    pub total_size_mb: u64,
    /// 轮转索引，老的在前
    pub indices: Vec<IndexStats>,
}

impl ClusterReport {
    pub async fn collect(catalog: &IndexCatalog, deflector: &Deflector) -> Result<Self> {
        let alias = deflector.alias();
        let deflector_target = match deflector.current_target(&alias).await? {
            DeflectorTarget::Bound(name) => Some(name),
            DeflectorTarget::Unbound => None,
        };
        let mut indices: Vec<IndexStats> =
            catalog.deflector_indices().await?.into_values().collect();
        indices.sort_by(|a, b| {
            a.creation_order
                .cmp(&b.creation_order)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(Self {
            node_count: catalog.node_count().await?,
            deflector_alias: alias,
            deflector_target,
            recent_index: catalog.naming().recent_index().to_string(),
            recent_index_docs: catalog.recent_index_stats().await?.map(|s| s.primary_docs),
            total_messages: catalog.total_message_count().await?,
            total_size_bytes: catalog.total_index_size_bytes().await?,
            total_size_mb: catalog.total_index_size_mb().await?,
            indices,
        })
    }
}

const SIZE_UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// 索引体积的展示格式：1024 进制，保留两位小数
fn human_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < SIZE_UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, SIZE_UNITS[unit])
}

impl fmt::Display for ClusterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔══════════════════════════════════════════════════╗")?;
        writeln!(f, "║           idx-deflector Cluster Report           ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════╣")?;
        writeln!(f, "║ nodes:          {:>32} ║", self.node_count)?;
        writeln!(f, "║ messages:       {:>32} ║", self.total_messages)?;
        writeln!(f, "║ store size:     {:>32} ║", human_bytes(self.total_size_bytes))?;
        writeln!(f, "╠──────────────────────────────────────────────────╣")?;
        writeln!(f, "║ deflector:      {:>32} ║", self.deflector_alias)?;
        writeln!(
            f,
            "║   target:       {:>32} ║",
            self.deflector_target.as_deref().unwrap_or("<unbound>")
        )?;
        writeln!(f, "║ recent index:   {:>32} ║", self.recent_index)?;
        match self.recent_index_docs {
            Some(docs) => writeln!(f, "║   docs:         {:>32} ║", docs)?,
            None => writeln!(f, "║   docs:         {:>32} ║", "<missing>")?,
        }
        writeln!(f, "╠──────────────────────────────────────────────────╣")?;
        writeln!(f, "║ indices ({:>3}):                                   ║", self.indices.len())?;
        for idx in &self.indices {
            let marker = if self.deflector_target.as_deref() == Some(idx.name.as_str()) {
                '*'
            } else {
                ' '
            };
            writeln!(
                f,
                "║ {} {:<20} {:>10} docs {:>10} ║",
                marker,
                idx.name,
                idx.primary_docs,
                human_bytes(idx.store_size_bytes)
            )?;
        }
        writeln!(f, "╚══════════════════════════════════════════════════╝")?;
        Ok(())
    }
}
