use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IndexerError, Result};
use crate::index::IndexNaming;

/// recent index 可选的存储引擎变体
pub const ALLOWED_RECENT_INDEX_STORE_TYPES: &[&str] = &["niofs", "simplefs", "mmapfs", "memory"];
pub const STANDARD_RECENT_INDEX_STORE_TYPE: &str = "niofs";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub indexer: IndexerConfig,
    pub retention: RetentionConfig,
    pub server: ServerConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub index_prefix: String,
    pub recent_index_name: String,
    pub recent_index_store_type: String,
    pub shards: u32,
    pub replicas: u32,
    pub analyzer: String,
    /// 0 表示 recent index 的文档不设 TTL
    pub recent_index_ttl_minutes: u32,
    /// 新建索引时下发的 mapping（JSON 文件），缺省时只携带 analyzer
    pub mapping_file: Option<PathBuf>,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            index_prefix: "graylog2".into(),
            recent_index_name: "graylog2_recent".into(),
            recent_index_store_type: STANDARD_RECENT_INDEX_STORE_TYPE.into(),
            shards: 4,
            replicas: 0,
            analyzer: "standard".into(),
            recent_index_ttl_minutes: 60,
            mapping_file: None,
        }
    }
}

impl IndexerConfig {
    pub fn naming(&self) -> IndexNaming {
        IndexNaming::new(&self.index_prefix, &self.recent_index_name)
    }

    pub fn recent_index_ttl(&self) -> Option<Duration> {
        (self.recent_index_ttl_minutes > 0)
            .then(|| Duration::from_secs(u64::from(self.recent_index_ttl_minutes) * 60))
    }

    /// mapping 文档对本 crate 是不透明的：文件内容原样下发
    pub fn load_mapping(&self) -> anyhow::Result<serde_json::Value> {
        match &self.mapping_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("Failed to read mapping file {:?}: {}", path, e))?;
                serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("Failed to parse mapping file {:?}: {}", path, e))
            }
            None => Ok(serde_json::json!({ "analyzer": self.analyzer })),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// 最多保留的轮转索引数；0 表示只留当前写目标
    pub max_indices: usize,
    pub interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_indices: 20,
            interval_secs: 300,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 6061 }
    }
}

pub fn validate_store_type(store_type: &str) -> Result<()> {
    if ALLOWED_RECENT_INDEX_STORE_TYPES.contains(&store_type) {
        Ok(())
    } else {
        Err(IndexerError::InvalidStoreType {
            given: store_type.to_string(),
            allowed: ALLOWED_RECENT_INDEX_STORE_TYPES.join(", "),
        })
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let ix = &self.indexer;
        if ix.index_prefix.is_empty() {
            return Err(anyhow::anyhow!("index_prefix cannot be empty"));
        }
        if ix.recent_index_name.is_empty() {
            return Err(anyhow::anyhow!("recent_index_name cannot be empty"));
        }
        // recent index 名不能与轮转索引撞名，否则会被 retention 当成普通索引删掉
        if ix.naming().index_number(&ix.recent_index_name).is_some() {
            return Err(anyhow::anyhow!(
                "recent_index_name '{}' collides with rotated index names",
                ix.recent_index_name
            ));
        }
        if ix.shards == 0 {
            return Err(anyhow::anyhow!("shards must be at least 1"));
        }
        validate_store_type(&ix.recent_index_store_type)?;
        if self.retention.interval_secs == 0 {
            return Err(anyhow::anyhow!("retention.interval_secs cannot be 0"));
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.indexer.shards, 4);
        assert_eq!(config.indexer.recent_index_store_type, "niofs");
        assert_eq!(
            config.indexer.recent_index_ttl(),
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str(
            r#"
            [indexer]
            index_prefix = "logs"
            recent_index_name = "logs_recent"
            recent_index_ttl_minutes = 30

            [retention]
            max_indices = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.indexer.index_prefix, "logs");
        assert_eq!(config.indexer.replicas, 0);
        assert_eq!(config.retention.max_indices, 5);
        assert_eq!(config.retention.interval_secs, 300);
        assert_eq!(
            config.indexer.recent_index_ttl(),
            Some(Duration::from_secs(30 * 60))
        );
    }

    #[test]
    fn shipped_example_config_parses() {
        let config =
            Config::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/idx-deflector.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn zero_max_indices_is_accepted() {
        let config = Config::from_toml_str(
            r#"
            [retention]
            max_indices = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.retention.max_indices, 0);
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        let ix = IndexerConfig {
            recent_index_ttl_minutes: 0,
            ..IndexerConfig::default()
        };
        assert_eq!(ix.recent_index_ttl(), None);
    }

    #[test]
    fn rejects_unknown_store_type() {
        let err = Config::from_toml_str(
            r#"
            [indexer]
            recent_index_store_type = "ramdisk"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ramdisk"));
    }

    #[test]
    fn rejects_recent_name_that_looks_rotated() {
        let err = Config::from_toml_str(
            r#"
            [indexer]
            recent_index_name = "graylog2_7"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn default_mapping_carries_analyzer() {
        let mapping = IndexerConfig::default().load_mapping().unwrap();
        assert_eq!(mapping["analyzer"], "standard");
    }
}
