use std::sync::Arc;

use crate::activity::{Activity, ActivityWriter};
use crate::config::{validate_store_type, IndexerConfig};
use crate::error::{IndexerError, Result};
use crate::index::catalog::IndexCatalog;
use crate::index::naming::IndexNaming;
use crate::store::{AliasAction, IndexSettings, IndexStore};

const SOURCE: &str = "deflector";

/// 别名的两种持久状态
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeflectorTarget {
    /// 首次 rotation 之前
    Unbound,
    Bound(String),
}

impl DeflectorTarget {
    pub fn name(&self) -> Option<&str> {
        match self {
            DeflectorTarget::Unbound => None,
            DeflectorTarget::Bound(name) => Some(name),
        }
    }
}

/// Deflector：独占写别名到物理索引的绑定。
///
/// 当前目标永远从 store 现查，不在进程内缓存，
/// 外部轮转之后也不会读到过期的目标。
pub struct Deflector {
    store: Arc<dyn IndexStore>,
    catalog: IndexCatalog,
    naming: IndexNaming,
    shards: u32,
    replicas: u32,
    recent_store_type: String,
    mapping: Arc<serde_json::Value>,
    activity: Arc<dyn ActivityWriter>,
}

impl Deflector {
    pub fn new(
        store: Arc<dyn IndexStore>,
        config: &IndexerConfig,
        mapping: serde_json::Value,
        activity: Arc<dyn ActivityWriter>,
    ) -> Self {
        let naming = config.naming();
        Self {
            catalog: IndexCatalog::new(store.clone(), naming.clone()),
            store,
            naming,
            shards: config.shards,
            replicas: config.replicas,
            recent_store_type: config.recent_index_store_type.clone(),
            mapping: Arc::new(mapping),
            activity,
        }
    }

    /// 写方使用的逻辑名
    pub fn alias(&self) -> String {
        self.naming.deflector_alias()
    }

    pub fn naming(&self) -> &IndexNaming {
        &self.naming
    }

    /// 建索引并下发 mapping，两步都被确认才算成功。
    ///
    /// mapping 未确认时不回滚：索引保留，错误里带上索引名供人工清理。
    pub async fn create_physical_index(
        &self,
        name: &str,
        shards: u32,
        replicas: u32,
    ) -> Result<()> {
        self.create_with_mapping(name, &IndexSettings::new(shards, replicas))
            .await
    }

    /// recent index：固定名字、指定 store type，只建一次
    pub async fn create_recent_index(&self) -> Result<()> {
        validate_store_type(&self.recent_store_type)?;
        let settings = IndexSettings::new(self.shards, self.replicas)
            .with_store_type(self.recent_store_type.clone());
        self.create_with_mapping(self.naming.recent_index(), &settings)
            .await
    }

    /// 不存在时创建 recent index，返回是否新建
    pub async fn ensure_recent_index(&self) -> Result<bool> {
        if self.catalog.index_exists(self.naming.recent_index()).await? {
            return Ok(false);
        }
        tracing::info!(
            "Recent index <{}> does not exist, creating it",
            self.naming.recent_index()
        );
        self.create_recent_index().await?;
        Ok(true)
    }

    async fn create_with_mapping(&self, name: &str, settings: &IndexSettings) -> Result<()> {
        if !self.store.create(name, settings).await? {
            tracing::error!("Creation of index <{}> was not acknowledged", name);
            return Err(IndexerError::not_acknowledged("create_index", name));
        }
        if !self.store.put_mapping(name, &self.mapping).await? {
            tracing::error!(
                "Mapping for index <{}> was not acknowledged, index left in place for manual cleanup",
                name
            );
            return Err(IndexerError::not_acknowledged("put_mapping", name));
        }
        tracing::info!(
            "Created index <{}> (shards={}, replicas={}, store_type={:?})",
            name,
            settings.number_of_shards,
            settings.number_of_replicas,
            settings.store_type
        );
        Ok(())
    }

    /// 把 `alias` 切到 `new_index`。
    ///
    /// - `old_index = None`：首次绑定，只有 add。
    /// - `old_index = Some(old)`：remove + add 放在同一个请求里原子生效。
    pub async fn cutover(
        &self,
        alias: &str,
        new_index: &str,
        old_index: Option<&str>,
    ) -> Result<()> {
        let mut actions = Vec::with_capacity(2);
        if let Some(old) = old_index {
            actions.push(AliasAction::remove(old, alias));
        }
        actions.push(AliasAction::add(new_index, alias));

        if !self.store.update_aliases(&actions).await? {
            tracing::error!(
                "Alias update <{}> -> <{}> (old: {:?}) was not acknowledged",
                alias,
                new_index,
                old_index
            );
            return Err(IndexerError::not_acknowledged("update_aliases", new_index));
        }
        tracing::info!(
            "Pointed alias <{}> to <{}> (was: {:?})",
            alias,
            new_index,
            old_index
        );
        Ok(())
    }

    pub async fn current_target(&self, alias: &str) -> Result<DeflectorTarget> {
        let mut targets = self.store.alias_targets(alias).await?;
        match targets.len() {
            0 => Ok(DeflectorTarget::Unbound),
            1 => Ok(DeflectorTarget::Bound(targets.remove(0))),
            _ => Err(IndexerError::AmbiguousAlias {
                alias: alias.to_string(),
                targets,
            }),
        }
    }

    /// 本部署别名的当前目标；未绑定时报 `NoCurrentTarget`
    pub async fn current_target_name(&self) -> Result<String> {
        let alias = self.alias();
        match self.current_target(&alias).await? {
            DeflectorTarget::Bound(name) => Ok(name),
            DeflectorTarget::Unbound => Err(IndexerError::NoCurrentTarget(alias)),
        }
    }

    /// 启动时调用：别名未绑定就做一次 rotation
    pub async fn setup(&self) -> Result<String> {
        match self.current_target(&self.alias()).await? {
            DeflectorTarget::Bound(name) => {
                tracing::info!("Deflector <{}> points to <{}>", self.alias(), name);
                Ok(name)
            }
            DeflectorTarget::Unbound => {
                tracing::info!("Deflector <{}> is not bound yet, cycling", self.alias());
                self.cycle().await
            }
        }
    }

    /// 轮转：新建 `<prefix>_<max+1>`，再把别名从旧目标切过去。返回新索引名。
    pub async fn cycle(&self) -> Result<String> {
        let alias = self.alias();
        let result = self.cycle_inner(&alias).await;
        if let Err(e) = &result {
            let msg = format!("Cycling deflector <{}> failed: {}", alias, e);
            tracing::error!("{}", msg);
            self.activity.write(Activity::new(msg, SOURCE));
        }
        result
    }

    async fn cycle_inner(&self, alias: &str) -> Result<String> {
        let old = self.current_target(alias).await?;
        let existing = self.catalog.deflector_index_names().await?;
        let new_index = self
            .naming
            .next_index_name(existing.iter().map(String::as_str));

        tracing::info!(
            "Cycling deflector <{}> from {:?} to <{}>",
            alias,
            old.name(),
            new_index
        );
        self.create_physical_index(&new_index, self.shards, self.replicas)
            .await?;
        self.cutover(alias, &new_index, old.name()).await?;

        let msg = match old.name() {
            Some(old) => format!("Cycled deflector from <{}> to <{}>", old, new_index),
            None => format!("Initialized deflector with first target <{}>", new_index),
        };
        self.activity.write(Activity::new(msg, SOURCE));
        Ok(new_index)
    }
}
