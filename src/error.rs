use thiserror::Error;

/// 索引生命周期管理的错误类型
///
/// 所有来自 IndexStore 的失败都同步地抛给直接调用方，本层不做重试。
#[derive(Debug, Error)]
pub enum IndexerError {
    /// 传输层 / 集群不可达
    #[error("index store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("index <{0}> not found")]
    IndexNotFound(String),

    #[error("index <{0}> already exists")]
    IndexAlreadyExists(String),

    /// 别名尚未绑定任何物理索引（首次 rotation 之前）
    #[error("deflector alias <{0}> has no current target")]
    NoCurrentTarget(String),

    /// 别名同时指向多个物理索引：违反 deflector 不变式
    #[error("alias <{alias}> is bound to more than one index: {targets:?}")]
    AmbiguousAlias { alias: String, targets: Vec<String> },

    /// store 没有确认变更（create / put_mapping / alias update）
    #[error("{operation} on <{index}> was not acknowledged by the store")]
    NotAcknowledged {
        operation: &'static str,
        index: String,
    },

    #[error("invalid recent index store type <{given}>, allowed: {allowed}")]
    InvalidStoreType { given: String, allowed: String },

    #[error("node <{0}> not found")]
    NodeNotFound(String),
}

impl IndexerError {
    pub fn not_acknowledged(operation: &'static str, index: impl Into<String>) -> Self {
        Self::NotAcknowledged {
            operation,
            index: index.into(),
        }
    }

    /// 是否为传输层失败（下一轮调度自然会重试）
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_index() {
        let err = IndexerError::IndexNotFound("graylog2_3".into());
        assert_eq!(err.to_string(), "index <graylog2_3> not found");

        let err = IndexerError::not_acknowledged("put_mapping", "graylog2_0");
        assert_eq!(
            err.to_string(),
            "put_mapping on <graylog2_0> was not acknowledged by the store"
        );
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(IndexerError::StoreUnavailable("connection refused".into()).is_transient());
        assert!(!IndexerError::IndexAlreadyExists("x".into()).is_transient());
        assert!(!IndexerError::NoCurrentTarget("graylog2_deflector".into()).is_transient());
    }

    #[test]
    fn result_propagates_with_question_mark() {
        fn inner() -> Result<()> {
            Err(IndexerError::NoCurrentTarget("d".into()))
        }
        fn outer() -> Result<u32> {
            inner()?;
            Ok(1)
        }
        assert!(matches!(outer(), Err(IndexerError::NoCurrentTarget(_))));
    }
}
