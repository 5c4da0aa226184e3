use serde::{Deserialize, Serialize};

/// 一条待写入的文档：调用方分配 id，主索引与 recent index 共用同一个 id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub body: serde_json::Value,
}

impl Record {
    pub fn new(id: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }
}
