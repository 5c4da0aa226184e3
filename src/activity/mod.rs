pub mod ranges;

use std::time::SystemTime;

use parking_lot::Mutex;

pub use ranges::{IndexRange, IndexRangeStore, MemoryIndexRanges};

/// 审计日志中的一条记录（人类可读）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activity {
    pub message: String,
    /// 产生该记录的组件
    pub source: &'static str,
    pub timestamp: SystemTime,
}

impl Activity {
    pub fn new(message: impl Into<String>, source: &'static str) -> Self {
        Self {
            message: message.into(),
            source,
            timestamp: SystemTime::now(),
        }
    }
}

/// 外部审计日志（retention / rotation 的动作记录）
pub trait ActivityWriter: Send + Sync {
    fn write(&self, activity: Activity);
}

/// 直接落到 tracing 的审计日志
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingActivityWriter;

impl ActivityWriter for TracingActivityWriter {
    fn write(&self, activity: Activity) {
        tracing::info!(target: "activity", source = activity.source, "{}", activity.message);
    }
}

/// 内存审计日志，保留全部记录
#[derive(Debug, Default)]
pub struct MemoryActivityWriter {
    entries: Mutex<Vec<Activity>>,
}

impl MemoryActivityWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Activity> {
        self.entries.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|a| a.message.clone()).collect()
    }
}

impl ActivityWriter for MemoryActivityWriter {
    fn write(&self, activity: Activity) {
        self.entries.lock().push(activity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_writer_keeps_order() {
        let w = MemoryActivityWriter::new();
        w.write(Activity::new("first", "test"));
        w.write(Activity::new("second", "test"));
        assert_eq!(w.messages(), vec!["first", "second"]);
        assert!(w.entries().iter().all(|a| a.source == "test"));
    }
}
