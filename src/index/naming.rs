/// 部署内所有索引名的推导规则。
///
/// - 物理索引：`<prefix>_<n>`（n 从 0 递增）
/// - 写别名（deflector）：`<prefix>_deflector`
/// - recent index：固定名字，不参与轮转
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexNaming {
    prefix: String,
    recent_index: String,
}

const SEPARATOR: char = '_';
const DEFLECTOR_SUFFIX: &str = "deflector";

impl IndexNaming {
    pub fn new(prefix: impl Into<String>, recent_index: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            recent_index: recent_index.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn recent_index(&self) -> &str {
        &self.recent_index
    }

    pub fn deflector_alias(&self) -> String {
        format!("{}{}{}", self.prefix, SEPARATOR, DEFLECTOR_SUFFIX)
    }

    /// 匹配本部署所有物理索引，例如 `graylog2_*`
    pub fn all_indices_pattern(&self) -> String {
        format!("{}{}*", self.prefix, SEPARATOR)
    }

    /// 同上但排除 recent index，例如 `graylog2_*,-graylog2_recent`
    pub fn all_indices_except_recent_pattern(&self) -> String {
        format!("{},-{}", self.all_indices_pattern(), self.recent_index)
    }

    pub fn index_name(&self, number: u64) -> String {
        format!("{}{}{}", self.prefix, SEPARATOR, number)
    }

    /// `graylog2_12` -> Some(12)；别名、recent index 等返回 None
    pub fn index_number(&self, name: &str) -> Option<u64> {
        name.strip_prefix(self.prefix.as_str())?
            .strip_prefix(SEPARATOR)?
            .parse()
            .ok()
    }

    pub fn is_deflector_index(&self, name: &str) -> bool {
        name != self.recent_index && self.index_number(name).is_some()
    }

    /// 下一个轮转索引名：现有最大编号 + 1，没有则从 0 开始
    pub fn next_index_name<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> String {
        let next = existing
            .into_iter()
            .filter_map(|n| self.index_number(n))
            .max()
            .map_or(0, |n| n + 1);
        self.index_name(next)
    }
}
