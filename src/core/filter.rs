//! 事件过滤
//!
//! 过滤掉 sink 驱动自身命名空间产生的日志，避免“写日志引发新日志”的
//! 无界反馈循环。过滤发生在任何格式化工作之前。

/// MongoDB 驱动自身的 tracing target 前缀
pub const MONGO_PREFIX: &str = "mongodb";

/// 按 logger 名称前缀抑制事件的过滤器
#[derive(Debug, Clone)]
pub struct EventFilter {
    reserved_prefix: String,
}

impl EventFilter {
    /// 创建使用指定保留前缀的过滤器
    pub fn new(reserved_prefix: impl Into<String>) -> Self {
        Self {
            reserved_prefix: reserved_prefix.into(),
        }
    }

    /// 判断事件是否应当被抑制
    ///
    /// 当且仅当 logger 名称以保留前缀开头时返回 true。无副作用。
    pub fn should_suppress(&self, logger_name: &str) -> bool {
        logger_name.starts_with(&self.reserved_prefix)
    }

    /// 当前配置的保留前缀
    pub fn reserved_prefix(&self) -> &str {
        &self.reserved_prefix
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::new(MONGO_PREFIX)
    }
}
