//! 定义 Log2Mongo 追加器的所有配置结构体。

use serde::Deserialize;
use std::time::Duration;

// --- 辅助函数，用于提供配置项的默认值 ---
fn default_true() -> bool {
    true
}
fn default_reserved_prefix() -> String {
    // Rust MongoDB 驱动自身的 tracing target 命名空间
    "mongodb".to_string()
}
fn default_max_capacity() -> usize {
    crate::buffer::MAX_CAPACITY
}
fn default_bulk_size() -> usize {
    crate::buffer::THRESHOLD_SIZE
}
fn default_bulk_time_ms() -> u64 {
    crate::buffer::THRESHOLD_TIME
}
fn default_max_threads() -> usize {
    crate::buffer::MAX_THREADS
}

/// 追加器顶层配置。
///
/// 在构造时一次性确定，此后不可变；仅有的两个运行期变更入口是
/// [`MongoAppender::add_extra_field`](crate::appender::MongoAppender::add_extra_field)
/// 和 [`MongoAppender::set_save_time_field_name`](crate::appender::MongoAppender::set_save_time_field_name)。
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct AppenderConfig {
    /// 是否启用 TimedBuffer，默认 true
    #[serde(default = "default_true")]
    pub use_buffer: bool,
    /// 在构造 MongoDB 连接时，确认连接可用性并忽略底层异常（配置为放弃数据）
    #[serde(default = "default_true")]
    pub ignore_exception: bool,
    /// 同步写入路径上的 sink 错误是否被吞掉，默认 true
    #[serde(default = "default_true")]
    pub ignore_sink_errors: bool,
    /// 需要过滤的 logger 名称前缀（sink 驱动自身的命名空间）
    #[serde(default = "default_reserved_prefix")]
    pub reserved_prefix: String,
    /// 存档时间字段名，None 时沿用 sink 的默认名
    #[serde(default)]
    pub save_time_field_name: Option<String>,
    /// TimedBuffer 配置
    #[serde(default)]
    pub buffer: TimedBufferConfig,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            use_buffer: default_true(),
            ignore_exception: default_true(),
            ignore_sink_errors: default_true(),
            reserved_prefix: default_reserved_prefix(),
            save_time_field_name: None,
            buffer: TimedBufferConfig::default(),
        }
    }
}

/// TimedBuffer 配置。
///
/// 默认值沿用 TimedBuffer 的常量：最大缓存 10000（超出的数据被丢弃），
/// 批量写入数量 1000，定时写入周期 1000ms。
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TimedBufferConfig {
    /// 最大缓存数量，超出的数据被丢弃
    #[serde(default = "default_max_capacity")]
    pub max_capacity: usize,
    /// 批量写入的数量阈值
    #[serde(default = "default_bulk_size")]
    pub bulk_size: usize,
    /// 定时写入的周期（毫秒）
    #[serde(default = "default_bulk_time_ms")]
    pub bulk_time_ms: u64,
    /// 刷新任务线程池大小
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,
    /// 使用两次刷新之间的间隔时间计算延时（fixed-delay），
    /// 为 false 时使用严格周期调度（fixed-rate）
    #[serde(default = "default_true")]
    pub fixed_delay: bool,
}

impl Default for TimedBufferConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            bulk_size: default_bulk_size(),
            bulk_time_ms: default_bulk_time_ms(),
            max_threads: default_max_threads(),
            fixed_delay: default_true(),
        }
    }
}

impl TimedBufferConfig {
    /// 定时写入周期
    pub fn bulk_time(&self) -> Duration {
        Duration::from_millis(self.bulk_time_ms)
    }
}
