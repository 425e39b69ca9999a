//! 定义 Log2Mongo 追加器的内部诊断与指标。
//!
//! 此模块提供对追加器健康状况的可观测性：处理、过滤、丢弃与写入计数。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 内部诊断与指标数据结构。
///
/// 使用原子操作确保线程安全，日志事件可能来自任意应用线程。
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// 追加器启动时间
    start_time: Option<Instant>,

    /// 已格式化并分发的事件总数
    events_processed: AtomicU64,

    /// 因 logger 前缀过滤而被抑制的事件数
    events_suppressed: AtomicU64,

    /// 因格式化失败而被丢弃的事件数
    events_dropped_format: AtomicU64,

    /// 因缓冲区饱和而被丢弃的事件数
    events_dropped_buffer: AtomicU64,

    /// Sink 写入错误计数
    sink_errors: AtomicU64,

    /// 批量写入次数
    bulk_writes: AtomicU64,
}

/// 诊断数据的快照，用于外部查询。
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsSnapshot {
    /// 追加器运行时间
    pub uptime: Option<Duration>,

    /// 已格式化并分发的事件总数
    pub events_processed: u64,

    /// 因 logger 前缀过滤而被抑制的事件数
    pub events_suppressed: u64,

    /// 因格式化失败而被丢弃的事件数
    pub events_dropped_format: u64,

    /// 因缓冲区饱和而被丢弃的事件数
    pub events_dropped_buffer: u64,

    /// Sink 写入错误计数
    pub sink_errors: u64,

    /// 批量写入次数
    pub bulk_writes: u64,

    /// 总丢弃事件数（格式化失败 + 缓冲区饱和）
    pub total_events_dropped: u64,
}

impl Diagnostics {
    /// 创建新的诊断实例。
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// 增加已处理事件计数。
    pub fn increment_events_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// 增加被抑制事件计数。
    pub fn increment_events_suppressed(&self) {
        self.events_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// 增加因格式化失败而丢弃的事件计数。
    pub fn increment_events_dropped_format(&self) {
        self.events_dropped_format.fetch_add(1, Ordering::Relaxed);
    }

    /// 批量增加因缓冲区饱和而丢弃的事件计数。
    pub fn add_events_dropped_buffer(&self, count: u64) {
        self.events_dropped_buffer.fetch_add(count, Ordering::Relaxed);
    }

    /// 增加 Sink 错误计数。
    pub fn increment_sink_errors(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 增加批量写入计数。
    pub fn increment_bulk_writes(&self) {
        self.bulk_writes.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取诊断数据的快照。
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let events_dropped_format = self.events_dropped_format.load(Ordering::Relaxed);
        let events_dropped_buffer = self.events_dropped_buffer.load(Ordering::Relaxed);

        DiagnosticsSnapshot {
            uptime: self.start_time.map(|start| start.elapsed()),
            events_processed: self.events_processed.load(Ordering::Relaxed),
            events_suppressed: self.events_suppressed.load(Ordering::Relaxed),
            events_dropped_format,
            events_dropped_buffer,
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            bulk_writes: self.bulk_writes.load(Ordering::Relaxed),
            total_events_dropped: events_dropped_format + events_dropped_buffer,
        }
    }

    /// 重置所有计数器（主要用于测试）。
    pub fn reset(&self) {
        self.events_processed.store(0, Ordering::Relaxed);
        self.events_suppressed.store(0, Ordering::Relaxed);
        self.events_dropped_format.store(0, Ordering::Relaxed);
        self.events_dropped_buffer.store(0, Ordering::Relaxed);
        self.sink_errors.store(0, Ordering::Relaxed);
        self.bulk_writes.store(0, Ordering::Relaxed);
    }
}

/// 全局诊断实例，使用 Arc 包装以支持多线程访问。
static GLOBAL_DIAGNOSTICS: std::sync::OnceLock<Arc<Diagnostics>> = std::sync::OnceLock::new();

/// 获取全局诊断实例，首次调用时初始化。
pub fn diagnostics() -> Arc<Diagnostics> {
    GLOBAL_DIAGNOSTICS
        .get_or_init(|| Arc::new(Diagnostics::new()))
        .clone()
}

/// 获取诊断数据快照。
///
/// 如果诊断系统尚未初始化，返回默认的空快照。
pub fn get_diagnostics() -> DiagnosticsSnapshot {
    match GLOBAL_DIAGNOSTICS.get() {
        Some(diagnostics) => diagnostics.snapshot(),
        None => DiagnosticsSnapshot {
            uptime: None,
            events_processed: 0,
            events_suppressed: 0,
            events_dropped_format: 0,
            events_dropped_buffer: 0,
            sink_errors: 0,
            bulk_writes: 0,
            total_events_dropped: 0,
        },
    }
}
