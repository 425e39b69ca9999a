//! MongoDB 追加器
//!
//! 追加器是格式化与分发的汇合点：过滤 → 格式化 → 路由。
//! 启用缓冲时文档交给 [`TimedBuffer`] 异步批量写入；
//! 否则在调用方上下文中同步写入 sink。
//!
//! 生命周期只有两个状态：接受事件与已关闭。[`MongoAppender::close`]
//! 先排空缓冲（等待全部刷新完成）再关闭 sink，保证关闭顺序不会与
//! 任何一次刷新竞争。
//!
//! 当 MongoSink 的写入平均效率低于日志产生的平均效率时，
//! 丢弃通知回调会有所通报。

use crate::buffer::{BufferDroppedNotify, BufferHandler, BufferStats, TimedBuffer};
use crate::config::AppenderConfig;
use crate::core::event::LogEvent;
use crate::core::filter::EventFilter;
use crate::core::formatter::EventFormatter;
use crate::diagnostics::diagnostics;
use crate::error::{Log2MongoError, Result};
use crate::sinks::mongo::MongoSink;
use crate::sinks::traits::DocumentSink;
use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// 追加器能力接口
///
/// 宿主框架只需要 append 与 close 两个入口。
#[async_trait]
pub trait Append: Send + Sync {
    /// 追加一条日志事件
    async fn append(&self, event: LogEvent) -> Result<()>;
    /// 关闭追加器
    async fn close(&self) -> Result<()>;
}

/// 缓冲回调的分发端：批量刷新走 bulk 写入，丢弃通报走诊断消息
#[derive(Debug, Clone)]
struct SinkDispatch {
    sink: Arc<dyn DocumentSink>,
}

#[async_trait]
impl BufferHandler<Document> for SinkDispatch {
    async fn process_buffer(&self, batch: Vec<Document>) {
        trace!("processBuffer: writing in bulk (count= {})", batch.len());
        match self.sink.write_list(batch).await {
            Ok(()) => diagnostics().increment_bulk_writes(),
            Err(e) => {
                diagnostics().increment_sink_errors();
                error!("bulk write to MongoDB failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl BufferDroppedNotify for SinkDispatch {
    async fn notify_buffer_dropped(&self, count: u64) {
        let message = format!(
            "notifyBufferDropped: something dropped by the buffer. full? (count= {})",
            count
        );
        trace!("{}", message);
        diagnostics().add_events_dropped_buffer(count);
        // 用于改善服务，通告缓存过程中出现过过载的信息
        self.sink.message(&message).await;
    }
}

/// MongoDB 追加器
#[derive(Debug)]
pub struct MongoAppender {
    sink: Arc<dyn DocumentSink>,
    buffer: Option<TimedBuffer<Document>>,
    formatter: EventFormatter,
    filter: EventFilter,
    ignore_sink_errors: bool,
    closed: AtomicBool,
}

impl MongoAppender {
    /// 使用默认配置构造追加器。
    ///
    /// 默认打开 TimedBuffer，忽略 MongoSink 的构造异常。
    pub async fn new(uri: &str) -> Result<Self> {
        Self::with_config(uri, AppenderConfig::default()).await
    }

    /// 使用指定配置构造追加器。
    ///
    /// 本层只检查连接串非空且 scheme 符合预期，URI 的解析与校验
    /// 由 sink 负责。
    pub async fn with_config(uri: &str, config: AppenderConfig) -> Result<Self> {
        if uri.is_empty() {
            return Err(Log2MongoError::config(
                "MongoDB connection string must not be empty",
            ));
        }
        if !uri.starts_with("mongodb://") && !uri.starts_with("mongodb+srv://") {
            return Err(Log2MongoError::config(format!(
                "expected a mongodb:// connection string, got: {}",
                uri
            )));
        }

        let sink = Arc::new(MongoSink::connect(uri, config.ignore_exception).await?);
        Ok(Self::with_sink(sink, config))
    }

    /// 绑定到已有 sink 构造追加器。
    ///
    /// 必须在 Tokio 运行时内调用（启用缓冲时会启动后台刷新任务）。
    pub fn with_sink(sink: Arc<dyn DocumentSink>, config: AppenderConfig) -> Self {
        let formatter = EventFormatter::new(sink.collection_timezone());
        let filter = EventFilter::new(config.reserved_prefix.clone());
        if let Some(name) = &config.save_time_field_name {
            sink.rename_save_time(name);
        }

        let buffer = if config.use_buffer {
            let dispatch = Arc::new(SinkDispatch {
                sink: Arc::clone(&sink),
            });
            Some(TimedBuffer::new(
                config.buffer.clone(),
                dispatch.clone(),
                dispatch,
            ))
        } else {
            None
        };

        Self {
            sink,
            buffer,
            formatter,
            filter,
            ignore_sink_errors: config.ignore_sink_errors,
            closed: AtomicBool::new(false),
        }
    }

    /// 追加一条日志事件。
    ///
    /// 被过滤的事件不付出任何格式化成本；单条事件的格式化失败只丢弃
    /// 该条事件并记录诊断，不会上抛到宿主的日志调用。启用缓冲时交给
    /// 缓冲非阻塞放入（饱和丢弃不是本层的错误）；无缓冲时同步写入，
    /// 写入失败按 `ignore_sink_errors` 吞掉或上抛。
    pub async fn append(&self, event: LogEvent) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            debug!("append after close, event dropped");
            return Ok(());
        }

        let Some(doc) = self.prepare(&event) else {
            return Ok(());
        };

        match &self.buffer {
            Some(buffer) => {
                // 饱和丢弃由缓冲记账并稍后通报
                buffer.put(doc);
            }
            None => {
                if let Err(e) = self.sink.write(doc).await {
                    diagnostics().increment_sink_errors();
                    if self.ignore_sink_errors {
                        warn!("synchronous write to MongoDB failed: {}", e);
                    } else {
                        return Err(e.into());
                    }
                }
            }
        }
        Ok(())
    }

    /// 同步入队一条事件，供无法 await 的调用点（如 tracing layer）使用。
    ///
    /// 启用缓冲时等价于 append 的缓冲路径；无缓冲时在当前 Tokio
    /// 运行时上尽力异步写入，没有运行时则丢弃该条事件。
    pub fn enqueue(&self, event: LogEvent) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let Some(doc) = self.prepare(&event) else {
            return;
        };

        match &self.buffer {
            Some(buffer) => {
                buffer.put(doc);
            }
            None => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let sink = Arc::clone(&self.sink);
                    let ignore_sink_errors = self.ignore_sink_errors;
                    handle.spawn(async move {
                        if let Err(e) = sink.write(doc).await {
                            diagnostics().increment_sink_errors();
                            if ignore_sink_errors {
                                warn!("asynchronous write to MongoDB failed: {}", e);
                            } else {
                                error!("asynchronous write to MongoDB failed: {}", e);
                            }
                        }
                    });
                } else {
                    warn!("no tokio runtime available, event dropped");
                }
            }
        }
    }

    /// 过滤并格式化，返回 None 表示事件被抑制或丢弃
    fn prepare(&self, event: &LogEvent) -> Option<Document> {
        // 过滤掉 sink 驱动自身的日志，避免反馈循环
        if self.filter.should_suppress(&event.logger_name) {
            diagnostics().increment_events_suppressed();
            return None;
        }

        match self.formatter.format(event) {
            Ok(doc) => {
                diagnostics().increment_events_processed();
                Some(doc)
            }
            Err(e) => {
                diagnostics().increment_events_dropped_format();
                error!("failed to format log event: {}", e);
                None
            }
        }
    }

    /// 关闭追加器。
    ///
    /// 先排空缓冲（等待最后一次刷新及所有进行中的刷新完成），
    /// 再关闭 sink —— sink 的关闭严格发生在最后一次刷新之后。
    /// 重复调用是无害的空操作。
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("mongo appender already closed");
            return Ok(());
        }
        debug!("Close mongo appender .");

        if let Some(buffer) = &self.buffer {
            buffer.close().await;
        }
        self.sink.close().await?;
        Ok(())
    }

    /// 追加一个额外字段，作用于此后格式化的所有文档
    pub fn add_extra_field(&self, key: impl Into<String>, value: Bson) {
        self.formatter.add_extra_field(key, value);
    }

    /// 重命名存档时间字段，原样转发给 sink
    pub fn set_save_time_field_name(&self, name: &str) {
        self.sink.rename_save_time(name);
    }

    /// 在写入时附加额外的键值（添加到存档文档中），由 sink 负责
    pub fn put_extra_element(&self, key: &str, value: Bson) {
        self.sink.put_extra_element(key, value);
    }

    /// 缓冲区统计信息，未启用缓冲时为 None
    pub fn buffer_stats(&self) -> Option<BufferStats> {
        self.buffer.as_ref().map(TimedBuffer::stats)
    }

    /// 追加器是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Append for MongoAppender {
    async fn append(&self, event: LogEvent) -> Result<()> {
        MongoAppender::append(self, event).await
    }

    async fn close(&self) -> Result<()> {
        MongoAppender::close(self).await
    }
}
