//! tracing 集成层
//!
//! 此层把 `tracing` 事件翻译为 [`LogEvent`] 并交给追加器，
//! 宿主应用无需直接构造事件。事件在产生它的线程上同步入队，
//! 网络 I/O 完全解耦于应用线程。

use crate::appender::MongoAppender;
use crate::core::event::{Location, LogEvent};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// 将 tracing 事件转发给 [`MongoAppender`] 的订阅层。
///
/// 事件的 target 作为 logger 名称参与保留前缀过滤，驱动自身的
/// 日志因此不会回写进同一个集合；本 crate 自己的诊断日志在此层
/// 直接丢弃。追加器未启用缓冲时，写入退化为当前运行时上的
/// 尽力而为异步任务。
pub struct MongoLayer {
    appender: Arc<MongoAppender>,
    max_level: Level,
}

impl MongoLayer {
    /// 创建绑定到指定追加器的层，接收所有级别的事件
    pub fn new(appender: Arc<MongoAppender>) -> Self {
        Self::with_max_level(appender, Level::TRACE)
    }

    /// 创建只接收 `max_level` 及更严重级别事件的层
    pub fn with_max_level(appender: Arc<MongoAppender>, max_level: Level) -> Self {
        Self {
            appender,
            max_level,
        }
    }

    /// 此层绑定的追加器
    pub fn appender(&self) -> &Arc<MongoAppender> {
        &self.appender
    }
}

impl<S> Layer<S> for MongoLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level {
            return;
        }
        // 本 crate 自身的诊断日志不回流，否则刷新产生的日志会再次入队
        let target = meta.target();
        if target == env!("CARGO_PKG_NAME")
            || target.starts_with(concat!(env!("CARGO_PKG_NAME"), "::"))
        {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        // 只有 message 时透传字符串；带结构化字段时合并为对象，
        // 文档字段集保持固定的同时不丢数据
        let message = if visitor.fields.is_empty() {
            Value::String(visitor.message.unwrap_or_default())
        } else {
            let mut object = Map::new();
            if let Some(message) = visitor.message {
                object.insert("message".to_string(), Value::String(message));
            }
            for (key, value) in visitor.fields {
                object.insert(key, value);
            }
            Value::Object(object)
        };

        let log_event = LogEvent::new(
            meta.level().to_string(),
            message,
            Utc::now().timestamp_millis(),
            meta.target(),
        )
        .with_location(Location {
            file: meta.file().map(str::to_string),
            line: meta.line(),
            class: meta.module_path().map(str::to_string),
            method: None,
        });

        self.appender.enqueue(log_event);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(
                field.name().to_string(),
                Value::String(format!("{:?}", value)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppenderConfig, TimedBufferConfig};
    use crate::sinks::traits::{DocumentSink, SinkResult};
    use async_trait::async_trait;
    use chrono_tz::{Tz, UTC};
    use mongodb::bson::{Bson, Document};
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    #[derive(Debug, Default)]
    struct CollectingSink {
        docs: Mutex<Vec<Document>>,
    }

    #[async_trait]
    impl DocumentSink for CollectingSink {
        async fn write(&self, doc: Document) -> SinkResult<()> {
            self.docs.lock().unwrap().push(doc);
            Ok(())
        }

        async fn write_list(&self, docs: Vec<Document>) -> SinkResult<()> {
            self.docs.lock().unwrap().extend(docs);
            Ok(())
        }

        async fn message(&self, _text: &str) {}

        async fn close(&self) -> SinkResult<()> {
            Ok(())
        }

        fn put_extra_element(&self, _key: &str, _value: Bson) {}

        fn rename_save_time(&self, _name: &str) {}

        fn collection_timezone(&self) -> Tz {
            UTC
        }

        fn name(&self) -> &'static str {
            "collecting"
        }
    }

    fn buffered_appender(sink: Arc<CollectingSink>) -> Arc<MongoAppender> {
        let config = AppenderConfig {
            buffer: TimedBufferConfig {
                max_capacity: 100,
                bulk_size: 1_000,
                bulk_time_ms: 60_000,
                max_threads: 2,
                fixed_delay: true,
            },
            ..Default::default()
        };
        Arc::new(MongoAppender::with_sink(sink, config))
    }

    #[tokio::test]
    async fn test_events_flow_through_layer() {
        let sink = Arc::new(CollectingSink::default());
        let appender = buffered_appender(sink.clone());
        let subscriber = Registry::default().with(MongoLayer::new(Arc::clone(&appender)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "app::service", "request failed");
        });

        appender.close().await.unwrap();

        let docs = sink.docs.lock().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("level").unwrap(), "ERROR");
        assert_eq!(docs[0].get_str("message").unwrap(), "request failed");
    }

    #[tokio::test]
    async fn test_structured_fields_are_folded_into_message() {
        let sink = Arc::new(CollectingSink::default());
        let appender = buffered_appender(sink.clone());
        let subscriber = Registry::default().with(MongoLayer::new(Arc::clone(&appender)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "app", code = 7, "partial failure");
        });

        appender.close().await.unwrap();

        let docs = sink.docs.lock().unwrap();
        assert_eq!(docs.len(), 1);
        let message = docs[0].get_document("message").unwrap();
        assert_eq!(message.get_str("message").unwrap(), "partial failure");
        assert_eq!(message.get_i64("code").unwrap(), 7);
    }

    #[tokio::test]
    async fn test_levels_below_threshold_are_skipped() {
        let sink = Arc::new(CollectingSink::default());
        let appender = buffered_appender(sink.clone());
        let layer = MongoLayer::with_max_level(Arc::clone(&appender), tracing::Level::INFO);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!(target: "app", "too detailed");
            tracing::info!(target: "app", "worth keeping");
        });

        appender.close().await.unwrap();

        let docs = sink.docs.lock().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("message").unwrap(), "worth keeping");
    }

    #[tokio::test]
    async fn test_driver_namespace_is_suppressed() {
        let sink = Arc::new(CollectingSink::default());
        let appender = buffered_appender(sink.clone());
        let subscriber = Registry::default().with(MongoLayer::new(Arc::clone(&appender)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "mongodb::command", "driver noise");
            tracing::error!(target: "log2mongo::appender", "own diagnostics");
            // 仅前缀相似的外部 crate 不受自身过滤影响
            tracing::error!(target: "log2mongo_demo", "demo binary");
            tracing::error!(target: "app", "real failure");
        });

        appender.close().await.unwrap();

        let docs = sink.docs.lock().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].get_str("message").unwrap(), "demo binary");
        assert_eq!(docs[1].get_str("message").unwrap(), "real failure");
    }
}
