//! Log2Mongo Sink Trait
//!
//! 定义统一的文档输出目标接口。追加器只依赖此接口分发文档，
//! 具体的连接管理、URI 解析与持久化语义由各实现负责。

use async_trait::async_trait;
use chrono_tz::Tz;
use mongodb::bson::{Bson, Document};
use std::fmt::Debug;

/// 文档输出目标
///
/// 所有方法都可能被追加器或缓冲区的刷新任务并发调用，
/// 实现必须自行保证线程安全。
#[async_trait]
pub trait DocumentSink: Send + Sync + Debug {
    /// 写入单个文档
    async fn write(&self, doc: Document) -> SinkResult<()>;

    /// 批量写入文档
    async fn write_list(&self, docs: Vec<Document>) -> SinkResult<()>;

    /// 写入一条尽力而为的诊断消息，失败不上抛
    async fn message(&self, text: &str);

    /// 关闭输出目标并释放连接
    async fn close(&self) -> SinkResult<()>;

    /// 在写入时附加额外的键值（添加到存档文档中）
    fn put_extra_element(&self, key: &str, value: Bson);

    /// 重命名存档时间字段
    fn rename_save_time(&self, name: &str);

    /// 目标集合使用的时区
    fn collection_timezone(&self) -> Tz;

    /// sink 名称，用于日志和调试
    fn name(&self) -> &'static str;

    /// 检查 sink 是否健康
    ///
    /// 默认实现总是返回 true。
    async fn is_healthy(&self) -> bool {
        true
    }
}

/// 通用 Sink 错误类型
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O 错误
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 网络错误
    #[error("Network error: {0}")]
    Network(String),

    /// 数据库错误
    #[error("Database error: {0}")]
    Database(String),

    /// Sink 已关闭
    #[error("Sink is closed")]
    Closed,

    /// 通用错误
    #[error("Generic error: {0}")]
    Generic(String),
}

/// Sink 结果类型
pub type SinkResult<T> = Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::UTC;
    use mongodb::bson::doc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    // 测试用的 Mock Sink
    #[derive(Debug, Default)]
    struct MockSink {
        write_count: AtomicU64,
        messages: Mutex<Vec<String>>,
        should_fail: bool,
    }

    #[async_trait]
    impl DocumentSink for MockSink {
        async fn write(&self, _doc: Document) -> SinkResult<()> {
            if self.should_fail {
                return Err(SinkError::Database("mock failure".to_string()));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn write_list(&self, docs: Vec<Document>) -> SinkResult<()> {
            if self.should_fail {
                return Err(SinkError::Database("mock failure".to_string()));
            }
            self.write_count.fetch_add(docs.len() as u64, Ordering::Relaxed);
            Ok(())
        }

        async fn message(&self, text: &str) {
            self.messages.lock().unwrap().push(text.to_string());
        }

        async fn close(&self) -> SinkResult<()> {
            Ok(())
        }

        fn put_extra_element(&self, _key: &str, _value: Bson) {}

        fn rename_save_time(&self, _name: &str) {}

        fn collection_timezone(&self) -> Tz {
            UTC
        }

        fn name(&self) -> &'static str {
            "mock"
        }

        async fn is_healthy(&self) -> bool {
            !self.should_fail
        }
    }

    #[tokio::test]
    async fn test_sink_basic_operations() {
        let sink = MockSink::default();

        assert!(sink.write(doc! {"message": "one"}).await.is_ok());
        assert!(sink
            .write_list(vec![doc! {"n": 1}, doc! {"n": 2}])
            .await
            .is_ok());
        assert_eq!(sink.write_count.load(Ordering::Relaxed), 3);

        sink.message("diagnostic").await;
        assert_eq!(sink.messages.lock().unwrap().as_slice(), &["diagnostic"]);

        assert!(sink.is_healthy().await);
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_sink_error_propagation() {
        let sink = MockSink {
            should_fail: true,
            ..Default::default()
        };

        let result = sink.write(doc! {"message": "one"}).await;
        assert!(matches!(result, Err(SinkError::Database(_))));
        assert!(!sink.is_healthy().await);
    }

    #[tokio::test]
    async fn test_concurrent_sink_writes() {
        let sink = Arc::new(MockSink::default());
        let mut handles = vec![];

        for i in 0..10 {
            let sink_clone = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                sink_clone.write(doc! {"n": i}).await
            }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(sink.write_count.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn test_sink_error_display() {
        let config_error = SinkError::Config("bad uri".to_string());
        assert!(config_error.to_string().contains("Configuration error"));

        let database_error = SinkError::Database("insert failed".to_string());
        assert!(database_error.to_string().contains("Database error"));

        let closed_error = SinkError::Closed;
        assert!(closed_error.to_string().contains("Sink is closed"));
    }
}
