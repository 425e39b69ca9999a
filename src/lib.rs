//! Log2Mongo - 异步 MongoDB 日志追加器
//!
//! Log2Mongo 把宿主应用的结构化日志桥接到 MongoDB：每条日志事件被
//! 转换为一个 BSON 文档（包含深度受限的异常因果链与时区正确的时间
//! 文本），经过反馈循环过滤后同步写入或交给异步批量缓冲。
//!
//! 遥测故障永远不会让宿主应用崩溃或可感知地阻塞：所有失败模式都退化
//! 为"丢失部分日志"。
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 初始化 Log2Mongo
//!     log2mongo::init("mongodb://localhost/database.collection").await?;
//!
//!     // 使用标准的 tracing 宏
//!     info!("Application started");
//!     warn!("This is a warning");
//!     error!("This is an error");
//!
//!     // 优雅关闭：排空缓冲后关闭连接
//!     log2mongo::shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # 自定义配置
//!
//! ```rust,no_run
//! use log2mongo::AppenderConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppenderConfig {
//!         use_buffer: false,
//!         ..Default::default()
//!     };
//!
//!     log2mongo::init_with_config(
//!         "mongodb://localhost/database.collection?timezone=Asia/Shanghai",
//!         config,
//!     )
//!     .await?;
//!
//!     // 你的应用代码...
//!
//!     log2mongo::shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod appender;
pub mod buffer;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod env_config;
pub mod error;
pub mod layer;
pub mod sinks;

// 重新导出主要类型
pub use appender::{Append, MongoAppender};
pub use buffer::{BufferDroppedNotify, BufferHandler, BufferStats, TimedBuffer};
pub use config::{AppenderConfig, TimedBufferConfig};
pub use crate::core::event::{Location, LogEvent, ThrowableInfo, ThrowableNode};
pub use diagnostics::{get_diagnostics, DiagnosticsSnapshot};
pub use error::{Log2MongoError, Result};
pub use layer::MongoLayer;
pub use sinks::{DocumentSink, MongoSink, SinkError};

use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 全局追加器实例，供 [`shutdown`] 关闭
static GLOBAL_APPENDER: Lazy<Mutex<Option<Arc<MongoAppender>>>> = Lazy::new(|| Mutex::new(None));

/// 使用默认配置初始化 Log2Mongo。
///
/// 默认打开 TimedBuffer，忽略 MongoSink 的构造异常，并在
/// `tracing` 全局订阅器上安装 [`MongoLayer`] 与控制台 `fmt` 层。
pub async fn init(uri: &str) -> Result<()> {
    init_with_config(uri, AppenderConfig::default()).await
}

/// 使用指定配置初始化 Log2Mongo。
///
/// 构造追加器并安装为全局 `tracing` 订阅器；安装失败（例如全局
/// 订阅器已被占用）时会先关闭已建立的连接再返回错误。
pub async fn init_with_config(uri: &str, config: AppenderConfig) -> Result<()> {
    let appender = Arc::new(MongoAppender::with_config(uri, config).await?);

    let subscriber = Registry::default()
        .with(MongoLayer::new(Arc::clone(&appender)))
        .with(tracing_subscriber::fmt::layer());

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        let _ = appender.close().await;
        return Err(Log2MongoError::tracing(format!(
            "failed to install global subscriber: {}",
            e
        )));
    }

    if let Ok(mut global) = GLOBAL_APPENDER.lock() {
        *global = Some(appender);
    }
    Ok(())
}

/// 优雅关闭 Log2Mongo。
///
/// 排空缓冲、等待所有刷新完成后关闭 MongoDB 连接。
/// 建议在应用程序退出前调用此函数。
pub async fn shutdown() -> Result<()> {
    let appender = if let Ok(mut global) = GLOBAL_APPENDER.lock() {
        global.take()
    } else {
        None
    };

    if let Some(appender) = appender {
        appender.close().await?;
    }
    Ok(())
}

/// 检查 Log2Mongo 是否已初始化
pub fn is_initialized() -> bool {
    GLOBAL_APPENDER
        .lock()
        .map(|global| global.is_some())
        .unwrap_or(false)
}
