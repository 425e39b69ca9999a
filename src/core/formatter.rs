//! 事件格式化
//!
//! 此模块将 [`LogEvent`] 组装为写入 MongoDB 的 BSON 文档。
//! 文档字段集固定：level、message、timestamp、timetext、file、line、
//! class、method、exception，缺失的数据写为 null 而不是报错；
//! 此外仅追加通过 [`EventFormatter::add_extra_field`] 配置的额外字段。

use crate::core::event::{LogEvent, ThrowableInfo, ThrowableNode};
use crate::core::time::format_time;
use crate::error::{Log2MongoError, Result};
use chrono_tz::Tz;
use mongodb::bson::{self, Bson, Document};
use std::sync::{Arc, RwLock};

/// 异常因果链的最大嵌套层次
pub const MAX_THROWABLE: usize = 5;

/// 将日志事件转换为 BSON 文档的格式化器。
///
/// 除额外字段映射外无共享可变状态；额外字段采用写时复制，
/// 变更只影响之后格式化的文档，高频写入与并发变更互不阻塞。
#[derive(Debug)]
pub struct EventFormatter {
    timezone: Tz,
    // 写入方克隆替换整个映射，读取方只克隆 Arc
    extra_fields: RwLock<Arc<Document>>,
}

impl EventFormatter {
    /// 创建使用指定时区的格式化器
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            extra_fields: RwLock::new(Arc::new(Document::new())),
        }
    }

    /// 格式化时使用的时区
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// 追加一个额外字段，作用于此后格式化的所有文档（不追溯已有文档）
    pub fn add_extra_field(&self, key: impl Into<String>, value: Bson) {
        let key = key.into();
        let mut guard = self
            .extra_fields
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = Document::clone(&guard);
        next.insert(key, value);
        *guard = Arc::new(next);
    }

    fn extra_fields(&self) -> Arc<Document> {
        self.extra_fields
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 将事件组装为输出文档
    ///
    /// 消息原样透传；时间戳与显示文本来自 [`format_time`]；
    /// 位置信息缺失的字段写 null；异常链由 [`format_throwable`] 渲染。
    pub fn format(&self, event: &LogEvent) -> Result<Document> {
        let mut doc = Document::new();
        doc.insert("level", event.level.as_str());

        let message = bson::to_bson(&event.message).map_err(|e| {
            Log2MongoError::format(format!("message not representable as BSON: {}", e))
        })?;
        doc.insert("message", message);

        let (instant, text) = format_time(event.timestamp_millis, self.timezone);
        doc.insert("timestamp", instant);
        doc.insert("timetext", text);

        let location = event.location.as_ref();
        doc.insert("file", optional(location.and_then(|l| l.file.clone())));
        doc.insert(
            "line",
            optional(location.and_then(|l| l.line).map(i64::from)),
        );
        doc.insert("class", optional(location.and_then(|l| l.class.clone())));
        doc.insert("method", optional(location.and_then(|l| l.method.clone())));

        doc.insert(
            "exception",
            match &event.throwable {
                Some(info) => Bson::Document(format_throwable(info)),
                None => Bson::Null,
            },
        );

        for (key, value) in self.extra_fields().iter() {
            doc.insert(key.clone(), value.clone());
        }

        Ok(doc)
    }
}

fn optional(value: Option<impl Into<Bson>>) -> Bson {
    value.map(Into::into).unwrap_or(Bson::Null)
}

/// 渲染异常信息的头节点。
///
/// trace 只在最外层异常上由预渲染栈帧拼接一次，嵌套的 cause 文档
/// 只携带 name/message/cause，不再各自生成 trace。
fn format_throwable(info: &ThrowableInfo) -> Document {
    let mut doc = Document::new();
    doc.insert(
        "trace",
        match &info.frames {
            Some(frames) => Bson::String(frames.join("\n")),
            None => Bson::Null,
        },
    );

    if let Some(node) = &info.throwable {
        doc.insert("name", node.name.as_str());
        doc.insert("message", optional(node.message.clone()));
        doc.insert(
            "cause",
            match &node.cause {
                Some(cause) => Bson::Document(format_cause(cause, 0)),
                None => Bson::Null,
            },
        );
    }

    doc
}

/// 带显式深度计数的 cause 渲染。
///
/// 因果链可能任意长，甚至在恶意输入下自引用；到达 `MAX_THROWABLE`
/// 层时停止下探，写入 discarded 哨兵节点。
fn format_cause(node: &ThrowableNode, level: usize) -> Document {
    let mut doc = Document::new();
    if level < MAX_THROWABLE {
        doc.insert("name", node.name.as_str());
        doc.insert("message", optional(node.message.clone()));
        doc.insert(
            "cause",
            match &node.cause {
                Some(cause) => Bson::Document(format_cause(cause, level + 1)),
                None => Bson::Null,
            },
        );
    } else {
        doc.insert("name", "discarded");
        doc.insert(
            "message",
            format!("Cause level more than {} will be discarding.", level),
        );
        doc.insert("cause", Bson::Null);
    }
    doc
}
