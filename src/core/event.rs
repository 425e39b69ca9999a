//! Log2Mongo 事件定义
//!
//! 此模块定义了由宿主日志框架交给追加器的输入事件结构。
//! 事件对本 crate 只读：追加器将其转换为 BSON 文档后不再持有。

use serde::{Deserialize, Serialize};

/// 日志事件结构
///
/// 包含一条日志记录的所有信息：级别、消息、时间戳、来源位置
/// 以及可选的异常因果链。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// 日志级别
    pub level: String,
    /// 日志消息，原样透传，不做二次字符串化
    pub message: serde_json::Value,
    /// 事件时间戳（epoch 毫秒）
    pub timestamp_millis: i64,
    /// 产生事件的 logger 名称
    pub logger_name: String,
    /// 来源位置信息
    pub location: Option<Location>,
    /// 异常因果链
    pub throwable: Option<ThrowableInfo>,
}

/// 来源位置信息
///
/// 任一字段都可能缺失，缺失的字段在输出文档中写为 null。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Location {
    /// 文件名
    pub file: Option<String>,
    /// 行号
    pub line: Option<u32>,
    /// 类名或模块路径
    pub class: Option<String>,
    /// 方法名
    pub method: Option<String>,
}

/// 异常信息
///
/// `frames` 是仅头节点携带的预渲染栈帧数组；`throwable` 是因果链的头节点。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowableInfo {
    /// 预渲染的栈帧文本，按行保存
    pub frames: Option<Vec<String>>,
    /// 因果链头节点
    pub throwable: Option<ThrowableNode>,
}

/// 因果链节点
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrowableNode {
    /// 异常类型的全限定名
    pub name: String,
    /// 异常消息
    pub message: Option<String>,
    /// 下一级 cause，链尾为 None
    pub cause: Option<Box<ThrowableNode>>,
}

impl LogEvent {
    /// 创建新的日志事件
    pub fn new(
        level: impl Into<String>,
        message: serde_json::Value,
        timestamp_millis: i64,
        logger_name: impl Into<String>,
    ) -> Self {
        Self {
            level: level.into(),
            message,
            timestamp_millis,
            logger_name: logger_name.into(),
            location: None,
            throwable: None,
        }
    }

    /// 附加来源位置信息
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// 附加异常信息
    pub fn with_throwable(mut self, throwable: ThrowableInfo) -> Self {
        self.throwable = Some(throwable);
        self
    }
}

impl ThrowableNode {
    /// 创建新的因果链节点
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: None,
            cause: None,
        }
    }

    /// 设置异常消息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 设置下一级 cause
    pub fn caused_by(mut self, cause: ThrowableNode) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl ThrowableInfo {
    /// 由因果链头节点创建异常信息
    pub fn from_node(node: ThrowableNode) -> Self {
        Self {
            frames: None,
            throwable: Some(node),
        }
    }

    /// 附加预渲染的栈帧文本
    pub fn with_frames(mut self, frames: Vec<String>) -> Self {
        self.frames = Some(frames);
        self
    }
}
