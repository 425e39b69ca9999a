//! 环境变量配置模块
//!
//! 此模块提供从环境变量读取 MongoDB 连接串的功能，
//! 对应 Java 版本中通过系统属性传递 URI 的用法。

use std::env;

/// MongoDB 连接串的环境变量名。
pub const LOG2MONGO_URI_ENV: &str = "LOG2MONGO_URI";

/// 环境变量配置管理器
pub struct EnvConfig;

impl EnvConfig {
    /// 从环境变量读取 MongoDB 连接串
    pub fn get_mongo_uri() -> Option<String> {
        env::var(LOG2MONGO_URI_ENV).ok().filter(|s| !s.is_empty())
    }
}

/// 解析 MongoDB 连接串：优先使用环境变量，其次使用第一个命令行参数。
///
/// 两者都缺失时返回空字符串，由调用方输出用法信息。
pub fn resolve_uri(args: &[String]) -> String {
    EnvConfig::get_mongo_uri()
        .or_else(|| args.first().cloned())
        .unwrap_or_default()
}
