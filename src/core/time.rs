//! 时间格式化
//!
//! 将 epoch 毫秒转换为文档中的原生时间值与显示文本。
//! 纯函数实现，不共享任何可变的日历状态，可被任意线程并发调用；
//! UTC 偏移按具体时刻在目标时区内解析，夏令时切换由 `chrono-tz` 处理。

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use mongodb::bson;

/// 将 epoch 毫秒格式化为 (原生时间值, 显示文本)。
///
/// 显示文本形如 `YYYY-MM-DD HH:MM:SS ±HHMM`，偏移为该时刻在
/// `timezone` 内的实际 UTC 偏移。超出 chrono 可表示范围的毫秒值
/// 回退到 epoch 零点，不会 panic。
pub fn format_time(timestamp_millis: i64, timezone: Tz) -> (bson::DateTime, String) {
    let instant = bson::DateTime::from_millis(timestamp_millis);

    let utc: DateTime<Utc> = Utc
        .timestamp_millis_opt(timestamp_millis)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH);
    let text = utc
        .with_timezone(&timezone)
        .format("%Y-%m-%d %H:%M:%S %z")
        .to_string();

    (instant, text)
}
