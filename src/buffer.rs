//! 定时缓冲
//!
//! 有界缓冲配合批量刷新可以明显改善连续向 MongoDB 写入数据的性能。
//! `put` 在调用线程上同步执行且从不阻塞：缓冲饱和时丢弃新数据并累计
//! 丢弃计数，稍后通过丢弃通知回调一次性通报。刷新由先到的条件触发：
//! 累积数量达到 `bulk_size`，或距上次刷新超过 `bulk_time`。
//!
//! `close` 是调用方视角的同步屏障：停止接收新数据、排空队列、
//! 等待所有进行中的刷新任务完成后才返回。

use crate::config::TimedBufferConfig;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// 最大缓存数量，超出的数据被丢弃
pub const MAX_CAPACITY: usize = 10_000;
/// 批量写入的数量阈值
pub const THRESHOLD_SIZE: usize = 1_000;
/// 定时写入的周期（毫秒）
pub const THRESHOLD_TIME: u64 = 1_000;
/// 刷新任务并发上限
pub const MAX_THREADS: usize = 4;
/// 默认使用 fixed-delay 调度
pub const FIX_DELAY: bool = true;

/// 批量刷新回调
///
/// 与 [`BufferDroppedNotify`] 各自独立注入，同一个对象可以同时实现两者。
#[async_trait]
pub trait BufferHandler<T>: Send + Sync {
    /// 处理一批从缓冲中取出的数据
    async fn process_buffer(&self, batch: Vec<T>);
}

/// 丢弃通知回调
#[async_trait]
pub trait BufferDroppedNotify: Send + Sync {
    /// 通报自上次通知以来因缓冲饱和而丢弃的数据总数
    async fn notify_buffer_dropped(&self, count: u64);
}

/// 缓冲区统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// 当前缓冲中的数据量
    pub current_size: usize,
    /// 累计丢弃的数据量
    pub dropped_count: u64,
}

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    max_capacity: usize,
    bulk_size: usize,
    /// 待通报的丢弃数，通报时清零
    dropped_pending: AtomicU64,
    /// 累计丢弃数，只增不减
    dropped_total: AtomicU64,
    closed: AtomicBool,
    flush_signal: Notify,
    shutdown_signal: Notify,
}

/// 有界定时缓冲
pub struct TimedBuffer<T> {
    shared: Arc<Shared<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> TimedBuffer<T> {
    /// 创建缓冲并启动后台刷新任务。
    ///
    /// 必须在 Tokio 运行时内调用。对退化配置施加最小阈值，
    /// 避免零容量或零周期。
    pub fn new(
        config: TimedBufferConfig,
        handler: Arc<dyn BufferHandler<T>>,
        drop_notify: Arc<dyn BufferDroppedNotify>,
    ) -> Self {
        let config = TimedBufferConfig {
            max_capacity: config.max_capacity.max(1),
            bulk_size: config.bulk_size.max(1),
            bulk_time_ms: config.bulk_time_ms.max(1),
            max_threads: config.max_threads.max(1),
            fixed_delay: config.fixed_delay,
        };

        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(
                config.bulk_size.min(config.max_capacity),
            )),
            max_capacity: config.max_capacity,
            bulk_size: config.bulk_size,
            dropped_pending: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            flush_signal: Notify::new(),
            shutdown_signal: Notify::new(),
        });

        let worker = tokio::spawn(run_worker(
            Arc::clone(&shared),
            handler,
            drop_notify,
            config,
        ));

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// 放入一条数据，从不阻塞调用线程。
    ///
    /// 缓冲已满或已关闭时丢弃该条数据并返回 false；
    /// 饱和丢弃会计入后续的丢弃通知。
    pub fn put(&self, item: T) -> bool {
        if self.shared.closed.load(Ordering::Acquire) {
            return false;
        }

        let len = {
            let mut queue = self
                .shared
                .queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if queue.len() >= self.shared.max_capacity {
                drop(queue);
                self.shared.dropped_pending.fetch_add(1, Ordering::Relaxed);
                self.shared.dropped_total.fetch_add(1, Ordering::Relaxed);
                return false;
            }
            queue.push_back(item);
            queue.len()
        };

        if len >= self.shared.bulk_size {
            self.shared.flush_signal.notify_one();
        }
        true
    }

    /// 当前统计信息
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            current_size: self
                .shared
                .queue
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
            dropped_count: self.shared.dropped_total.load(Ordering::Relaxed),
        }
    }

    /// 关闭缓冲：停止接收、排空队列并刷新，等待全部刷新任务完成。
    ///
    /// 返回后可以安全地关闭下游 sink —— 不会再有刷新与之竞争。
    /// 重复调用是无害的空操作。
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.shutdown_signal.notify_one();

        let handle = {
            let mut guard = self
                .worker
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.take()
        };
        if let Some(handle) = handle {
            if handle.await.is_err() {
                warn!("timed buffer worker terminated abnormally");
            }
        }
    }
}

impl<T> fmt::Debug for TimedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedBuffer")
            .field("max_capacity", &self.shared.max_capacity)
            .field("bulk_size", &self.shared.bulk_size)
            .field("closed", &self.shared.closed.load(Ordering::Relaxed))
            .finish()
    }
}

async fn run_worker<T: Send + 'static>(
    shared: Arc<Shared<T>>,
    handler: Arc<dyn BufferHandler<T>>,
    drop_notify: Arc<dyn BufferDroppedNotify>,
    config: TimedBufferConfig,
) {
    let permits = Arc::new(Semaphore::new(config.max_threads));
    let period = config.bulk_time();
    let mut ticker = interval_at(Instant::now() + period, period);
    // fixed-delay：下一次刷新的期限从上一次刷新算起；
    // fixed-rate：严格按周期调度，不受刷新耗时影响
    ticker.set_missed_tick_behavior(if config.fixed_delay {
        MissedTickBehavior::Delay
    } else {
        MissedTickBehavior::Burst
    });

    loop {
        tokio::select! {
            _ = shared.shutdown_signal.notified() => break,
            _ = shared.flush_signal.notified() => {
                flush(&shared, &handler, &permits).await;
                if config.fixed_delay {
                    ticker.reset();
                }
            }
            _ = ticker.tick() => {
                flush(&shared, &handler, &permits).await;
                report_dropped(&shared, &drop_notify).await;
            }
        }
    }

    // 停止接收后的最终排空
    flush(&shared, &handler, &permits).await;
    report_dropped(&shared, &drop_notify).await;

    // 占满所有许可，等价于等待全部进行中的刷新任务完成
    let _ = permits.acquire_many(config.max_threads as u32).await;
    debug!("timed buffer worker stopped");
}

async fn flush<T: Send + 'static>(
    shared: &Arc<Shared<T>>,
    handler: &Arc<dyn BufferHandler<T>>,
    permits: &Arc<Semaphore>,
) {
    let batch: Vec<T> = {
        let mut queue = shared
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if queue.is_empty() {
            return;
        }
        queue.drain(..).collect()
    };

    // 许可耗尽时在此等待，刷新并发由 max_threads 限定；
    // 期间新数据继续进入队列，饱和后按丢弃策略处理
    let Ok(permit) = Arc::clone(permits).acquire_owned().await else {
        return;
    };
    let handler = Arc::clone(handler);
    tokio::spawn(async move {
        handler.process_buffer(batch).await;
        drop(permit);
    });
}

async fn report_dropped<T>(shared: &Arc<Shared<T>>, drop_notify: &Arc<dyn BufferDroppedNotify>) {
    let count = shared.dropped_pending.swap(0, Ordering::AcqRel);
    if count > 0 {
        drop_notify.notify_buffer_dropped(count).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use tokio::time::Duration;

    #[derive(Default)]
    struct RecordingHandler {
        delay: Option<Duration>,
        batches: Mutex<Vec<Vec<u32>>>,
        completed: AtomicU64,
    }

    impl RecordingHandler {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        fn completed(&self) -> u64 {
            self.completed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BufferHandler<u32> for RecordingHandler {
        async fn process_buffer(&self, batch: Vec<u32>) {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.completed.fetch_add(batch.len() as u64, Ordering::SeqCst);
            self.batches.lock().unwrap().push(batch);
        }
    }

    #[derive(Default)]
    struct RecordingNotify {
        counts: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl BufferDroppedNotify for RecordingNotify {
        async fn notify_buffer_dropped(&self, count: u64) {
            self.counts.lock().unwrap().push(count);
        }
    }

    fn quiet_config(max_capacity: usize, bulk_size: usize) -> TimedBufferConfig {
        TimedBufferConfig {
            max_capacity,
            bulk_size,
            // 周期拉长到测试不会碰到定时刷新
            bulk_time_ms: 60_000,
            max_threads: 2,
            fixed_delay: true,
        }
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    #[tokio::test]
    async fn test_saturation_drops_exactly_the_excess() {
        let handler = Arc::new(RecordingHandler::default());
        let notify = Arc::new(RecordingNotify::default());
        let buffer = TimedBuffer::new(quiet_config(8, 1_000), handler.clone(), notify.clone());

        let mut accepted = 0;
        for item in 0..20u32 {
            if buffer.put(item) {
                accepted += 1;
            }
        }

        // 容量 8，放入 20：恰好丢弃 12
        assert_eq!(accepted, 8);
        let stats = buffer.stats();
        assert_eq!(stats.current_size, 8);
        assert_eq!(stats.dropped_count, 12);

        buffer.close().await;

        // 排空时收到全部接受的数据，丢弃通知的计数之和等于 12
        assert_eq!(handler.completed(), 8);
        let reported: u64 = notify.counts.lock().unwrap().iter().sum();
        assert_eq!(reported, 12);
    }

    #[tokio::test]
    async fn test_size_triggered_flush() {
        let handler = Arc::new(RecordingHandler::default());
        let notify = Arc::new(RecordingNotify::default());
        let buffer = TimedBuffer::new(quiet_config(100, 5), handler.clone(), notify);

        for item in 0..5u32 {
            assert!(buffer.put(item));
        }

        wait_until(|| handler.completed() == 5).await;
        assert_eq!(buffer.stats().current_size, 0);

        buffer.close().await;
    }

    #[tokio::test]
    async fn test_time_triggered_flush() {
        let handler = Arc::new(RecordingHandler::default());
        let notify = Arc::new(RecordingNotify::default());
        let config = TimedBufferConfig {
            max_capacity: 100,
            bulk_size: 1_000,
            bulk_time_ms: 50,
            max_threads: 2,
            fixed_delay: true,
        };
        let buffer = TimedBuffer::new(config, handler.clone(), notify);

        for item in 0..3u32 {
            assert!(buffer.put(item));
        }

        // 数量阈值远未达到，只能由定时器触发
        wait_until(|| handler.completed() == 3).await;

        buffer.close().await;
    }

    #[tokio::test]
    async fn test_close_waits_for_slow_flush() {
        let handler = Arc::new(RecordingHandler::with_delay(Duration::from_millis(200)));
        let notify = Arc::new(RecordingNotify::default());
        let buffer = TimedBuffer::new(quiet_config(100, 1_000), handler.clone(), notify);

        for item in 0..10u32 {
            assert!(buffer.put(item));
        }

        // close 必须等慢速刷新完成后才返回
        buffer.close().await;
        assert_eq!(handler.completed(), 10);
    }

    #[tokio::test]
    async fn test_put_after_close_is_rejected() {
        let handler = Arc::new(RecordingHandler::default());
        let notify = Arc::new(RecordingNotify::default());
        let buffer = TimedBuffer::new(quiet_config(8, 1_000), handler.clone(), notify.clone());

        assert!(buffer.put(1));
        buffer.close().await;

        assert!(!buffer.put(2));
        // 关闭后的拒绝不计入丢弃通报
        assert!(notify.counts.lock().unwrap().is_empty());
        assert_eq!(handler.completed(), 1);

        // 重复关闭是无害的
        buffer.close().await;
    }

    #[tokio::test]
    async fn test_multiple_batches_accumulate() {
        let handler = Arc::new(RecordingHandler::default());
        let notify = Arc::new(RecordingNotify::default());
        let buffer = TimedBuffer::new(quiet_config(100, 4), handler.clone(), notify);

        for item in 0..4u32 {
            assert!(buffer.put(item));
        }
        wait_until(|| handler.completed() == 4).await;

        for item in 4..8u32 {
            assert!(buffer.put(item));
        }
        wait_until(|| handler.completed() == 8).await;

        buffer.close().await;
        assert_eq!(handler.batches.lock().unwrap().len(), 2);
    }
}
