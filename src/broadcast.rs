//! Broadcast fan-out: a single worker drains a FIFO queue of jobs, so
//! queued broadcasts run strictly in submission order. Each job is split
//! into chunks delivered concurrently, with per-recipient retry and a fixed
//! pause between chunks to respect the chat API's rate limits. A recipient
//! that exhausts its retries is counted as failed and does not block the
//! rest of the chunk. Callers can observe queue depth and busy state but
//! cannot cancel an in-flight chunk.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::i18n::{Lang, Msg};

/// Delivery seam. The production implementation wraps the Telegram client;
/// tests substitute a recorder.
#[async_trait]
pub trait Outbound: Send + Sync + 'static {
    async fn deliver(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    pub chunk_size: usize,
    pub chunk_pause: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&AppConfig> for BroadcastSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            chunk_size: config.broadcast_chunk_size,
            chunk_pause: config.broadcast_chunk_pause,
            retry_attempts: config.broadcast_retry_attempts,
            retry_delay: config.broadcast_retry_delay,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastJob {
    pub text: String,
    pub recipients: Vec<i64>,
    /// Chat to receive the completion summary, with its language.
    pub notify: Option<(i64, Lang)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct BroadcastQueue {
    tx: mpsc::UnboundedSender<BroadcastJob>,
    depth: Arc<AtomicUsize>,
    busy: Arc<AtomicBool>,
}

impl BroadcastQueue {
    /// Spawns the single worker task and returns the queue handle.
    pub fn spawn(outbound: Arc<dyn Outbound>, settings: BroadcastSettings) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<BroadcastJob>();
        let depth = Arc::new(AtomicUsize::new(0));
        let busy = Arc::new(AtomicBool::new(false));

        let worker_depth = depth.clone();
        let worker_busy = busy.clone();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                // Busy flips on before the depth drops so `is_busy` never
                // reads idle while a job is in hand.
                worker_busy.store(true, Ordering::SeqCst);
                worker_depth.fetch_sub(1, Ordering::SeqCst);

                let report = run_job(outbound.clone(), &settings, &job).await;
                tracing::info!(sent = report.sent, failed = report.failed, "broadcast finished");

                if let Some((chat_id, lang)) = job.notify {
                    let summary = Msg::BroadcastFinished {
                        sent: report.sent,
                        failed: report.failed,
                    }
                    .render(lang);
                    if let Err(e) = outbound.deliver(chat_id, &summary).await {
                        tracing::warn!("failed to deliver broadcast summary: {e}");
                    }
                }

                worker_busy.store(false, Ordering::SeqCst);
            }
        });

        Self { tx, depth, busy }
    }

    pub fn enqueue(&self, job: BroadcastJob) {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            tracing::error!("broadcast worker is gone, job dropped");
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst) || self.queue_depth() > 0
    }
}

/// Runs one job to completion: chunked, concurrent within a chunk, paused
/// between chunks.
pub async fn run_job(
    outbound: Arc<dyn Outbound>,
    settings: &BroadcastSettings,
    job: &BroadcastJob,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    let chunks: Vec<&[i64]> = job.recipients.chunks(settings.chunk_size.max(1)).collect();
    let last = chunks.len().saturating_sub(1);

    for (i, chunk) in chunks.into_iter().enumerate() {
        let mut tasks = tokio::task::JoinSet::new();
        for &chat_id in chunk {
            let outbound = outbound.clone();
            let settings = settings.clone();
            let text = job.text.clone();
            tasks.spawn(async move {
                deliver_with_retry(outbound.as_ref(), &settings, chat_id, &text).await
            });
        }

        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(true) => report.sent += 1,
                _ => report.failed += 1,
            }
        }

        if i < last {
            tokio::time::sleep(settings.chunk_pause).await;
        }
    }

    report
}

/// Retries a single recipient, with the delay growing per attempt.
async fn deliver_with_retry(
    outbound: &dyn Outbound,
    settings: &BroadcastSettings,
    chat_id: i64,
    text: &str,
) -> bool {
    for attempt in 1..=settings.retry_attempts.max(1) {
        match outbound.deliver(chat_id, text).await {
            Ok(()) => return true,
            Err(e) => {
                tracing::warn!(chat_id, attempt, "broadcast delivery failed: {e}");
                if attempt < settings.retry_attempts {
                    tokio::time::sleep(settings.retry_delay * attempt).await;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records delivery attempts; fails a chat id for its first N
    /// configured attempts, then succeeds.
    struct MockOutbound {
        attempts: Mutex<HashMap<i64, u32>>,
        failures: HashMap<i64, u32>,
    }

    impl MockOutbound {
        fn new(failures: HashMap<i64, u32>) -> Arc<Self> {
            Arc::new(Self {
                attempts: Mutex::new(HashMap::new()),
                failures,
            })
        }

        fn attempts_for(&self, chat_id: i64) -> u32 {
            *self.attempts.lock().unwrap().get(&chat_id).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl Outbound for MockOutbound {
        async fn deliver(&self, chat_id: i64, _text: &str) -> anyhow::Result<()> {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(chat_id).or_insert(0);
            *n += 1;
            if *n <= *self.failures.get(&chat_id).unwrap_or(&0) {
                anyhow::bail!("simulated delivery failure");
            }
            Ok(())
        }
    }

    fn fast_settings() -> BroadcastSettings {
        BroadcastSettings {
            chunk_size: 2,
            chunk_pause: Duration::ZERO,
            retry_attempts: 3,
            retry_delay: Duration::ZERO,
        }
    }

    fn job(recipients: Vec<i64>) -> BroadcastJob {
        BroadcastJob {
            text: "hello".into(),
            recipients,
            notify: None,
        }
    }

    #[tokio::test]
    async fn delivers_to_every_recipient_across_chunks() {
        let outbound = MockOutbound::new(HashMap::new());
        let report = run_job(outbound.clone(), &fast_settings(), &job(vec![1, 2, 3, 4, 5])).await;

        assert_eq!(report, BroadcastReport { sent: 5, failed: 0 });
        for id in 1..=5 {
            assert_eq!(outbound.attempts_for(id), 1);
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_and_counted_sent() {
        // Chat 2 fails twice, then succeeds on the third attempt.
        let outbound = MockOutbound::new(HashMap::from([(2, 2)]));
        let report = run_job(outbound.clone(), &fast_settings(), &job(vec![1, 2])).await;

        assert_eq!(report, BroadcastReport { sent: 2, failed: 0 });
        assert_eq!(outbound.attempts_for(1), 1);
        assert_eq!(outbound.attempts_for(2), 3);
    }

    #[tokio::test]
    async fn exhausted_recipient_fails_without_blocking_the_chunk() {
        // Chat 3 never succeeds.
        let outbound = MockOutbound::new(HashMap::from([(3, u32::MAX)]));
        let report = run_job(outbound.clone(), &fast_settings(), &job(vec![1, 2, 3, 4])).await;

        assert_eq!(report, BroadcastReport { sent: 3, failed: 1 });
        assert_eq!(outbound.attempts_for(3), 3);
        assert_eq!(outbound.attempts_for(4), 1);
    }

    #[tokio::test]
    async fn queue_reports_depth_and_drains_in_order() {
        let outbound = MockOutbound::new(HashMap::new());
        let queue = BroadcastQueue::spawn(outbound.clone(), fast_settings());

        queue.enqueue(job(vec![1]));
        queue.enqueue(job(vec![2]));

        // Wait for the single worker to drain both jobs.
        for _ in 0..100 {
            if !queue.is_busy() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!queue.is_busy());
        assert_eq!(queue.queue_depth(), 0);
        assert_eq!(outbound.attempts_for(1), 1);
        assert_eq!(outbound.attempts_for(2), 1);
    }
}
