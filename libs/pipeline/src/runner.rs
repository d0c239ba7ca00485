use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use meterflow_api::{AckHandle, Diagnostics, Message, MessageSink, MessageSource};

use crate::PipelineError;
use crate::chain::{Outcome, StageChain, process_payload};
use crate::config::{AckPolicy, RunnerConfig};

// ═══════════════════════════════════════════════════════════════
//  Stats
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct RunnerStats {
    pulled: AtomicU64,
    published: AtomicU64,
    filtered: AtomicU64,
    malformed: AtomicU64,
    publish_failed: AtomicU64,
    ack_failed: AtomicU64,
}

impl RunnerStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            pulled: self.pulled.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            publish_failed: self.publish_failed.load(Ordering::Relaxed),
            ack_failed: self.ack_failed.load(Ordering::Relaxed),
        }
    }
}

/// Счётчики runner'а на момент вызова.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub pulled: u64,
    pub published: u64,
    pub filtered: u64,
    pub malformed: u64,
    pub publish_failed: u64,
    pub ack_failed: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Shared state: одна копия на runner, Arc в каждой задаче
// ═══════════════════════════════════════════════════════════════

struct Shared {
    name: String,
    source: Arc<dyn MessageSource>,
    sink: Arc<dyn MessageSink>,
    chain: StageChain,
    diagnostics: Arc<dyn Diagnostics>,
    ack: AckPolicy,
    stats: RunnerStats,
}

impl Shared {
    /// Обработка одного сообщения: stages → publish → ack.
    async fn handle(&self, message: Message) {
        let Message { payload, ack } = message;

        match process_payload(&self.chain, &*self.diagnostics, &payload) {
            Outcome::Emit(bytes) => match self.sink.publish(bytes).await {
                Ok(()) => {
                    RunnerStats::bump(&self.stats.published);
                    self.ack_after_publish(ack).await;
                }
                Err(e) => {
                    // Без ack: брокер доставит сообщение повторно.
                    RunnerStats::bump(&self.stats.publish_failed);
                    self.diagnostics.publish_failed(&e);
                }
            },
            Outcome::Filtered => {
                RunnerStats::bump(&self.stats.filtered);
                self.ack_after_publish(ack).await;
            }
            Outcome::Malformed(_) => {
                RunnerStats::bump(&self.stats.malformed);
                self.ack_after_publish(ack).await;
            }
        }
    }

    async fn ack_after_publish(&self, handle: AckHandle) {
        if self.ack == AckPolicy::AfterPublish {
            self.ack(handle).await;
        }
    }

    async fn ack(&self, handle: AckHandle) {
        if let Err(e) = self.source.ack(handle).await {
            RunnerStats::bump(&self.stats.ack_failed);
            self.diagnostics.ack_failed(&e);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  PipelineRunner
// ═══════════════════════════════════════════════════════════════

/// Source → StageChain → Sink.
///
/// Pull выполняется последовательно из одной задачи, обработка каждого
/// сообщения в отдельной задаче, не более `concurrency` одновременно.
/// Порядок на выходе не гарантируется.
pub struct PipelineRunner {
    shared: Arc<Shared>,
    concurrency: usize,
}

impl PipelineRunner {
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn MessageSource>,
        sink: Arc<dyn MessageSink>,
        chain: StageChain,
        diagnostics: Arc<dyn Diagnostics>,
        config: &RunnerConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(Shared {
                name: name.into(),
                source,
                sink,
                chain,
                diagnostics,
                ack: config.ack,
                stats: RunnerStats::default(),
            }),
            concurrency: config.concurrency,
        })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Крутит цикл до отмены `token`, конца входного потока или ошибки pull().
    ///
    /// В любом случае дожидается всех задач в обработке и вызывает
    /// `sink.flush()` ровно один раз.
    pub async fn run(self, token: CancellationToken) -> Result<StatsSnapshot, PipelineError> {
        let shared = self.shared;
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut failure = None;

        tracing::info!(
            runner = %shared.name,
            stages = ?shared.chain.names(),
            concurrency = self.concurrency,
            ack = %shared.ack,
            "runner started"
        );

        loop {
            let permit = tokio::select! {
                _ = token.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let pulled = tokio::select! {
                _ = token.cancelled() => break,
                pulled = shared.source.pull() => pulled,
            };

            let message = match pulled {
                Ok(Some(message)) => message,
                Ok(None) => {
                    tracing::info!(runner = %shared.name, "input stream closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(runner = %shared.name, error = ?e, "pull failed, stopping");
                    failure = Some(PipelineError::Source(e));
                    break;
                }
            };

            RunnerStats::bump(&shared.stats.pulled);
            if shared.ack == AckPolicy::OnPull {
                shared.ack(message.ack).await;
            }

            let task = shared.clone();
            tasks.spawn(async move {
                task.handle(message).await;
                drop(permit);
            });

            while let Some(joined) = tasks.try_join_next() {
                log_join(&shared.name, joined);
            }
        }

        if !tasks.is_empty() {
            tracing::info!(runner = %shared.name, in_flight = tasks.len(), "draining");
        }
        while let Some(joined) = tasks.join_next().await {
            log_join(&shared.name, joined);
        }

        if let Err(e) = shared.sink.flush().await {
            tracing::error!(runner = %shared.name, error = ?e, "sink flush failed");
            if failure.is_none() {
                failure = Some(PipelineError::Sink(e));
            }
        }

        let stats = shared.stats.snapshot();
        tracing::info!(
            runner = %shared.name,
            pulled = stats.pulled,
            published = stats.published,
            filtered = stats.filtered,
            malformed = stats.malformed,
            publish_failed = stats.publish_failed,
            ack_failed = stats.ack_failed,
            "runner finished"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }
}

fn log_join(name: &str, joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(runner = %name, error = ?e, "record task panicked");
    }
}

/// Запустить runner в отдельной задаче.
pub fn spawn_runner(
    runner: PipelineRunner,
    token: CancellationToken,
) -> JoinHandle<Result<StatsSnapshot, PipelineError>> {
    tokio::spawn(runner.run(token))
}
