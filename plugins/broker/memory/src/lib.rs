use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::pin::{Pin, pin};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use meterflow_api::{AckHandle, AdapterError, Message, MessageSink, MessageSource, OverflowPolicy};

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

/// In-process брокер: именованные topic'и с ack и повторной доставкой.
/// Для тестов и локального запуска без внешнего брокера.
#[derive(Default)]
pub struct MemoryBroker {
    topics: Mutex<HashMap<String, Arc<MemoryTopic>>>,
    capacity: usize,
}

impl MemoryBroker {
    /// Брокер с неограниченными topic'ами.
    pub fn new() -> Self {
        Self::default()
    }

    /// Брокер, у которого каждый topic вмещает не больше `capacity`
    /// неполученных сообщений. 0 = без ограничения.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { topics: Mutex::default(), capacity }
    }

    /// Topic по имени; создаётся при первом обращении.
    pub fn topic(&self, name: &str) -> Arc<MemoryTopic> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryTopic::new(name, self.capacity)))
            .clone()
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryTopic
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct TopicState {
    queue: VecDeque<Vec<u8>>,
    unacked: BTreeMap<u64, Vec<u8>>,
    closed: bool,
}

/// Очередь сообщений одного topic'а.
///
/// Выданное через pull() сообщение хранится до ack(). Неподтверждённые
/// сообщения можно вернуть в начало очереди через `redeliver_unacked()`.
pub struct MemoryTopic {
    name: String,
    capacity: usize,
    state: Mutex<TopicState>,
    readable: Notify,
    writable: Notify,
    next_id: AtomicU64,
}

impl MemoryTopic {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            state: Mutex::default(),
            readable: Notify::new(),
            writable: Notify::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn source(self: &Arc<Self>) -> MemorySource {
        MemorySource { topic: self.clone() }
    }

    pub fn sink(self: &Arc<Self>, overflow: OverflowPolicy) -> MemorySink {
        MemorySink { topic: self.clone(), overflow }
    }

    fn state(&self) -> MutexGuard<'_, TopicState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_full(&self, state: &TopicState) -> bool {
        self.capacity > 0 && state.queue.len() >= self.capacity
    }

    /// Положить payload в очередь в обход capacity.
    pub fn publish_raw(&self, payload: impl Into<Vec<u8>>) -> Result<(), AdapterError> {
        let mut state = self.state();
        if state.closed {
            return Err(self.closed_error());
        }
        state.queue.push_back(payload.into());
        drop(state);
        self.readable.notify_waiters();
        Ok(())
    }

    /// Забрать все ещё не полученные сообщения (без ack-учёта).
    pub fn drain(&self) -> Vec<Vec<u8>> {
        let drained: Vec<Vec<u8>> = self.state().queue.drain(..).collect();
        self.writable.notify_waiters();
        drained
    }

    /// Больше никаких publish. Pull вернёт None, когда очередь опустеет.
    pub fn close(&self) {
        self.state().closed = true;
        tracing::debug!(topic = %self.name, "topic closed");
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    /// Сообщений в очереди (не выданных через pull).
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Выдано через pull(), но не подтверждено.
    pub fn pending_acks(&self) -> usize {
        self.state().unacked.len()
    }

    /// Вернуть все неподтверждённые сообщения в начало очереди.
    /// Возвращает их количество.
    pub fn redeliver_unacked(&self) -> usize {
        let mut state = self.state();
        let unacked = std::mem::take(&mut state.unacked);
        let count = unacked.len();
        for payload in unacked.into_values().rev() {
            state.queue.push_front(payload);
        }
        drop(state);

        if count > 0 {
            tracing::debug!(topic = %self.name, count, "redelivering unacked messages");
            self.readable.notify_waiters();
        }
        count
    }

    /// Some(Some) = сообщение, Some(None) = topic закрыт и пуст, None = ждать.
    fn try_pull(&self) -> Option<Option<Message>> {
        let mut state = self.state();
        match state.queue.pop_front() {
            Some(payload) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                state.unacked.insert(id, payload.clone());
                drop(state);
                self.writable.notify_waiters();
                Some(Some(Message { payload, ack: AckHandle::new(id) }))
            }
            None if state.closed => Some(None),
            None => None,
        }
    }

    async fn pull(&self) -> Option<Message> {
        loop {
            let mut notified = pin!(self.readable.notified());
            notified.as_mut().enable();

            if let Some(pulled) = self.try_pull() {
                return pulled;
            }
            notified.await;
        }
    }

    fn ack(&self, handle: AckHandle) -> Result<(), AdapterError> {
        match self.state().unacked.remove(&handle.id()) {
            Some(_) => Ok(()),
            None => Err(AdapterError::new(format!(
                "topic '{}': unknown ack handle {handle}",
                self.name
            ))),
        }
    }

    async fn publish(&self, payload: Vec<u8>, overflow: OverflowPolicy) -> Result<(), AdapterError> {
        loop {
            let mut notified = pin!(self.writable.notified());
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if state.closed {
                    return Err(self.closed_error());
                }
                if !self.is_full(&state) {
                    state.queue.push_back(payload);
                    drop(state);
                    self.readable.notify_waiters();
                    return Ok(());
                }
                if overflow == OverflowPolicy::Drop {
                    tracing::warn!(topic = %self.name, capacity = self.capacity, "topic full, dropping");
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    fn closed_error(&self) -> AdapterError {
        AdapterError::new(format!("topic '{}' is closed", self.name))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Adapters
// ═══════════════════════════════════════════════════════════════

pub struct MemorySource {
    topic: Arc<MemoryTopic>,
}

impl MessageSource for MemorySource {
    fn pull(&self) -> Pin<Box<dyn Future<Output = Result<Option<Message>, AdapterError>> + Send + '_>> {
        Box::pin(async { Ok(self.topic.pull().await) })
    }

    fn ack(&self, handle: AckHandle) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + '_>> {
        Box::pin(async move { self.topic.ack(handle) })
    }
}

pub struct MemorySink {
    topic: Arc<MemoryTopic>,
    overflow: OverflowPolicy,
}

impl MessageSink for MemorySink {
    fn publish(&self, payload: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + '_>> {
        Box::pin(self.topic.publish(payload, self.overflow))
    }
}
