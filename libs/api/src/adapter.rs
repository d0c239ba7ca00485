use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::AdapterError;

// ════════════════════════════════════════════════════════════════
//  Overflow Policy
// ════════════════════════════════════════════════════════════════

/// Стратегия поведения при переполнении bounded канала.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// try_send(): если канал полон, дропнуть сообщение и залогировать.
    Drop,
    /// .send().await: ждать пока появится место (back-pressure).
    #[serde(alias = "backpressure")]
    BackPressure,
}

// ════════════════════════════════════════════════════════════════
//  Messages
// ════════════════════════════════════════════════════════════════

/// Непрозрачный токен подтверждения, выданный source'ом при pull().
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AckHandle(u64);

impl AckHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for AckHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Сообщение из входного потока: сырые байты + ack handle.
#[derive(Debug, Clone)]
pub struct Message {
    pub payload: Vec<u8>,
    pub ack: AckHandle,
}

// ════════════════════════════════════════════════════════════════
//  Adapter Traits
// ════════════════════════════════════════════════════════════════

/// Входной поток брокера.
///
/// Подключение, аутентификация и retry транспорта на стороне
/// реализации. Runner вызывает pull() последовательно из одной задачи,
/// ack() из задач обработки.
pub trait MessageSource: Send + Sync {
    /// Следующее сообщение. Ждёт, пока сообщение не появится.
    /// None = поток закрыт, новых сообщений не будет.
    fn pull(&self) -> Pin<Box<dyn Future<Output = Result<Option<Message>, AdapterError>> + Send + '_>>;

    /// Подтвердить обработку сообщения.
    fn ack(&self, handle: AckHandle) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + '_>>;
}

/// Выходной поток брокера.
pub trait MessageSink: Send + Sync {
    /// Опубликовать payload. Ошибка = PublishError; retry не делается.
    fn publish(&self, payload: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + '_>>;

    /// Flush буферов. Вызывается один раз после остановки runner'а.
    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}
