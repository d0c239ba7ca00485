use crate::{AdapterError, ParseError, Record, Value};

// ════════════════════════════════════════════════════════════════
//  Stage
// ════════════════════════════════════════════════════════════════

/// Один шаг преобразования: запись → 0 или 1 запись.
///
/// Реализации stateless и синхронные: один экземпляр обслуживает
/// все записи, в том числе параллельно.
pub trait Stage: Send + Sync {
    /// Имя стадии (для логирования).
    fn name(&self) -> &'static str;

    fn process(&self, record: Record) -> Option<Record>;
}

// ════════════════════════════════════════════════════════════════
//  Diagnostics
// ════════════════════════════════════════════════════════════════

/// Приёмник диагностических событий pipeline.
///
/// Передаётся в стадии и runner явно, вместо глобального логгера.
pub trait Diagnostics: Send + Sync {
    /// Запись отброшена фильтром; `field`: первое пустое поле.
    fn record_filtered(&self, id: &Value, field: &'static str);

    /// Поле не удалось привести к числу, оставлено как есть.
    fn conversion_skipped(&self, id: &Value, field: &'static str);

    /// Payload не является корректной записью.
    fn malformed_payload(&self, error: &ParseError);

    /// Sink не принял запись.
    fn publish_failed(&self, error: &AdapterError);

    /// Source не принял ack.
    fn ack_failed(&self, error: &AdapterError);
}
