use std::sync::Arc;

use meterflow_api::{Diagnostics, Record, Stage};

/// Отбрасывает записи, в которых есть пустое измерение
/// (null или строка "none").
pub struct FilterStage {
    diagnostics: Arc<dyn Diagnostics>,
}

impl FilterStage {
    pub fn new(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self { diagnostics }
    }

    /// Запись без изменений либо None. Значения и типы полей не трогает.
    pub fn filter(&self, record: Record) -> Option<Record> {
        match first_missing(&record) {
            Some(field) => {
                self.diagnostics.record_filtered(&record.id, field);
                None
            }
            None => Some(record),
        }
    }
}

impl Stage for FilterStage {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn process(&self, record: Record) -> Option<Record> {
        self.filter(record)
    }
}

/// Первое пустое поле в порядке полей записи.
pub fn first_missing(record: &Record) -> Option<&'static str> {
    record
        .fields()
        .into_iter()
        .find(|(_, value)| value.is_missing())
        .map(|(name, _)| name)
}
