use std::sync::Arc;

use meterflow_api::{Diagnostics, ParseError, Record, Stage};
use stage_missing_filter::FilterStage;
use stage_unit_convert::ConvertStage;

// ═══════════════════════════════════════════════════════════════
//  StageChain
// ═══════════════════════════════════════════════════════════════

/// Упорядоченная цепочка стадий. Первая стадия, вернувшая None,
/// прерывает цепочку.
#[derive(Default)]
pub struct StageChain {
    stages: Vec<Box<dyn Stage>>,
}

impl StageChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// filter → convert.
    pub fn standard(diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self::new()
            .with(FilterStage::new(diagnostics.clone()))
            .with(ConvertStage::new(diagnostics))
    }

    pub fn apply(&self, record: Record) -> Option<Record> {
        self.stages
            .iter()
            .try_fold(record, |record, stage| stage.process(record))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Per-message processing
// ═══════════════════════════════════════════════════════════════

/// Результат обработки одного payload.
#[derive(Debug)]
pub enum Outcome {
    /// Сериализованная запись для publish.
    Emit(Vec<u8>),
    /// Отброшена стадией.
    Filtered,
    /// Payload не распарсился.
    Malformed(ParseError),
}

/// Payload → Record → стадии → payload. Чистая функция от входа:
/// повторная доставка того же payload даёт тот же результат.
pub fn process_payload(chain: &StageChain, diagnostics: &dyn Diagnostics, payload: &[u8]) -> Outcome {
    let record = match Record::from_slice(payload) {
        Ok(record) => record,
        Err(e) => {
            diagnostics.malformed_payload(&e);
            return Outcome::Malformed(e);
        }
    };

    let Some(record) = chain.apply(record) else {
        return Outcome::Filtered;
    };

    match record.to_vec() {
        Ok(bytes) => Outcome::Emit(bytes),
        Err(e) => {
            let e = ParseError::Json(e);
            diagnostics.malformed_payload(&e);
            Outcome::Malformed(e)
        }
    }
}
