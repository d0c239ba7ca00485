use std::sync::Mutex;

use meterflow_api::{AdapterError, Diagnostics, ParseError, Value};

// ═══════════════════════════════════════════════════════════════
//  TracingDiagnostics
// ═══════════════════════════════════════════════════════════════

/// Диагностика через `tracing`. Используется бинарником.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn record_filtered(&self, id: &Value, field: &'static str) {
        tracing::info!(id = %id, field, "record filtered: missing value");
    }

    fn conversion_skipped(&self, id: &Value, field: &'static str) {
        tracing::debug!(id = %id, field, "conversion skipped: value is not numeric");
    }

    fn malformed_payload(&self, error: &ParseError) {
        tracing::warn!(error = %error, "malformed payload dropped");
    }

    fn publish_failed(&self, error: &AdapterError) {
        tracing::error!(error = ?error, "publish failed, message left unacked");
    }

    fn ack_failed(&self, error: &AdapterError) {
        tracing::warn!(error = ?error, "ack failed");
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryDiagnostics
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    Filtered { id: Value, field: &'static str },
    ConversionSkipped { id: Value, field: &'static str },
    Malformed(String),
    PublishFailed(String),
    AckFailed(String),
}

/// Копит события в памяти. Для тестов и встраивания.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemoryDiagnostics {
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn push(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn record_filtered(&self, id: &Value, field: &'static str) {
        self.push(DiagnosticEvent::Filtered { id: id.clone(), field });
    }

    fn conversion_skipped(&self, id: &Value, field: &'static str) {
        self.push(DiagnosticEvent::ConversionSkipped { id: id.clone(), field });
    }

    fn malformed_payload(&self, error: &ParseError) {
        self.push(DiagnosticEvent::Malformed(error.to_string()));
    }

    fn publish_failed(&self, error: &AdapterError) {
        self.push(DiagnosticEvent::PublishFailed(error.to_string()));
    }

    fn ack_failed(&self, error: &AdapterError) {
        self.push(DiagnosticEvent::AckFailed(error.to_string()));
    }
}
