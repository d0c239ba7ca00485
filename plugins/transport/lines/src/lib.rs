//! Построчный транспорт: JSON-записи по одной на строку поверх
//! stdin/stdout, файлов и TCP.

mod framing;
mod reference;
mod sink;
mod source;

use serde::Deserialize;

use meterflow_api::AdapterError;

pub use framing::{Frame, LineDecoder, encode_line};
pub use reference::StreamRef;
pub use sink::LineSink;
pub use source::LineSource;

// ═══════════════════════════════════════════════════════════════
//  LinesConfig
// ═══════════════════════════════════════════════════════════════

fn default_max_length() -> usize {
    65536
}

fn default_buffer() -> usize {
    1024
}

/// Секция `[transport]`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinesConfig {
    /// Максимальная длина строки в байтах (0 = без ограничения).
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Ёмкость канала между читателями и pull().
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

impl Default for LinesConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            buffer: default_buffer(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Entry points
// ═══════════════════════════════════════════════════════════════

/// Открыть входной поток по ссылке (`-`, `file://`, `tcp://`, `tcp-listen://`).
pub async fn open_source(reference: &str, config: &LinesConfig) -> Result<LineSource, AdapterError> {
    LineSource::open(reference.parse()?, config).await
}

/// Открыть выходной поток по ссылке (`-`, `file://`, `tcp://`).
pub async fn open_sink(reference: &str) -> Result<LineSink, AdapterError> {
    LineSink::open(reference.parse()?).await
}
