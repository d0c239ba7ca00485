/// Откуда пришла ошибка адаптера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Неверная ссылка на поток или роль адаптера. Только при старте.
    Config,
    /// Ошибка чтения, записи или соединения.
    Io,
    /// Нарушен протокол брокера: неизвестный ack handle, закрытый topic.
    Logic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Ошибка pull/ack/publish/flush.
///
/// Runner не различает виды при обработке: publish без ack уходит на
/// повторную доставку, ошибка pull останавливает цикл. `kind` нужен
/// для логов и тестов.
#[derive(Clone)]
pub struct AdapterError {
    kind: ErrorKind,
    message: String,
}

impl AdapterError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl std::fmt::Debug for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for AdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AdapterError {}

impl From<std::io::Error> for AdapterError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

// ════════════════════════════════════════════════════════════════
//  ParseError
// ════════════════════════════════════════════════════════════════

/// Payload is not a well-formed ingress record.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a json object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("unexpected field '{0}'")]
    UnexpectedField(String),

    #[error("field '{field}': unsupported {kind} value")]
    UnsupportedValue { field: &'static str, kind: &'static str },
}
