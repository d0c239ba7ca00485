use meterflow_api::AdapterError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("config: {0}")]
    Config(String),

    #[error("source: {0}")]
    Source(AdapterError),

    #[error("sink: {0}")]
    Sink(AdapterError),
}
