#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("no {0} stream configured")]
    MissingStream(&'static str),

    #[error("{0}")]
    Adapter(#[from] meterflow_api::AdapterError),

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("runner task: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
