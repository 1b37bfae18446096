#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("store: {0}")]
    Store(#[from] logsink_api::StoreError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("server task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ServerError {
    pub fn config(context: &'static str, detail: impl Into<String>) -> Self {
        ServerError::Config {
            context,
            detail: detail.into(),
        }
    }
}
