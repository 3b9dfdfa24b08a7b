#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("unknown storage backend '{0}' (expected \"rocksdb\" or \"memory\")")]
    UnknownBackend(String),

    #[error("storage: {0}")]
    Storage(#[from] queue_api::StorageError),

    #[error("{0}")]
    Queue(#[from] queue_engine::QueueError),

    #[error("api: {0}")]
    Api(String),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
