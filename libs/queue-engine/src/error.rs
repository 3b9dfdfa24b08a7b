use queue_api::StorageError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// GetNext на topic'е, в который ещё не было ни одного Insert.
    #[error("topic does not exist")]
    TopicNotExist,

    /// Курсор чтения догнал write offset. Клиенту стоит повторить позже.
    #[error("no message available")]
    NoMessageAvailable,

    /// Nack offset'а, который сейчас не in-flight.
    #[error("nacked message does not exist")]
    NackMsgNotExist,

    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

impl QueueError {
    /// Ошибки, после которых очередь в порядке, а клиенту достаточно
    /// подождать или исправить запрос.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::TopicNotExist | QueueError::NoMessageAvailable)
    }
}
