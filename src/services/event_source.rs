use crate::error::Result;

/// Источник оконных событий: X-сервер или dry-run сценарий.
/// События уходят в общую очередь цикла композитора.
#[async_trait::async_trait]
pub trait EventSource: Send {
    /// Run the event source until the queue closes or an error occurs
    async fn run(self: Box<Self>) -> Result<()>;
}
