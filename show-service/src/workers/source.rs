use async_trait::async_trait;
use service_core::error::AppError;
use tokio::sync::mpsc;

/// Settles a delivery with the broker once processing has finished.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), AppError>;
    async fn reject(&self, requeue: bool) -> Result<(), AppError>;
}

/// One delivery from the acceptance queue.
///
/// `acknowledger` is `None` when the broker already considers the message
/// consumed (auto-ack).
pub struct QueueMessage {
    pub payload: Vec<u8>,
    pub acknowledger: Option<Box<dyn Acknowledger>>,
}

impl QueueMessage {
    pub fn auto_acked(payload: Vec<u8>) -> Self {
        Self {
            payload,
            acknowledger: None,
        }
    }
}

impl std::fmt::Debug for QueueMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueMessage")
            .field("payload", &String::from_utf8_lossy(&self.payload))
            .field("manual_ack", &self.acknowledger.is_some())
            .finish()
    }
}

#[async_trait]
pub trait MessageSource: Send {
    /// Next delivery, or `None` once the source is closed for good.
    async fn next_message(&mut self) -> Option<Result<QueueMessage, AppError>>;
}

/// In-process source fed through an mpsc channel. Messages are auto-acked.
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl ChannelSource {
    pub fn new(buffer: usize) -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_message(&mut self) -> Option<Result<QueueMessage, AppError>> {
        self.rx.recv().await.map(|payload| Ok(QueueMessage::auto_acked(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_source_closes_when_senders_drop() {
        let (tx, mut source) = ChannelSource::new(4);
        tx.send(b"{}".to_vec()).await.unwrap();
        drop(tx);

        let message = source.next_message().await.unwrap().unwrap();
        assert_eq!(message.payload, b"{}");
        assert!(message.acknowledger.is_none());
        assert!(source.next_message().await.is_none());
    }
}
