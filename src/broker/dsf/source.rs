//! Push channel sources for the DSF broker.
//!
//! A source is connected at most once per client and yields raw frames (task
//! resources as JSON text) until it closes.

use crate::constants::BrokerType;
use crate::error::{BrokerError, BrokerResult};
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Establishes the push channel and hands back its frame queue
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn connect(&self) -> BrokerResult<mpsc::Receiver<String>>;
}

/// In-process source fed through an mpsc sender.
///
/// Used for embedding and tests; the receiver can be taken only once.
#[derive(Debug)]
pub struct ChannelNotificationSource {
    receiver: Mutex<Option<mpsc::Receiver<String>>>,
}

impl ChannelNotificationSource {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Sender<String>) {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        (
            Self {
                receiver: Mutex::new(Some(receiver)),
            },
            sender,
        )
    }
}

#[async_trait]
impl NotificationSource for ChannelNotificationSource {
    async fn connect(&self) -> BrokerResult<mpsc::Receiver<String>> {
        self.receiver
            .lock()
            .take()
            .ok_or(BrokerError::ChannelClosed {
                broker_type: BrokerType::Dsf,
            })
    }
}

/// Source backed by PostgreSQL LISTEN/NOTIFY on a single channel
pub struct PgNotificationSource {
    pool: PgPool,
    channel: String,
    buffer_size: usize,
}

impl std::fmt::Debug for PgNotificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgNotificationSource")
            .field("channel", &self.channel)
            .field("buffer_size", &self.buffer_size)
            .finish()
    }
}

impl PgNotificationSource {
    pub fn new(pool: PgPool, channel: impl Into<String>, buffer_size: usize) -> Self {
        Self {
            pool,
            channel: channel.into(),
            buffer_size: buffer_size.max(1),
        }
    }
}

#[async_trait]
impl NotificationSource for PgNotificationSource {
    async fn connect(&self) -> BrokerResult<mpsc::Receiver<String>> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(&self.channel).await?;

        info!(
            channel = %self.channel,
            buffer_size = self.buffer_size,
            "Listening for DSF task notifications"
        );

        let (sender, receiver) = mpsc::channel(self.buffer_size);
        let channel = self.channel.clone();

        tokio::spawn(async move {
            let mut stream = listener.into_stream();

            while let Some(notification) = stream.next().await {
                match notification {
                    Ok(notification) => {
                        debug!(
                            "Received notification from channel: {} ({} bytes)",
                            notification.channel(),
                            notification.payload().len()
                        );
                        if sender.send(notification.payload().to_string()).await.is_err() {
                            warn!("Frame receiver dropped, stopping listener");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Connection error in listener: {}", e);
                        break;
                    }
                }
            }

            info!(channel = %channel, "DSF notification listener stopped");
        });

        Ok(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_connects_once() {
        let (source, sender) = ChannelNotificationSource::new(4);

        let mut receiver = source.connect().await.unwrap();
        sender.send("frame".to_string()).await.unwrap();
        assert_eq!(receiver.recv().await.as_deref(), Some("frame"));

        assert!(matches!(
            source.connect().await,
            Err(BrokerError::ChannelClosed { .. })
        ));
    }
}
