use crate::task::ConversationId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Message received from a chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: ConversationId,
    pub text: String,
}

/// Message sent to a chat transport: a reply or a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub conversation_id: ConversationId,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self {
            conversation_id,
            text: text.into(),
        }
    }
}

/// Chat transport contract. New transports only need to implement this trait.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Stable transport identifier (e.g. `stdio`).
    fn id(&self) -> &'static str;

    /// Send a message to a conversation.
    async fn send(&self, message: OutboundMessage) -> anyhow::Result<()>;

    /// Start receiving inbound messages and forwarding them to the runtime.
    /// Returns when the transport reaches end of input.
    async fn run(&self, inbound_tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<()>;
}

/// Where the reminder scheduler hands rendered reminders.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, message: OutboundMessage) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: ChannelAdapter + ?Sized> DeliverySink for T {
    async fn deliver(&self, message: OutboundMessage) -> anyhow::Result<()> {
        self.send(message).await
    }
}
