use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted after state changes commit.
///
/// Consumers are advisory only: order and catalog writes never depend on an
/// event being delivered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PaymentStatusChanged {
        order_id: Uuid,
        new_status: String,
    },
    CatalogReloaded {
        categories: usize,
        products: usize,
        variants: usize,
    },
    ProductCreated(String),
    ProductDeleted(String),
    UserRegistered(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-forget send. Events are advisory, so a full or closed
    /// channel is logged and swallowed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!(error = %e, "failed to send event");
        }
    }
}

/// Builds a bounded event channel.
pub fn event_channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. Runs until every sender
/// is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "processing event");
    }
    info!("event channel closed, consumer shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (sender, mut receiver) = event_channel(8);
        let order_id = Uuid::new_v4();

        sender.send(Event::OrderCreated(order_id)).await.unwrap();
        drop(sender);

        assert_matches!(receiver.recv().await, Some(Event::OrderCreated(id)) if id == order_id);
        assert_matches!(receiver.recv().await, None);
    }
}
