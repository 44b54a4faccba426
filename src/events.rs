use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated {
        order_id: Uuid,
        order_number: String,
    },
    OrderUpdated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),
    OrderDeleted(Uuid),

    // Inventory events
    StockReserved {
        product_id: Uuid,
        quantity: i32,
        remaining: i32,
    },
    StockReleased {
        product_id: Uuid,
        quantity: i32,
        remaining: i32,
    },
    StockAdjusted {
        product_id: Uuid,
        delta: i32,
        remaining: i32,
    },
    LowStockDetected {
        product_id: Uuid,
        remaining: i32,
        reorder_point: i32,
    },

    // Catalog events
    ProductCreated(Uuid),
    ProductDeleted(Uuid),
    SupplierCreated(Uuid),

    // User events
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

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel pair.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Background consumer that drains the event channel.
///
/// Downstream delivery (webhooks, queues) is a collaborator concern; this
/// process records the stream so operators can follow what the system did.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::LowStockDetected {
                product_id,
                remaining,
                reorder_point,
            } => {
                warn!(
                    product_id = %product_id,
                    remaining = remaining,
                    reorder_point = reorder_point,
                    "Product fell to or below its reorder point"
                );
            }
            other => {
                info!(event = ?other, "Domain event");
            }
        }
    }
    info!("Event channel closed; processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (sender, mut rx) = channel(4);
        let order_id = Uuid::new_v4();
        sender
            .send(Event::OrderCancelled(order_id))
            .await
            .expect("send");

        match rx.recv().await {
            Some(Event::OrderCancelled(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (sender, rx) = channel(1);
        drop(rx);
        assert!(sender.send(Event::OrderDeleted(Uuid::new_v4())).await.is_err());
    }
}
