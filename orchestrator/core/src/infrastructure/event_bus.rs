// Event Bus Implementation - Pub/Sub for Deployment Events
//
// Provides in-memory event streaming using tokio broadcast channels.
// Enables real-time event streaming to CLI, SSE endpoints, and observers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::events::DeploymentEvent;

/// Event bus for publishing and subscribing to deployment events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DeploymentEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Capacity determines how many events can be buffered before
    /// dropping old ones.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish a deployment event to all subscribers
    pub fn publish(&self, event: DeploymentEvent) {
        debug!("Publishing event: {:?}", event);
        // send() returns the number of receivers; zero subscribers is fine
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all deployment events
    pub fn subscribe(&self) -> broadcast::Receiver<DeploymentEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::with_default_capacity();
        let mut receiver = bus.subscribe();
        bus.publish(DeploymentEvent::PlanCompleted {
            deployment_id: "dep-1".into(),
            resource_count: 2,
            connection_count: 1,
            completed_at: Utc::now(),
        });
        match receiver.recv().await.unwrap() {
            DeploymentEvent::PlanCompleted { deployment_id, .. } => {
                assert_eq!(deployment_id, "dep-1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
