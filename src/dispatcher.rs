use tokio::sync::broadcast;

use crate::models::domain::{PullRequestWithActor, PullRequestWithComment};
use crate::webhook::WebhookEvent;

const CHANNEL_CAPACITY: usize = 64;

/// Domain events republished after a webhook delivery has been applied to
/// the repository.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    PullRequest {
        event: WebhookEvent,
        envelope: PullRequestWithActor,
    },
    Comment {
        envelope: PullRequestWithComment,
    },
}

/// One pub/sub hub per process, decoupling webhook ingestion from
/// notification delivery. Constructed once at startup and handed to the
/// router and the fan-out as an explicit dependency.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publishes to every current subscriber. Publishing with no subscriber
    /// is not an error.
    pub fn emit(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("domain event emitted with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
