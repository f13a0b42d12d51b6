//! Notification fan-out: turns domain events into per-recipient pushes
//! over the channel hub.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::channel::{ChannelHub, ServerEvent, Subscriber};
use crate::dispatcher::{DomainEvent, EventBus};
use crate::models::domain::{
    PullRequest, PullRequestEvent, PullRequestWithActor, PullRequestWithComment,
};
use crate::repository::SharedRepository;
use crate::webhook::WebhookEvent;

/// Spawns the worker that drains the event bus for the process lifetime.
/// A lagged subscription is logged and skipped, never fatal.
pub fn spawn_fanout(
    bus: &EventBus,
    hub: Arc<ChannelHub>,
    repository: SharedRepository,
) -> JoinHandle<()> {
    let mut events = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => dispatch(event, &hub, &repository).await,
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "notification fan-out lagged behind the dispatcher");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn dispatch(event: DomainEvent, hub: &ChannelHub, repository: &SharedRepository) {
    match event {
        DomainEvent::PullRequest { event, envelope } => {
            notify_pull_request(event, envelope, hub, repository).await;
        }
        DomainEvent::Comment { envelope } => notify_comment(envelope, hub).await,
    }
}

/// Recipient set: the author plus every reviewer, deduplicated. Each
/// recipient gets a fresh personalized snapshot; reviewers additionally get
/// the narrow single-pull-request update.
async fn notify_pull_request(
    event: WebhookEvent,
    envelope: PullRequestWithActor,
    hub: &ChannelHub,
    repository: &SharedRepository,
) {
    let PullRequestWithActor {
        pull_request,
        actor,
    } = envelope;
    let source_event = format!("webhook:{}", event.key());

    let mut recipients: Vec<String> = vec![pull_request.author.identity().to_string()];
    for reviewer in &pull_request.reviewers {
        let identity = reviewer.user.identity().to_string();
        if !recipients.contains(&identity) {
            recipients.push(identity);
        }
    }
    tracing::debug!(
        source_event,
        recipients = recipients.len(),
        "fanning out pull request event"
    );

    for recipient in &recipients {
        let pull_requests = repository.read().await.find_by_user_identity(recipient);
        hub.emit_to_room(
            recipient,
            ServerEvent::PullRequestsUpdated(PullRequestEvent {
                actor: Some(actor.clone()),
                source_event: source_event.clone(),
                context: Some(pull_request.clone()),
                pull_requests,
            }),
        )
        .await;
    }

    for reviewer in &pull_request.reviewers {
        hub.emit_to_room(
            reviewer.user.identity(),
            ServerEvent::PullRequestUpdated(pull_request.clone()),
        )
        .await;
    }
}

/// Comments go to the pull request author only.
async fn notify_comment(envelope: PullRequestWithComment, hub: &ChannelHub) {
    let author = envelope.pull_request.author.identity().to_string();
    hub.emit_to_room(&author, ServerEvent::CommentNew(envelope))
        .await;
}

/// Joins a client to the room named by their identity and immediately
/// pushes the initial snapshot.
pub async fn introduce(
    identity: &str,
    subscriber: Subscriber,
    hub: &ChannelHub,
    repository: &SharedRepository,
) {
    hub.join(identity, subscriber).await;
    let pull_requests = repository.read().await.find_by_user_identity(identity);
    hub.emit_to_room(
        identity,
        ServerEvent::Introduced(PullRequestEvent {
            actor: None,
            source_event: "client:introduce".to_string(),
            context: None,
            pull_requests,
        }),
    )
    .await;
}

/// Client-initiated reminder: pushed to every reviewer who has not
/// approved yet.
pub async fn remind(pull_request: &PullRequest, hub: &ChannelHub) {
    for reviewer in pull_request.unapproved_reviewers() {
        hub.emit_to_room(
            reviewer.user.identity(),
            ServerEvent::Remind(pull_request.clone()),
        )
        .await;
    }
}
