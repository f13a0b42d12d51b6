//! Routes inbound webhook deliveries: fetch the canonical pull request,
//! apply the repository transition, republish a domain event.

use std::str::FromStr;

use anyhow::{Context, Result};
use futures::future::join_all;

use crate::bitbucket_client::BitbucketClient;
use crate::dispatcher::{DomainEvent, EventBus};
use crate::mapper;
use crate::models::bitbucket::{RawPullRequest, WebhookPayload};
use crate::models::domain::{PullRequest, PullRequestWithActor, PullRequestWithComment};
use crate::repository::SharedRepository;

/// Event keys delivered in the `x-event-key` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    PullRequestCreated,
    PullRequestUpdated,
    PullRequestApproved,
    PullRequestUnapproved,
    PullRequestFulfilled,
    PullRequestRejected,
    CommentCreated,
}

impl WebhookEvent {
    pub fn key(&self) -> &'static str {
        match self {
            WebhookEvent::PullRequestCreated => "pullrequest:created",
            WebhookEvent::PullRequestUpdated => "pullrequest:updated",
            WebhookEvent::PullRequestApproved => "pullrequest:approved",
            WebhookEvent::PullRequestUnapproved => "pullrequest:unapproved",
            WebhookEvent::PullRequestFulfilled => "pullrequest:fulfilled",
            WebhookEvent::PullRequestRejected => "pullrequest:rejected",
            WebhookEvent::CommentCreated => "pullrequest:comment_created",
        }
    }
}

impl FromStr for WebhookEvent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pullrequest:created" => Ok(WebhookEvent::PullRequestCreated),
            "pullrequest:updated" => Ok(WebhookEvent::PullRequestUpdated),
            "pullrequest:approved" => Ok(WebhookEvent::PullRequestApproved),
            "pullrequest:unapproved" => Ok(WebhookEvent::PullRequestUnapproved),
            "pullrequest:fulfilled" => Ok(WebhookEvent::PullRequestFulfilled),
            "pullrequest:rejected" => Ok(WebhookEvent::PullRequestRejected),
            "pullrequest:comment_created" => Ok(WebhookEvent::CommentCreated),
            _ => Err(anyhow::anyhow!("unsupported event key: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandlerKind {
    PullRequest,
    Comment,
}

/// Fixed routing table: each handler declares the event keys it accepts.
/// More than one handler may match a delivery.
const HANDLERS: &[(HandlerKind, &[WebhookEvent])] = &[
    (
        HandlerKind::PullRequest,
        &[
            WebhookEvent::PullRequestCreated,
            WebhookEvent::PullRequestUpdated,
            WebhookEvent::PullRequestApproved,
            WebhookEvent::PullRequestUnapproved,
            WebhookEvent::PullRequestFulfilled,
            WebhookEvent::PullRequestRejected,
        ],
    ),
    (HandlerKind::Comment, &[WebhookEvent::CommentCreated]),
];

pub struct WebhookRouter {
    client: BitbucketClient,
    repository: SharedRepository,
    bus: EventBus,
}

impl WebhookRouter {
    pub fn new(client: BitbucketClient, repository: SharedRepository, bus: EventBus) -> Self {
        Self {
            client,
            repository,
            bus,
        }
    }

    /// Routes one delivery. The body is decoded once; every matching
    /// handler runs concurrently and all are awaited before the first
    /// failure propagates. Unknown event keys are logged and dropped.
    pub async fn handle_payload(&self, event_key: &str, body: &[u8]) -> Result<()> {
        let Ok(event) = event_key.parse::<WebhookEvent>() else {
            tracing::debug!(event_key, "dropping webhook with unsupported event key");
            return Ok(());
        };
        let payload: WebhookPayload =
            serde_json::from_slice(body).context("malformed webhook body")?;

        let matched: Vec<HandlerKind> = HANDLERS
            .iter()
            .filter(|(_, events)| events.contains(&event))
            .map(|(kind, _)| *kind)
            .collect();

        let results = join_all(
            matched
                .into_iter()
                .map(|kind| self.run_handler(kind, event, &payload)),
        )
        .await;
        for result in results {
            result?;
        }
        Ok(())
    }

    async fn run_handler(
        &self,
        kind: HandlerKind,
        event: WebhookEvent,
        payload: &WebhookPayload,
    ) -> Result<()> {
        match kind {
            HandlerKind::PullRequest => self.handle_pull_request(event, payload).await,
            HandlerKind::Comment => self.handle_comment(payload).await,
        }
    }

    /// The payload is only trusted for its self link; the stored state
    /// always comes from a fresh fetch of the canonical entity.
    async fn fetch_referenced(&self, payload: &WebhookPayload) -> Result<PullRequest> {
        let href = payload
            .pull_request
            .links
            .as_ref()
            .and_then(|links| links.self_link.as_ref())
            .map(|link| link.href.as_str())
            .context("webhook payload carries no pull request self link")?;
        let raw: RawPullRequest = self.client.fetch_by_link(href).await?;
        Ok(mapper::map_pull_request(raw)?)
    }

    async fn handle_pull_request(&self, event: WebhookEvent, payload: &WebhookPayload) -> Result<()> {
        let pull_request = self.fetch_referenced(payload).await?;
        let actor = mapper::map_user(payload.actor.clone())?;

        {
            let mut repository = self.repository.write().await;
            match event {
                WebhookEvent::PullRequestCreated => repository.add(pull_request.clone()),
                WebhookEvent::PullRequestUpdated
                | WebhookEvent::PullRequestApproved
                | WebhookEvent::PullRequestUnapproved => repository.update(pull_request.clone()),
                WebhookEvent::PullRequestFulfilled | WebhookEvent::PullRequestRejected => {
                    repository.remove(&pull_request)
                }
                WebhookEvent::CommentCreated => {}
            }
        }

        self.bus.emit(DomainEvent::PullRequest {
            event,
            envelope: PullRequestWithActor {
                pull_request,
                actor,
            },
        });
        Ok(())
    }

    /// Comments never mutate the repository; the envelope is republished
    /// carrying the comment.
    async fn handle_comment(&self, payload: &WebhookPayload) -> Result<()> {
        let comment = payload
            .comment
            .clone()
            .context("comment event payload carries no comment")?;
        let pull_request = self.fetch_referenced(payload).await?;
        let actor = mapper::map_user(payload.actor.clone())?;

        self.bus.emit(DomainEvent::Comment {
            envelope: PullRequestWithComment {
                pull_request,
                actor,
                comment: mapper::map_comment(comment),
            },
        });
        Ok(())
    }
}
