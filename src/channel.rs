//! Room-based push channel: the in-process stand-in for the socket
//! transport. Clients join the room named by their user identity and
//! receive every event emitted to it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};

use crate::models::domain::{PullRequest, PullRequestEvent, PullRequestWithComment};

/// Server→client events, serialized as `{"event": ..., "payload": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "server:introduced")]
    Introduced(PullRequestEvent),
    #[serde(rename = "server:pullrequests:updated")]
    PullRequestsUpdated(PullRequestEvent),
    #[serde(rename = "server:pullrequest:updated")]
    PullRequestUpdated(PullRequest),
    #[serde(rename = "server:remind")]
    Remind(PullRequest),
    #[serde(rename = "server:comment:new")]
    CommentNew(PullRequestWithComment),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Introduced(_) => "server:introduced",
            ServerEvent::PullRequestsUpdated(_) => "server:pullrequests:updated",
            ServerEvent::PullRequestUpdated(_) => "server:pullrequest:updated",
            ServerEvent::Remind(_) => "server:remind",
            ServerEvent::CommentNew(_) => "server:comment:new",
        }
    }
}

/// Client→server events in the same `{event, payload}` shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ClientEvent {
    #[serde(rename = "client:introduce")]
    Introduce(String),
    #[serde(rename = "client:remind")]
    Remind(PullRequest),
}

pub type Subscriber = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug, Default)]
pub struct ChannelHub {
    rooms: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins a client to a room, creating the room on first use.
    pub async fn join(&self, room: &str, subscriber: Subscriber) {
        self.rooms
            .lock()
            .await
            .entry(room.to_string())
            .or_default()
            .push(subscriber);
    }

    /// Emits to every live subscriber of a room. Disconnected subscribers
    /// are pruned on the way; emitting to an unknown room is a no-op.
    pub async fn emit_to_room(&self, room: &str, event: ServerEvent) {
        let mut rooms = self.rooms.lock().await;
        let Some(subscribers) = rooms.get_mut(room) else {
            return;
        };
        subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
        if subscribers.is_empty() {
            rooms.remove(room);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::{Project, PullRequestState, User};

    fn pull_request() -> PullRequest {
        PullRequest {
            id: 1,
            title: "pr".to_string(),
            description: String::new(),
            author: User {
                uuid: None,
                username: Some("jon.snow".to_string()),
                display_name: "Jon".to_string(),
            },
            target_repository: Project {
                name: "winterfell".to_string(),
                full_name: "stark/winterfell".to_string(),
                pull_requests_url: String::new(),
            },
            target_branch: "master".to_string(),
            reviewers: Vec::new(),
            state: PullRequestState::Open,
            self_link: String::new(),
            created_on: None,
            updated_on: None,
        }
    }

    #[tokio::test]
    async fn emits_only_to_the_named_room() {
        let hub = ChannelHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.join("jon.snow", tx1).await;
        hub.join("sam", tx2).await;

        hub.emit_to_room("jon.snow", ServerEvent::Remind(pull_request()))
            .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnected_subscribers_are_pruned() {
        let hub = ChannelHub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.join("jon.snow", tx).await;
        drop(rx);

        hub.emit_to_room("jon.snow", ServerEvent::Remind(pull_request()))
            .await;

        assert!(hub.rooms.lock().await.is_empty());
    }

    #[test]
    fn events_carry_their_wire_name() {
        let event = ServerEvent::Remind(pull_request());
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "server:remind");
        assert_eq!(json["payload"]["id"], 1);
        assert_eq!(event.name(), "server:remind");
    }
}
