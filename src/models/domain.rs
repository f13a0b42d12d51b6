use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    /// Unique key, shaped `org/repo`.
    pub full_name: String,
    pub pull_requests_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub display_name: String,
}

impl User {
    /// Stable identity: the uuid when present, else the legacy username.
    /// The mapper guarantees at least one of the two exists.
    pub fn identity(&self) -> &str {
        self.uuid
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or_default()
    }

    /// Identity match against either the uuid or the username.
    pub fn matches(&self, identity: &str) -> bool {
        !identity.is_empty()
            && (self.uuid.as_deref() == Some(identity)
                || self.username.as_deref() == Some(identity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reviewer {
    pub user: User,
    pub approved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PullRequestState {
    Open,
    Merged,
    Declined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Unique within `target_repository`.
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub author: User,
    pub target_repository: Project,
    pub target_branch: String,
    #[serde(default)]
    pub reviewers: Vec<Reviewer>,
    pub state: PullRequestState,
    pub self_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Identity across the whole snapshot: project key plus pull request id.
    pub fn identity(&self) -> (&str, u64) {
        (self.target_repository.full_name.as_str(), self.id)
    }

    pub fn unapproved_reviewers(&self) -> impl Iterator<Item = &Reviewer> {
        self.reviewers.iter().filter(|reviewer| !reviewer.approved)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentContent {
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub markup: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentLinks {
    #[serde(default, rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// Attached to notification payloads only, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub content: CommentContent,
    #[serde(default)]
    pub links: CommentLinks,
}

/// Short-lived envelope bundling a pull request with the webhook actor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestWithActor {
    pub pull_request: PullRequest,
    pub actor: User,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestWithComment {
    pub pull_request: PullRequest,
    pub actor: User,
    pub comment: Comment,
}

/// Per-recipient notification payload: the triggering event, the pull
/// request it concerns and a fresh personalized snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<User>,
    pub source_event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<PullRequest>,
    pub pull_requests: Vec<PullRequest>,
}
