use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Standard paginated collection envelope returned by every list endpoint.
///
/// `next` is only present when more than one page exists and carries a `page`
/// query parameter pointing at the second page.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Paginated<T> {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub pagelen: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub values: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRepositoryLinks {
    #[serde(default, rename = "self")]
    pub self_link: Option<Link>,
    #[serde(default)]
    pub pullrequests: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRepository {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub links: Option<RawRepositoryLinks>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawUser {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    // Newer API versions report `nickname` instead of `username`.
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawParticipant {
    #[serde(default)]
    pub role: Option<String>,
    pub user: RawUser,
    #[serde(default)]
    pub approved: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawBranch {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEndpoint {
    #[serde(default)]
    pub branch: Option<RawBranch>,
    #[serde(default)]
    pub repository: Option<RawRepository>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPullRequestLinks {
    #[serde(default, rename = "self")]
    pub self_link: Option<Link>,
    #[serde(default)]
    pub html: Option<Link>,
}

/// Full pull request representation as served by the detail endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPullRequest {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub author: Option<RawUser>,
    #[serde(default)]
    pub destination: Option<RawEndpoint>,
    #[serde(default)]
    pub participants: Vec<RawParticipant>,
    #[serde(default)]
    pub links: Option<RawPullRequestLinks>,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

/// Listing entry. List endpoints are only trusted for their links; the
/// stored entity always comes from a follow-up fetch of `links.self`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPullRequestStub {
    #[serde(default)]
    pub links: Option<RawPullRequestLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCommentContent {
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub markup: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCommentLinks {
    #[serde(default, rename = "self")]
    pub self_link: Option<Link>,
    #[serde(default)]
    pub html: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub id: u64,
    #[serde(default)]
    pub content: Option<RawCommentContent>,
    #[serde(default)]
    pub links: Option<RawCommentLinks>,
}

/// Inbound webhook body, shaped `{pullrequest, actor, comment?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(rename = "pullrequest")]
    pub pull_request: RawPullRequestStub,
    pub actor: RawUser,
    #[serde(default)]
    pub comment: Option<RawComment>,
}
