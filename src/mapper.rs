//! Converts raw remote-API payloads into typed domain entities.
//!
//! Pure and stateless. Absent or malformed fields surface as a
//! `MappingError` here, before any business logic sees the entity.

use thiserror::Error;

use crate::models::bitbucket::{RawComment, RawPullRequest, RawRepository, RawUser};
use crate::models::domain::{
    Comment, CommentContent, CommentLinks, Project, PullRequest, PullRequestState, Reviewer, User,
};

const REVIEWER_ROLE: &str = "REVIEWER";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("{entity} payload is missing required field `{field}`")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("user `{display_name}` carries neither uuid nor username")]
    MissingIdentity { display_name: String },

    #[error("unknown pull request state `{0}`")]
    UnknownState(String),
}

fn require<T>(value: Option<T>, entity: &'static str, field: &'static str) -> Result<T, MappingError> {
    value.ok_or(MappingError::MissingField { entity, field })
}

pub fn map_project(raw: RawRepository) -> Result<Project, MappingError> {
    let full_name = require(raw.full_name, "repository", "full_name")?;
    let links = require(raw.links, "repository", "links")?;
    let pull_requests_url = match links.pullrequests {
        Some(link) => link.href,
        // Repository references embedded in other payloads only carry a
        // self link; the pull request collection hangs off it.
        None => {
            let self_link = require(links.self_link, "repository", "links.self")?;
            format!("{}/pullrequests", self_link.href.trim_end_matches('/'))
        }
    };
    let name = match raw.name {
        Some(name) => name,
        None => full_name
            .rsplit('/')
            .next()
            .unwrap_or(full_name.as_str())
            .to_string(),
    };
    Ok(Project {
        name,
        full_name,
        pull_requests_url,
    })
}

pub fn map_user(raw: RawUser) -> Result<User, MappingError> {
    let username = raw.username.or(raw.nickname);
    if raw.uuid.is_none() && username.is_none() {
        return Err(MappingError::MissingIdentity {
            display_name: raw.display_name.unwrap_or_default(),
        });
    }
    Ok(User {
        uuid: raw.uuid,
        username,
        display_name: raw.display_name.unwrap_or_default(),
    })
}

fn map_state(state: &str) -> Result<PullRequestState, MappingError> {
    match state {
        "OPEN" => Ok(PullRequestState::Open),
        "MERGED" => Ok(PullRequestState::Merged),
        "DECLINED" => Ok(PullRequestState::Declined),
        other => Err(MappingError::UnknownState(other.to_string())),
    }
}

/// Maps a fully hydrated pull request. Participants without the REVIEWER
/// role are excluded from the reviewer list.
pub fn map_pull_request(raw: RawPullRequest) -> Result<PullRequest, MappingError> {
    let title = require(raw.title, "pullrequest", "title")?;
    let state = map_state(&require(raw.state, "pullrequest", "state")?)?;
    let author = map_user(require(raw.author, "pullrequest", "author")?)?;

    let destination = require(raw.destination, "pullrequest", "destination")?;
    let target_branch = require(
        destination.branch.and_then(|branch| branch.name),
        "pullrequest",
        "destination.branch.name",
    )?;
    let target_repository = map_project(require(
        destination.repository,
        "pullrequest",
        "destination.repository",
    )?)?;

    let links = require(raw.links, "pullrequest", "links")?;
    let self_link = require(links.self_link, "pullrequest", "links.self")?.href;

    let reviewers = raw
        .participants
        .into_iter()
        .filter(|participant| participant.role.as_deref() == Some(REVIEWER_ROLE))
        .map(|participant| {
            Ok(Reviewer {
                user: map_user(participant.user)?,
                approved: participant.approved,
            })
        })
        .collect::<Result<Vec<_>, MappingError>>()?;

    Ok(PullRequest {
        id: raw.id,
        title,
        description: raw.description.unwrap_or_default(),
        author,
        target_repository,
        target_branch,
        reviewers,
        state,
        self_link,
        created_on: raw.created_on,
        updated_on: raw.updated_on,
    })
}

pub fn map_comment(raw: RawComment) -> Comment {
    let content = raw.content.unwrap_or_default();
    let links = raw.links.unwrap_or_default();
    Comment {
        id: raw.id,
        content: CommentContent {
            raw: content.raw.unwrap_or_default(),
            html: content.html.unwrap_or_default(),
            markup: content.markup.unwrap_or_default(),
        },
        links: CommentLinks {
            self_link: links.self_link.map(|link| link.href),
            html: links.html.map(|link| link.href),
        },
    }
}
