use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::domain::{Project, PullRequest, PullRequestState};

/// Shared handle threaded through the sync pipeline, the webhook router and
/// the notification fan-out. Mutations never hold the lock across an await.
pub type SharedRepository = Arc<RwLock<PullRequestRepository>>;

/// Authoritative in-memory snapshot of open pull requests, bucketed by
/// project full name. Invariant: a pull request is stored iff its state is
/// `Open` — `update` evicts anything else.
#[derive(Debug, Default)]
pub struct PullRequestRepository {
    projects: Vec<Project>,
    pull_requests: HashMap<String, Vec<PullRequest>>,
}

impl PullRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Wholesale replace of the known project list.
    pub fn set_projects(&mut self, projects: Vec<Project>) {
        self.projects = projects;
    }

    /// Atomically replaces one project's snapshot.
    pub fn set_pull_requests(&mut self, full_name: &str, pull_requests: Vec<PullRequest>) {
        self.pull_requests
            .insert(full_name.to_string(), pull_requests);
    }

    /// Every stored pull request. Project order is unspecified; order within
    /// a project is preserved.
    pub fn find_all(&self) -> Vec<PullRequest> {
        self.pull_requests.values().flatten().cloned().collect()
    }

    pub fn find_by_author_identity(&self, identity: &str) -> Vec<PullRequest> {
        self.pull_requests
            .values()
            .flatten()
            .filter(|pr| pr.author.matches(identity))
            .cloned()
            .collect()
    }

    pub fn find_by_reviewer_identity(&self, identity: &str) -> Vec<PullRequest> {
        self.pull_requests
            .values()
            .flatten()
            .filter(|pr| pr.reviewers.iter().any(|reviewer| reviewer.user.matches(identity)))
            .cloned()
            .collect()
    }

    /// Union of authored and reviewing, deduplicated by (project, id): a
    /// user who is both author and reviewer of a pull request sees it once.
    pub fn find_by_user_identity(&self, identity: &str) -> Vec<PullRequest> {
        let mut result = self.find_by_author_identity(identity);
        for pull_request in self.find_by_reviewer_identity(identity) {
            if !result
                .iter()
                .any(|known| known.identity() == pull_request.identity())
            {
                result.push(pull_request);
            }
        }
        result
    }

    /// Appends without a duplicate check; callers own deduplication.
    pub fn add(&mut self, pull_request: PullRequest) {
        self.pull_requests
            .entry(pull_request.target_repository.full_name.clone())
            .or_default()
            .push(pull_request);
    }

    /// The single state transition point: Open is stored or replaced in
    /// place, any other state is evicted.
    pub fn update(&mut self, pull_request: PullRequest) {
        if pull_request.state != PullRequestState::Open {
            self.remove(&pull_request);
            return;
        }
        let bucket = self
            .pull_requests
            .entry(pull_request.target_repository.full_name.clone())
            .or_default();
        match bucket.iter_mut().find(|known| known.id == pull_request.id) {
            Some(slot) => *slot = pull_request,
            None => bucket.push(pull_request),
        }
    }

    /// No-op when the pull request is not stored.
    pub fn remove(&mut self, pull_request: &PullRequest) {
        if let Some(bucket) = self
            .pull_requests
            .get_mut(&pull_request.target_repository.full_name)
        {
            bucket.retain(|known| known.id != pull_request.id);
        }
    }
}
