//! Startup synchronization: builds the authoritative snapshot from the
//! remote API. Every commit is all-or-nothing; a failed page or detail
//! fetch rejects the whole operation with nothing written.

use anyhow::{Context, Result};
use futures::future::try_join_all;

use crate::bitbucket_client::BitbucketClient;
use crate::mapper;
use crate::models::bitbucket::{Paginated, RawPullRequest, RawPullRequestStub, RawRepository};
use crate::models::domain::{Project, PullRequest};
use crate::pagination::remaining_pages;
use crate::repository::SharedRepository;

/// Sequential pipeline: the project list first, then every project's open
/// pull requests.
pub async fn sync_all(client: &BitbucketClient, repository: &SharedRepository) -> Result<()> {
    let projects = fetch_projects(client).await?;
    tracing::info!(projects = projects.len(), "project list synced");
    repository.write().await.set_projects(projects.clone());

    for project in &projects {
        sync_pull_requests_for_project(client, repository, project).await?;
    }
    Ok(())
}

/// Walks every page of the team repository listing and maps the entries.
async fn fetch_projects(client: &BitbucketClient) -> Result<Vec<Project>> {
    let url = client.repositories_url();
    let first: Paginated<RawRepository> = client.fetch_json(&url).await?;

    let pages: Vec<Paginated<RawRepository>> = try_join_all(
        remaining_pages(&first)?
            .iter()
            .map(|page_url| client.fetch_json(page_url.as_str())),
    )
    .await?;

    let mut raw = first.values;
    for page in pages {
        raw.extend(page.values);
    }
    raw.into_iter()
        .map(mapper::map_project)
        .collect::<Result<Vec<_>, _>>()
        .context("mapping repository listing")
}

/// Replaces one project's snapshot with its fully hydrated open pull
/// requests.
pub async fn sync_pull_requests_for_project(
    client: &BitbucketClient,
    repository: &SharedRepository,
    project: &Project,
) -> Result<()> {
    let url = format!("{}?state=OPEN", project.pull_requests_url);
    let first: Paginated<RawPullRequestStub> = client.fetch_json(&url).await?;

    let pages: Vec<Paginated<RawPullRequestStub>> = try_join_all(
        remaining_pages(&first)?
            .iter()
            .map(|page_url| client.fetch_json(page_url.as_str())),
    )
    .await?;

    let mut stubs = first.values;
    for page in pages {
        stubs.extend(page.values);
    }

    let pull_requests: Vec<PullRequest> =
        try_join_all(stubs.iter().map(|stub| hydrate(client, stub))).await?;

    tracing::info!(
        project = %project.full_name,
        open = pull_requests.len(),
        "pull request snapshot replaced"
    );
    repository
        .write()
        .await
        .set_pull_requests(&project.full_name, pull_requests);
    Ok(())
}

/// Listing entries are only trusted for their self link; the stored entity
/// always comes from the detail fetch.
async fn hydrate(client: &BitbucketClient, stub: &RawPullRequestStub) -> Result<PullRequest> {
    let href = stub
        .links
        .as_ref()
        .and_then(|links| links.self_link.as_ref())
        .map(|link| link.href.as_str())
        .context("pull request listing entry carries no self link")?;
    let raw: RawPullRequest = client.fetch_by_link(href).await?;
    Ok(mapper::map_pull_request(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::{PullRequestState, User};
    use crate::repository::PullRequestRepository;
    use secrecy::SecretString;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str) -> BitbucketClient {
        BitbucketClient::new(
            base_url,
            "stark",
            "bot",
            SecretString::from("hunter2".to_string()),
        )
    }

    fn shared() -> SharedRepository {
        Arc::new(RwLock::new(PullRequestRepository::new()))
    }

    fn project(server_uri: &str) -> Project {
        Project {
            name: "winterfell".to_string(),
            full_name: "stark/winterfell".to_string(),
            pull_requests_url: format!("{}/repositories/stark/winterfell/pullrequests", server_uri),
        }
    }

    fn detail_body(server_uri: &str, id: u64) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("pr {}", id),
            "state": "OPEN",
            "author": {"username": "jon.snow", "display_name": "Jon"},
            "destination": {
                "branch": {"name": "master"},
                "repository": {
                    "name": "winterfell",
                    "full_name": "stark/winterfell",
                    "links": {"self": {"href": format!("{}/repositories/stark/winterfell", server_uri)}}
                }
            },
            "links": {"self": {"href": format!("{}/pr/{}", server_uri, id)}}
        })
    }

    fn stub(server_uri: &str, id: u64) -> serde_json::Value {
        json!({"links": {"self": {"href": format!("{}/pr/{}", server_uri, id)}}})
    }

    #[tokio::test]
    async fn snapshot_is_walked_hydrated_and_replaced() {
        let server = MockServer::start().await;
        let uri = server.uri();

        Mock::given(method("GET"))
            .and(path("/repositories/stark/winterfell/pullrequests"))
            .and(query_param("state", "OPEN"))
            .and(query_param_is_missing("page"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "size": 2,
                "pagelen": 1,
                "next": format!("{}/repositories/stark/winterfell/pullrequests?state=OPEN&page=2", uri),
                "values": [stub(&uri, 1)]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/stark/winterfell/pullrequests"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "size": 2,
                "pagelen": 1,
                "values": [stub(&uri, 2)]
            })))
            .mount(&server)
            .await;
        for id in [1, 2] {
            Mock::given(method("GET"))
                .and(path(format!("/pr/{}", id)))
                .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(&uri, id)))
                .mount(&server)
                .await;
        }

        let repository = shared();
        // A stale entry that the snapshot replace must discard.
        repository.write().await.set_pull_requests(
            "stark/winterfell",
            vec![PullRequest {
                id: 99,
                title: "stale".to_string(),
                description: String::new(),
                author: User {
                    uuid: None,
                    username: Some("ghost".to_string()),
                    display_name: "Ghost".to_string(),
                },
                target_repository: project(&uri),
                target_branch: "master".to_string(),
                reviewers: Vec::new(),
                state: PullRequestState::Open,
                self_link: String::new(),
                created_on: None,
                updated_on: None,
            }],
        );

        sync_pull_requests_for_project(&client(&uri), &repository, &project(&uri))
            .await
            .unwrap();

        let stored = repository.read().await.find_all();
        let ids: Vec<u64> = stored.iter().map(|pr| pr.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn failed_detail_fetch_commits_nothing() {
        let server = MockServer::start().await;
        let uri = server.uri();

        Mock::given(method("GET"))
            .and(path("/repositories/stark/winterfell/pullrequests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "size": 2,
                "pagelen": 10,
                "values": [stub(&uri, 1), stub(&uri, 2)]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pr/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(&uri, 1)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pr/2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let repository = shared();
        let result =
            sync_pull_requests_for_project(&client(&uri), &repository, &project(&uri)).await;

        assert!(result.is_err());
        assert!(repository.read().await.find_all().is_empty());
    }

    #[tokio::test]
    async fn sync_all_walks_projects_then_their_pull_requests() {
        let server = MockServer::start().await;
        let uri = server.uri();

        Mock::given(method("GET"))
            .and(path("/repositories/stark"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "size": 1,
                "pagelen": 10,
                "values": [{
                    "name": "winterfell",
                    "full_name": "stark/winterfell",
                    "links": {
                        "self": {"href": format!("{}/repositories/stark/winterfell", uri)},
                        "pullrequests": {"href": format!("{}/repositories/stark/winterfell/pullrequests", uri)}
                    }
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/stark/winterfell/pullrequests"))
            .and(query_param("state", "OPEN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "size": 1,
                "pagelen": 10,
                "values": [stub(&uri, 1)]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pr/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(detail_body(&uri, 1)))
            .mount(&server)
            .await;

        let repository = shared();
        sync_all(&client(&uri), &repository).await.unwrap();

        let repository = repository.read().await;
        assert_eq!(repository.projects().len(), 1);
        assert_eq!(repository.projects()[0].full_name, "stark/winterfell");
        assert_eq!(repository.find_all().len(), 1);
    }

    #[tokio::test]
    async fn failed_project_listing_aborts_the_pipeline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/stark"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let repository = shared();
        let result = sync_all(&client(&server.uri()), &repository).await;

        assert!(result.is_err());
        assert!(repository.read().await.projects().is_empty());
    }
}
