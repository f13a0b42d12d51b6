use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::Config;
use crate::models::bitbucket::RawPullRequest;

const BODY_SNIPPET_LEN: usize = 200;

/// The single error kind for all remote interaction. Always carries the
/// target URL; the status code and a bounded body excerpt when a response
/// was received at all.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned {status}: {snippet}")]
    UnexpectedStatus {
        url: String,
        status: u16,
        snippet: String,
    },

    #[error("response from {url} is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Transport { url, .. }
            | FetchError::UnexpectedStatus { url, .. }
            | FetchError::Decode { url, .. } => url,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Minimal Bitbucket REST client issuing authenticated GET requests.
#[derive(Clone, Debug)]
pub struct BitbucketClient {
    base_url: String,
    team: String,
    username: String,
    app_password: SecretString,
    http: reqwest::Client,
}

impl BitbucketClient {
    pub fn new(
        base_url: impl AsRef<str>,
        team: impl AsRef<str>,
        username: impl AsRef<str>,
        app_password: SecretString,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build http client");
        Self {
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            team: team.as_ref().to_string(),
            username: username.as_ref().to_string(),
            app_password,
            http,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.bitbucket_url,
            &config.bitbucket_team,
            &config.bitbucket_username,
            config.bitbucket_app_password.clone(),
        )
    }

    /// First page of the team repository listing.
    pub fn repositories_url(&self) -> String {
        format!("{}/repositories/{}", self.base_url, self.team)
    }

    /// Single choke point for remote-call failure semantics: one
    /// authenticated GET, anything but a 200 with valid JSON is a
    /// `FetchError`.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(self.app_password.expose_secret()))
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
                snippet: snippet(&body),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Fetches an entity through a hypermedia link carried by another
    /// payload (listing stubs, webhook bodies).
    pub async fn fetch_by_link<T: DeserializeOwned>(&self, href: &str) -> Result<T, FetchError> {
        self.fetch_json(href).await
    }

    /// Fetches a single pull request by project coordinates instead of a
    /// link.
    pub async fn fetch_pull_request_by_coordinates(
        &self,
        full_name: &str,
        id: u64,
    ) -> Result<RawPullRequest, FetchError> {
        let url = format!(
            "{}/repositories/{}/pullrequests/{}",
            self.base_url, full_name, id
        );
        self.fetch_json(&url).await
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_LEN).collect()
}
