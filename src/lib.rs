pub mod bitbucket_client;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod mapper;
pub mod models;
pub mod notify;
pub mod pagination;
pub mod repository;
pub mod server;
pub mod sync;
pub mod webhook;

pub use bitbucket_client::{BitbucketClient, FetchError};
pub use channel::ChannelHub;
pub use config::Config;
pub use dispatcher::{DomainEvent, EventBus};
pub use mapper::MappingError;
pub use repository::{PullRequestRepository, SharedRepository};
pub use server::AppState;
pub use webhook::{WebhookEvent, WebhookRouter};
