pub mod bitbucket;
pub mod domain;
