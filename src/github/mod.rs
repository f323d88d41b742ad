//! GitHub REST API access: upstream payload mapping, paginated fetchers and
//! the cached client the HTTP handlers use.

pub mod api_types;
pub mod cached_client;
pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod fetcher;
pub mod listing;
pub mod rate_limit;
pub mod types;

pub use cached_client::CachedGithub;
pub use client::GithubClient;
pub use fetcher::Resource;
