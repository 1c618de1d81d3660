use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes outbound requests; implemented by [`super::BasicClient`] and by
/// test doubles that serve canned feeds.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
