mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use reqwest::StatusCode;
use tracing::debug;

use crate::{Error, Result};

/// Fetches `url` and returns the body as text.
///
/// # Errors
///
/// Returns [`Error::Upstream`] when the server answers with anything but 200,
/// and [`Error::Unreachable`] when the request itself fails.
#[tracing::instrument(skip(client))]
pub async fn fetch_text<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<String> {
    let url = reqwest::Url::parse(url)
        .map_err(|e| Error::Unreachable(format!("invalid feed url: {e}")))?;
    let req = reqwest::Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if status != StatusCode::OK {
        return Err(Error::Upstream(status));
    }

    let text = resp.text().await?;
    debug!(bytes = text.len(), "Feed body received");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClient for Canned {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let resp = axum::http::Response::builder()
                .status(self.status)
                .body(self.body)
                .expect("valid response");
            Ok(resp.into())
        }
    }

    #[tokio::test]
    async fn test_fetch_text_returns_body() {
        let client = Canned { status: 200, body: "2,17,59440000,24750000,0,90,123,1,," };
        let text = fetch_text(&client, "http://feed.test/gps.txt").await.unwrap();
        assert_eq!(text, "2,17,59440000,24750000,0,90,123,1,,");
    }

    #[tokio::test]
    async fn test_fetch_text_non_ok_status() {
        let client = Canned { status: 503, body: "down" };
        let err = fetch_text(&client, "http://feed.test/gps.txt").await.unwrap_err();
        assert_eq!(err, Error::Upstream(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_fetch_text_other_success_is_rejected() {
        let client = Canned { status: 204, body: "" };
        let err = fetch_text(&client, "http://feed.test/gps.txt").await.unwrap_err();
        assert_eq!(err, Error::Upstream(StatusCode::NO_CONTENT));
    }

    #[tokio::test]
    async fn test_fetch_text_invalid_url() {
        let client = Canned { status: 200, body: "" };
        let err = fetch_text(&client, "not a url").await.unwrap_err();
        assert!(matches!(err, Error::Unreachable(_)));
    }
}
