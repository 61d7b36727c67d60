//! Authorized HTTP access shared by all Google services.

use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::error::{GoogleError, GoogleResult};
use crate::session::Session;

#[derive(Clone)]
pub struct GoogleClient {
    http: reqwest::Client,
    session: Arc<Mutex<Session>>,
}

impl GoogleClient {
    pub fn new(session: Session) -> Self {
        GoogleClient {
            http: reqwest::Client::new(),
            session: Arc::new(Mutex::new(session)),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send `request` with a bearer token. A 401 triggers one token refresh
    /// and a retry. Non-2xx responses become [`GoogleError::Status`], except
    /// for the statuses in `accept`.
    pub async fn execute(
        &self,
        service: &'static str,
        request: RequestBuilder,
        accept: &[StatusCode],
    ) -> GoogleResult<Response> {
        let retry = request.try_clone();
        let token = self.session.lock().await.access_token().await?;
        let mut response = request.bearer_auth(token).send().await?;

        // A token without a recorded expiry is only found stale here
        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(retry) = retry {
                debug!(service, "Access token rejected, refreshing once");
                let token = {
                    let mut session = self.session.lock().await;
                    session.refresh().await?;
                    session.access_token().await?
                };
                response = retry.bearer_auth(token).send().await?;
            }
        }

        let status = response.status();
        if status.is_success() || accept.contains(&status) {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(GoogleError::Status {
            service,
            status: status.as_u16(),
            body,
        })
    }

    /// Send and decode a JSON response body.
    pub async fn json<T: DeserializeOwned>(&self, service: &'static str, request: RequestBuilder) -> GoogleResult<T> {
        self.execute(service, request, &[])
            .await?
            .json()
            .await
            .map_err(|e| GoogleError::Decode {
                service,
                message: e.to_string(),
            })
    }
}

/// `base` with `segments` appended as percent-encoded path segments.
pub fn endpoint(base: &str, segments: &[&str]) -> GoogleResult<Url> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_segments() {
        let url = endpoint(
            "https://storage.googleapis.com/storage/v1/",
            &["b", "my-bucket", "o", "dir/events history.json"],
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/my-bucket/o/dir%2Fevents%20history.json"
        );
    }

    #[test]
    fn endpoint_rejects_garbage() {
        assert!(endpoint("not a url", &["x"]).is_err());
    }
}
