//! Request plumbing shared by the peer clients.

use caremanager_core::PeerError;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

#[derive(Clone)]
pub(crate) struct PeerHttp {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl PeerHttp {
    pub(crate) fn new(client: Client, base_url: &str, auth_token: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.map(str::to_string),
        }
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.client.request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Sends `req`, mapping 404 to `NotFound` and every other non-success status to `Status`.
    pub(crate) async fn send(&self, req: RequestBuilder) -> Result<Response, PeerError> {
        let response = req
            .send()
            .await
            .map_err(|e| PeerError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        tracing::debug!(%status, %url, "peer request failed");
        if status == StatusCode::NOT_FOUND {
            Err(PeerError::NotFound(url))
        } else {
            Err(PeerError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, PeerError> {
        self.send(req)
            .await?
            .json::<T>()
            .await
            .map_err(|e| PeerError::Decode(e.to_string()))
    }

    pub(crate) async fn send_empty(&self, req: RequestBuilder) -> Result<(), PeerError> {
        self.send(req).await.map(|_| ())
    }
}
