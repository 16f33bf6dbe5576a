use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// Answers "is anyone signed in right now?". Errors must collapse to `false`.
pub trait SessionCheck: Send + Sync + 'static {
    fn has_session(&self) -> impl Future<Output = bool> + Send;
}

/// GETs the auth session endpoint. A session exists iff the call succeeds
/// and the JSON body carries a non-null `user`.
#[derive(Clone)]
pub struct HttpSessionCheck {
    client: Client,
    endpoint: String,
}

impl HttpSessionCheck {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn fetch_session(&self) -> Result<bool> {
        let response = self.client.get(&self.endpoint).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("session endpoint returned {}", response.status()));
        }
        let body: Value = response.json().await?;
        Ok(session_present(&body))
    }
}

impl SessionCheck for HttpSessionCheck {
    async fn has_session(&self) -> bool {
        match self.fetch_session().await {
            Ok(present) => present,
            Err(e) => {
                debug!("Session check failed: {}", e);
                false
            }
        }
    }
}

pub(crate) fn session_present(body: &Value) -> bool {
    body.get("user").map(|u| !u.is_null()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transport::tests::{direct_client, serve_once};
    use serde_json::json;

    #[test]
    fn user_field_decides_session() {
        assert!(session_present(&json!({ "user": { "id": 4 } })));
        assert!(!session_present(&json!({ "user": null })));
        assert!(!session_present(&json!({})));
    }

    fn check(url: String) -> HttpSessionCheck {
        HttpSessionCheck::with_client(direct_client(), url)
    }

    #[tokio::test]
    async fn signed_in_user_is_a_session() {
        let url = serve_once("200 OK", r#"{"user":{"id":1}}"#).await;
        assert!(check(url).has_session().await);
    }

    #[tokio::test]
    async fn null_user_is_no_session() {
        let url = serve_once("200 OK", r#"{"user":null}"#).await;
        assert!(!check(url).has_session().await);
    }

    #[tokio::test]
    async fn unauthorized_is_no_session() {
        let url = serve_once("401 Unauthorized", r#"{"user":{"id":1}}"#).await;
        assert!(!check(url).has_session().await);
    }

    #[tokio::test]
    async fn unparseable_body_is_no_session() {
        let url = serve_once("200 OK", "<html>").await;
        assert!(!check(url).has_session().await);
    }
}
