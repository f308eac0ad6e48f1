//! Tracker HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::item::{Item, ItemStats};

use super::{Coordinator, CoordinatorConfig, CoordinatorError, CoordinatorIdentity, API_VERSION};

/// Coordinator reached over HTTP at `{url}/{project}/...`.
pub struct HttpCoordinator {
    client: Client,
    config: CoordinatorConfig,
    identity: CoordinatorIdentity,
}

impl HttpCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        identity: CoordinatorIdentity,
    ) -> Result<Self, CoordinatorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(format!("warrior/{}", identity.version))
            .build()
            .map_err(|e| CoordinatorError::ApiError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            identity,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn endpoint(&self, project: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url(), project, path)
    }

    /// Identity fields plus `fields`; `fields` wins on conflicts.
    fn payload(&self, fields: Value) -> Value {
        let mut body = json!({
            "downloader": self.identity.downloader,
            "version": self.identity.version,
            "api_version": API_VERSION,
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut body, fields) {
            base.extend(extra);
        }
        body
    }

    async fn post(&self, url: &str, body: &Value) -> Result<(StatusCode, String), CoordinatorError> {
        debug!(url = %url, "POST to coordinator");
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }
}

fn unexpected(status: StatusCode, body: &str) -> CoordinatorError {
    match status.as_u16() {
        420 | 429 => CoordinatorError::RateLimited,
        _ => CoordinatorError::ApiError(format!(
            "HTTP {}: {}",
            status,
            body.chars().take(100).collect::<String>()
        )),
    }
}

#[async_trait]
impl Coordinator for HttpCoordinator {
    fn name(&self) -> &str {
        "http"
    }

    async fn claim_next(&self, project: &str) -> Result<Option<String>, CoordinatorError> {
        let url = self.endpoint(project, "request");
        let (status, body) = self.post(&url, &self.payload(json!({}))).await?;

        match status {
            StatusCode::OK => {
                let name = body.trim();
                if name.is_empty() {
                    return Err(CoordinatorError::InvalidResponse(
                        "empty item name".to_string(),
                    ));
                }
                Ok(Some(name.to_string()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected(status, &body)),
        }
    }

    async fn upload_target(&self, item: &Item) -> Result<String, CoordinatorError> {
        let url = self.endpoint(item.project(), "upload");
        let (status, body) = self.post(&url, &self.payload(json!({}))).await?;

        if status != StatusCode::OK {
            return Err(unexpected(status, &body));
        }
        let target = body.trim();
        if target.is_empty() {
            return Err(CoordinatorError::InvalidResponse(
                "empty upload target".to_string(),
            ));
        }
        Ok(target.to_string())
    }

    async fn report_done(&self, item: &Item, stats: &ItemStats) -> Result<(), CoordinatorError> {
        let url = self.endpoint(item.project(), "done");
        let mut fields = serde_json::to_value(stats)
            .map_err(|e| CoordinatorError::InvalidResponse(format!("Failed to encode stats: {}", e)))?;
        if let Value::Object(map) = &mut fields {
            map.insert("item".to_string(), Value::String(item.name().to_string()));
        }
        let (status, body) = self.post(&url, &self.payload(fields)).await?;

        if status != StatusCode::OK {
            return Err(unexpected(status, &body));
        }
        if body.trim() != "OK" {
            warn!(item = item.name(), response = %body.trim(), "Unexpected done response");
            return Err(CoordinatorError::InvalidResponse(body.trim().to_string()));
        }
        Ok(())
    }

    fn supports_failure_reports(&self) -> bool {
        self.config.supports_failure_reports
    }

    async fn report_failed(&self, item: &Item, reason: &str) -> Result<(), CoordinatorError> {
        if !self.config.supports_failure_reports {
            return Err(CoordinatorError::Unsupported("failure reports"));
        }
        let url = self.endpoint(item.project(), "failed");
        let fields = json!({ "item": item.name(), "reason": reason });
        let (status, body) = self.post(&url, &self.payload(fields)).await?;

        if status != StatusCode::OK {
            return Err(unexpected(status, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(url: &str) -> HttpCoordinator {
        HttpCoordinator::new(
            CoordinatorConfig::new(url),
            CoordinatorIdentity::new("alice", "20131011.01"),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let c = coordinator("http://tracker.example.org/");
        assert_eq!(
            c.endpoint("bloopertv", "request"),
            "http://tracker.example.org/bloopertv/request"
        );
    }

    #[test]
    fn test_payload_carries_identity() {
        let c = coordinator("http://tracker.example.org");
        let body = c.payload(json!({ "item": "http://blip.tv/a/b.flv" }));
        assert_eq!(body["downloader"], "alice");
        assert_eq!(body["version"], "20131011.01");
        assert_eq!(body["api_version"], "2");
        assert_eq!(body["item"], "http://blip.tv/a/b.flv");
    }

    #[test]
    fn test_rate_limit_statuses() {
        let status = StatusCode::from_u16(420).unwrap();
        assert!(matches!(unexpected(status, ""), CoordinatorError::RateLimited));
        assert!(matches!(
            unexpected(StatusCode::TOO_MANY_REQUESTS, ""),
            CoordinatorError::RateLimited
        ));
        assert!(matches!(
            unexpected(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            CoordinatorError::ApiError(_)
        ));
    }

    #[tokio::test]
    async fn test_failure_report_unsupported_by_default() {
        let c = coordinator("http://127.0.0.1:9");
        let item = Item::claimed("bloopertv", "http://blip.tv/a/b.flv");
        let err = c.report_failed(&item, "boom").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Unsupported(_)));
    }
}
