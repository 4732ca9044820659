//! REST binding to the load-balancer control plane.
//!
//! One HTTP request per operation; retries and scheduling are owned by the
//! syncer, which treats any failure here as fatal to the affected pair.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tgsync_state::TargetGroupArn;
use tgsync_sync::TargetGroupClient;

/// Default HTTP timeout for control-plane requests.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the control plane's admin REST API.
#[derive(Clone)]
pub struct ControlPlaneClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

// The bearer token must never leak through Debug output.
impl std::fmt::Debug for ControlPlaneClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TargetDescription {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ListTargetsResponse {
    targets: Vec<TargetDescription>,
}

#[derive(Debug, Serialize)]
struct MutateTargetsRequest<'a> {
    targets: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceTag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceTagMapping {
    pub arn: String,
    #[serde(default)]
    pub tags: Vec<ResourceTag>,
}

#[derive(Debug, Deserialize)]
struct ListResourcesResponse {
    resources: Vec<ResourceTagMapping>,
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("unable to build HTTP client")?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            base_url,
            token,
            client,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// All resources carrying the given tag key, with their tag lists.
    pub(crate) async fn resources_by_tag_key(
        &self,
        tag_key: &str,
    ) -> anyhow::Result<Vec<ResourceTagMapping>> {
        let resp = self
            .request(Method::GET, "/v1/resources")
            .query(&[("tag-key", tag_key)])
            .send()
            .await
            .with_context(|| format!("unable to query resources tagged {tag_key}"))?;
        let body: ListResourcesResponse = check(resp)
            .await?
            .json()
            .await
            .context("malformed list-resources response")?;
        Ok(body.resources)
    }
}

/// Surface non-2xx responses as errors carrying status and body.
async fn check(resp: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("control plane returned {status}: {body}")
}

#[async_trait]
impl TargetGroupClient for ControlPlaneClient {
    async fn list_ips(&self, tg: &TargetGroupArn) -> anyhow::Result<Vec<String>> {
        let resp = self
            .request(Method::GET, "/v1/target-groups/targets")
            .query(&[("group", tg.as_str())])
            .send()
            .await
            .with_context(|| format!("unable to list targets of {tg}"))?;
        let body: ListTargetsResponse = check(resp)
            .await?
            .json()
            .await
            .context("malformed list-targets response")?;
        Ok(body.targets.into_iter().map(|t| t.id).collect())
    }

    async fn register(&self, tg: &TargetGroupArn, ips: &[String]) -> anyhow::Result<()> {
        if ips.is_empty() {
            return Ok(());
        }
        let resp = self
            .request(Method::POST, "/v1/target-groups/register")
            .query(&[("group", tg.as_str())])
            .json(&MutateTargetsRequest { targets: ips })
            .send()
            .await
            .with_context(|| format!("unable to register targets with {tg}"))?;
        check(resp).await?;
        Ok(())
    }

    async fn deregister(&self, tg: &TargetGroupArn, ips: &[String]) -> anyhow::Result<()> {
        if ips.is_empty() {
            return Ok(());
        }
        let resp = self
            .request(Method::POST, "/v1/target-groups/deregister")
            .query(&[("group", tg.as_str())])
            .json(&MutateTargetsRequest { targets: ips })
            .send()
            .await
            .with_context(|| format!("unable to deregister targets with {tg}"))?;
        check(resp).await?;
        Ok(())
    }
}
