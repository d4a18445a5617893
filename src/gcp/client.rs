//! Compute Client
//!
//! One client per API tier. Combines authentication and HTTP functionality
//! and knows how GCE lays out its REST collections.

use super::auth::AccessTokenSource;
use super::http::GcpHttpClient;
use crate::cloud::op::{Operation, OperationSource};
use crate::error::Result;
use crate::meta::{Scope, Version};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

/// Default compute endpoint
pub const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com";

/// REST client for one tier of the compute API
#[derive(Clone)]
pub struct ComputeClient {
    version: Version,
    endpoint: String,
    http: GcpHttpClient,
    tokens: Arc<dyn AccessTokenSource>,
}

impl ComputeClient {
    pub fn new(
        version: Version,
        endpoint: &str,
        http: GcpHttpClient,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            version,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http,
            tokens,
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    // =========================================================================
    // URL helpers
    // =========================================================================

    /// Root of this tier: `<endpoint>/compute/<v1|alpha|beta>`
    pub fn base_url(&self) -> String {
        format!("{}/compute/{}", self.endpoint, self.version.url_segment())
    }

    /// Build Compute Engine API URL
    pub fn compute_url(&self, project: &str, path: &str) -> String {
        format!("{}/projects/{}/{}", self.base_url(), project, path)
    }

    /// URL of a collection. Regions, zones and projects live directly under
    /// the project; other global collections under `global/`.
    pub fn collection_url(&self, project: &str, resource: &str, scope: &Scope) -> String {
        match scope {
            Scope::Global if resource == "projects" => format!("{}/projects", self.base_url()),
            Scope::Global if resource == "regions" || resource == "zones" => {
                self.compute_url(project, resource)
            },
            Scope::Global => self.compute_url(project, &format!("global/{}", resource)),
            Scope::Region(region) => {
                self.compute_url(project, &format!("regions/{}/{}", region, resource))
            },
            Scope::Zone(zone) => self.compute_url(project, &format!("zones/{}/{}", zone, resource)),
        }
    }

    /// URL of a single resource
    pub fn resource_url(&self, project: &str, resource: &str, scope: &Scope, name: &str) -> String {
        format!("{}/{}", self.collection_url(project, resource, scope), name)
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.tokens.token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.tokens.token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.tokens.token().await?;
        self.http.delete(url, &token).await
    }

    /// Make a request with an arbitrary verb
    pub async fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.tokens.token().await?;
        self.http.request(method, url, &token, body).await
    }

    async fn get_operation(&self, url: &str) -> Result<Option<Operation>> {
        let response = self.get(url).await?;
        if response.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(response)?))
    }
}

#[async_trait]
impl OperationSource for ComputeClient {
    type Record = Operation;

    async fn global_operation(&self, project: &str, name: &str) -> Result<Option<Operation>> {
        let url = self.compute_url(project, &format!("global/operations/{}", name));
        self.get_operation(&url).await
    }

    async fn region_operation(
        &self,
        project: &str,
        region: &str,
        name: &str,
    ) -> Result<Option<Operation>> {
        let url = self.compute_url(project, &format!("regions/{}/operations/{}", region, name));
        self.get_operation(&url).await
    }

    async fn zone_operation(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Option<Operation>> {
        let url = self.compute_url(project, &format!("zones/{}/operations/{}", zone, name));
        self.get_operation(&url).await
    }
}

/// Append query parameters to a URL
pub fn add_query_params(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    if url.contains('?') {
        format!("{}&{}", url, query)
    } else {
        format!("{}?{}", url, query)
    }
}
