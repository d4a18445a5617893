//! Project routing and the Projects service

use super::ratelimit::RateLimitKey;
use super::mock::lock;
use super::{with_context, Service};
use crate::error::{Error, Result};
use crate::meta::{Key, Version};
use crate::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Decides which project a call for (version, service) is made against.
#[async_trait]
pub trait ProjectRouter: Send + Sync {
    async fn project_id(&self, ctx: &Context, version: Version, service: &str) -> String;
}

/// Routes every call to one project.
#[derive(Debug, Clone)]
pub struct SingleProjectRouter {
    pub id: String,
}

impl SingleProjectRouter {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl ProjectRouter for SingleProjectRouter {
    async fn project_id(&self, _ctx: &Context, _version: Version, _service: &str) -> String {
        self.id.clone()
    }
}

/// Hand-written operations of the Projects service.
#[async_trait]
pub trait ProjectsOps: Send + Sync {
    async fn get_project(&self, ctx: &Context, project_id: &str) -> Result<Value>;
}

/// Projects operations against the stable tier.
pub struct GceProjects {
    service: Arc<Service>,
}

impl GceProjects {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ProjectsOps for GceProjects {
    async fn get_project(&self, ctx: &Context, project_id: &str) -> Result<Value> {
        let rk = RateLimitKey {
            project_id: project_id.to_string(),
            operation: "Get".to_string(),
            version: Version::Ga,
            service: "Projects".to_string(),
        };
        self.service.accept(ctx, &rk).await?;

        let client = self.service.client(Version::Ga);
        let url = format!("{}/projects/{}", client.base_url(), project_id);
        tracing::debug!("GceProjects.get_project({:?})", project_id);
        with_context(ctx, client.get(&url)).await
    }
}

type GetProjectHook = Arc<dyn Fn(&Context, &str) -> Result<Value> + Send + Sync>;

/// In-memory Projects, keyed by a global key on the project id.
#[derive(Default)]
pub struct MockProjects {
    objects: Mutex<HashMap<Key, Value>>,
    get_hook: Mutex<Option<GetProjectHook>>,
}

impl MockProjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a project.
    pub fn insert(&self, project_id: &str, obj: Value) {
        lock(&self.objects).insert(Key::global(project_id), obj);
    }

    pub fn set_get_hook<F>(&self, hook: F)
    where
        F: Fn(&Context, &str) -> Result<Value> + Send + Sync + 'static,
    {
        *lock(&self.get_hook) = Some(Arc::new(hook));
    }
}

#[async_trait]
impl ProjectsOps for MockProjects {
    async fn get_project(&self, ctx: &Context, project_id: &str) -> Result<Value> {
        let hook = lock(&self.get_hook).clone();
        if let Some(hook) = hook {
            return hook(ctx, project_id);
        }

        let key = Key::global(project_id);
        lock(&self.objects)
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("MockProjects {} not found", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_single_project_router() {
        let router = SingleProjectRouter::new("my-project");
        let id = router.project_id(&Context::new(), Version::Alpha, "Addresses").await;
        assert_eq!(id, "my-project");
    }

    #[tokio::test]
    async fn test_mock_projects() {
        let projects = MockProjects::new();
        let ctx = Context::new();
        assert!(projects.get_project(&ctx, "p").await.unwrap_err().is_not_found());

        projects.insert("p", json!({"name": "p"}));
        assert_eq!(projects.get_project(&ctx, "p").await.unwrap()["name"], "p");

        projects.set_get_hook(|_, id| Err(Error::already_exists(id.to_string())));
        assert_eq!(projects.get_project(&ctx, "p").await.unwrap_err().code(), Some(409));
    }
}
