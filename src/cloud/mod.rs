//! Cloud access layer
//!
//! Runtime wrappers over the compute API tiers. Every catalog entry is served
//! by a [`ComputeService`]: [`GceService`] dispatches to the provider, while
//! [`mock::MockService`] keeps objects in memory. Both are built from the same
//! validated catalog entry, so they expose the same methods and error codes.
//!
//! # Example
//!
//! ```ignore
//! use gcecloud::cloud::{Cloud, filter::Filter};
//! use gcecloud::meta::{Key, Version};
//!
//! async fn example(cloud: &dyn Cloud, ctx: &gcecloud::Context) -> gcecloud::Result<()> {
//!     let firewalls = cloud.service(Version::Ga, "Firewalls")?;
//!     let fw = firewalls.get(ctx, &Key::global("allow-ssh")).await?;
//!     let all = firewalls.list(ctx, None, &Filter::None).await?;
//!     Ok(())
//! }
//! ```

pub mod filter;
pub mod mock;
pub mod op;
pub mod project;
pub mod ratelimit;
pub mod resource;

use crate::error::{Error, Result};
use crate::gcp::auth::AccessTokenSource;
use crate::gcp::client::{add_query_params, ComputeClient};
use crate::gcp::http::GcpHttpClient;
use crate::meta::{all_services, GenerationError, Key, KeyType, Method, ReturnShape, Scope, ServiceInfo, Version};
use crate::Context;
use async_trait::async_trait;
use filter::Filter;
use op::{Operation, OPERATION_DONE};
use project::{GceProjects, ProjectRouter, ProjectsOps};
use ratelimit::{RateLimitKey, RateLimiter};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between operation polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Run `fut` unless `ctx` is cancelled first.
pub(crate) async fn with_context<F, T>(ctx: &Context, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}

/// Shared state of the production wrappers: one client per tier plus the
/// project router and rate limiter every dispatch goes through.
pub struct Service {
    ga: ComputeClient,
    alpha: ComputeClient,
    beta: ComputeClient,
    project_router: Arc<dyn ProjectRouter>,
    rate_limiter: Arc<dyn RateLimiter>,
    poll_interval: Duration,
}

impl Service {
    pub fn new(
        endpoint: &str,
        http: GcpHttpClient,
        tokens: Arc<dyn AccessTokenSource>,
        project_router: Arc<dyn ProjectRouter>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let client = |v| ComputeClient::new(v, endpoint, http.clone(), tokens.clone());
        Self {
            ga: client(Version::Ga),
            alpha: client(Version::Alpha),
            beta: client(Version::Beta),
            project_router,
            rate_limiter,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Client for one tier
    pub fn client(&self, version: Version) -> &ComputeClient {
        match version {
            Version::Ga => &self.ga,
            Version::Alpha => &self.alpha,
            Version::Beta => &self.beta,
        }
    }

    pub async fn project_id(&self, ctx: &Context, version: Version, service: &str) -> String {
        self.project_router.project_id(ctx, version, service).await
    }

    /// Pass the rate limiter. Called exactly once per dispatch.
    pub async fn accept(&self, ctx: &Context, key: &RateLimitKey) -> Result<()> {
        tracing::debug!(
            "rate limit accept: {} {}.{} project={}",
            key.version,
            key.service,
            key.operation,
            key.project_id
        );
        with_context(ctx, self.rate_limiter.accept(ctx, key)).await
    }

    /// Ask the provider once whether `op` has completed.
    pub async fn is_done(
        &self,
        ctx: &Context,
        version: Version,
        op: &Operation,
        project_id: &str,
    ) -> Result<bool> {
        op::is_done(ctx, self.client(version), op, project_id).await
    }

    /// Poll `op` until it is done, sleeping the poll interval between polls.
    /// A finished operation that carries an error fails with that error.
    pub async fn wait_for_completion(
        &self,
        ctx: &Context,
        version: Version,
        op: &Operation,
        project_id: &str,
    ) -> Result<()> {
        if op.status == OPERATION_DONE {
            return finished(op);
        }
        loop {
            let fetched = op::poll(ctx, self.client(version), op, project_id).await?;
            if let Some(current) = fetched.filter(|f| f.status == OPERATION_DONE) {
                tracing::debug!("operation {} done", op.name);
                return finished(&current);
            }
            tokio::select! {
                _ = ctx.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

fn finished(op: &Operation) -> Result<()> {
    match op.failure() {
        Some(err) => {
            tracing::warn!("operation {} failed: {}", op.name, err);
            Err(err)
        }
        None => Ok(()),
    }
}

/// Uniform surface of one catalog entry.
#[async_trait]
pub trait ComputeService: Send + Sync {
    /// Catalog entry this service serves
    fn info(&self) -> &ServiceInfo;

    async fn get(&self, ctx: &Context, key: &Key) -> Result<Value>;

    /// List objects. `location` is the region or zone for scoped services
    /// and must be `None` for global ones.
    async fn list(&self, ctx: &Context, location: Option<&str>, filter: &Filter) -> Result<Vec<Value>>;

    async fn insert(&self, ctx: &Context, key: &Key, obj: Value) -> Result<()>;

    async fn delete(&self, ctx: &Context, key: &Key) -> Result<()>;

    /// Invoke an additional method by native (`SetUrlMap`) or Rust
    /// (`set_url_map`) name with its remaining native arguments.
    async fn call(&self, ctx: &Context, method: &str, key: &Key, args: Vec<Value>) -> Result<()>;
}

/// Access to every service in the catalog.
pub trait Cloud: Send + Sync {
    fn service(&self, version: Version, service: &str) -> Result<Arc<dyn ComputeService>>;

    fn projects(&self) -> Arc<dyn ProjectsOps>;
}

/// Fails with `InvalidKey` unless `key` is usable with `info`.
pub(crate) fn check_key(info: &ServiceInfo, key: &Key) -> Result<()> {
    if key.valid() && key.key_type() == info.key_type {
        return Ok(());
    }
    Err(Error::InvalidKey {
        key: key.to_string(),
        service: info.wrap_type(),
    })
}

/// Scope of a list call on `info`.
pub(crate) fn list_scope(info: &ServiceInfo, location: Option<&str>) -> Result<Scope> {
    let scope = match (info.key_type, location) {
        (KeyType::Global, None) => Some(Scope::Global),
        (KeyType::Regional, Some(r)) if !r.is_empty() => Some(Scope::Region(r.to_string())),
        (KeyType::Zonal, Some(z)) if !z.is_empty() => Some(Scope::Zone(z.to_string())),
        _ => None,
    };
    scope.ok_or_else(|| Error::InvalidKey {
        key: format!("location {:?}", location),
        service: info.wrap_type(),
    })
}

/// Find an additional method by native or Rust name.
pub(crate) fn find_method<'a>(info: &ServiceInfo, methods: &'a [Method], name: &str) -> Result<&'a Method> {
    let method = methods
        .iter()
        .find(|m| m.name() == name || m.fn_name() == name)
        .ok_or_else(|| Error::UnknownMethod {
            service: info.wrap_type(),
            method: name.to_string(),
        })?;
    Ok(method)
}

/// Fails with `InvalidArguments` unless `got` matches the method's arity.
pub(crate) fn check_args(info: &ServiceInfo, method: &Method, got: usize) -> Result<()> {
    let expected = method.native_args().len();
    if got != expected {
        return Err(Error::InvalidArguments {
            service: info.wrap_type(),
            method: method.name().to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

/// Production wrapper for one catalog entry.
pub struct GceService {
    service: Arc<Service>,
    info: ServiceInfo,
    methods: Vec<Method>,
}

/// One page of a list call
struct Page {
    items: Vec<Value>,
    next_token: Option<String>,
}

impl GceService {
    /// Build the wrapper; fails if any declared method does not validate.
    pub fn new(service: Arc<Service>, info: ServiceInfo) -> Result<Self> {
        let methods = info.methods()?;
        Ok(Self {
            service,
            info,
            methods,
        })
    }

    fn client(&self) -> &ComputeClient {
        self.service.client(self.info.version)
    }

    /// Resolve the project and pass the rate limiter for `operation`.
    async fn prepare(&self, ctx: &Context, operation: &str) -> Result<String> {
        let project_id = self
            .service
            .project_id(ctx, self.info.version, &self.info.service)
            .await;
        let rk = RateLimitKey {
            project_id: project_id.clone(),
            operation: operation.to_string(),
            version: self.info.version,
            service: self.info.service.clone(),
        };
        self.service.accept(ctx, &rk).await?;
        Ok(project_id)
    }

    fn resource_url(&self, project_id: &str, key: &Key) -> String {
        self.client()
            .resource_url(project_id, &self.info.resource, &key.scope, &key.name)
    }

    fn read_only(&self, method: &str) -> Error {
        Error::UnknownMethod {
            service: self.info.wrap_type(),
            method: format!("{} (read-only service)", method),
        }
    }

    /// Wait for the operation in `response` to complete.
    async fn wait(&self, ctx: &Context, project_id: &str, response: Value) -> Result<()> {
        let op: Operation = serde_json::from_value(response)?;
        self.service
            .wait_for_completion(ctx, self.info.version, &op, project_id)
            .await
    }

    async fn fetch_page(
        &self,
        ctx: &Context,
        url: &str,
        filter: &Filter,
        page_token: Option<&str>,
    ) -> Result<Page> {
        let mut params = Vec::new();
        if let Some(query) = filter.to_query() {
            params.push(("filter".to_string(), query));
        }
        if let Some(token) = page_token {
            params.push(("pageToken".to_string(), token.to_string()));
        }

        let response = with_context(ctx, self.client().get(&add_query_params(url, &params))).await?;

        let items = response
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let next_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        Ok(Page { items, next_token })
    }
}

#[async_trait]
impl ComputeService for GceService {
    fn info(&self) -> &ServiceInfo {
        &self.info
    }

    async fn get(&self, ctx: &Context, key: &Key) -> Result<Value> {
        tracing::debug!("{}.get({})", self.info.gce_wrap_type(), key);
        check_key(&self.info, key)?;
        let project_id = self.prepare(ctx, "Get").await?;
        let url = self.resource_url(&project_id, key);
        with_context(ctx, self.client().get(&url)).await
    }

    async fn list(&self, ctx: &Context, location: Option<&str>, filter: &Filter) -> Result<Vec<Value>> {
        tracing::debug!("{}.list({:?}, {:?})", self.info.gce_wrap_type(), location, filter);
        let scope = list_scope(&self.info, location)?;
        let project_id = self.prepare(ctx, "List").await?;
        let url = self
            .client()
            .collection_url(&project_id, &self.info.resource, &scope);

        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.fetch_page(ctx, &url, filter, page_token.as_deref()).await?;
            all_items.extend(page.items);

            if page.next_token.is_none() {
                break;
            }
            page_token = page.next_token;
        }

        tracing::debug!("{}.list: {} items", self.info.gce_wrap_type(), all_items.len());
        Ok(all_items)
    }

    async fn insert(&self, ctx: &Context, key: &Key, mut obj: Value) -> Result<()> {
        if !self.info.generate_mutations() {
            return Err(self.read_only("insert"));
        }
        check_key(&self.info, key)?;
        let project_id = self.prepare(ctx, "Insert").await?;

        if let Value::Object(map) = &mut obj {
            map.insert("name".to_string(), Value::String(key.name.clone()));
        }
        let url = self
            .client()
            .collection_url(&project_id, &self.info.resource, &key.scope);
        let url = add_query_params(&url, &[("requestId".to_string(), uuid::Uuid::new_v4().to_string())]);

        tracing::info!("{}.insert({})", self.info.gce_wrap_type(), key);
        let response = with_context(ctx, self.client().post(&url, Some(&obj))).await?;
        self.wait(ctx, &project_id, response).await
    }

    async fn delete(&self, ctx: &Context, key: &Key) -> Result<()> {
        if !self.info.generate_mutations() {
            return Err(self.read_only("delete"));
        }
        check_key(&self.info, key)?;
        let project_id = self.prepare(ctx, "Delete").await?;
        let url = self.resource_url(&project_id, key);

        tracing::info!("{}.delete({})", self.info.gce_wrap_type(), key);
        let response = with_context(ctx, self.client().delete(&url)).await?;
        self.wait(ctx, &project_id, response).await
    }

    async fn call(&self, ctx: &Context, method: &str, key: &Key, args: Vec<Value>) -> Result<()> {
        let m = find_method(&self.info, &self.methods, method)?;
        check_args(&self.info, m, args.len())?;
        check_key(&self.info, key)?;
        let project_id = self.prepare(ctx, m.name()).await?;

        let mut url = self.resource_url(&project_id, key);
        if !m.verb.is_empty() {
            url = format!("{}/{}", url, m.verb);
        }
        let mut body = None;
        let mut params = Vec::new();
        for (native, value) in m.native_args().iter().zip(args) {
            if native.is_body() {
                debug_assert!(body.is_none(), "validated methods carry at most one body");
                body = Some(value);
            } else {
                let v = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                params.push((native.name.clone(), v));
            }
        }
        let url = add_query_params(&url, &params);
        let http_method = reqwest::Method::from_bytes(m.http_method.as_bytes()).map_err(|_| {
            GenerationError::Dispatch {
                service: self.info.service.clone(),
                method: m.name().to_string(),
                reason: format!("unsupported HTTP method {:?}", m.http_method),
            }
        })?;

        tracing::info!("{}.{}({})", self.info.gce_wrap_type(), m.fn_name(), key);
        let response = with_context(ctx, self.client().request(http_method, &url, body.as_ref())).await?;
        match m.return_shape {
            ReturnShape::Operation => self.wait(ctx, &project_id, response).await,
            ReturnShape::Error => Ok(()),
        }
    }
}

/// Production [`Cloud`]: one [`GceService`] per catalog entry.
pub struct GceCloud {
    service: Arc<Service>,
    services: HashMap<(Version, String), Arc<dyn ComputeService>>,
}

impl GceCloud {
    /// Build wrappers for the whole catalog. Fails if the catalog does not
    /// validate against the native schemas.
    pub fn new(service: Service) -> Result<Self> {
        let service = Arc::new(service);
        let mut services: HashMap<(Version, String), Arc<dyn ComputeService>> = HashMap::new();
        for info in all_services()? {
            let wrapper = GceService::new(service.clone(), info.clone())?;
            services.insert((info.version, info.service.clone()), Arc::new(wrapper));
        }
        tracing::info!("GceCloud ready with {} services", services.len());
        Ok(Self { service, services })
    }

    pub fn inner(&self) -> &Arc<Service> {
        &self.service
    }
}

impl Cloud for GceCloud {
    fn service(&self, version: Version, service: &str) -> Result<Arc<dyn ComputeService>> {
        self.services
            .get(&(version, service.to_string()))
            .cloned()
            .ok_or_else(|| Error::UnknownService {
                version,
                service: service.to_string(),
            })
    }

    fn projects(&self) -> Arc<dyn ProjectsOps> {
        Arc::new(GceProjects::new(self.service.clone()))
    }
}
