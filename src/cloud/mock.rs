//! In-memory test doubles
//!
//! A [`MockService`] stores objects per key behind one lock. Each operation
//! first checks for an injected hook; a present hook runs instead of the
//! default behavior and its result is returned as-is.

use super::filter::Filter;
use super::project::{MockProjects, ProjectsOps};
use super::{check_args, check_key, find_method, list_scope, Cloud, ComputeService};
use crate::error::{Error, Result};
use crate::meta::{all_services, Key, Method, ServiceInfo, Version};
use crate::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Lock a mutex, recovering the data if a hook panicked while holding it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub type GetHook = Arc<dyn Fn(&MockService, &Context, &Key) -> Result<Value> + Send + Sync>;
pub type ListHook =
    Arc<dyn Fn(&MockService, &Context, Option<&str>, &Filter) -> Result<Vec<Value>> + Send + Sync>;
pub type InsertHook = Arc<dyn Fn(&MockService, &Context, &Key, &Value) -> Result<()> + Send + Sync>;
pub type DeleteHook = Arc<dyn Fn(&MockService, &Context, &Key) -> Result<()> + Send + Sync>;
/// Hook for an additional method; receives the remaining native arguments.
pub type MethodHook = Arc<dyn Fn(&MockService, &Context, &Key, &[Value]) -> Result<()> + Send + Sync>;

#[derive(Default, Clone)]
struct Hooks {
    get: Option<GetHook>,
    list: Option<ListHook>,
    insert: Option<InsertHook>,
    delete: Option<DeleteHook>,
    /// Keyed by hook name, e.g. `set_url_map_hook`
    methods: HashMap<String, MethodHook>,
}

/// Test double for one catalog entry.
pub struct MockService {
    info: ServiceInfo,
    methods: Vec<Method>,
    objects: Mutex<BTreeMap<Key, Value>>,
    hooks: RwLock<Hooks>,
}

impl MockService {
    pub fn new(info: ServiceInfo) -> Result<Self> {
        let methods = info.methods()?;
        Ok(Self {
            info,
            methods,
            objects: Mutex::new(BTreeMap::new()),
            hooks: RwLock::new(Hooks::default()),
        })
    }

    fn hooks(&self) -> Hooks {
        self.hooks.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn update_hooks(&self, f: impl FnOnce(&mut Hooks)) {
        f(&mut self.hooks.write().unwrap_or_else(|e| e.into_inner()));
    }

    /// Run `f` with the object map locked. Hooks use this to emulate
    /// provider side effects.
    pub fn with_objects<R>(&self, f: impl FnOnce(&mut BTreeMap<Key, Value>) -> R) -> R {
        f(&mut lock(&self.objects))
    }

    /// Store an object without going through insert (no hook, no conflict check).
    pub fn seed(&self, key: Key, obj: Value) {
        lock(&self.objects).insert(key, obj);
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_get_hook<F>(&self, hook: F)
    where
        F: Fn(&MockService, &Context, &Key) -> Result<Value> + Send + Sync + 'static,
    {
        self.update_hooks(|h| h.get = Some(Arc::new(hook)));
    }

    pub fn set_list_hook<F>(&self, hook: F)
    where
        F: Fn(&MockService, &Context, Option<&str>, &Filter) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        self.update_hooks(|h| h.list = Some(Arc::new(hook)));
    }

    pub fn set_insert_hook<F>(&self, hook: F)
    where
        F: Fn(&MockService, &Context, &Key, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.update_hooks(|h| h.insert = Some(Arc::new(hook)));
    }

    pub fn set_delete_hook<F>(&self, hook: F)
    where
        F: Fn(&MockService, &Context, &Key) -> Result<()> + Send + Sync + 'static,
    {
        self.update_hooks(|h| h.delete = Some(Arc::new(hook)));
    }

    /// Inject a hook for an additional method, named by native or Rust name.
    pub fn set_method_hook<F>(&self, method: &str, hook: F) -> Result<()>
    where
        F: Fn(&MockService, &Context, &Key, &[Value]) -> Result<()> + Send + Sync + 'static,
    {
        let name = find_method(&self.info, &self.methods, method)?.mock_hook_name();
        self.update_hooks(|h| {
            h.methods.insert(name, Arc::new(hook));
        });
        Ok(())
    }

    /// Remove every injected hook.
    pub fn clear_hooks(&self) {
        self.update_hooks(|h| *h = Hooks::default());
    }

    fn not_found(&self, key: &Key) -> Error {
        Error::not_found(format!("{} {} not found", self.info.mock_wrap_type(), key))
    }

    fn read_only(&self, method: &str) -> Error {
        Error::UnknownMethod {
            service: self.info.mock_wrap_type(),
            method: format!("{} (read-only service)", method),
        }
    }
}

#[async_trait]
impl ComputeService for MockService {
    fn info(&self) -> &ServiceInfo {
        &self.info
    }

    async fn get(&self, ctx: &Context, key: &Key) -> Result<Value> {
        if let Some(hook) = self.hooks().get {
            return hook(self, ctx, key);
        }
        check_key(&self.info, key)?;

        let obj = lock(&self.objects).get(key).cloned();
        match obj {
            Some(obj) => {
                tracing::debug!("{}.get({}) = {}", self.info.mock_wrap_type(), key, obj);
                Ok(obj)
            },
            None => Err(self.not_found(key)),
        }
    }

    async fn list(&self, ctx: &Context, location: Option<&str>, filter: &Filter) -> Result<Vec<Value>> {
        if let Some(hook) = self.hooks().list {
            return hook(self, ctx, location, filter);
        }
        let scope = list_scope(&self.info, location)?;

        let objs: Vec<Value> = lock(&self.objects)
            .iter()
            .filter(|(k, obj)| k.scope == scope && filter.matches(obj))
            .map(|(_, obj)| obj.clone())
            .collect();
        tracing::debug!("{}.list({:?}) = {} items", self.info.mock_wrap_type(), location, objs.len());
        Ok(objs)
    }

    async fn insert(&self, ctx: &Context, key: &Key, obj: Value) -> Result<()> {
        if !self.info.generate_mutations() {
            return Err(self.read_only("insert"));
        }
        if let Some(hook) = self.hooks().insert {
            return hook(self, ctx, key, &obj);
        }
        check_key(&self.info, key)?;

        let mut objects = lock(&self.objects);
        if objects.contains_key(key) {
            return Err(Error::already_exists(format!(
                "{} {} exists",
                self.info.mock_wrap_type(),
                key
            )));
        }
        objects.insert(key.clone(), obj);
        tracing::debug!("{}.insert({})", self.info.mock_wrap_type(), key);
        Ok(())
    }

    async fn delete(&self, ctx: &Context, key: &Key) -> Result<()> {
        if !self.info.generate_mutations() {
            return Err(self.read_only("delete"));
        }
        if let Some(hook) = self.hooks().delete {
            return hook(self, ctx, key);
        }
        check_key(&self.info, key)?;

        match lock(&self.objects).remove(key) {
            Some(_) => {
                tracing::debug!("{}.delete({})", self.info.mock_wrap_type(), key);
                Ok(())
            },
            None => Err(self.not_found(key)),
        }
    }

    async fn call(&self, ctx: &Context, method: &str, key: &Key, args: Vec<Value>) -> Result<()> {
        let m = find_method(&self.info, &self.methods, method)?;
        check_args(&self.info, m, args.len())?;
        if let Some(hook) = self.hooks().methods.get(&m.mock_hook_name()) {
            return hook(self, ctx, key, &args);
        }
        tracing::debug!("{}.{}({}) default no-op", self.info.mock_wrap_type(), m.fn_name(), key);
        Ok(())
    }
}

/// Test double [`Cloud`]: one [`MockService`] per catalog entry.
pub struct MockCloud {
    services: HashMap<(Version, String), Arc<MockService>>,
    projects: Arc<MockProjects>,
}

impl MockCloud {
    pub fn new() -> Result<Self> {
        let mut services = HashMap::new();
        for info in all_services()? {
            let mock = MockService::new(info.clone())?;
            services.insert((info.version, info.service.clone()), Arc::new(mock));
        }
        Ok(Self {
            services,
            projects: Arc::new(MockProjects::new()),
        })
    }

    /// Concrete mock, for seeding objects and injecting hooks.
    pub fn mock(&self, version: Version, service: &str) -> Option<Arc<MockService>> {
        self.services.get(&(version, service.to_string())).cloned()
    }

    pub fn mock_projects(&self) -> Arc<MockProjects> {
        self.projects.clone()
    }
}

impl Cloud for MockCloud {
    fn service(&self, version: Version, service: &str) -> Result<Arc<dyn ComputeService>> {
        self.mock(version, service)
            .map(|m| m as Arc<dyn ComputeService>)
            .ok_or_else(|| Error::UnknownService {
                version,
                service: service.to_string(),
            })
    }

    fn projects(&self) -> Arc<dyn ProjectsOps> {
        self.projects.clone()
    }
}
