//! Source generation for the typed wrapper surface.
//!
//! For every catalog entry this renders:
//!
//! - an `#[async_trait]` wrapper trait with insert/get/list/delete (the
//!   mutations are omitted for read-only entries) and every additional
//!   method, with `<Wrap>Ops` as supertrait when the entry has a custom
//!   operations surface. Those traits are hand-written in
//!   [`crate::cloud::project`] and only imported here; the generated module's
//!   owner implements them for `Gce<Wrap>` and `Mock<Wrap>`.
//! - `Gce<Wrap>`, delegating to the runtime [`ComputeService`](crate::cloud::ComputeService)
//! - `Mock<Wrap>`, an in-memory double with one optional hook per operation
//!
//! Every additional method is validated before anything is rendered, so a
//! catalog that does not match the native schemas produces no output.

use crate::meta::{GenerationError, KeyType, Method, ServiceInfo};
use std::fmt::Write;

/// Header comment placed at the top of the generated file.
const FILE_HEADER: &str = "//! Generated by `gcecloud gen`. DO NOT EDIT.";

/// Module holding the hand-written custom operation traits.
const CUSTOM_OPS_MODULE: &str = "gcecloud::cloud::project";

/// A catalog entry together with its validated methods.
struct Entry<'a> {
    info: &'a ServiceInfo,
    methods: Vec<Method>,
}

/// Render the wrapper module for `services`. Output is deterministic and
/// ordered as the catalog is.
pub fn generate(services: &[ServiceInfo]) -> Result<String, GenerationError> {
    let entries = services
        .iter()
        .map(|info| {
            tracing::debug!("validating {} {}", info.version, info.service);
            Ok(Entry {
                info,
                methods: info.methods()?,
            })
        })
        .collect::<Result<Vec<_>, GenerationError>>()?;

    let mut out = String::with_capacity(256 * 1024);
    write_header(&mut out, &entries)?;
    for e in &entries {
        write_interface(&mut out, e)?;
    }
    for e in &entries {
        write_gce(&mut out, e)?;
    }
    for e in &entries {
        write_mock(&mut out, e)?;
    }

    tracing::info!("generated wrappers for {} services", entries.len());
    Ok(out)
}

/// Validate every entry without rendering. Returns the number of additional
/// methods checked.
pub fn check(services: &[ServiceInfo]) -> Result<usize, GenerationError> {
    let mut count = 0;
    for info in services {
        count += info.methods()?.len();
    }
    Ok(count)
}

fn write_header(out: &mut String, entries: &[Entry<'_>]) -> std::fmt::Result {
    let mut ops: Vec<String> = entries
        .iter()
        .filter(|e| e.info.generate_custom_ops())
        .map(|e| e.info.wrap_type_ops())
        .collect();
    ops.sort();
    ops.dedup();

    writeln!(out, "{FILE_HEADER}")?;
    writeln!(out)?;
    writeln!(out, "use async_trait::async_trait;")?;
    writeln!(out, "use gcecloud::cloud::filter::Filter;")?;
    match ops.as_slice() {
        [] => {},
        [one] => writeln!(out, "use {CUSTOM_OPS_MODULE}::{one};")?,
        many => writeln!(out, "use {CUSTOM_OPS_MODULE}::{{{}}};", many.join(", "))?,
    }
    writeln!(out, "use gcecloud::cloud::ComputeService;")?;
    writeln!(out, "use gcecloud::meta;")?;
    writeln!(out, "use gcecloud::{{Context, Error}};")?;
    writeln!(out, "use std::collections::BTreeMap;")?;
    writeln!(out, "use std::sync::{{Arc, Mutex}};")?;
    writeln!(out)?;
    writeln!(out, "use crate::{{alpha, beta, ga}};")?;
    writeln!(out)
}

/// Extra list parameter for scoped services.
fn location_param(key_type: KeyType) -> Option<&'static str> {
    match key_type {
        KeyType::Global => None,
        KeyType::Regional => Some("region"),
        KeyType::Zonal => Some("zone"),
    }
}

fn list_signature(info: &ServiceInfo) -> String {
    let location = location_param(info.key_type)
        .map(|p| format!("{p}: &str, "))
        .unwrap_or_default();
    format!(
        "async fn list(&self, ctx: &Context, {location}fl: &Filter) -> Result<Vec<{}>, Error>",
        info.fq_object_type()
    )
}

/// Signatures of the basic operations, in trait order.
fn basic_signatures(info: &ServiceInfo) -> Vec<String> {
    let obj = info.fq_object_type();
    let mut sigs = vec![
        format!("async fn get(&self, ctx: &Context, key: &meta::Key) -> Result<{obj}, Error>"),
        list_signature(info),
    ];
    if info.generate_mutations() {
        sigs.push(format!(
            "async fn insert(&self, ctx: &Context, key: &meta::Key, obj: &{obj}) -> Result<(), Error>"
        ));
        sigs.push("async fn delete(&self, ctx: &Context, key: &meta::Key) -> Result<(), Error>".to_string());
    }
    sigs
}

fn write_interface(out: &mut String, e: &Entry<'_>) -> std::fmt::Result {
    let info = e.info;
    let wrap = info.wrap_type();

    writeln!(out, "/// {wrap} is an interface that allows for mocking of {}.", info.service)?;
    writeln!(out, "#[async_trait]")?;
    if info.generate_custom_ops() {
        writeln!(out, "pub trait {wrap}: {} {{", info.wrap_type_ops())?;
    } else {
        writeln!(out, "pub trait {wrap}: Send + Sync {{")?;
    }
    for sig in basic_signatures(info) {
        writeln!(out, "    {sig};")?;
    }
    for m in &e.methods {
        writeln!(out, "    {};", m.interface_func())?;
    }
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_gce(out: &mut String, e: &Entry<'_>) -> std::fmt::Result {
    let info = e.info;
    let gce = info.gce_wrap_type();

    writeln!(out, "/// {gce} is a simplifying adapter for the {} {} API.", info.version, info.service)?;
    if info.generate_custom_ops() {
        writeln!(out, "///")?;
        writeln!(out, "/// `{}` must be implemented by hand.", info.wrap_type_ops())?;
    }
    writeln!(out, "pub struct {gce} {{")?;
    writeln!(out, "    pub s: Arc<dyn ComputeService>,")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "#[async_trait]")?;
    writeln!(out, "impl {} for {gce} {{", info.wrap_type())?;

    writeln!(out, "    {} {{", basic_signatures(info)[0])?;
    writeln!(out, "        let v = self.s.get(ctx, key).await?;")?;
    writeln!(out, "        Ok(serde_json::from_value(v)?)")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;

    let location = match location_param(info.key_type) {
        Some(p) => format!("Some({p})"),
        None => "None".to_string(),
    };
    writeln!(out, "    {} {{", list_signature(info))?;
    writeln!(out, "        let items = self.s.list(ctx, {location}, fl).await?;")?;
    writeln!(out, "        let mut all = Vec::with_capacity(items.len());")?;
    writeln!(out, "        for item in items {{")?;
    writeln!(out, "            all.push(serde_json::from_value(item)?);")?;
    writeln!(out, "        }}")?;
    writeln!(out, "        Ok(all)")?;
    writeln!(out, "    }}")?;

    if info.generate_mutations() {
        writeln!(out)?;
        writeln!(out, "    {} {{", basic_signatures(info)[2])?;
        writeln!(out, "        self.s.insert(ctx, key, serde_json::to_value(obj)?).await")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        writeln!(out, "    {} {{", basic_signatures(info)[3])?;
        writeln!(out, "        self.s.delete(ctx, key).await")?;
        writeln!(out, "    }}")?;
    }

    for m in &e.methods {
        let args: Vec<String> = (0..m.native_args().len())
            .map(|i| format!("serde_json::to_value(arg{i})?"))
            .collect();
        writeln!(out)?;
        writeln!(out, "    /// {} is a method on {gce}.", m.name())?;
        writeln!(out, "    {} {{", m.interface_func())?;
        writeln!(
            out,
            "        self.s.call(ctx, {:?}, key, vec![{}]).await",
            m.name(),
            args.join(", ")
        )?;
        writeln!(out, "    }}")?;
    }
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_mock(out: &mut String, e: &Entry<'_>) -> std::fmt::Result {
    let info = e.info;
    let mock = info.mock_wrap_type();
    let obj = info.fq_object_type();

    writeln!(out, "/// {mock} is the mock for {}.", info.service)?;
    writeln!(out, "#[derive(Default)]")?;
    writeln!(out, "pub struct {mock} {{")?;
    writeln!(out, "    pub objects: Mutex<BTreeMap<meta::Key, {obj}>>,")?;
    writeln!(
        out,
        "    pub get_hook: Option<Box<dyn Fn(&{mock}, &Context, &meta::Key) -> Result<{obj}, Error> + Send + Sync>>,"
    )?;
    writeln!(
        out,
        "    pub list_hook: Option<Box<dyn Fn(&{mock}, &Context, &Filter) -> Result<Vec<{obj}>, Error> + Send + Sync>>,"
    )?;
    if info.generate_mutations() {
        writeln!(
            out,
            "    pub insert_hook: Option<Box<dyn Fn(&{mock}, &Context, &meta::Key, &{obj}) -> Result<(), Error> + Send + Sync>>,"
        )?;
        writeln!(
            out,
            "    pub delete_hook: Option<Box<dyn Fn(&{mock}, &Context, &meta::Key) -> Result<(), Error> + Send + Sync>>,"
        )?;
    }
    for m in &e.methods {
        writeln!(out, "    pub {},", m.mock_hook())?;
    }
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "#[async_trait]")?;
    writeln!(out, "impl {} for {mock} {{", info.wrap_type())?;

    writeln!(out, "    {} {{", basic_signatures(info)[0])?;
    writeln!(out, "        if let Some(hook) = &self.get_hook {{")?;
    writeln!(out, "            return hook(self, ctx, key);")?;
    writeln!(out, "        }}")?;
    writeln!(out, "        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());")?;
    writeln!(out, "        objects")?;
    writeln!(out, "            .get(key)")?;
    writeln!(out, "            .cloned()")?;
    writeln!(
        out,
        "            .ok_or_else(|| Error::not_found(format!(\"{mock} {{}} not found\", key)))"
    )?;
    writeln!(out, "    }}")?;
    writeln!(out)?;

    writeln!(out, "    {} {{", list_signature(info))?;
    writeln!(out, "        if let Some(hook) = &self.list_hook {{")?;
    writeln!(out, "            return hook(self, ctx, fl);")?;
    writeln!(out, "        }}")?;
    writeln!(out, "        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());")?;
    writeln!(out, "        let mut objs = Vec::new();")?;
    writeln!(out, "        for (k, obj) in objects.iter() {{")?;
    match location_param(info.key_type) {
        Some(p) => writeln!(out, "            if k.location() != Some({p}) {{")?,
        None => writeln!(out, "            if k.location().is_some() {{")?,
    }
    writeln!(out, "                continue;")?;
    writeln!(out, "            }}")?;
    writeln!(out, "            if !fl.matches(&serde_json::to_value(obj)?) {{")?;
    writeln!(out, "                continue;")?;
    writeln!(out, "            }}")?;
    writeln!(out, "            objs.push(obj.clone());")?;
    writeln!(out, "        }}")?;
    writeln!(out, "        Ok(objs)")?;
    writeln!(out, "    }}")?;

    if info.generate_mutations() {
        writeln!(out)?;
        writeln!(out, "    {} {{", basic_signatures(info)[2])?;
        writeln!(out, "        if let Some(hook) = &self.insert_hook {{")?;
        writeln!(out, "            return hook(self, ctx, key, obj);")?;
        writeln!(out, "        }}")?;
        writeln!(out, "        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());")?;
        writeln!(out, "        if objects.contains_key(key) {{")?;
        writeln!(
            out,
            "            return Err(Error::already_exists(format!(\"{mock} {{}} exists\", key)));"
        )?;
        writeln!(out, "        }}")?;
        writeln!(out, "        objects.insert(key.clone(), obj.clone());")?;
        writeln!(out, "        Ok(())")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        writeln!(out, "    {} {{", basic_signatures(info)[3])?;
        writeln!(out, "        if let Some(hook) = &self.delete_hook {{")?;
        writeln!(out, "            return hook(self, ctx, key);")?;
        writeln!(out, "        }}")?;
        writeln!(out, "        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());")?;
        writeln!(out, "        match objects.remove(key) {{")?;
        writeln!(out, "            Some(_) => Ok(()),")?;
        writeln!(
            out,
            "            None => Err(Error::not_found(format!(\"{mock} {{}} not found\", key))),"
        )?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")?;
    }

    for m in &e.methods {
        writeln!(out)?;
        writeln!(out, "    {} {{", m.interface_func())?;
        writeln!(out, "        if let Some(hook) = &self.{} {{", m.mock_hook_name())?;
        writeln!(out, "            return hook(self, ctx, key{});", m.call_args())?;
        writeln!(out, "        }}")?;
        writeln!(out, "        Ok(())")?;
        writeln!(out, "    }}")?;
    }
    writeln!(out, "}}")?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::all_services;
    use crate::meta::service::parse_catalog;

    #[test]
    fn test_generate_is_deterministic() {
        let services = all_services().unwrap();
        let a = generate(services).unwrap();
        let b = generate(services).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(FILE_HEADER));
    }

    #[test]
    fn test_read_only_omits_mutations() {
        let services = parse_catalog(
            r#"{"services": [{"object": "Zone", "service": "Zones", "key_type": "global",
                "resource": "zones", "options": ["read_only"]}]}"#,
        )
        .unwrap();
        let src = generate(&services).unwrap();
        assert!(src.contains("pub trait Zones: Send + Sync {"));
        assert!(!src.contains("cloud::project"));
        assert!(src.contains("async fn get(&self, ctx: &Context, key: &meta::Key) -> Result<ga::Zone, Error>"));
        assert!(!src.contains("async fn insert"));
        assert!(!src.contains("delete_hook"));
    }

    #[test]
    fn test_custom_ops_supertrait() {
        let services = parse_catalog(
            r#"{"services": [{"object": "Project", "service": "Projects", "key_type": "global",
                "resource": "projects", "options": ["read_only", "custom_ops"]}]}"#,
        )
        .unwrap();
        let src = generate(&services).unwrap();
        assert!(src.contains("use gcecloud::cloud::project::ProjectsOps;\n"));
        assert!(src.contains("pub trait Projects: ProjectsOps {"));
        assert!(!src.contains("trait ProjectsOps"));
        assert!(!src.contains("impl ProjectsOps for"));
    }

    #[test]
    fn test_method_hooks_and_dispatch() {
        let services = parse_catalog(
            r#"{"services": [{"object": "Instance", "service": "Instances", "version": "alpha",
                "key_type": "zonal", "resource": "instances",
                "methods": ["AttachDisk", "UpdateNetworkInterface"]}]}"#,
        )
        .unwrap();
        let src = generate(&services).unwrap();
        assert!(src.contains("pub trait AlphaInstances: Send + Sync {"));
        assert!(src.contains("pub struct GceAlphaInstances {"));
        assert!(src.contains(
            "async fn update_network_interface(&self, ctx: &Context, key: &meta::Key, arg0: String, arg1: &alpha::NetworkInterface) -> Result<(), Error>"
        ));
        assert!(src.contains(
            "pub update_network_interface_hook: Option<Box<dyn Fn(&MockAlphaInstances, &Context, &meta::Key, String, &alpha::NetworkInterface) -> Result<(), Error> + Send + Sync>>,"
        ));
        assert!(src.contains("return hook(self, ctx, key, arg0, arg1);"));
        assert!(src.contains("self.s.call(ctx, \"AttachDisk\", key, vec![serde_json::to_value(arg0)?]).await"));
        assert!(src.contains("async fn list(&self, ctx: &Context, zone: &str, fl: &Filter)"));
    }

    #[test]
    fn test_catalog_order_only_changes_output_order() {
        let services = all_services().unwrap();
        let mut reversed = services.to_vec();
        reversed.reverse();
        let a = generate(services).unwrap();
        let b = generate(&reversed).unwrap();
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_method_aborts() {
        let services = parse_catalog(
            r#"{"services": [
                {"object": "Firewall", "service": "Firewalls", "key_type": "global", "resource": "firewalls"},
                {"object": "UrlMap", "service": "UrlMaps", "key_type": "global", "resource": "urlMaps",
                 "methods": ["Update", "Frobnicate"]}]}"#,
        )
        .unwrap();
        let err = generate(&services).unwrap_err();
        assert_eq!(
            err,
            GenerationError::MissingMethod {
                service: "UrlMaps".to_string(),
                method: "Frobnicate".to_string()
            }
        );
        assert!(check(&services).is_err());
    }

    #[test]
    fn test_check_counts_methods() {
        let services = all_services().unwrap();
        let expected: usize = services.iter().map(|s| s.methods.len()).sum();
        assert_eq!(check(services).unwrap(), expected);
    }
}
