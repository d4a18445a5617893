//! Service Catalog - Load service descriptors from JSON
//!
//! Every (object, service, tier) combination this crate supports is listed in
//! `resources/services.json`. Tiers not listed for a service are simply not
//! generated. The order of entries only affects output ordering.

use super::method::Method;
use super::schema::{tier_schema, TierSchema};
use super::{GenerationError, KeyType, Version};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Embedded catalog (compiled into the binary)
const CATALOG_FILE: &str = include_str!("../resources/services.json");

/// Optional behaviours of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceOption {
    /// No insert() or delete() is generated for the wrapper
    ReadOnly,
    /// An empty `xxxOps` trait is generated so hand-written methods can be
    /// attached to the service surface
    CustomOps,
}

/// Catalog entry for a service that code will be generated for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceInfo {
    /// Object kind, e.g. `Address`
    pub object: String,
    /// Service (collection) name, e.g. `GlobalAddresses`
    pub service: String,
    #[serde(default)]
    pub version: Version,
    pub key_type: KeyType,
    /// REST collection segment, e.g. `addresses`
    pub resource: String,
    /// Native service type; defaults to `<service>Service`
    #[serde(default)]
    pub native: Option<String>,
    /// Methods beyond insert/get/list/delete
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub options: Vec<ServiceOption>,
}

impl ServiceInfo {
    /// Tier-qualified field name (`GA`, `Alpha`, `Beta`).
    pub fn version_field(&self) -> &'static str {
        match self.version {
            Version::Ga => "GA",
            Version::Alpha => "Alpha",
            Version::Beta => "Beta",
        }
    }

    /// Name of the wrapper service type.
    pub fn wrap_type(&self) -> String {
        format!("{}{}", self.version.type_prefix(), self.service)
    }

    /// Name of the additional operations type.
    pub fn wrap_type_ops(&self) -> String {
        format!("{}Ops", self.wrap_type())
    }

    /// Name of the concrete mock for this type.
    pub fn mock_wrap_type(&self) -> String {
        format!("Mock{}", self.wrap_type())
    }

    /// Name of the production wrapper type.
    pub fn gce_wrap_type(&self) -> String {
        format!("Gce{}", self.wrap_type())
    }

    /// Accessor name on the cloud surface, e.g. `alpha_addresses`.
    pub fn field(&self) -> String {
        snake_case(&self.wrap_type())
    }

    /// Fully qualified object type, e.g. `alpha::Address`.
    pub fn fq_object_type(&self) -> String {
        format!("{}::{}", self.version, self.object)
    }

    /// Name of the native service type in the tier schema.
    pub fn native_service(&self) -> String {
        self.native
            .clone()
            .unwrap_or_else(|| format!("{}Service", self.service))
    }

    /// True if insert() and delete() are generated.
    pub fn generate_mutations(&self) -> bool {
        !self.options.contains(&ServiceOption::ReadOnly)
    }

    /// True if an `xxxOps` trait is generated for hand-written methods.
    pub fn generate_custom_ops(&self) -> bool {
        self.options.contains(&ServiceOption::CustomOps)
    }

    /// Resolve and validate the additional methods against the tier's
    /// embedded native schema.
    pub fn methods(&self) -> Result<Vec<Method>, GenerationError> {
        self.methods_in(tier_schema(self.version)?)
    }

    /// Resolve and validate the additional methods against `schema`.
    ///
    /// Methods are returned in the native service's declared order. Every
    /// declared name must exist and pass [`Method::sanity_check`].
    pub fn methods_in(&self, schema: &TierSchema) -> Result<Vec<Method>, GenerationError> {
        let native = self.native_service();
        let service = schema
            .service(&native)
            .ok_or_else(|| GenerationError::UnknownNativeService {
                version: self.version,
                service: self.service.clone(),
                native: native.clone(),
            })?;

        let mut pending: BTreeSet<&str> = self.methods.iter().map(String::as_str).collect();
        let mut ret = Vec::new();
        for def in &service.methods {
            if !pending.remove(def.name.as_str()) {
                continue;
            }
            ret.push(Method::new(self, def, schema)?);
        }

        if let Some(missing) = pending.into_iter().next() {
            return Err(GenerationError::MissingMethod {
                service: self.service.clone(),
                method: missing.to_string(),
            });
        }
        Ok(ret)
    }
}

/// Root structure of resources/services.json
#[derive(Debug, Clone, Deserialize)]
struct Catalog {
    services: Vec<ServiceInfo>,
}

static CATALOG: OnceLock<Result<Vec<ServiceInfo>, GenerationError>> = OnceLock::new();

/// Parse a catalog document.
pub fn parse_catalog(content: &str) -> Result<Vec<ServiceInfo>, GenerationError> {
    let catalog: Catalog = serde_json::from_str(content).map_err(|e| GenerationError::Schema {
        file: "services.json".to_string(),
        reason: e.to_string(),
    })?;
    Ok(catalog.services)
}

/// All catalog entries, in declared order (loads on first access)
pub fn all_services() -> Result<&'static [ServiceInfo], GenerationError> {
    CATALOG
        .get_or_init(|| parse_catalog(CATALOG_FILE))
        .as_deref()
        .map_err(Clone::clone)
}

/// Look up a catalog entry by tier and service name
pub fn find_service(version: Version, service: &str) -> Option<&'static ServiceInfo> {
    all_services()
        .ok()?
        .iter()
        .find(|s| s.version == version && s.service == service)
}

/// `AlphaBackendServices` -> `alpha_backend_services`
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
