//! Native Schema Registry
//!
//! Static description of each tier's native compute surface, loaded from
//! embedded JSON. Each tier file pins one provider library version and lists
//! the native services, their methods (in declared order) and the call
//! handles those methods return. This stands in for live type introspection:
//! the catalog is checked against these descriptions at generation time.

use super::{GenerationError, Version};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Embedded schema files (compiled into the binary), one per tier.
const SCHEMA_FILES: &[(Version, &str, &str)] = &[
    (
        Version::Ga,
        "compute_v1.json",
        include_str!("../resources/compute_v1.json"),
    ),
    (
        Version::Alpha,
        "compute_alpha.json",
        include_str!("../resources/compute_alpha.json"),
    ),
    (
        Version::Beta,
        "compute_beta.json",
        include_str!("../resources/compute_beta.json"),
    ),
];

/// Reference to a native type: `pointers` levels of indirection over
/// `package.name`. Builtins (`string`, `error`) have no package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeRef {
    #[serde(rename = "type")]
    pub name: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub pointers: usize,
}

impl TypeRef {
    pub fn is_string(&self) -> bool {
        self.pointers == 0 && self.package.is_empty() && self.name == "string"
    }

    pub fn is_error(&self) -> bool {
        self.pointers == 0 && self.package.is_empty() && self.name == "error"
    }

    /// Human readable form used in error messages.
    pub fn describe(&self) -> String {
        let stars = "*".repeat(self.pointers);
        if self.package.is_empty() {
            format!("{}{}", stars, self.name)
        } else {
            format!("{}{}.{}", stars, self.package, self.name)
        }
    }
}

/// Named parameter of a native method.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParamDef {
    pub name: String,
    #[serde(flatten)]
    pub ty: TypeRef,
}

/// A native method. The first parameter is the receiver.
#[derive(Debug, Clone, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub returns: Vec<TypeRef>,
    /// HTTP verb used by the REST transport
    #[serde(default = "default_http_method")]
    pub http_method: String,
    /// Custom verb appended to the resource path (`.../urlMaps/x/setUrlMap`)
    #[serde(default)]
    pub verb: String,
}

fn default_http_method() -> String {
    "POST".to_string()
}

/// Method on a call handle (e.g. the completion method).
#[derive(Debug, Clone, Deserialize)]
pub struct HandleMethodDef {
    pub name: String,
    #[serde(default)]
    pub results: Vec<TypeRef>,
}

/// A call-builder handle type returned by native methods.
#[derive(Debug, Clone, Deserialize)]
pub struct HandleDef {
    pub name: String,
    pub methods: Vec<HandleMethodDef>,
}

impl HandleDef {
    pub fn method(&self, name: &str) -> Option<&HandleMethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NativeServiceDef {
    pub name: String,
    pub methods: Vec<MethodDef>,
}

/// Root structure of resources/compute_*.json
#[derive(Debug, Clone, Deserialize)]
pub struct TierSchema {
    /// Pinned provider library version
    pub library_version: String,
    pub services: Vec<NativeServiceDef>,
    #[serde(default)]
    pub handles: Vec<HandleDef>,
}

impl TierSchema {
    pub fn service(&self, name: &str) -> Option<&NativeServiceDef> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn handle(&self, name: &str) -> Option<&HandleDef> {
        self.handles.iter().find(|h| h.name == name)
    }
}

static SCHEMAS: OnceLock<Result<HashMap<Version, TierSchema>, GenerationError>> = OnceLock::new();

/// Parse a tier schema document.
pub fn parse_schema(file: &str, content: &str) -> Result<TierSchema, GenerationError> {
    serde_json::from_str(content).map_err(|e| GenerationError::Schema {
        file: file.to_string(),
        reason: e.to_string(),
    })
}

fn load_schemas() -> Result<HashMap<Version, TierSchema>, GenerationError> {
    let mut schemas = HashMap::new();
    for (version, file, content) in SCHEMA_FILES {
        let schema = parse_schema(file, content)?;
        tracing::debug!(
            "Loaded {} native schema {} ({} services)",
            version,
            schema.library_version,
            schema.services.len()
        );
        schemas.insert(*version, schema);
    }
    Ok(schemas)
}

/// Get the native schema of a tier (loads from embedded JSON on first access)
pub fn tier_schema(version: Version) -> Result<&'static TierSchema, GenerationError> {
    let schemas = SCHEMAS.get_or_init(load_schemas).as_ref().map_err(Clone::clone)?;
    schemas.get(&version).ok_or_else(|| GenerationError::Schema {
        file: format!("compute_{}.json", version.url_segment()),
        reason: "tier schema missing".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tier_schemas_load() {
        for version in super::super::ALL_VERSIONS {
            let schema = tier_schema(version).unwrap();
            assert!(!schema.services.is_empty(), "{} has services", version);
        }
    }

    #[test]
    fn test_handles_have_completion_method() {
        let schema = tier_schema(Version::Ga).unwrap();
        let handle = schema.handle("UrlMapsUpdateCall").unwrap();
        let done = handle.method("Do").unwrap();
        assert_eq!(done.results.len(), 2);
        assert_eq!(done.results[0].name, crate::meta::method::OPERATION_TYPE);
        assert!(done.results[1].is_error());
    }

    #[test]
    fn test_mutation_handles_return_operations() {
        for version in super::super::ALL_VERSIONS {
            let schema = tier_schema(version).unwrap();
            let mutations = schema
                .handles
                .iter()
                .filter(|h| h.name.ends_with("InsertCall") || h.name.ends_with("DeleteCall"));
            for handle in mutations {
                let done = handle.method("Do").unwrap();
                assert_eq!(
                    done.results[0].name,
                    crate::meta::method::OPERATION_TYPE,
                    "{} {}",
                    version,
                    handle.name
                );
            }
        }
    }

    #[test]
    fn test_tier_packages_normalize() {
        use crate::meta::Arg;
        for version in super::super::ALL_VERSIONS {
            let schema = tier_schema(version).unwrap();
            let refs = schema
                .services
                .iter()
                .flat_map(|s| s.methods.iter())
                .flat_map(|m| m.params.iter().map(|p| &p.ty).chain(m.returns.iter()))
                .filter(|t| t.package.contains("compute"));
            for t in refs {
                let prefix = Arg::from(t).normalized_pkg().unwrap();
                assert_eq!(prefix, format!("{}::", version.as_str()), "{}", t.describe());
                assert!(t.package.contains("google.golang.org/api/compute/"), "{}", t.package);
            }
        }
    }

    #[test]
    fn test_parse_schema_reports_file() {
        let err = parse_schema("broken.json", "{").unwrap_err();
        assert!(matches!(err, GenerationError::Schema { ref file, .. } if file == "broken.json"));
    }

    #[test]
    fn test_type_ref_describe() {
        let t = TypeRef {
            name: "Firewall".to_string(),
            package: "google.golang.org/api/compute/v1".to_string(),
            pointers: 1,
        };
        assert_eq!(t.describe(), "*google.golang.org/api/compute/v1.Firewall");
        assert!(!t.is_string());
    }
}
