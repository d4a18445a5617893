//! Resource identities
//!
//! Parses GCE resource locators, either absolute
//! (`https://<host>/compute/<v1|alpha|beta>/projects/<id>/...`) or relative
//! (`projects/<id>/...`), into a comparable [`ResourceId`].

use crate::error::{Error, Result};
use crate::meta::{Key, Scope, Version};
use std::fmt;

/// Collection name of a project-root identity.
pub const PROJECTS: &str = "projects";

/// Structured form of a resource locator.
///
/// `key` is absent only for project-root identities. Region and zone
/// locators without a trailing collection (`.../regions/us-central1`) are
/// identified as a global key on the region or zone name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    project_id: String,
    resource: String,
    key: Option<Key>,
}

impl ResourceId {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Pluralized resource kind, e.g. `addresses`
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    /// Absolute locator on `endpoint` for `version`.
    pub fn self_link(&self, version: Version, endpoint: &str) -> String {
        format!(
            "{}/compute/{}/{}",
            endpoint.trim_end_matches('/'),
            version.url_segment(),
            self
        )
    }
}

/// Canonical relative form; parses back to an equal identity.
impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "projects/{}", self.project_id)?;
        let Some(key) = &self.key else {
            return Ok(());
        };
        match &key.scope {
            Scope::Global if self.resource == "regions" || self.resource == "zones" => {
                write!(f, "/{}/{}", self.resource, key.name)
            },
            Scope::Global => write!(f, "/global/{}/{}", self.resource, key.name),
            Scope::Region(r) => write!(f, "/regions/{}/{}/{}", r, self.resource, key.name),
            Scope::Zone(z) => write!(f, "/zones/{}/{}/{}", z, self.resource, key.name),
        }
    }
}

fn malformed(url: &str, reason: impl Into<String>) -> Error {
    Error::MalformedLocator {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Parse a GCE resource locator.
pub fn parse_resource_url(url: &str) -> Result<ResourceId> {
    let path: Vec<String> = if url.starts_with("https://") || url.starts_with("http://") {
        let parsed = url::Url::parse(url).map_err(|e| malformed(url, e.to_string()))?;
        let segments = parsed
            .path_segments()
            .ok_or_else(|| malformed(url, "URL has no path"))?;
        strip_api_prefix(url, segments.map(str::to_string).collect())?
    } else {
        url.split('/').map(str::to_string).collect()
    };
    parse_path(url, &path)
}

/// Drop `compute/<tier>` ahead of `projects/...`. The tier may be omitted.
fn strip_api_prefix(url: &str, mut segments: Vec<String>) -> Result<Vec<String>> {
    if segments.first().map(String::as_str) != Some("compute") {
        return Err(malformed(url, "expected /compute/ path"));
    }
    segments.remove(0);
    match segments.first().map(String::as_str) {
        Some(PROJECTS) => {},
        Some(tier) if Version::from_url_segment(tier).is_some() => {
            segments.remove(0);
        },
        Some(tier) => return Err(malformed(url, format!("unknown API version {:?}", tier))),
        None => return Err(malformed(url, "missing path after /compute/")),
    }
    Ok(segments)
}

fn parse_path(url: &str, parts: &[String]) -> Result<ResourceId> {
    if parts.iter().any(String::is_empty) {
        return Err(malformed(url, "empty path segment"));
    }
    let parts: Vec<&str> = parts.iter().map(String::as_str).collect();

    let (project_id, rest) = match parts.as_slice() {
        [PROJECTS, project, rest @ ..] => (project.to_string(), rest),
        _ => return Err(malformed(url, "expected projects/<id>")),
    };

    let (resource, key) = match rest {
        [] => (PROJECTS.to_string(), None),
        ["global", resource, name] => (resource.to_string(), Some(Key::global(*name))),
        ["regions", region] => ("regions".to_string(), Some(Key::global(*region))),
        ["zones", zone] => ("zones".to_string(), Some(Key::global(*zone))),
        ["regions", region, resource, name] => {
            (resource.to_string(), Some(Key::regional(*name, *region)))
        },
        ["zones", zone, resource, name] => (resource.to_string(), Some(Key::zonal(*name, *zone))),
        _ => return Err(malformed(url, format!("unrecognized path {:?}", rest.join("/")))),
    };

    Ok(ResourceId {
        project_id,
        resource,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(project: &str, resource: &str, key: Option<Key>) -> ResourceId {
        ResourceId {
            project_id: project.to_string(),
            resource: resource.to_string(),
            key,
        }
    }

    #[test]
    fn test_parse_resource_url() {
        let op = "operation-1513289952196-56054460af5a0-b1dae0c3-9bbf9dbf";
        let cases = vec![
            (
                "https://www.googleapis.com/compute/v1/projects/some-gce-project".to_string(),
                id("some-gce-project", "projects", None),
            ),
            (
                "https://www.googleapis.com/compute/v1/projects/some-gce-project/regions/us-central1".to_string(),
                id("some-gce-project", "regions", Some(Key::global("us-central1"))),
            ),
            (
                "https://www.googleapis.com/compute/v1/projects/some-gce-project/zones/us-central1-b".to_string(),
                id("some-gce-project", "zones", Some(Key::global("us-central1-b"))),
            ),
            (
                format!("https://www.googleapis.com/compute/v1/projects/some-gce-project/global/operations/{op}"),
                id("some-gce-project", "operations", Some(Key::global(op))),
            ),
            (
                "https://www.googleapis.com/compute/alpha/projects/some-gce-project/regions/us-central1/addresses/my-address".to_string(),
                id("some-gce-project", "addresses", Some(Key::regional("my-address", "us-central1"))),
            ),
            (
                "https://www.googleapis.com/compute/v1/projects/some-gce-project/zones/us-central1-c/instances/instance-1".to_string(),
                id("some-gce-project", "instances", Some(Key::zonal("instance-1", "us-central1-c"))),
            ),
            (
                "https://compute.googleapis.com/compute/projects/some-gce-project/zones/us-central1-c/instances/instance-1".to_string(),
                id("some-gce-project", "instances", Some(Key::zonal("instance-1", "us-central1-c"))),
            ),
            ("projects/some-gce-project".to_string(), id("some-gce-project", "projects", None)),
            (
                "projects/some-gce-project/regions/us-central1".to_string(),
                id("some-gce-project", "regions", Some(Key::global("us-central1"))),
            ),
            (
                "projects/some-gce-project/zones/us-central1-b".to_string(),
                id("some-gce-project", "zones", Some(Key::global("us-central1-b"))),
            ),
            (
                format!("projects/some-gce-project/global/operations/{op}"),
                id("some-gce-project", "operations", Some(Key::global(op))),
            ),
            (
                "projects/some-gce-project/regions/us-central1/addresses/my-address".to_string(),
                id("some-gce-project", "addresses", Some(Key::regional("my-address", "us-central1"))),
            ),
            (
                "projects/some-gce-project/zones/us-central1-c/instances/instance-1".to_string(),
                id("some-gce-project", "instances", Some(Key::zonal("instance-1", "us-central1-c"))),
            ),
        ];

        for (input, want) in cases {
            let got = parse_resource_url(&input);
            assert!(got.is_ok(), "parse_resource_url({input:?}) = {got:?}");
            assert_eq!(got.unwrap(), want, "parse_resource_url({input:?})");
        }
    }

    #[test]
    fn test_parse_malformed() {
        for input in [
            "",
            "/",
            "/a",
            "/a/b",
            "/a/b/c",
            "/a/b/c/d",
            "/a/b/c/d/e",
            "/a/b/c/d/e/f",
            "/projects/some-gce-project",
            "projects",
            "projects/",
            "https://www.googleapis.com/compute/v1/projects/some-gce-project/global",
            "https://www.googleapis.com/compute/v1/",
            "https://www.googleapis.com/storage/v1/projects/some-gce-project",
            "projects/some-gce-project/global",
            "projects/some-gce-project/global/foo/bar/baz",
            "projects/some-gce-project/regions",
            "projects/some-gce-project/zones/us-central1-c/res",
            "projects/some-gce-project/zones/us-central1-c/res/name/extra",
            "projects/some-gce-project/networks/default",
            "https://www.googleapis.com/compute/gamma/projects/some-gce-project/global/addresses/name",
        ] {
            let got = parse_resource_url(input);
            assert!(
                matches!(got, Err(Error::MalformedLocator { .. })),
                "parse_resource_url({input:?}) = {got:?}, want MalformedLocator"
            );
        }
    }

    #[test]
    fn test_display_round_trip() {
        for input in [
            "projects/p",
            "projects/p/regions/us-central1",
            "projects/p/zones/us-central1-b",
            "projects/p/global/firewalls/fw-1",
            "projects/p/regions/us-central1/addresses/a",
            "projects/p/zones/us-central1-c/instances/i",
        ] {
            let parsed = parse_resource_url(input).unwrap();
            assert_eq!(parsed.to_string(), input);
            assert_eq!(parse_resource_url(&parsed.to_string()).unwrap(), parsed);
        }
    }

    #[test]
    fn test_self_link() {
        let parsed = parse_resource_url("projects/p/zones/z/instances/i").unwrap();
        let link = parsed.self_link(Version::Beta, "https://compute.googleapis.com/");
        assert_eq!(link, "https://compute.googleapis.com/compute/beta/projects/p/zones/z/instances/i");
        assert_eq!(parse_resource_url(&link).unwrap(), parsed);
    }
}
