//! Integration tests for the in-memory cloud
//!
//! These tests drive the test doubles through the same `Cloud` surface
//! production code uses and verify they report the provider's error codes.

use gcecloud::cloud::filter::Filter;
use gcecloud::cloud::mock::MockCloud;
use gcecloud::cloud::Cloud;
use gcecloud::meta::{all_services, Key, Version};
use gcecloud::{Context, Error};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Test module for default storage behavior
mod storage_tests {
    use super::*;

    /// Insert then Get returns the inserted object; Delete then Get is NotFound
    #[tokio::test]
    async fn test_round_trip_through_cloud() {
        let cloud = MockCloud::new().unwrap();
        let ctx = Context::new();
        let disks = cloud.service(Version::Alpha, "RegionDisks").unwrap();
        let key = Key::regional("disk-1", "europe-west1");
        let obj = json!({"name": "disk-1", "sizeGb": "10", "replicaZones": ["a", "b"]});

        disks.insert(&ctx, &key, obj.clone()).await.unwrap();
        assert_eq!(disks.get(&ctx, &key).await.unwrap(), obj);

        disks.delete(&ctx, &key).await.unwrap();
        let err = disks.get(&ctx, &key).await.unwrap_err();
        assert!(err.is_not_found());
    }

    /// List after N inserts and M deletes returns N - M objects
    #[tokio::test]
    async fn test_list_after_inserts_and_deletes() {
        let cloud = MockCloud::new().unwrap();
        let ctx = Context::new();
        let routes = cloud.service(Version::Ga, "Routes").unwrap();

        for i in 0..10 {
            let key = Key::global(format!("route-{i}"));
            routes.insert(&ctx, &key, json!({"name": format!("route-{i}")})).await.unwrap();
        }
        for i in (0..10).step_by(3) {
            routes.delete(&ctx, &Key::global(format!("route-{i}"))).await.unwrap();
        }

        let all = routes.list(&ctx, None, &Filter::None).await.unwrap();
        assert_eq!(all.len(), 6);
    }

    /// Tiers are independent: the same key lives separately per tier
    #[tokio::test]
    async fn test_tiers_are_independent() {
        let cloud = MockCloud::new().unwrap();
        let ctx = Context::new();
        let key = Key::regional("addr", "us-central1");

        let ga = cloud.service(Version::Ga, "Addresses").unwrap();
        let beta = cloud.service(Version::Beta, "Addresses").unwrap();
        ga.insert(&ctx, &key, json!({"name": "addr"})).await.unwrap();

        assert!(beta.get(&ctx, &key).await.unwrap_err().is_not_found());
        beta.insert(&ctx, &key, json!({"name": "addr"})).await.unwrap();
    }

    /// Duplicate inserts are reported as conflicts
    #[tokio::test]
    async fn test_duplicate_insert() {
        let cloud = MockCloud::new().unwrap();
        let ctx = Context::new();
        let groups = cloud.service(Version::Ga, "InstanceGroups").unwrap();
        let key = Key::zonal("ig", "us-central1-a");

        groups.insert(&ctx, &key, json!({})).await.unwrap();
        let err = groups.insert(&ctx, &key, json!({})).await.unwrap_err();
        assert_eq!(err.code(), Some(409));
    }

    /// Every catalog entry has a mock with the same descriptor
    #[test]
    fn test_every_entry_is_mocked() {
        let cloud = MockCloud::new().unwrap();
        for info in all_services().unwrap() {
            let mock = cloud.mock(info.version, &info.service).unwrap();
            assert!(mock.is_empty(), "{} starts empty", info.mock_wrap_type());
        }
    }
}

/// Test module for hook overrides
mod hook_tests {
    use super::*;

    /// A list hook replaces the default storage scan
    #[tokio::test]
    async fn test_list_hook_overrides_default() {
        let cloud = MockCloud::new().unwrap();
        let ctx = Context::new();
        let mock = cloud.mock(Version::Ga, "UrlMaps").unwrap();
        mock.seed(Key::global("stored"), json!({"name": "stored"}));

        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        mock.set_list_hook(move |_, _, _, _| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(vec![json!({"name": "from-hook"})])
        });

        let url_maps = cloud.service(Version::Ga, "UrlMaps").unwrap();
        let items = url_maps.list(&ctx, None, &Filter::None).await.unwrap();
        assert_eq!(items, vec![json!({"name": "from-hook"})]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        mock.clear_hooks();
        let items = url_maps.list(&ctx, None, &Filter::None).await.unwrap();
        assert_eq!(items, vec![json!({"name": "stored"})]);
    }

    /// A delete hook error is returned as-is and the object stays stored
    #[tokio::test]
    async fn test_delete_hook_error_propagates() {
        let cloud = MockCloud::new().unwrap();
        let ctx = Context::new();
        let mock = cloud.mock(Version::Alpha, "HealthChecks").unwrap();
        let key = Key::global("hc");
        mock.seed(key.clone(), json!({"name": "hc"}));
        mock.set_delete_hook(|_, _, _| {
            Err(Error::Provider {
                code: 400,
                message: "resource is in use".to_string(),
            })
        });

        let checks = cloud.service(Version::Alpha, "HealthChecks").unwrap();
        let err = checks.delete(&ctx, &key).await.unwrap_err();
        assert_eq!(err.code(), Some(400));
        assert_eq!(mock.len(), 1);
    }

    /// Additional method hooks receive the canonical key and native arguments
    #[tokio::test]
    async fn test_method_hook_receives_arguments() {
        let cloud = MockCloud::new().unwrap();
        let ctx = Context::new();
        let mock = cloud.mock(Version::Alpha, "NetworkEndpointGroups").unwrap();

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        mock.set_method_hook("AttachNetworkEndpoints", move |_, _, key, args| {
            s.lock().unwrap().push((key.clone(), args.to_vec()));
            Ok(())
        })
        .unwrap();

        let negs = cloud.service(Version::Alpha, "NetworkEndpointGroups").unwrap();
        let key = Key::zonal("neg", "us-central1-a");
        let req = json!({"networkEndpoints": [{"ipAddress": "10.0.0.1", "port": 80}]});
        negs.call(&ctx, "attach_network_endpoints", &key, vec![req.clone()])
            .await
            .unwrap();

        // No hook for detach: the default is a no-op
        negs.call(&ctx, "DetachNetworkEndpoints", &key, vec![req.clone()])
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(key, vec![req])]);
    }

    /// Projects are seeded and looked up by project ID
    #[tokio::test]
    async fn test_projects() {
        let cloud = MockCloud::new().unwrap();
        let ctx = Context::new();
        assert!(cloud.projects().get_project(&ctx, "p1").await.unwrap_err().is_not_found());

        cloud.mock_projects().insert("p1", json!({"name": "p1"}));
        let project = cloud.projects().get_project(&ctx, "p1").await.unwrap();
        assert_eq!(project["name"], "p1");
    }
}
