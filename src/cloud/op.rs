//! Long-running operation polling
//!
//! Mutations return an operation record. Whether it has completed is decided
//! by fetching it again from the region, zone or global operations
//! collection it lives in. The logic is written once over [`OperationSource`]
//! and instantiated per tier by the tier's compute client.

use super::with_context;
use crate::error::{Error, Result};
use crate::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status value of a completed operation.
pub const OPERATION_DONE: &str = "DONE";

/// Read-only view over a tier's operation record.
pub trait OperationRecord {
    fn name(&self) -> &str;
    fn status(&self) -> &str;
    /// Region the operation runs in (short name)
    fn region(&self) -> Option<&str>;
    /// Zone the operation runs in (short name)
    fn zone(&self) -> Option<&str>;
}

/// The three operation endpoints of one tier.
#[async_trait]
pub trait OperationSource: Send + Sync {
    type Record: OperationRecord + Send + Sync;

    async fn global_operation(&self, project: &str, name: &str) -> Result<Option<Self::Record>>;

    async fn region_operation(
        &self,
        project: &str,
        region: &str,
        name: &str,
    ) -> Result<Option<Self::Record>>;

    async fn zone_operation(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<Option<Self::Record>>;
}

/// Fetch the current record of `op` from the endpoint it lives in.
///
/// Exactly one of the region, zone or global endpoints is queried, chosen in
/// that order of precedence. Provider errors are returned unchanged.
pub async fn poll<S>(ctx: &Context, source: &S, op: &S::Record, project_id: &str) -> Result<Option<S::Record>>
where
    S: OperationSource + ?Sized,
{
    if let Some(region) = op.region() {
        with_context(ctx, source.region_operation(project_id, region, op.name())).await
    } else if let Some(zone) = op.zone() {
        with_context(ctx, source.zone_operation(project_id, zone, op.name())).await
    } else {
        with_context(ctx, source.global_operation(project_id, op.name())).await
    }
}

/// Query the provider once for the status of `op`. This call can block.
pub async fn is_done<S>(ctx: &Context, source: &S, op: &S::Record, project_id: &str) -> Result<bool>
where
    S: OperationSource + ?Sized,
{
    let fetched = poll(ctx, source, op, project_id).await?;
    Ok(fetched.map(|f| f.status() == OPERATION_DONE).unwrap_or(false))
}

/// GCE operation resource. `region` and `zone` arrive as resource URLs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error_status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error_message: Option<String>,
}

impl Operation {
    /// Failure recorded on a finished operation, as a provider error.
    ///
    /// The provider reports asynchronous failures in `error.errors[]`; the
    /// status code falls back to 500 when the record carries none.
    pub fn failure(&self) -> Option<Error> {
        let error = self.error.as_ref()?;
        let messages: Vec<String> = error
            .get("errors")
            .and_then(|e| e.as_array())
            .map(|errors| {
                errors
                    .iter()
                    .map(|e| {
                        let code = e.get("code").and_then(|c| c.as_str()).unwrap_or("UNKNOWN");
                        let msg = e.get("message").and_then(|m| m.as_str()).unwrap_or("");
                        format!("{}: {}", code, msg)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let message = if messages.is_empty() {
            self.http_error_message
                .clone()
                .unwrap_or_else(|| error.to_string())
        } else {
            messages.join("; ")
        };
        Some(Error::Provider {
            code: self.http_error_status_code.unwrap_or(500),
            message: format!("operation {} failed: {}", self.name, message),
        })
    }
}

/// Last path segment of a resource URL
/// e.g. ".../projects/my-project/zones/us-central1-a" -> "us-central1-a"
fn short_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

impl OperationRecord for Operation {
    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn region(&self) -> Option<&str> {
        self.region.as_deref().filter(|r| !r.is_empty()).map(short_name)
    }

    fn zone(&self) -> Option<&str> {
        self.zone.as_deref().filter(|z| !z.is_empty()).map(short_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    /// Records which endpoint was hit and answers with a fixed status.
    struct FakeSource {
        calls: Mutex<Vec<String>>,
        status: Option<&'static str>,
        fail: bool,
    }

    impl FakeSource {
        fn new(status: Option<&'static str>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                status,
                fail: false,
            }
        }

        fn answer(&self, call: String, name: &str) -> Result<Option<Operation>> {
            self.calls.lock().unwrap().push(call);
            if self.fail {
                return Err(Error::Provider {
                    code: 503,
                    message: "backend unavailable".to_string(),
                });
            }
            Ok(self.status.map(|s| Operation {
                name: name.to_string(),
                status: s.to_string(),
                ..Default::default()
            }))
        }
    }

    #[async_trait]
    impl OperationSource for FakeSource {
        type Record = Operation;

        async fn global_operation(&self, project: &str, name: &str) -> Result<Option<Operation>> {
            self.answer(format!("global/{project}/{name}"), name)
        }

        async fn region_operation(&self, project: &str, region: &str, name: &str) -> Result<Option<Operation>> {
            self.answer(format!("region/{project}/{region}/{name}"), name)
        }

        async fn zone_operation(&self, project: &str, zone: &str, name: &str) -> Result<Option<Operation>> {
            self.answer(format!("zone/{project}/{zone}/{name}"), name)
        }
    }

    fn op(region: Option<&str>, zone: Option<&str>) -> Operation {
        Operation {
            name: "operation-1".to_string(),
            status: "RUNNING".to_string(),
            region: region.map(str::to_string),
            zone: zone.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_zone_operation_polls_zone_endpoint_once() {
        let source = FakeSource::new(Some("DONE"));
        let zone = "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-b";
        let done = is_done(&Context::new(), &source, &op(None, Some(zone)), "p").await.unwrap();
        assert!(done);
        assert_eq!(*source.calls.lock().unwrap(), vec!["zone/p/us-central1-b/operation-1"]);
    }

    #[tokio::test]
    async fn test_region_takes_precedence() {
        let source = FakeSource::new(Some("DONE"));
        is_done(&Context::new(), &source, &op(Some("us-central1"), Some("us-central1-b")), "p")
            .await
            .unwrap();
        assert_eq!(*source.calls.lock().unwrap(), vec!["region/p/us-central1/operation-1"]);
    }

    #[tokio::test]
    async fn test_global_operation() {
        let source = FakeSource::new(Some("DONE"));
        is_done(&Context::new(), &source, &op(None, Some("")), "p").await.unwrap();
        assert_eq!(*source.calls.lock().unwrap(), vec!["global/p/operation-1"]);
    }

    #[tokio::test]
    async fn test_status_must_be_done() {
        for status in ["PENDING", "RUNNING", "done", ""] {
            let source = FakeSource::new(Some(status));
            let done = is_done(&Context::new(), &source, &op(None, None), "p").await.unwrap();
            assert!(!done, "status {status:?}");
        }
    }

    #[tokio::test]
    async fn test_absent_record_is_not_done() {
        let source = FakeSource::new(None);
        assert!(!is_done(&Context::new(), &source, &op(None, None), "p").await.unwrap());
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let mut source = FakeSource::new(Some("DONE"));
        source.fail = true;
        let err = is_done(&Context::new(), &source, &op(Some("r"), None), "p").await.unwrap_err();
        assert_eq!(err.code(), Some(503));
    }

    #[test]
    fn test_failure_reports_operation_errors() {
        let op: Operation = serde_json::from_value(serde_json::json!({
            "name": "operation-9",
            "status": "DONE",
            "httpErrorStatusCode": 409,
            "httpErrorMessage": "CONFLICT",
            "error": {"errors": [{"code": "RESOURCE_ALREADY_EXISTS", "message": "The resource 'fw' already exists"}]}
        }))
        .unwrap();
        let err = op.failure().unwrap();
        assert_eq!(err.code(), Some(409));
        assert!(err.to_string().contains("RESOURCE_ALREADY_EXISTS"), "{err}");
    }

    #[test]
    fn test_failure_defaults_to_server_error() {
        let op = Operation {
            name: "operation-9".to_string(),
            error: Some(serde_json::json!({"errors": []})),
            ..Default::default()
        };
        assert_eq!(op.failure().unwrap().code(), Some(500));
        assert!(Operation::default().failure().is_none());
    }

    #[tokio::test]
    async fn test_poll_returns_fetched_record() {
        let source = FakeSource::new(Some("RUNNING"));
        let fetched = poll(&Context::new(), &source, &op(None, None), "p").await.unwrap();
        assert_eq!(fetched.unwrap().status, "RUNNING");
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let source = FakeSource::new(Some("DONE"));
        let ctx = Context::new();
        ctx.cancel();
        let err = is_done(&ctx, &source, &op(None, None), "p").await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(source.calls.lock().unwrap().is_empty());
    }
}
