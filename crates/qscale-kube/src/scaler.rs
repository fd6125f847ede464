//! Deployment replica counts via the scale subresource.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v1::Scale;
use kube::Client;
use kube::api::{Api, Patch, PatchParams};
use serde_json::json;
use tracing::debug;

use qscale_autoscale::{ClientError, OrchestrationClient};

/// Reads and patches `deployments/scale`.
#[derive(Clone)]
pub struct DeploymentScaler {
    client: Client,
}

impl DeploymentScaler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build from the in-cluster service account or the local kubeconfig.
    pub async fn try_default() -> Result<Self, kube::Error> {
        Ok(Self::new(Client::try_default().await?))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl OrchestrationClient for DeploymentScaler {
    async fn replica_count(&self, namespace: &str, workload: &str) -> Result<u32, ClientError> {
        let scale = self
            .deployments(namespace)
            .get_scale(workload)
            .await
            .map_err(|e| map_kube_error(namespace, workload, e))?;
        replicas_from_scale(&scale).ok_or_else(|| {
            ClientError::InvalidResponse(format!("scale of {namespace}/{workload} has no replicas"))
        })
    }

    async fn set_replica_count(
        &self,
        namespace: &str,
        workload: &str,
        count: u32,
    ) -> Result<(), ClientError> {
        let replicas = i32::try_from(count).map_err(|_| {
            ClientError::InvalidResponse(format!("replica count {count} out of range"))
        })?;
        let patch = Patch::Merge(json!({ "spec": { "replicas": replicas } }));

        self.deployments(namespace)
            .patch_scale(workload, &PatchParams::default(), &patch)
            .await
            .map_err(|e| map_kube_error(namespace, workload, e))?;

        debug!(namespace, deployment = workload, replicas, "patched deployment scale");
        Ok(())
    }
}

/// Desired replicas of a scale document, falling back to the observed
/// count when the spec leaves it unset. Negative values read as zero.
pub fn replicas_from_scale(scale: &Scale) -> Option<u32> {
    let desired = scale.spec.as_ref().and_then(|s| s.replicas);
    let observed = scale.status.as_ref().map(|s| s.replicas);
    desired
        .or(observed)
        .map(|n| u32::try_from(n).unwrap_or(0))
}

fn map_kube_error(namespace: &str, workload: &str, err: kube::Error) -> ClientError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => {
            ClientError::NotFound(format!("deployment {namespace}/{workload}"))
        }
        other => ClientError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::autoscaling::v1::{ScaleSpec, ScaleStatus};

    fn scale(desired: Option<i32>, observed: Option<i32>) -> Scale {
        Scale {
            spec: Some(ScaleSpec { replicas: desired }),
            status: observed.map(|replicas| ScaleStatus {
                replicas,
                selector: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn prefers_desired_replicas() {
        assert_eq!(replicas_from_scale(&scale(Some(4), Some(2))), Some(4));
    }

    #[test]
    fn falls_back_to_observed_replicas() {
        assert_eq!(replicas_from_scale(&scale(None, Some(3))), Some(3));
    }

    #[test]
    fn empty_scale_has_no_replicas() {
        assert_eq!(replicas_from_scale(&scale(None, None)), None);
        assert_eq!(replicas_from_scale(&Scale::default()), None);
    }

    #[test]
    fn negative_replicas_read_as_zero() {
        assert_eq!(replicas_from_scale(&scale(Some(-1), None)), Some(0));
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "deployments.apps \"w\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        });
        assert_eq!(
            map_kube_error("ns", "w", err),
            ClientError::NotFound("deployment ns/w".to_string())
        );
    }

    #[test]
    fn other_api_errors_are_transport_errors() {
        let err = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "forbidden".to_string(),
            reason: "Forbidden".to_string(),
            code: 403,
        });
        assert!(matches!(map_kube_error("ns", "w", err), ClientError::Transport(_)));
    }
}
