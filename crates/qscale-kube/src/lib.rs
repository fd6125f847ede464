//! qscale-kube — Kubernetes orchestration client.
//!
//! [`DeploymentScaler`] implements [`qscale_autoscale::OrchestrationClient`]
//! through a Deployment's `scale` subresource, so it needs only
//! `get`/`patch` on `deployments/scale` in the target namespaces.

pub mod scaler;

pub use scaler::{DeploymentScaler, replicas_from_scale};
