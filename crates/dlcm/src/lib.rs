//! DLCMv2 cluster synthesis: resolve provider catalogs, allocate the node topology and
//! assemble the `createDlcmV2` request.
//!
//! Everything runs sequentially in [`PROVIDER_ORDER`]. The first failure ends the run and
//! nothing is submitted.

#![forbid(unsafe_code)]

use std::time::Instant;

use daiteap_api::{ApiError, Method, ResourceResolver, Transport};
use daiteap_core::{
    ClusterIntent, ProviderCredential, ProvisioningRequest, ResolvedCapabilities, SynthError, SynthResult,
    DLCMV2_CLUSTER_TYPE, PROVIDER_ORDER,
};
use metrics::counter;
use serde_json::Value;
use tracing::{debug, info};

pub mod allocator;
pub mod assembler;

pub use allocator::{control_plane_nodes_count, distribute, worker_nodes_count, NodeTemplate, ProviderAllocation};
pub use assembler::assemble;

pub const CREATE_ENDPOINT: &str = "/createDlcmV2";

fn resolver_err(e: ApiError) -> SynthError { SynthError::ResolverUnavailable(e.to_string()) }

/// Look up one provider's catalog and pick its node template.
/// The zone is chosen before instance types are listed, since that lookup is zone-scoped.
pub async fn resolve_template(
    resolver: &dyn ResourceResolver,
    credential: &ProviderCredential,
    intent: &ClusterIntent,
    username: &str,
) -> SynthResult<NodeTemplate> {
    let ProviderCredential { provider, credential_id, region } = credential;
    let zones = resolver.list_zones(*provider, credential_id, region).await.map_err(resolver_err)?;
    let zone = zones
        .first()
        .ok_or_else(|| SynthError::NoZonesAvailable { provider: *provider, region: region.clone() })?;
    let instance_types_by_size =
        resolver.list_instance_types(*provider, credential_id, region, zone).await.map_err(resolver_err)?;
    let operating_systems = resolver
        .list_operating_systems(*provider, credential_id, region, DLCMV2_CLUSTER_TYPE, username)
        .await
        .map_err(resolver_err)?;
    let caps = ResolvedCapabilities { zones, instance_types_by_size, operating_systems };
    debug!(provider = %provider, zones = caps.zones.len(), types = caps.instance_types_by_size.len(), os = caps.operating_systems.len(), "dlcm: capabilities resolved");
    NodeTemplate::pick(*provider, region, intent.size, &caps)
}

/// Build the full provisioning request for `intent`. Does not submit anything.
pub async fn synthesize(
    resolver: &dyn ResourceResolver,
    intent: &ClusterIntent,
    username: &str,
) -> SynthResult<ProvisioningRequest> {
    let t0 = Instant::now();
    let workers = intent.size.worker_nodes();
    let control_plane = allocator::control_plane_for(intent.high_availability);
    info!(cluster = %intent.name, size = %intent.size, ha = intent.high_availability, providers = ?intent.selected_providers(), "dlcm: synthesis start");

    let supported = resolver.list_supported_kubernetes_config().await.map_err(resolver_err)?;

    let mut templates = Vec::with_capacity(PROVIDER_ORDER.len());
    for credential in intent.selected() {
        let template = resolve_template(resolver, credential, intent, username).await?;
        templates.push((credential.clone(), template));
    }

    let (allocations, left) = distribute(templates, workers, control_plane);
    let request = assemble(intent, &allocations, &supported)?;
    let total = request.nodes().count();
    counter!("dlcm_nodes_allocated", total as u64);
    info!(nodes = total, unassigned_control_plane = left, took_ms = %t0.elapsed().as_millis(), "dlcm: synthesis ok");
    Ok(request)
}

/// Send a request body (synthesized or pre-built) to the platform.
pub async fn submit(transport: &dyn Transport, body: String) -> SynthResult<Value> {
    let t0 = Instant::now();
    let res = transport
        .submit(Method::Post, CREATE_ENDPOINT, Some(body))
        .await
        .map_err(|e| SynthError::SubmissionFailed(e.to_string()));
    info!(ok = res.is_ok(), took_ms = %t0.elapsed().as_millis(), "dlcm: submitted");
    res
}

/// Synthesize, serialize and submit in one go.
pub async fn create_dlcmv2(
    resolver: &dyn ResourceResolver,
    transport: &dyn Transport,
    intent: &ClusterIntent,
    username: &str,
) -> SynthResult<Value> {
    let request = synthesize(resolver, intent, username).await?;
    let body = serde_json::to_string(&request).map_err(|e| SynthError::SubmissionFailed(e.to_string()))?;
    submit(transport, body).await
}
