//! Topology allocation: size/HA intent to per-provider node lists.
//!
//! Control-plane slots form one budget shared by every selected provider. Providers
//! are walked in [`PROVIDER_ORDER`](daiteap_core::PROVIDER_ORDER); each one's list is sized from whatever budget is
//! left when its turn comes, and its leading nodes drain that budget. With HA and two
//! providers this gives the first provider all three control-plane nodes and the
//! second provider a worker-only list.
//!
//! NOTE: because list length depends on the remaining budget, later providers get
//! shorter lists purely from their position. The platform currently expects exactly
//! this shape, so it is kept as-is.

use daiteap_core::{NodeSpec, ProviderCredential, ProviderName, ResolvedCapabilities, Size, SynthError, SynthResult};

pub fn worker_nodes_count(size: &str) -> SynthResult<u32> {
    Ok(size.parse::<Size>()?.worker_nodes())
}

pub fn control_plane_nodes_count(high_availability: &str) -> SynthResult<u32> {
    Ok(control_plane_for(daiteap_core::parse_high_availability(high_availability)?))
}

/// Replicated control plane under HA, single node otherwise.
pub fn control_plane_for(high_availability: bool) -> u32 {
    if high_availability { 3 } else { 1 }
}

/// Values every node of one provider shares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTemplate {
    pub zone: String,
    pub instance_type: String,
    pub operating_system: String,
}

impl NodeTemplate {
    /// First zone, the size's instance type and the first OS from the catalog.
    pub fn pick(provider: ProviderName, region: &str, size: Size, caps: &ResolvedCapabilities) -> SynthResult<Self> {
        let zone = caps
            .zones
            .first()
            .cloned()
            .ok_or_else(|| SynthError::NoZonesAvailable { provider, region: region.to_string() })?;
        let instance_type = caps.instance_types_by_size.get(size.as_str()).cloned().ok_or_else(|| {
            SynthError::UnsupportedSizeForProvider { provider, region: region.to_string(), size: size.to_string() }
        })?;
        let operating_system = caps
            .operating_systems
            .first()
            .cloned()
            .ok_or_else(|| SynthError::NoOperatingSystemAvailable { provider, region: region.to_string() })?;
        Ok(Self { zone, instance_type, operating_system })
    }

    fn node(&self, is_control_plane: bool) -> NodeSpec {
        NodeSpec {
            is_control_plane,
            zone: self.zone.clone(),
            instance_type: self.instance_type.clone(),
            operating_system: self.operating_system.clone(),
        }
    }
}

/// One provider's share of the topology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAllocation {
    pub credential: ProviderCredential,
    pub nodes: Vec<NodeSpec>,
}

impl ProviderAllocation {
    pub fn provider(&self) -> ProviderName { self.credential.provider }

    pub fn control_plane_count(&self) -> usize { self.nodes.iter().filter(|n| n.is_control_plane).count() }
}

/// Build one provider's list of `workers + remaining` nodes and return it with the
/// budget left afterwards.
pub fn allocate_provider(template: &NodeTemplate, workers: u32, remaining: u32) -> (Vec<NodeSpec>, u32) {
    let len = workers + remaining;
    let mut left = remaining;
    let nodes = (0..len)
        .map(|_| {
            let cp = left > 0;
            if cp {
                left -= 1;
            }
            template.node(cp)
        })
        .collect();
    (nodes, left)
}

/// Fold the control-plane budget over providers in the given order.
/// `providers` must already be in allocation order.
pub fn distribute(
    providers: Vec<(ProviderCredential, NodeTemplate)>,
    workers: u32,
    control_plane: u32,
) -> (Vec<ProviderAllocation>, u32) {
    providers.into_iter().fold((Vec::new(), control_plane), |(mut out, remaining), (credential, template)| {
        let (nodes, rest) = allocate_provider(&template, workers, remaining);
        tracing::debug!(provider = %credential.provider, nodes = nodes.len(), control_plane = remaining - rest, remaining = rest, "allocated");
        out.push(ProviderAllocation { credential, nodes });
        (out, rest)
    })
}
