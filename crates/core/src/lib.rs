//! Daiteap core types: cluster intent, node topology and the DLCMv2 request document.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

mod error;

pub use error::{SynthError, SynthResult};

/// Cluster type code the platform uses for DLCMv2 environments.
pub const DLCMV2_CLUSTER_TYPE: u32 = 7;
pub const INTERNAL_DNS_ZONE: &str = "daiteap.internal";
pub const SERVICE_ADDRESSES: &str = "10.233.0.0/18";
pub const PODS_SUBNET: &str = "10.233.64.0/18";

/// Cloud providers that can take part in a DLCMv2 cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Google,
    Aws,
    Azure,
}

/// Allocation order. Providers earlier in this list absorb control-plane nodes first.
pub const PROVIDER_ORDER: [ProviderName; 3] = [ProviderName::Google, ProviderName::Aws, ProviderName::Azure];

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Google => "google",
            ProviderName::Aws => "aws",
            ProviderName::Azure => "azure",
        }
    }

    /// VPC range the platform expects for this provider's network.
    pub fn vpc_cidr(&self) -> &'static str {
        match self {
            ProviderName::Google => "10.30.0.0/16",
            ProviderName::Aws => "10.10.0.0/16",
            ProviderName::Azure => "10.20.0.0/16",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Coarse sizing tier. Doubles as the key into provider instance-type catalogs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Size {
    S,
    M,
    L,
    XL,
}

impl Size {
    pub fn as_str(&self) -> &'static str {
        match self {
            Size::S => "S",
            Size::M => "M",
            Size::L => "L",
            Size::XL => "XL",
        }
    }

    pub fn worker_nodes(&self) -> u32 {
        match self {
            Size::S => 1,
            Size::M => 2,
            Size::L => 3,
            Size::XL => 4,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Size {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "S" => Ok(Size::S),
            "M" => Ok(Size::M),
            "L" => Ok(Size::L),
            "XL" => Ok(Size::XL),
            other => Err(SynthError::InvalidSize(other.to_string())),
        }
    }
}

/// Parse the textual high-availability flag. Only the literals `true` and `false` are accepted.
pub fn parse_high_availability(s: &str) -> SynthResult<bool> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(SynthError::InvalidAvailabilityMode(other.to_string())),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderCredential {
    pub provider: ProviderName,
    pub credential_id: String,
    pub region: String,
}

/// What the user asked for. Read-only during synthesis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterIntent {
    pub name: String,
    pub description: String,
    pub project_id: String,
    pub size: Size,
    pub high_availability: bool,
    /// At most one credential per provider; input order carries no meaning.
    pub credentials: Vec<ProviderCredential>,
}

impl ClusterIntent {
    /// Credentials that participate, in [`PROVIDER_ORDER`]. Empty credential ids are skipped.
    pub fn selected(&self) -> Vec<&ProviderCredential> {
        PROVIDER_ORDER
            .iter()
            .filter_map(|p| self.credentials.iter().find(|c| c.provider == *p && !c.credential_id.is_empty()))
            .collect()
    }

    pub fn selected_providers(&self) -> Vec<ProviderName> {
        self.selected().into_iter().map(|c| c.provider).collect()
    }
}

/// Per-provider catalog answers from the platform.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedCapabilities {
    pub zones: Vec<String>,
    pub instance_types_by_size: BTreeMap<String, String>,
    pub operating_systems: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSpec {
    pub is_control_plane: bool,
    pub zone: String,
    #[serde(rename = "instanceType")]
    pub instance_type: String,
    #[serde(rename = "operatingSystem")]
    pub operating_system: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderBlock {
    pub account: u64,
    pub region: String,
    pub vpc_cidr: String,
    pub nodes: Vec<NodeSpec>,
}

/// Versions and network plugins the platform currently supports, best first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupportedKubernetesConfig {
    #[serde(rename = "supportedKubernetesVersions", default)]
    pub versions: Vec<String>,
    #[serde(rename = "supportedKubernetesNetworkPlugins", default)]
    pub network_plugins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesConfiguration {
    pub version: String,
    pub service_addresses: String,
    pub pods_subnet: String,
    pub network_plugin: String,
}

/// Body of `POST /createDlcmV2`. Key names are fixed by the platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningRequest {
    #[serde(rename = "projectId")]
    pub project_id: String,
    pub internal_dns_zone: String,
    #[serde(rename = "clusterName")]
    pub cluster_name: String,
    #[serde(rename = "clusterDescription")]
    pub cluster_description: String,
    #[serde(rename = "googleSelected")]
    pub google_selected: bool,
    #[serde(rename = "awsSelected")]
    pub aws_selected: bool,
    #[serde(rename = "azureSelected")]
    pub azure_selected: bool,
    #[serde(rename = "onpremiseSelected")]
    pub onpremise_selected: bool,
    #[serde(rename = "alicloudSelected")]
    pub alicloud_selected: bool,
    #[serde(rename = "iotarmSelected")]
    pub iotarm_selected: bool,
    #[serde(rename = "openstackSelected")]
    pub openstack_selected: bool,
    #[serde(rename = "type")]
    pub cluster_type: u32,
    pub resize: bool,
    #[serde(rename = "kubernetesConfiguration")]
    pub kubernetes_configuration: KubernetesConfiguration,
    pub load_balancer_integration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google: Option<ProviderBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<ProviderBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<ProviderBlock>,
}

impl ProvisioningRequest {
    pub fn block(&self, provider: ProviderName) -> Option<&ProviderBlock> {
        match provider {
            ProviderName::Google => self.google.as_ref(),
            ProviderName::Aws => self.aws.as_ref(),
            ProviderName::Azure => self.azure.as_ref(),
        }
    }

    /// All nodes across selected providers, in [`PROVIDER_ORDER`].
    pub fn nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        PROVIDER_ORDER.into_iter().filter_map(|p| self.block(p)).flat_map(|b| b.nodes.iter())
    }
}
