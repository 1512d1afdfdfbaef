//! Fold provider allocations and the fixed cluster-wide fields into one request.

use daiteap_core::{
    ClusterIntent, KubernetesConfiguration, ProviderBlock, ProviderName, ProvisioningRequest, SupportedKubernetesConfig,
    SynthError, SynthResult, DLCMV2_CLUSTER_TYPE, INTERNAL_DNS_ZONE, PODS_SUBNET, SERVICE_ADDRESSES,
};

use crate::allocator::ProviderAllocation;

/// Version and plugin are the platform's first (preferred) entries.
pub fn kubernetes_configuration(supported: &SupportedKubernetesConfig) -> SynthResult<KubernetesConfiguration> {
    let version = supported
        .versions
        .first()
        .cloned()
        .ok_or_else(|| SynthError::ResolverUnavailable("platform reported no supported Kubernetes versions".into()))?;
    let network_plugin = supported
        .network_plugins
        .first()
        .cloned()
        .ok_or_else(|| SynthError::ResolverUnavailable("platform reported no supported network plugins".into()))?;
    Ok(KubernetesConfiguration {
        version,
        service_addresses: SERVICE_ADDRESSES.to_string(),
        pods_subnet: PODS_SUBNET.to_string(),
        network_plugin,
    })
}

pub fn provider_block(allocation: &ProviderAllocation) -> SynthResult<ProviderBlock> {
    let cred = &allocation.credential;
    let account = cred.credential_id.parse::<u64>().map_err(|_| SynthError::InvalidCredentialId {
        provider: cred.provider,
        credential_id: cred.credential_id.clone(),
    })?;
    Ok(ProviderBlock {
        account,
        region: cred.region.clone(),
        vpc_cidr: cred.provider.vpc_cidr().to_string(),
        nodes: allocation.nodes.clone(),
    })
}

/// Assemble the `createDlcmV2` body. `allocations` are expected in allocation order;
/// the load-balancer integration goes to the first of them.
pub fn assemble(
    intent: &ClusterIntent,
    allocations: &[ProviderAllocation],
    supported: &SupportedKubernetesConfig,
) -> SynthResult<ProvisioningRequest> {
    let kubernetes_configuration = kubernetes_configuration(supported)?;
    let block_for = |p: ProviderName| -> SynthResult<Option<ProviderBlock>> {
        allocations.iter().find(|a| a.provider() == p).map(provider_block).transpose()
    };
    let google = block_for(ProviderName::Google)?;
    let aws = block_for(ProviderName::Aws)?;
    let azure = block_for(ProviderName::Azure)?;
    let load_balancer_integration = allocations.first().map(|a| a.provider().as_str().to_string()).unwrap_or_default();

    Ok(ProvisioningRequest {
        project_id: intent.project_id.clone(),
        internal_dns_zone: INTERNAL_DNS_ZONE.to_string(),
        cluster_name: intent.name.clone(),
        cluster_description: intent.description.clone(),
        google_selected: google.is_some(),
        aws_selected: aws.is_some(),
        azure_selected: azure.is_some(),
        onpremise_selected: false,
        alicloud_selected: false,
        iotarm_selected: false,
        openstack_selected: false,
        cluster_type: DLCMV2_CLUSTER_TYPE,
        resize: false,
        kubernetes_configuration,
        load_balancer_integration,
        google,
        aws,
        azure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use daiteap_core::{NodeSpec, ProviderCredential, Size};
    use serde_json::json;

    fn intent() -> ClusterIntent {
        ClusterIntent {
            name: "demo".into(),
            description: "demo cluster".into(),
            project_id: "proj-1".into(),
            size: Size::S,
            high_availability: false,
            credentials: Vec::new(),
        }
    }

    fn supported() -> SupportedKubernetesConfig {
        SupportedKubernetesConfig { versions: vec!["v1.28.4".into(), "v1.27.1".into()], network_plugins: vec!["flannel".into(), "calico".into()] }
    }

    fn alloc(p: ProviderName, id: &str, cp: bool) -> ProviderAllocation {
        ProviderAllocation {
            credential: ProviderCredential { provider: p, credential_id: id.into(), region: "reg".into() },
            nodes: vec![NodeSpec { is_control_plane: cp, zone: "zone-a".into(), instance_type: "small".into(), operating_system: "ubuntu".into() }],
        }
    }

    #[test]
    fn unselected_providers_are_explicitly_false() {
        let req = assemble(&intent(), &[alloc(ProviderName::Aws, "12", true)], &supported()).unwrap();
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["googleSelected"], json!(false));
        assert_eq!(v["awsSelected"], json!(true));
        assert_eq!(v["azureSelected"], json!(false));
        for key in ["onpremiseSelected", "alicloudSelected", "iotarmSelected", "openstackSelected"] {
            assert_eq!(v[key], json!(false), "{key}");
        }
        assert!(v.get("google").is_none());
        assert!(v.get("azure").is_none());
        assert_eq!(v["load_balancer_integration"], json!("aws"));
    }

    #[test]
    fn load_balancer_goes_to_first_allocation() {
        let req = assemble(
            &intent(),
            &[alloc(ProviderName::Google, "1", true), alloc(ProviderName::Azure, "3", false)],
            &supported(),
        )
        .unwrap();
        assert_eq!(req.load_balancer_integration, "google");

        let none = assemble(&intent(), &[], &supported()).unwrap();
        assert_eq!(none.load_balancer_integration, "");
        assert!(!none.google_selected && !none.aws_selected && !none.azure_selected);
    }

    #[test]
    fn wire_shape_matches_platform_keys() {
        let req = assemble(&intent(), &[alloc(ProviderName::Azure, "7", true)], &supported()).unwrap();
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["projectId"], json!("proj-1"));
        assert_eq!(v["clusterName"], json!("demo"));
        assert_eq!(v["clusterDescription"], json!("demo cluster"));
        assert_eq!(v["internal_dns_zone"], json!("daiteap.internal"));
        assert_eq!(v["type"], json!(7));
        assert_eq!(v["resize"], json!(false));
        assert_eq!(
            v["kubernetesConfiguration"],
            json!({ "version": "v1.28.4", "serviceAddresses": "10.233.0.0/18", "podsSubnet": "10.233.64.0/18", "networkPlugin": "flannel" })
        );
        assert_eq!(
            v["azure"],
            json!({
                "account": 7,
                "region": "reg",
                "vpcCidr": "10.20.0.0/16",
                "nodes": [ { "is_control_plane": true, "zone": "zone-a", "instanceType": "small", "operatingSystem": "ubuntu" } ]
            })
        );
    }

    #[test]
    fn vpc_cidr_per_provider() {
        let req = assemble(
            &intent(),
            &[alloc(ProviderName::Google, "1", true), alloc(ProviderName::Aws, "2", false), alloc(ProviderName::Azure, "3", false)],
            &supported(),
        )
        .unwrap();
        assert_eq!(req.google.as_ref().unwrap().vpc_cidr, "10.30.0.0/16");
        assert_eq!(req.aws.as_ref().unwrap().vpc_cidr, "10.10.0.0/16");
        assert_eq!(req.azure.as_ref().unwrap().vpc_cidr, "10.20.0.0/16");
    }

    #[test]
    fn non_numeric_credential_is_rejected() {
        let err = assemble(&intent(), &[alloc(ProviderName::Google, "my-cred", true)], &supported()).unwrap_err();
        assert_eq!(err, SynthError::InvalidCredentialId { provider: ProviderName::Google, credential_id: "my-cred".into() });
    }

    #[test]
    fn empty_kubernetes_catalog_is_an_error() {
        let err = assemble(&intent(), &[], &SupportedKubernetesConfig::default()).unwrap_err();
        assert!(matches!(err, SynthError::ResolverUnavailable(_)));
    }

    #[test]
    fn request_round_trips() {
        let req = assemble(
            &intent(),
            &[alloc(ProviderName::Google, "1", true), alloc(ProviderName::Aws, "2", false)],
            &supported(),
        )
        .unwrap();
        let text = serde_json::to_string(&req).unwrap();
        let back: ProvisioningRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(back, req);
    }
}
