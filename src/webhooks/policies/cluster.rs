//! AzureCluster and AzureClusterTemplate policies.
//!
//! Create:
//! - cluster name, resource group and cloud environment
//! - VNet, subnets, load balancers, private DNS zone and bastion
//! - `extendedLocation` only with the EdgeZone gate
//!
//! Update: location, identity and network plumbing are fixed once created;
//! endpoint fields and the bastion may go from unset to set.

use kube::ResourceExt;

use super::{metadata_name_path, spec_path, template_spec_path};
use crate::config::FeatureGates;
use crate::crd::{
    AZURE_ENVIRONMENTS, AzureBastion, AzureCluster, AzureClusterClassSpec, AzureClusterTemplate,
    LoadBalancerClassSpec, LoadBalancerSpec, NetworkSpec, NetworkTemplateSpec, SecurityGroup, SubnetRole,
    SubnetSpec, SubnetTemplateSpec,
};
use crate::defaults::{set_azure_cluster_defaults, set_azure_cluster_template_defaults};
use crate::validation::network::{
    validate_api_server_lb, validate_api_server_lb_class, validate_bastion, validate_control_plane_outbound_lb,
    validate_node_outbound_lb, validate_private_dns_zone_name, validate_subnet_cidrs, validate_subnet_roles,
    validate_subnets, validate_vnet, validate_vnet_peerings,
};
use crate::validation::primitives::{validate_cidrs, validate_cluster_name, validate_resource_group, validate_subnet_name};
use crate::validation::security::validate_security_rules;
use crate::validation::{ErrorList, FieldError, FieldPath};
use crate::webhooks::immutability::{
    Rule, check_unchanged, compare, compare_after_defaulting, template_immutable_detail,
};

/// The only kind an `identityRef` may point at.
pub const CLUSTER_IDENTITY_KIND: &str = "AzureClusterIdentity";

// ============================================================================
// Create
// ============================================================================

/// Validate an AzureCluster.
pub fn validate_cluster(cluster: &AzureCluster, gates: &FeatureGates) -> ErrorList {
    let spec = &cluster.spec;
    let path = spec_path();

    let mut errs = validate_cluster_name(&cluster.name_any(), &metadata_name_path());
    errs.append(validate_class(&spec.class, gates, &path));
    if !spec.resource_group.is_empty() {
        errs.append(validate_resource_group(&spec.resource_group, &path.child("resourceGroup")));
    }
    errs.append(validate_network_spec(&spec.network_spec, &path.child("networkSpec")));
    if let Some(bastion) = &spec.bastion_spec.azure_bastion {
        errs.append(validate_bastion(
            bastion,
            &spec.network_spec.vnet.cidr_blocks,
            &path.child("bastionSpec").child("azureBastion"),
        ));
    }
    errs
}

fn validate_class(class: &AzureClusterClassSpec, gates: &FeatureGates, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if class.extended_location.is_some() && !gates.edge_zone {
        errs.push(FieldError::forbidden(
            path.child("extendedLocation"),
            "can be set only if the EdgeZone feature flag is enabled",
        ));
    }
    if let Some(kind) = class.identity_ref.as_ref().and_then(|r| r.kind.as_deref()) {
        if kind != CLUSTER_IDENTITY_KIND {
            errs.push(FieldError::not_supported(
                path.child("identityRef").child("kind"),
                kind,
                &[CLUSTER_IDENTITY_KIND],
            ));
        }
    }
    if !class.azure_environment.is_empty() && !AZURE_ENVIRONMENTS.contains(&class.azure_environment.as_str()) {
        errs.push(FieldError::not_supported(
            path.child("azureEnvironment"),
            &class.azure_environment,
            AZURE_ENVIRONMENTS,
        ));
    }
    errs
}

fn validate_network_spec(network: &NetworkSpec, path: &FieldPath) -> ErrorList {
    let mut errs = validate_vnet(&network.vnet, &path.child("vnet"));
    errs.append(validate_subnets(&network.subnets, &network.vnet, &path.child("subnets")));

    let lb_type = network.api_server_lb_type();
    if let Some(lb) = &network.api_server_lb {
        let control_plane_cidrs = network
            .subnets_with_role(SubnetRole::ControlPlane)
            .next()
            .map(|(_, s)| s.cidr_blocks.as_slice())
            .unwrap_or_default();
        errs.append(validate_api_server_lb(lb, control_plane_cidrs, &path.child("apiServerLB")));
    }
    errs.append(validate_node_outbound_lb(
        network.node_outbound_lb.as_ref(),
        network.has_ipv6_node_subnet(),
        lb_type,
        &path.child("nodeOutboundLB"),
    ));
    errs.append(validate_control_plane_outbound_lb(
        network.control_plane_outbound_lb.as_ref(),
        lb_type,
        &path.child("controlPlaneOutboundLB"),
    ));
    errs.append(validate_private_dns_zone_name(
        network.private_dns_zone_name.as_deref(),
        lb_type,
        &path.child("privateDNSZoneName"),
    ));
    errs
}

/// Validate an AzureClusterTemplate.
pub fn validate_cluster_template(template: &AzureClusterTemplate, gates: &FeatureGates) -> ErrorList {
    let spec = &template.spec.template.spec;
    let path = template_spec_path();

    let mut errs = validate_class(&spec.class, gates, &path);
    errs.append(validate_network_template(&spec.network_spec, &path.child("networkSpec")));
    if let Some(bastion) = &spec.bastion_spec.azure_bastion {
        let bastion = AzureBastion {
            subnet: subnet_from_template(&bastion.subnet),
            ..Default::default()
        };
        errs.append(validate_bastion(
            &bastion,
            &spec.network_spec.vnet.cidr_blocks,
            &path.child("bastionSpec").child("azureBastion"),
        ));
    }
    errs
}

fn validate_network_template(network: &NetworkTemplateSpec, path: &FieldPath) -> ErrorList {
    let vnet_cidrs = &network.vnet.cidr_blocks;
    let vnet_path = path.child("vnet");
    let mut errs = validate_cidrs(vnet_cidrs, &vnet_path.child("cidrBlocks"));
    errs.append(validate_vnet_peerings(&network.vnet.peerings, &vnet_path.child("peerings")));

    let subnets_path = path.child("subnets");
    let roles: Vec<_> = network.subnets.iter().map(|s| s.role).collect();
    errs.append(validate_subnet_roles(&roles, &subnets_path));
    for (i, subnet) in network.subnets.iter().enumerate() {
        let subnet_path = subnets_path.index(i);
        errs.append(validate_subnet_cidrs(&subnet.cidr_blocks, vnet_cidrs, &subnet_path.child("cidrBlocks")));
        errs.append(validate_security_rules(&subnet.security_rules, &subnet_path.child("securityRules")));
        if let Some(nat) = subnet.nat_gateway_name.as_deref().filter(|n| !n.is_empty()) {
            errs.append(validate_subnet_name(nat, &subnet_path.child("natGatewayName")));
        }
    }

    let lb_type = network.api_server_lb_type();
    if let Some(class) = &network.api_server_lb {
        errs.append(validate_api_server_lb_class(class, &path.child("apiServerLB")));
    }
    errs.append(validate_node_outbound_lb(
        network.node_outbound_lb.as_ref().map(lb_from_class).as_ref(),
        network.has_ipv6_node_subnet(),
        lb_type,
        &path.child("nodeOutboundLB"),
    ));
    errs.append(validate_control_plane_outbound_lb(
        network.control_plane_outbound_lb.as_ref().map(lb_from_class).as_ref(),
        lb_type,
        &path.child("controlPlaneOutboundLB"),
    ));
    errs.append(validate_private_dns_zone_name(
        network.private_dns_zone_name.as_deref(),
        lb_type,
        &path.child("privateDNSZoneName"),
    ));
    errs
}

fn lb_from_class(class: &LoadBalancerClassSpec) -> LoadBalancerSpec {
    LoadBalancerSpec {
        class: class.clone(),
        ..Default::default()
    }
}

fn subnet_from_template(subnet: &SubnetTemplateSpec) -> SubnetSpec {
    SubnetSpec {
        role: subnet.role,
        cidr_blocks: subnet.cidr_blocks.clone(),
        security_group: SecurityGroup {
            security_rules: subnet.security_rules.clone(),
            ..Default::default()
        },
        ..Default::default()
    }
}

// ============================================================================
// Update
// ============================================================================

fn cluster_rules() -> Vec<Rule> {
    vec![
        Rule::equal("spec.resourceGroup"),
        Rule::equal("spec.subscriptionID"),
        Rule::equal("spec.location"),
        Rule::equal("spec.extendedLocation"),
        Rule::enable_only("spec.controlPlaneEndpoint.host"),
        Rule::enable_only("spec.controlPlaneEndpoint.port"),
        Rule::equal("spec.networkSpec.privateDNSZoneName"),
        Rule::equal("spec.networkSpec.privateDNSZoneResourceGroup"),
        Rule::equal("spec.networkSpec.controlPlaneOutboundLB"),
        Rule::enable_only("spec.networkSpec.nodeOutboundLB.name"),
        Rule::enable_only("spec.networkSpec.nodeOutboundLB.sku"),
        Rule::enable_only("spec.networkSpec.nodeOutboundLB.type"),
        Rule::enable_only("spec.bastionSpec.azureBastion"),
    ]
}

/// Rules checked against the stored object after re-applying defaults.
fn renormalized_cluster_rules() -> Vec<Rule> {
    vec![Rule::equal("spec.azureEnvironment")]
}

fn subnet_rules(managed_vnet: bool) -> Vec<Rule> {
    let mut rules = Vec::with_capacity(4);
    // CIDRs of a VNet we do not own are the owner's business.
    if managed_vnet {
        rules.push(Rule::equal("cidrBlocks"));
    }
    rules.push(Rule::equal("routeTable.name"));
    rules.push(Rule::equal("securityGroup.name"));
    rules.push(Rule::enable_only("natGateway.name"));
    rules
}

/// Immutability rules of an AzureCluster update.
pub fn validate_cluster_immutability(old: &AzureCluster, new: &AzureCluster) -> ErrorList {
    let root = FieldPath::default();
    let mut errs = compare(old, new, &root, &cluster_rules());
    errs.append(compare_after_defaulting(
        old,
        new,
        &root,
        &renormalized_cluster_rules(),
        set_azure_cluster_defaults,
    ));

    let subnets_path = FieldPath::from_fields(&["spec", "networkSpec", "subnets"]);
    let rules = subnet_rules(new.spec.network_spec.vnet.is_managed(&new.name_any()));
    for (i, subnet) in new.spec.network_spec.subnets.iter().enumerate() {
        let Some(old_subnet) = old
            .spec
            .network_spec
            .subnets
            .iter()
            .find(|s| s.name == subnet.name)
        else {
            continue;
        };
        errs.append(compare(old_subnet, subnet, &subnets_path.index(i), &rules));
    }
    errs
}

/// Immutability rule of an AzureClusterTemplate update: the template spec
/// is frozen.
pub fn validate_cluster_template_immutability(old: &AzureClusterTemplate, new: &AzureClusterTemplate) -> ErrorList {
    if old.spec.template.spec == new.spec.template.spec {
        return ErrorList::new();
    }
    let mut old = old.clone();
    set_azure_cluster_template_defaults(&mut old);
    check_unchanged(
        &old.spec.template.spec,
        &new.spec.template.spec,
        template_spec_path(),
        &template_immutable_detail("AzureClusterTemplate"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::{AzureClusterSpec, AzureBastionTemplateSpec, ExtendedLocationSpec};
    use crate::validation::ErrorType;
    use k8s_openapi::api::core::v1::ObjectReference;
    use kube::api::ObjectMeta;

    fn defaulted_cluster(name: &str) -> AzureCluster {
        let mut cluster = AzureCluster {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: AzureClusterSpec {
                class: AzureClusterClassSpec {
                    location: "westus2".to_string(),
                    subscription_id: "sub".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        };
        set_azure_cluster_defaults(&mut cluster);
        cluster
    }

    fn paths(errs: &ErrorList) -> Vec<String> {
        errs.iter().map(|e| e.path.to_string()).collect()
    }

    #[test]
    fn test_defaulted_cluster_is_valid() {
        let cluster = defaulted_cluster("cluster-test");
        let errs = validate_cluster(&cluster, &FeatureGates::default());
        assert!(errs.is_empty(), "{errs}");
    }

    #[test]
    fn test_invalid_cluster_name() {
        let mut cluster = defaulted_cluster("good");
        cluster.metadata.name = Some("-bad".to_string());
        let errs = validate_cluster(&cluster, &FeatureGates::default());
        assert_eq!(paths(&errs), vec!["metadata.name"]);

        // Names derived from an invalid cluster name are reported as well.
        let errs = validate_cluster(&defaulted_cluster("-bad"), &FeatureGates::default());
        assert_eq!(paths(&errs)[0], "metadata.name");
        assert!(paths(&errs).contains(&"spec.networkSpec.subnets[0].name".to_string()));
    }

    #[test]
    fn test_extended_location_requires_edge_zone() {
        let mut cluster = defaulted_cluster("edge");
        cluster.spec.class.extended_location = Some(ExtendedLocationSpec {
            name: "losangeles".to_string(),
            r#type: "EdgeZone".to_string(),
        });
        let errs = validate_cluster(&cluster, &FeatureGates::default());
        assert_eq!(paths(&errs), vec!["spec.extendedLocation"]);
        assert_eq!(errs.iter().next().unwrap().error_type, ErrorType::Forbidden);

        let gates = FeatureGates {
            edge_zone: true,
            ..Default::default()
        };
        assert!(validate_cluster(&cluster, &gates).is_empty());
    }

    #[test]
    fn test_identity_ref_kind() {
        let mut cluster = defaulted_cluster("ident");
        cluster.spec.class.identity_ref = Some(ObjectReference {
            kind: Some("Secret".to_string()),
            name: Some("x".to_string()),
            ..Default::default()
        });
        let errs = validate_cluster(&cluster, &FeatureGates::default());
        assert_eq!(paths(&errs), vec!["spec.identityRef.kind"]);
    }

    #[test]
    fn test_private_dns_zone_requires_internal_lb() {
        let mut cluster = defaulted_cluster("dns");
        cluster.spec.network_spec.private_dns_zone_name = Some("example.private".to_string());
        let errs = validate_cluster(&cluster, &FeatureGates::default());
        assert_eq!(paths(&errs), vec!["spec.networkSpec.privateDNSZoneName"]);
    }

    #[test]
    fn test_duplicate_subnet_names() {
        let mut cluster = defaulted_cluster("dup");
        let mut extra = cluster.spec.network_spec.subnets[1].clone();
        extra.cidr_blocks = vec!["10.2.0.0/16".to_string()];
        cluster.spec.network_spec.subnets.push(extra);
        let errs = validate_cluster(&cluster, &FeatureGates::default());
        assert!(errs.iter().any(|e| e.error_type == ErrorType::Duplicate));
    }

    #[test]
    fn test_resource_group_is_immutable() {
        let mut old = defaulted_cluster("c1");
        old.spec.resource_group = "demoResourceGroup".to_string();
        let mut new = old.clone();
        new.spec.resource_group = "demoResourceGroup-2".to_string();
        let errs = validate_cluster_immutability(&old, &new);
        assert_eq!(paths(&errs), vec!["spec.resourceGroup"]);
        let err = errs.iter().next().unwrap();
        assert_eq!(err.error_type, ErrorType::Immutable);
        assert_eq!(err.detail, "field is immutable");
    }

    #[test]
    fn test_control_plane_endpoint_can_be_set_once() {
        let old = defaulted_cluster("c1");
        let mut new = old.clone();
        new.spec.control_plane_endpoint.host = "apiserver.example.com".to_string();
        new.spec.control_plane_endpoint.port = 6443;
        assert!(validate_cluster_immutability(&old, &new).is_empty());

        let mut changed = new.clone();
        changed.spec.control_plane_endpoint.port = 443;
        let errs = validate_cluster_immutability(&new, &changed);
        assert_eq!(paths(&errs), vec!["spec.controlPlaneEndpoint.port"]);
    }

    #[test]
    fn test_azure_environment_renormalized() {
        let mut old = defaulted_cluster("c1");
        old.spec.class.azure_environment = String::new();
        let new = defaulted_cluster("c1");
        assert!(validate_cluster_immutability(&old, &new).is_empty());

        let mut china = new.clone();
        china.spec.class.azure_environment = "AzureChinaCloud".to_string();
        assert_eq!(paths(&validate_cluster_immutability(&new, &china)), vec!["spec.azureEnvironment"]);
    }

    #[test]
    fn test_bastion_can_be_enabled_not_removed() {
        let old = defaulted_cluster("c1");
        let mut new = old.clone();
        new.spec.bastion_spec.azure_bastion = Some(AzureBastion::default());
        assert!(validate_cluster_immutability(&old, &new).is_empty());
        assert_eq!(
            paths(&validate_cluster_immutability(&new, &old)),
            vec!["spec.bastionSpec.azureBastion"]
        );
    }

    #[test]
    fn test_subnet_updates_are_matched_by_name() {
        let old = defaulted_cluster("c1");
        let mut new = old.clone();
        new.spec.network_spec.subnets.reverse();
        assert!(validate_cluster_immutability(&old, &new).is_empty());

        new.spec.network_spec.subnets[0].route_table.name = "other".to_string();
        new.spec.network_spec.subnets[0].cidr_blocks = vec!["10.9.0.0/16".to_string()];
        let errs = validate_cluster_immutability(&old, &new);
        assert_eq!(
            paths(&errs),
            vec![
                "spec.networkSpec.subnets[0].cidrBlocks",
                "spec.networkSpec.subnets[0].routeTable.name"
            ]
        );
    }

    #[test]
    fn test_nat_gateway_enable_only() {
        let mut old = defaulted_cluster("c1");
        old.spec.network_spec.subnets[1].nat_gateway.name = String::new();
        let new = defaulted_cluster("c1");
        assert!(validate_cluster_immutability(&old, &new).is_empty());
        let errs = validate_cluster_immutability(&new, &old);
        assert_eq!(paths(&errs), vec!["spec.networkSpec.subnets[1].natGateway.name"]);
    }

    fn template(name: &str) -> AzureClusterTemplate {
        AzureClusterTemplate {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_defaulted_template_is_valid() {
        let mut t = template("tmpl");
        t.spec.template.spec.bastion_spec.azure_bastion = Some(AzureBastionTemplateSpec::default());
        set_azure_cluster_template_defaults(&mut t);
        let errs = validate_cluster_template(&t, &FeatureGates::default());
        assert!(errs.is_empty(), "{errs}");
    }

    #[test]
    fn test_template_requires_node_outbound_lb_for_ipv6() {
        let mut t = template("tmpl");
        set_azure_cluster_template_defaults(&mut t);
        let node = t
            .spec
            .template
            .spec
            .network_spec
            .subnets
            .iter_mut()
            .find(|s| s.role == Some(SubnetRole::Node))
            .unwrap();
        node.cidr_blocks.push("2001:1234:5678:9abd::/64".to_string());
        t.spec.template.spec.network_spec.vnet.cidr_blocks.push("2001:1234:5678:9a00::/56".to_string());
        let errs = validate_cluster_template(&t, &FeatureGates::default());
        assert_eq!(paths(&errs), vec!["spec.template.spec.networkSpec.nodeOutboundLB"]);
    }

    #[test]
    fn test_template_spec_is_frozen() {
        let mut old = template("tmpl");
        set_azure_cluster_template_defaults(&mut old);
        let mut new = old.clone();
        new.spec.template.spec.class.location = "eastus".to_string();
        let errs = validate_cluster_template_immutability(&old, &new);
        assert_eq!(paths(&errs), vec!["spec.template.spec"]);
        assert!(errs.iter().next().unwrap().detail.starts_with("AzureClusterTemplate spec.template.spec"));
    }

    #[test]
    fn test_template_update_tolerates_new_defaults() {
        let old = template("tmpl");
        let mut new = old.clone();
        set_azure_cluster_template_defaults(&mut new);
        assert!(validate_cluster_template_immutability(&old, &new).is_empty());
    }
}
